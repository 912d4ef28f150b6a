use serde::{Deserialize, Serialize};

/// Karma given to a freshly materialized profile.
pub const DEFAULT_KARMA: i32 = 1;
const DEFAULT_MAXVISIT: i32 = 20;
const DEFAULT_MINAWAY: i32 = 180;

/// User as saved on database.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub username: String,
    #[serde(skip)]
    pub password: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl User {
    /// Create a new [`User`] from an already hashed password.
    pub fn new(username: impl Into<String>, password_hash: String) -> Self {
        Self {
            username: username.into(),
            password: password_hash,
            created_at: chrono::Utc::now(),
        }
    }
}

/// Profile extension of a [`User`], known as user fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Profile {
    pub username: String,
    pub karma: i32,
    pub about: Option<String>,
    pub showdead: bool,
    pub noprocrast: bool,
    pub maxvisit: i32,
    pub minaway: i32,
    pub delay: i32,
    #[serde(skip)]
    pub api_key_hash: Option<String>,
}

impl Profile {
    /// Create a default profile for `username`.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            karma: DEFAULT_KARMA,
            about: None,
            showdead: false,
            noprocrast: false,
            maxvisit: DEFAULT_MAXVISIT,
            minaway: DEFAULT_MINAWAY,
            delay: 0,
            api_key_hash: None,
        }
    }
}

/// Publicly visible part of a [`Profile`].
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicProfile {
    pub username: String,
    pub karma: i32,
    pub about: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl PublicProfile {
    pub fn new(user: &User, profile: &Profile) -> Self {
        Self {
            username: user.username.clone(),
            karma: profile.karma,
            about: profile.about.clone(),
            created_at: user.created_at,
        }
    }
}
