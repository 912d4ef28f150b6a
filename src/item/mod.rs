//! Contributions and comments.
mod query;

pub use query::*;

use serde::{Deserialize, Serialize};

pub type ItemId = i64;

/// Contribution or comment as saved on database.
///
/// A comment is an item with a `contribution`; a top-level comment has no
/// `parent`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub url: Option<String>,
    pub text: Option<String>,
    pub user_id: String,
    pub publication_time: chrono::DateTime<chrono::Utc>,
    pub points: i32,
    pub comments: i32,
    pub hidden: i32,
    #[serde(rename = "contribution", skip_serializing_if = "Option::is_none")]
    pub contribution_id: Option<ItemId>,
    #[serde(rename = "parent", skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ItemId>,
}

impl Item {
    /// Whether this item belongs to another contribution.
    pub fn is_comment(&self) -> bool {
        self.contribution_id.is_some()
    }

    /// Name used in error messages.
    pub fn kind(&self) -> &'static str {
        if self.is_comment() {
            "comment"
        } else {
            "contribution"
        }
    }
}

/// Item not yet saved.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NewItem {
    pub title: String,
    pub url: Option<String>,
    pub text: Option<String>,
    pub user_id: String,
    pub contribution_id: Option<ItemId>,
    pub parent_id: Option<ItemId>,
}

impl NewItem {
    /// Top-level link or text post.
    pub fn contribution(
        user_id: impl Into<String>,
        title: impl Into<String>,
        url: Option<String>,
        text: Option<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url,
            text,
            user_id: user_id.into(),
            ..Default::default()
        }
    }

    /// Comment on `contribution`, replying to `parent` when set.
    pub fn comment(
        user_id: impl Into<String>,
        contribution: ItemId,
        parent: Option<ItemId>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            text: Some(text.into()),
            user_id: user_id.into(),
            contribution_id: Some(contribution),
            parent_id: parent,
            ..Default::default()
        }
    }

    /// Turn into an [`Item`] once the store assigned an id.
    pub fn into_item(self, id: ItemId) -> Item {
        Item {
            id,
            title: self.title,
            url: self.url,
            text: self.text,
            user_id: self.user_id,
            publication_time: chrono::Utc::now(),
            points: 1,
            comments: 0,
            hidden: 0,
            contribution_id: self.contribution_id,
            parent_id: self.parent_id,
        }
    }
}

/// [`Item`] as seen by one viewer.
///
/// `liked` and `show` are computed per request and never saved.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemView {
    #[serde(flatten)]
    pub item: Item,
    pub liked: bool,
    pub show: bool,
}

impl ItemView {
    pub fn new(item: Item, liked: bool) -> Self {
        Self {
            item,
            liked,
            show: false,
        }
    }

    pub fn id(&self) -> ItemId {
        self.item.id
    }
}
