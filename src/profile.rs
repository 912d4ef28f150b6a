//! Accounts, API keys and profiles.

use serde::{Deserialize, Serialize};
use validator::Validate;
use zeroize::Zeroizing;

use crate::ServerError;
use crate::crypto::{Crypto, generate_api_key};
use crate::error::Result;
use crate::karma;
use crate::store::Store;
use crate::user::{Profile, PublicProfile, User};

/// Changes a user can make to their own profile.
#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(
        max = 2000,
        message = "About must be at most 2000 characters long."
    ))]
    pub about: Option<String>,
    pub showdead: Option<bool>,
    pub noprocrast: Option<bool>,
    #[validate(range(min = 0, message = "Must be positive."))]
    pub maxvisit: Option<i32>,
    #[validate(range(min = 0, message = "Must be positive."))]
    pub minaway: Option<i32>,
    #[validate(range(min = 0, message = "Must be positive."))]
    pub delay: Option<i32>,
}

/// Create an account and return its first API key.
pub async fn register(
    store: &dyn Store,
    crypto: &Crypto,
    username: &str,
    password: &str,
    about: Option<String>,
) -> Result<Zeroizing<String>> {
    let hash = crypto.pwd.hash_password(password)?;

    let mut tx = store.begin().await?;
    if tx.find_user(username).await?.is_some() {
        return Err(ServerError::Conflict("username is taken"));
    }
    tx.insert_user(&User::new(username, hash)).await?;

    let key = generate_api_key();
    let mut profile = Profile::new(username);
    profile.about = about;
    profile.api_key_hash = Some(crypto.hasher.digest(key.as_bytes()));
    tx.upsert_profile(&profile).await?;
    tx.commit().await?;

    tracing::info!(%username, "user registered");

    Ok(key)
}

/// Check credentials and issue a new API key. The previous key stops
/// working.
pub async fn login(
    store: &dyn Store,
    crypto: &Crypto,
    username: &str,
    password: &str,
) -> Result<Zeroizing<String>> {
    let mut tx = store.begin().await?;

    let hash = match tx.find_user(username).await? {
        Some(user) => user.password,
        // Same answer, and same cost, as a wrong password.
        None => crypto.pwd.dummy_hash().to_owned(),
    };
    crypto.pwd.verify_password(password, hash)?;

    let key = generate_api_key();
    let mut profile = karma::materialize(tx.as_mut(), username).await?;
    profile.api_key_hash = Some(crypto.hasher.digest(key.as_bytes()));
    tx.upsert_profile(&profile).await?;
    tx.commit().await?;

    tracing::info!(%username, "api key rotated");

    Ok(key)
}

/// Username owning API key `key`.
pub async fn authenticate(
    store: &dyn Store,
    crypto: &Crypto,
    key: &str,
) -> Result<String> {
    let digest = crypto.hasher.digest(key.as_bytes());

    let mut tx = store.begin().await?;
    tx.find_profile_by_key(&digest)
        .await?
        .map(|profile| profile.username)
        .ok_or(ServerError::Unauthorized)
}

/// Existing user and its profile, materializing the profile if needed.
async fn load(store: &dyn Store, username: &str) -> Result<(User, Profile)> {
    let mut tx = store.begin().await?;
    let user = tx
        .find_user(username)
        .await?
        .ok_or_else(|| ServerError::not_found("user", username))?;
    let profile = karma::materialize(tx.as_mut(), username).await?;
    tx.commit().await?;

    Ok((user, profile))
}

/// Profile of `username` as anyone sees it.
pub async fn public(store: &dyn Store, username: &str) -> Result<PublicProfile> {
    let (user, profile) = load(store, username).await?;
    Ok(PublicProfile::new(&user, &profile))
}

/// Full profile of `username`, preferences included.
pub async fn private(store: &dyn Store, username: &str) -> Result<Profile> {
    load(store, username).await.map(|(_, profile)| profile)
}

/// Apply `changes` to the profile of `username`.
pub async fn update(
    store: &dyn Store,
    username: &str,
    changes: ProfileUpdate,
) -> Result<Profile> {
    let mut tx = store.begin().await?;
    let mut profile = karma::materialize(tx.as_mut(), username).await?;

    if let Some(about) = changes.about {
        profile.about = Some(about);
    }
    if let Some(showdead) = changes.showdead {
        profile.showdead = showdead;
    }
    if let Some(noprocrast) = changes.noprocrast {
        profile.noprocrast = noprocrast;
    }
    if let Some(maxvisit) = changes.maxvisit {
        profile.maxvisit = maxvisit;
    }
    if let Some(minaway) = changes.minaway {
        profile.minaway = minaway;
    }
    if let Some(delay) = changes.delay {
        profile.delay = delay;
    }

    tx.upsert_profile(&profile).await?;
    tx.commit().await?;

    Ok(profile)
}
