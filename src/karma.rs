//! Karma ledger.
//!
//! Karma is moved by one point per like or unlike received. The profile row
//! is read locked inside the caller's transaction, so concurrent votes on
//! the same author serialize on it.

use crate::ServerError;
use crate::error::Result;
use crate::store::Transaction;
use crate::user::Profile;

/// Profile of `username`, created with default karma when missing.
pub async fn materialize(
    tx: &mut dyn Transaction,
    username: &str,
) -> Result<Profile> {
    if let Some(profile) = tx.lock_profile(username).await? {
        return Ok(profile);
    }

    // A concurrent transaction may create the row first; keep its values.
    tx.insert_profile_if_missing(&Profile::new(username)).await?;
    tracing::debug!(%username, "profile materialized");

    tx.lock_profile(username).await?.ok_or_else(|| ServerError::Internal {
        details: format!("profile of {username} vanished after insert"),
        source: None,
    })
}

/// Add `delta` to the karma of `username` and return the new value.
pub async fn credit(
    tx: &mut dyn Transaction,
    username: &str,
    delta: i32,
) -> Result<i32> {
    let mut profile = materialize(tx, username).await?;
    profile.karma += delta;
    tx.upsert_profile(&profile).await?;

    Ok(profile.karma)
}
