//! Likes and hides on contributions and comments.
//!
//! The API surface is strict: repeating a vote or a hide is a conflict.
//! The web surface toggles whatever the current state is.

use serde::{Deserialize, Serialize};

use crate::ServerError;
use crate::error::Result;
use crate::item::{Item, ItemId, Relation};
use crate::karma;
use crate::store::Transaction;

/// What the actor asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    /// Add to the set, conflict if already there.
    Add,
    /// Remove from the set, conflict if absent.
    Remove,
    /// Flip the current state.
    Toggle,
}

/// State of a like after a mutation.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct VoteOutcome {
    pub id: ItemId,
    pub liked: bool,
    pub points: i32,
    /// Karma of the author after the vote.
    pub karma: i32,
}

/// State of a hide after a mutation.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct HideOutcome {
    pub id: ItemId,
    pub hidden_by_you: bool,
    pub hidden: i32,
}

async fn target(tx: &mut dyn Transaction, id: ItemId) -> Result<Item> {
    tx.lock_item(id)
        .await?
        .ok_or_else(|| ServerError::not_found("item", id))
}

/// Resolve `intent` against the current membership; `true` means add.
fn decide(
    intent: Intent,
    present: bool,
    already: &'static str,
    missing: &'static str,
) -> Result<bool> {
    match (intent, present) {
        (Intent::Add, true) => Err(ServerError::Conflict(already)),
        (Intent::Remove, false) => Err(ServerError::Conflict(missing)),
        (Intent::Add, false) => Ok(true),
        (Intent::Remove, true) => Ok(false),
        (Intent::Toggle, present) => Ok(!present),
    }
}

/// Like or unlike item `id` as `actor`.
///
/// Karma of the author moves by one point and `points` is reset to the
/// size of the like set.
pub async fn like(
    tx: &mut dyn Transaction,
    actor: &str,
    id: ItemId,
    intent: Intent,
) -> Result<VoteOutcome> {
    let mut item = target(tx, id).await?;

    if intent == Intent::Remove
        && !item.is_comment()
        && item.user_id == actor
    {
        return Err(ServerError::SelfInteraction("contribution"));
    }

    let present = tx.related(Relation::Likes, id, actor).await?;
    let add = decide(
        intent,
        present,
        "you already voted this item",
        "you have not voted this item",
    )?;
    let delta = if add { 1 } else { -1 };

    if add {
        tx.relate(Relation::Likes, id, actor).await?;
    } else {
        tx.unrelate(Relation::Likes, id, actor).await?;
    }

    let karma = karma::credit(tx, &item.user_id, delta).await?;

    item.points += delta;
    let likes = tx.count_related(Relation::Likes, id).await? as i32;
    if likes != item.points {
        tracing::warn!(
            item = id,
            counter = item.points,
            likes,
            "points drifted from likes"
        );
    }
    item.points = likes;
    tx.update_item(&item).await?;

    crate::telemetry::record_vote(item.kind(), add);
    tracing::info!(item = id, %actor, liked = add, points = item.points, "vote");

    Ok(VoteOutcome {
        id,
        liked: add,
        points: item.points,
        karma,
    })
}

/// Hide or unhide item `id` for `actor`.
pub async fn hide(
    tx: &mut dyn Transaction,
    actor: &str,
    id: ItemId,
    intent: Intent,
) -> Result<HideOutcome> {
    let mut item = target(tx, id).await?;

    let present = tx.related(Relation::Hidden, id, actor).await?;
    let add = decide(
        intent,
        present,
        "you already hid this item",
        "you have not hidden this item",
    )?;

    if add {
        tx.relate(Relation::Hidden, id, actor).await?;
    } else {
        tx.unrelate(Relation::Hidden, id, actor).await?;
    }
    item.hidden = tx.count_related(Relation::Hidden, id).await? as i32;
    tx.update_item(&item).await?;

    crate::telemetry::record_hide(item.kind(), add);
    tracing::info!(item = id, %actor, hidden = add, "hide");

    Ok(HideOutcome {
        id,
        hidden_by_you: add,
        hidden: item.hidden,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::NewItem;
    use crate::store::{MemoryStore, Store};

    /// Store with one contribution by `alice` she already likes.
    async fn setup() -> (MemoryStore, ItemId) {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let item = tx
            .insert_item(NewItem::contribution(
                "alice",
                "Show: a tiny allocator",
                Some("https://example.com/alloc".into()),
                None,
            ))
            .await
            .unwrap();
        tx.relate(Relation::Likes, item.id, "alice").await.unwrap();
        tx.commit().await.unwrap();

        (store, item.id)
    }

    async fn karma_of(store: &MemoryStore, username: &str) -> Option<i32> {
        let mut tx = store.begin().await.unwrap();
        tx.find_profile(username).await.unwrap().map(|p| p.karma)
    }

    #[tokio::test]
    async fn test_like_round_trip() {
        let (store, id) = setup().await;

        let mut tx = store.begin().await.unwrap();
        let outcome = like(tx.as_mut(), "bob", id, Intent::Add).await.unwrap();
        assert_eq!(outcome.points, 2);
        assert_eq!(outcome.karma, 2);
        assert_eq!(
            outcome.points as i64,
            tx.count_related(Relation::Likes, id).await.unwrap()
        );
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        let outcome =
            like(tx.as_mut(), "bob", id, Intent::Remove).await.unwrap();
        tx.commit().await.unwrap();

        assert!(!outcome.liked);
        assert_eq!(outcome.points, 1);
        assert_eq!(karma_of(&store, "alice").await, Some(1));
    }

    #[tokio::test]
    async fn test_strict_guards() {
        let (store, id) = setup().await;
        let mut tx = store.begin().await.unwrap();

        like(tx.as_mut(), "bob", id, Intent::Add).await.unwrap();
        assert!(matches!(
            like(tx.as_mut(), "bob", id, Intent::Add).await,
            Err(ServerError::Conflict(_))
        ));
        assert!(matches!(
            like(tx.as_mut(), "carol", id, Intent::Remove).await,
            Err(ServerError::Conflict(_))
        ));
        assert!(matches!(
            like(tx.as_mut(), "alice", id, Intent::Remove).await,
            Err(ServerError::SelfInteraction(_))
        ));
        assert!(matches!(
            like(tx.as_mut(), "bob", 404, Intent::Add).await,
            Err(ServerError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_toggle_is_permissive() {
        let (store, id) = setup().await;
        let mut tx = store.begin().await.unwrap();

        // The author may take back her own vote on the web surface.
        let outcome =
            like(tx.as_mut(), "alice", id, Intent::Toggle).await.unwrap();
        assert!(!outcome.liked);
        assert_eq!(outcome.points, 0);
        assert_eq!(outcome.karma, 0);

        let outcome =
            like(tx.as_mut(), "alice", id, Intent::Toggle).await.unwrap();
        assert!(outcome.liked);
        assert_eq!(outcome.points, 1);
        assert_eq!(outcome.karma, 1);
    }

    #[tokio::test]
    async fn test_points_heal_from_drift() {
        let (store, id) = setup().await;
        let mut tx = store.begin().await.unwrap();

        let mut item = tx.find_item(id).await.unwrap().unwrap();
        item.points = 42;
        tx.update_item(&item).await.unwrap();

        let outcome = like(tx.as_mut(), "bob", id, Intent::Add).await.unwrap();
        assert_eq!(outcome.points, 2);
    }

    #[tokio::test]
    async fn test_hide_round_trip() {
        let (store, id) = setup().await;
        let mut tx = store.begin().await.unwrap();

        let outcome = hide(tx.as_mut(), "bob", id, Intent::Add).await.unwrap();
        assert_eq!(outcome.hidden, 1);
        assert!(matches!(
            hide(tx.as_mut(), "bob", id, Intent::Add).await,
            Err(ServerError::Conflict(_))
        ));

        let outcome =
            hide(tx.as_mut(), "bob", id, Intent::Remove).await.unwrap();
        assert_eq!(outcome.hidden, 0);
        assert!(!outcome.hidden_by_you);
        assert!(matches!(
            hide(tx.as_mut(), "bob", id, Intent::Remove).await,
            Err(ServerError::Conflict(_))
        ));
        // Hiding never touches karma.
        assert!(tx.find_profile("alice").await.unwrap().is_none());
    }
}
