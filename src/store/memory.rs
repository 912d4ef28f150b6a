//! In-memory store, used when no PostgreSQL is configured and by tests.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Store, Transaction};
use crate::error::Result;
use crate::item::{Item, ItemId, ItemQuery, NewItem, Relation};
use crate::user::{Profile, User};

#[derive(Clone, Debug, Default)]
struct Tables {
    users: BTreeMap<String, User>,
    profiles: BTreeMap<String, Profile>,
    items: BTreeMap<ItemId, Item>,
    likes: BTreeSet<(ItemId, String)>,
    hidden: BTreeSet<(ItemId, String)>,
    last_id: ItemId,
}

impl Tables {
    fn set(&self, relation: Relation) -> &BTreeSet<(ItemId, String)> {
        match relation {
            Relation::Likes => &self.likes,
            Relation::Hidden => &self.hidden,
        }
    }

    fn set_mut(
        &mut self,
        relation: Relation,
    ) -> &mut BTreeSet<(ItemId, String)> {
        match relation {
            Relation::Likes => &mut self.likes,
            Relation::Hidden => &mut self.hidden,
        }
    }
}

/// Store keeping everything in process memory.
///
/// Transactions are serialized: one holds the whole store until it is
/// committed or dropped.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    /// Create an empty [`MemoryStore`].
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let scratch = guard.clone();

        Ok(Box::new(MemoryTransaction { guard, scratch }))
    }
}

/// Writes go to `scratch`, copied back on commit.
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    scratch: Tables,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn find_user(&mut self, username: &str) -> Result<Option<User>> {
        Ok(self.scratch.users.get(username).cloned())
    }

    async fn insert_user(&mut self, user: &User) -> Result<()> {
        if self.scratch.users.contains_key(&user.username) {
            return Err(crate::ServerError::Conflict("username is taken"));
        }
        self.scratch
            .users
            .insert(user.username.clone(), user.clone());
        Ok(())
    }

    async fn find_profile(
        &mut self,
        username: &str,
    ) -> Result<Option<Profile>> {
        Ok(self.scratch.profiles.get(username).cloned())
    }

    async fn lock_profile(
        &mut self,
        username: &str,
    ) -> Result<Option<Profile>> {
        self.find_profile(username).await
    }

    async fn find_profile_by_key(
        &mut self,
        key_hash: &str,
    ) -> Result<Option<Profile>> {
        Ok(self
            .scratch
            .profiles
            .values()
            .find(|p| p.api_key_hash.as_deref() == Some(key_hash))
            .cloned())
    }

    async fn upsert_profile(&mut self, profile: &Profile) -> Result<()> {
        self.scratch
            .profiles
            .insert(profile.username.clone(), profile.clone());
        Ok(())
    }

    async fn insert_profile_if_missing(
        &mut self,
        profile: &Profile,
    ) -> Result<()> {
        self.scratch
            .profiles
            .entry(profile.username.clone())
            .or_insert_with(|| profile.clone());
        Ok(())
    }

    async fn find_item(&mut self, id: ItemId) -> Result<Option<Item>> {
        Ok(self.scratch.items.get(&id).cloned())
    }

    async fn lock_item(&mut self, id: ItemId) -> Result<Option<Item>> {
        self.find_item(id).await
    }

    async fn insert_item(&mut self, item: NewItem) -> Result<Item> {
        self.scratch.last_id += 1;
        let item = item.into_item(self.scratch.last_id);
        self.scratch.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn update_item(&mut self, item: &Item) -> Result<()> {
        match self.scratch.items.get_mut(&item.id) {
            Some(saved) => {
                *saved = item.clone();
                Ok(())
            },
            None => Err(crate::ServerError::not_found(item.kind(), item.id)),
        }
    }

    async fn delete_items(&mut self, ids: &[ItemId]) -> Result<()> {
        let ids: HashSet<ItemId> = ids.iter().copied().collect();
        self.scratch.items.retain(|id, _| !ids.contains(id));
        self.scratch.likes.retain(|(id, _)| !ids.contains(id));
        self.scratch.hidden.retain(|(id, _)| !ids.contains(id));
        Ok(())
    }

    async fn items(&mut self, query: &ItemQuery) -> Result<Vec<Item>> {
        let tables = &self.scratch;
        let in_set = |relation: Relation, user: &Option<String>, id: ItemId| {
            user.as_ref().is_none_or(|user| {
                tables.set(relation).contains(&(id, user.clone()))
            })
        };

        let mut items: Vec<Item> = tables
            .items
            .values()
            .filter(|item| query.matches(item))
            .filter(|item| in_set(Relation::Likes, &query.liked_by, item.id))
            .filter(|item| in_set(Relation::Hidden, &query.hidden_by, item.id))
            .cloned()
            .collect();
        items.sort_by(|a, b| query.order.compare(a, b));

        Ok(items)
    }

    async fn related(
        &mut self,
        relation: Relation,
        item: ItemId,
        username: &str,
    ) -> Result<bool> {
        Ok(self
            .scratch
            .set(relation)
            .contains(&(item, username.to_owned())))
    }

    async fn relate(
        &mut self,
        relation: Relation,
        item: ItemId,
        username: &str,
    ) -> Result<bool> {
        Ok(self
            .scratch
            .set_mut(relation)
            .insert((item, username.to_owned())))
    }

    async fn unrelate(
        &mut self,
        relation: Relation,
        item: ItemId,
        username: &str,
    ) -> Result<bool> {
        Ok(self
            .scratch
            .set_mut(relation)
            .remove(&(item, username.to_owned())))
    }

    async fn count_related(
        &mut self,
        relation: Relation,
        item: ItemId,
    ) -> Result<i64> {
        Ok(self
            .scratch
            .set(relation)
            .iter()
            .filter(|(id, _)| *id == item)
            .count() as i64)
    }

    async fn related_items(
        &mut self,
        relation: Relation,
        username: &str,
    ) -> Result<HashSet<ItemId>> {
        Ok(self
            .scratch
            .set(relation)
            .iter()
            .filter(|(_, user)| user == username)
            .map(|(id, _)| *id)
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTransaction { mut guard, scratch } = *self;
        *guard = scratch;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&User::new("alice", "hash".into())).await.unwrap();
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_user("alice").await.unwrap().is_none());
        tx.insert_user(&User::new("alice", "hash".into())).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_user("alice").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_relations_follow_deleted_items() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let item = tx
            .insert_item(NewItem::contribution(
                "alice",
                "Ask: borrowck?",
                None,
                Some("why".into()),
            ))
            .await
            .unwrap();
        assert!(tx.relate(Relation::Likes, item.id, "bob").await.unwrap());
        assert!(!tx.relate(Relation::Likes, item.id, "bob").await.unwrap());
        assert_eq!(tx.count_related(Relation::Likes, item.id).await.unwrap(), 1);

        tx.delete_items(&[item.id]).await.unwrap();
        assert_eq!(tx.count_related(Relation::Likes, item.id).await.unwrap(), 0);
        assert!(tx.find_item(item.id).await.unwrap().is_none());
    }
}
