//! Entity store port and its adapters.
//!
//! Every operation runs inside a [`Transaction`]. Dropping a transaction
//! without calling [`Transaction::commit`] discards its writes.
mod memory;
mod postgres;

pub use memory::*;
pub use postgres::*;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::Result;
use crate::item::{Item, ItemId, ItemQuery, NewItem, Relation};
use crate::user::{Profile, User};

/// Entry point of the entity store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a new transaction.
    async fn begin(&self) -> Result<Box<dyn Transaction>>;
}

/// Unit of work on the entity store.
#[async_trait]
pub trait Transaction: Send {
    /// Find a user by its username.
    async fn find_user(&mut self, username: &str) -> Result<Option<User>>;

    /// Insert a new [`User`].
    async fn insert_user(&mut self, user: &User) -> Result<()>;

    /// Find the profile of `username`.
    async fn find_profile(&mut self, username: &str)
    -> Result<Option<Profile>>;

    /// Find the profile of `username`, preventing concurrent updates until
    /// commit.
    async fn lock_profile(&mut self, username: &str)
    -> Result<Option<Profile>>;

    /// Find the profile owning an API key hash.
    async fn find_profile_by_key(
        &mut self,
        key_hash: &str,
    ) -> Result<Option<Profile>>;

    /// Insert or replace a profile.
    async fn upsert_profile(&mut self, profile: &Profile) -> Result<()>;

    /// Insert `profile` unless its user already has one.
    async fn insert_profile_if_missing(&mut self, profile: &Profile)
    -> Result<()>;

    /// Find an item by id.
    async fn find_item(&mut self, id: ItemId) -> Result<Option<Item>>;

    /// Find an item by id, preventing concurrent updates until commit.
    async fn lock_item(&mut self, id: ItemId) -> Result<Option<Item>>;

    /// Insert an item and return it with its assigned id.
    async fn insert_item(&mut self, item: NewItem) -> Result<Item>;

    /// Save mutable fields of an item.
    async fn update_item(&mut self, item: &Item) -> Result<()>;

    /// Delete items and their relations.
    async fn delete_items(&mut self, ids: &[ItemId]) -> Result<()>;

    /// Items matching `query`, in its order.
    async fn items(&mut self, query: &ItemQuery) -> Result<Vec<Item>>;

    /// Whether `username` is in the `relation` set of `item`.
    async fn related(
        &mut self,
        relation: Relation,
        item: ItemId,
        username: &str,
    ) -> Result<bool>;

    /// Add `username` to the set; `false` when already present.
    async fn relate(
        &mut self,
        relation: Relation,
        item: ItemId,
        username: &str,
    ) -> Result<bool>;

    /// Remove `username` from the set; `false` when absent.
    async fn unrelate(
        &mut self,
        relation: Relation,
        item: ItemId,
        username: &str,
    ) -> Result<bool>;

    /// Cardinality of the set of `item`.
    async fn count_related(
        &mut self,
        relation: Relation,
        item: ItemId,
    ) -> Result<i64>;

    /// Every item `username` is related to.
    async fn related_items(
        &mut self,
        relation: Relation,
        username: &str,
    ) -> Result<HashSet<ItemId>>;

    /// Make every write of this transaction durable.
    async fn commit(self: Box<Self>) -> Result<()>;
}
