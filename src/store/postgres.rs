//! PostgreSQL store.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, QueryBuilder};

use super::{Store, Transaction};
use crate::error::Result;
use crate::item::{Item, ItemId, ItemQuery, NewItem, Relation};
use crate::user::{Profile, User};

const ITEM_COLUMNS: &str = "i.id, i.title, i.url, i.text, i.user_id, i.publication_time, i.points, i.comments, i.hidden, i.contribution_id, i.parent_id";
const PROFILE_COLUMNS: &str = "username, karma, about, showdead, noprocrast, maxvisit, minaway, delay, api_key_hash";

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    /// Create a new [`PgStore`].
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }
}

pub struct PgTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

impl PgTransaction {
    async fn profile(
        &mut self,
        username: &str,
        lock: bool,
    ) -> Result<Option<Profile>> {
        let query = format!(
            "SELECT {PROFILE_COLUMNS} FROM user_fields WHERE username = $1{}",
            if lock { " FOR UPDATE" } else { "" }
        );

        Ok(sqlx::query_as::<_, Profile>(&query)
            .bind(username)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn item(&mut self, id: ItemId, lock: bool) -> Result<Option<Item>> {
        let query = format!(
            "SELECT {ITEM_COLUMNS} FROM items i WHERE i.id = $1{}",
            if lock { " FOR UPDATE" } else { "" }
        );

        Ok(sqlx::query_as::<_, Item>(&query)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?)
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn find_user(&mut self, username: &str) -> Result<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT username, password, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&mut *self.tx)
        .await?)
    }

    async fn insert_user(&mut self, user: &User) -> Result<()> {
        let result = sqlx::query(
            r#"INSERT INTO users (username, password, created_at) VALUES ($1, $2, $3)
                ON CONFLICT (username) DO NOTHING"#,
        )
        .bind(&user.username)
        .bind(&user.password)
        .bind(user.created_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() != 1 {
            return Err(crate::ServerError::Conflict("username is taken"));
        }

        Ok(())
    }

    async fn find_profile(
        &mut self,
        username: &str,
    ) -> Result<Option<Profile>> {
        self.profile(username, false).await
    }

    async fn lock_profile(
        &mut self,
        username: &str,
    ) -> Result<Option<Profile>> {
        self.profile(username, true).await
    }

    async fn find_profile_by_key(
        &mut self,
        key_hash: &str,
    ) -> Result<Option<Profile>> {
        let query = format!(
            "SELECT {PROFILE_COLUMNS} FROM user_fields WHERE api_key_hash = $1"
        );

        Ok(sqlx::query_as::<_, Profile>(&query)
            .bind(key_hash)
            .fetch_optional(&mut *self.tx)
            .await?)
    }

    async fn upsert_profile(&mut self, profile: &Profile) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO user_fields (username, karma, about, showdead, noprocrast, maxvisit, minaway, delay, api_key_hash)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (username) DO UPDATE SET
                    karma = EXCLUDED.karma,
                    about = EXCLUDED.about,
                    showdead = EXCLUDED.showdead,
                    noprocrast = EXCLUDED.noprocrast,
                    maxvisit = EXCLUDED.maxvisit,
                    minaway = EXCLUDED.minaway,
                    delay = EXCLUDED.delay,
                    api_key_hash = EXCLUDED.api_key_hash"#,
        )
        .bind(&profile.username)
        .bind(profile.karma)
        .bind(&profile.about)
        .bind(profile.showdead)
        .bind(profile.noprocrast)
        .bind(profile.maxvisit)
        .bind(profile.minaway)
        .bind(profile.delay)
        .bind(&profile.api_key_hash)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_profile_if_missing(
        &mut self,
        profile: &Profile,
    ) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO user_fields (username, karma, about, showdead, noprocrast, maxvisit, minaway, delay, api_key_hash)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (username) DO NOTHING"#,
        )
        .bind(&profile.username)
        .bind(profile.karma)
        .bind(&profile.about)
        .bind(profile.showdead)
        .bind(profile.noprocrast)
        .bind(profile.maxvisit)
        .bind(profile.minaway)
        .bind(profile.delay)
        .bind(&profile.api_key_hash)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_item(&mut self, id: ItemId) -> Result<Option<Item>> {
        self.item(id, false).await
    }

    async fn lock_item(&mut self, id: ItemId) -> Result<Option<Item>> {
        self.item(id, true).await
    }

    async fn insert_item(&mut self, item: NewItem) -> Result<Item> {
        let query = format!(
            r#"INSERT INTO items AS i (title, url, text, user_id, contribution_id, parent_id)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING {ITEM_COLUMNS}"#
        );

        Ok(sqlx::query_as::<_, Item>(&query)
            .bind(item.title)
            .bind(item.url)
            .bind(item.text)
            .bind(item.user_id)
            .bind(item.contribution_id)
            .bind(item.parent_id)
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn update_item(&mut self, item: &Item) -> Result<()> {
        sqlx::query(
            r#"UPDATE items
                SET title = $1, url = $2, text = $3, points = $4, comments = $5, hidden = $6
                WHERE id = $7"#,
        )
        .bind(&item.title)
        .bind(&item.url)
        .bind(&item.text)
        .bind(item.points)
        .bind(item.comments)
        .bind(item.hidden)
        .bind(item.id)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_items(&mut self, ids: &[ItemId]) -> Result<()> {
        // Relations are removed by `ON DELETE CASCADE`.
        sqlx::query("DELETE FROM items WHERE id = ANY($1)")
            .bind(ids)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn items(&mut self, query: &ItemQuery) -> Result<Vec<Item>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {ITEM_COLUMNS} FROM items i WHERE "
        ));

        builder.push(match query.scope {
            crate::item::Scope::Contributions => "i.contribution_id IS NULL",
            crate::item::Scope::Comments => "i.contribution_id IS NOT NULL",
        });
        match query.format {
            Some(crate::item::Format::Ask) => {
                builder.push(" AND i.url IS NULL");
            },
            Some(crate::item::Format::Show) => {
                builder.push(" AND i.url IS NOT NULL");
            },
            None => {},
        }
        if let Some(author) = &query.author {
            builder.push(" AND i.user_id = ").push_bind(author.clone());
        }
        if let Some(contribution) = query.contribution {
            builder
                .push(" AND i.contribution_id = ")
                .push_bind(contribution);
        }
        for (relation, user) in [
            (Relation::Likes, &query.liked_by),
            (Relation::Hidden, &query.hidden_by),
        ] {
            if let Some(user) = user {
                builder
                    .push(format!(
                        " AND EXISTS (SELECT 1 FROM {} r WHERE r.item_id = i.id AND r.username = ",
                        relation.table()
                    ))
                    .push_bind(user.clone())
                    .push(")");
            }
        }
        builder.push(" ORDER BY ").push(query.order.sql());

        Ok(builder
            .build_query_as::<Item>()
            .fetch_all(&mut *self.tx)
            .await?)
    }

    async fn related(
        &mut self,
        relation: Relation,
        item: ItemId,
        username: &str,
    ) -> Result<bool> {
        let query = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE item_id = $1 AND username = $2)",
            relation.table()
        );

        Ok(sqlx::query_scalar::<_, bool>(&query)
            .bind(item)
            .bind(username)
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn relate(
        &mut self,
        relation: Relation,
        item: ItemId,
        username: &str,
    ) -> Result<bool> {
        let query = format!(
            "INSERT INTO {} (item_id, username) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            relation.table()
        );

        let result = sqlx::query(&query)
            .bind(item)
            .bind(username)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn unrelate(
        &mut self,
        relation: Relation,
        item: ItemId,
        username: &str,
    ) -> Result<bool> {
        let query = format!(
            "DELETE FROM {} WHERE item_id = $1 AND username = $2",
            relation.table()
        );

        let result = sqlx::query(&query)
            .bind(item)
            .bind(username)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn count_related(
        &mut self,
        relation: Relation,
        item: ItemId,
    ) -> Result<i64> {
        let query =
            format!("SELECT COUNT(*) FROM {} WHERE item_id = $1", relation.table());

        Ok(sqlx::query_scalar::<_, i64>(&query)
            .bind(item)
            .fetch_one(&mut *self.tx)
            .await?)
    }

    async fn related_items(
        &mut self,
        relation: Relation,
        username: &str,
    ) -> Result<HashSet<ItemId>> {
        let query =
            format!("SELECT item_id FROM {} WHERE username = $1", relation.table());

        let ids = sqlx::query_scalar::<_, ItemId>(&query)
            .bind(username)
            .fetch_all(&mut *self.tx)
            .await?;

        Ok(ids.into_iter().collect())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
