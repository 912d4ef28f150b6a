//! Listings and discussions as seen by one viewer.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::ServerError;
use crate::error::Result;
use crate::item::{Item, ItemId, ItemQuery, ItemView, Relation};
use crate::ranking::{Page, PageWindow, paginate};
use crate::store::{Store, Transaction};
use crate::tree::{ThreadEntry, thread};
use crate::visibility::{Mode, update_show};

/// Liked and hidden sets of a viewer; empty for anonymous viewers.
#[derive(Debug, Default)]
struct Relations {
    liked: HashSet<ItemId>,
    hidden: HashSet<ItemId>,
}

impl Relations {
    async fn load(
        tx: &mut dyn Transaction,
        viewer: Option<&str>,
    ) -> Result<Self> {
        let Some(viewer) = viewer else {
            return Ok(Self::default());
        };

        Ok(Self {
            liked: tx.related_items(Relation::Likes, viewer).await?,
            hidden: tx.related_items(Relation::Hidden, viewer).await?,
        })
    }

    fn views(&self, items: Vec<Item>) -> Vec<ItemView> {
        items
            .into_iter()
            .map(|item| {
                let liked = self.liked.contains(&item.id);
                ItemView::new(item, liked)
            })
            .collect()
    }
}

/// Contribution with its comment thread.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Discussion {
    pub contribution: ItemView,
    pub comments: Vec<ThreadEntry>,
}

/// One page of `query` for `viewer`.
pub async fn page(
    store: &dyn Store,
    query: &ItemQuery,
    viewer: Option<&str>,
    mode: Mode,
    window: PageWindow,
) -> Result<Page<ItemView>> {
    let mut tx = store.begin().await?;
    let candidates = tx.items(query).await?;
    let relations = Relations::load(tx.as_mut(), viewer).await?;

    let mut views = relations.views(candidates);
    update_show(&mut views, &relations.hidden, window.border(), mode);
    let shown: Vec<ItemView> = views.into_iter().filter(|v| v.show).collect();

    Ok(paginate(shown, &window))
}

/// Every candidate of `query`, with `show` set for `viewer`.
pub async fn all(
    store: &dyn Store,
    query: &ItemQuery,
    viewer: Option<&str>,
    mode: Mode,
) -> Result<Vec<ItemView>> {
    let mut tx = store.begin().await?;
    let candidates = tx.items(query).await?;
    let relations = Relations::load(tx.as_mut(), viewer).await?;

    let mut views = relations.views(candidates);
    let border = views.len();
    update_show(&mut views, &relations.hidden, border, mode);

    Ok(views)
}

/// Single item for `viewer`.
pub async fn item(
    store: &dyn Store,
    id: ItemId,
    viewer: Option<&str>,
) -> Result<ItemView> {
    let mut tx = store.begin().await?;
    let item = tx
        .find_item(id)
        .await?
        .ok_or_else(|| ServerError::not_found("item", id))?;
    let relations = Relations::load(tx.as_mut(), viewer).await?;

    let mut view = ItemView::new(item, relations.liked.contains(&id));
    view.show = !relations.hidden.contains(&id);

    Ok(view)
}

/// Contribution `id` and its comments as a thread.
pub async fn discussion(
    store: &dyn Store,
    id: ItemId,
    viewer: Option<&str>,
) -> Result<Discussion> {
    let mut tx = store.begin().await?;
    let contribution = tx
        .find_item(id)
        .await?
        .filter(|item| !item.is_comment())
        .ok_or_else(|| ServerError::not_found("contribution", id))?;
    let comments = tx
        .items(&ItemQuery::comments().thread(id).order(crate::item::Order::Oldest))
        .await?;
    let relations = Relations::load(tx.as_mut(), viewer).await?;

    let mut contribution =
        ItemView::new(contribution, relations.liked.contains(&id));
    contribution.show = !relations.hidden.contains(&id);

    Ok(Discussion {
        contribution,
        comments: thread(relations.views(comments), &relations.hidden),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::NewItem;
    use crate::ranking::DEFAULT_PAGE_SIZE;
    use crate::store::MemoryStore;

    async fn seed(store: &MemoryStore, count: usize) -> Vec<ItemId> {
        let mut tx = store.begin().await.unwrap();
        let mut ids = Vec::new();
        for n in 0..count {
            let item = tx
                .insert_item(NewItem::contribution(
                    "alice",
                    format!("Story {n}"),
                    Some(format!("https://example.com/{n}")),
                    None,
                ))
                .await
                .unwrap();
            ids.push(item.id);
        }
        tx.commit().await.unwrap();
        ids
    }

    #[tokio::test]
    async fn test_page_skips_hidden_and_reports_more() {
        let store = MemoryStore::new();
        let ids = seed(&store, 35).await;

        let mut tx = store.begin().await.unwrap();
        tx.relate(Relation::Hidden, ids[34], "bob").await.unwrap();
        tx.relate(Relation::Likes, ids[33], "bob").await.unwrap();
        tx.commit().await.unwrap();

        // Newest first: ids[34] would rank first.
        let query = ItemQuery::contributions().order(crate::item::Order::Newest);
        let window = PageWindow::first(DEFAULT_PAGE_SIZE, true);
        let page = page(&store, &query, Some("bob"), Mode::UnlessHidden, window)
            .await
            .unwrap();

        assert_eq!(page.items.len(), 30);
        assert!(page.more);
        assert_eq!(page.items[0].id(), ids[33]);
        assert!(page.items[0].liked);
        assert!(page.items.iter().all(|v| v.show));
        assert!(page.items.iter().all(|v| v.id() != ids[34]));
    }

    #[tokio::test]
    async fn test_hidden_view() {
        let store = MemoryStore::new();
        let ids = seed(&store, 5).await;

        let mut tx = store.begin().await.unwrap();
        tx.relate(Relation::Hidden, ids[1], "bob").await.unwrap();
        tx.commit().await.unwrap();

        let query = ItemQuery::contributions().hidden_by("bob");
        let window = PageWindow::first(DEFAULT_PAGE_SIZE, true);
        let page = page(&store, &query, Some("bob"), Mode::OnlyHidden, window)
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id(), ids[1]);
        assert!(!page.more);
    }

    #[tokio::test]
    async fn test_all_marks_hidden_without_dropping() {
        let store = MemoryStore::new();
        let ids = seed(&store, 3).await;

        let mut tx = store.begin().await.unwrap();
        tx.relate(Relation::Hidden, ids[0], "bob").await.unwrap();
        tx.commit().await.unwrap();

        let views = all(&store, &ItemQuery::contributions(), Some("bob"), Mode::UnlessHidden)
            .await
            .unwrap();
        assert_eq!(views.len(), 3);
        assert_eq!(views.iter().filter(|v| v.show).count(), 2);

        let anonymous = all(&store, &ItemQuery::contributions(), None, Mode::UnlessHidden)
            .await
            .unwrap();
        assert!(anonymous.iter().all(|v| v.show && !v.liked));
    }
}
