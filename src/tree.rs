//! Comment trees.
//!
//! Comments reference their parent by id. Walks use an explicit stack so
//! arbitrarily deep threads never grow the call stack.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ServerError;
use crate::error::Result;
use crate::item::{Item, ItemId, ItemView};
use crate::store::Transaction;

#[derive(Debug, Default)]
struct Node {
    parent: Option<ItemId>,
    children: Vec<ItemId>,
}

/// Arena of the comments of one contribution.
#[derive(Debug, Default)]
pub struct CommentTree {
    nodes: HashMap<ItemId, Node>,
    roots: Vec<ItemId>,
}

impl CommentTree {
    /// Build the tree from `comments`, keeping their order among siblings.
    ///
    /// A comment whose parent is not part of `comments` becomes a root.
    pub fn new<'a>(comments: impl IntoIterator<Item = &'a Item>) -> Self {
        let mut tree = CommentTree::default();
        let mut order = Vec::new();

        for comment in comments {
            order.push(comment.id);
            tree.nodes.insert(
                comment.id,
                Node {
                    parent: comment.parent_id,
                    children: Vec::new(),
                },
            );
        }

        for id in order {
            match tree.nodes.get(&id).and_then(|n| n.parent) {
                Some(parent) if tree.nodes.contains_key(&parent) => {
                    if let Some(node) = tree.nodes.get_mut(&parent) {
                        node.children.push(id);
                    }
                },
                _ => tree.roots.push(id),
            }
        }

        tree
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Parents of `id`, nearest first.
    pub fn ancestors(&self, id: ItemId) -> Vec<ItemId> {
        let mut ancestors = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut next = self.nodes.get(&id).and_then(|n| n.parent);

        while let Some(parent) = next {
            if !seen.insert(parent) || !self.nodes.contains_key(&parent) {
                break;
            }
            ancestors.push(parent);
            next = self.nodes.get(&parent).and_then(|n| n.parent);
        }

        ancestors
    }

    /// Every comment below `id`, in depth-first pre-order.
    pub fn descendants(&self, id: ItemId) -> Vec<ItemId> {
        let mut descendants = Vec::new();
        let mut stack: Vec<ItemId> = self.children(id).rev().collect();

        while let Some(current) = stack.pop() {
            descendants.push(current);
            stack.extend(self.children(current).rev());
        }

        descendants
    }

    /// Whole tree in depth-first pre-order with depths.
    pub fn walk(&self) -> Vec<(ItemId, usize)> {
        let mut walk = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(ItemId, usize)> =
            self.roots.iter().rev().map(|id| (*id, 0)).collect();

        while let Some((current, depth)) = stack.pop() {
            walk.push((current, depth));
            stack.extend(self.children(current).rev().map(|c| (c, depth + 1)));
        }

        walk
    }

    /// Set `value` in `show` for every descendant of `id`.
    pub fn cascade(
        &self,
        id: ItemId,
        value: bool,
        show: &mut HashMap<ItemId, bool>,
    ) {
        for descendant in self.descendants(id) {
            show.insert(descendant, value);
        }
    }

    /// `show` flag of every comment for a viewer who hid `hidden`.
    ///
    /// A hidden comment is not shown and neither is anything below it.
    pub fn visibility(
        &self,
        hidden: &HashSet<ItemId>,
    ) -> HashMap<ItemId, bool> {
        let mut show: HashMap<ItemId, bool> =
            self.nodes.keys().map(|id| (*id, true)).collect();

        for (id, _) in self.walk() {
            if hidden.contains(&id) {
                show.insert(id, false);
                self.cascade(id, false, &mut show);
            }
        }

        show
    }

    fn children(
        &self,
        id: ItemId,
    ) -> impl DoubleEndedIterator<Item = ItemId> + '_ {
        self.nodes
            .get(&id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
            .iter()
            .copied()
    }
}

/// A comment placed in its thread.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct ThreadEntry {
    #[serde(flatten)]
    pub view: ItemView,
    pub depth: usize,
}

/// Order `views` as a thread and set their `show` flags.
pub fn thread(
    mut views: Vec<ItemView>,
    hidden: &HashSet<ItemId>,
) -> Vec<ThreadEntry> {
    let tree = CommentTree::new(views.iter().map(|v| &v.item));
    let show = tree.visibility(hidden);
    let mut by_id: HashMap<ItemId, ItemView> =
        views.drain(..).map(|v| (v.id(), v)).collect();

    tree.walk()
        .into_iter()
        .filter_map(|(id, depth)| {
            let mut view = by_id.remove(&id)?;
            view.show = show.get(&id).copied().unwrap_or(true);
            Some(ThreadEntry { view, depth })
        })
        .collect()
}

/// Add `delta` to the `comments` counter of every ancestor of `comment`,
/// then to its contribution.
pub async fn propagate_count(
    tx: &mut dyn Transaction,
    comment: &Item,
    delta: i32,
) -> Result<()> {
    let mut seen = HashSet::from([comment.id]);
    let mut next = comment.parent_id;

    while let Some(id) = next {
        if !seen.insert(id) {
            return Err(ServerError::Internal {
                details: format!("cycle in comment chain at {id}"),
                source: None,
            });
        }

        let mut parent = tx
            .lock_item(id)
            .await?
            .ok_or_else(|| ServerError::not_found("comment", id))?;
        parent.comments += delta;
        tx.update_item(&parent).await?;
        next = parent.parent_id;
    }

    if let Some(id) = comment.contribution_id {
        let mut contribution = tx
            .lock_item(id)
            .await?
            .ok_or_else(|| ServerError::not_found("contribution", id))?;
        contribution.comments += delta;
        tx.update_item(&contribution).await?;
    }

    Ok(())
}
