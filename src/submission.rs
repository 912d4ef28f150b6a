//! Submitting contributions and maintaining comments.

use crate::ServerError;
use crate::error::Result;
use crate::item::{Item, ItemId, ItemQuery, NewItem, Relation};
use crate::store::Transaction;
use crate::tree::{CommentTree, propagate_count};

/// Save `item` and let its author like it, so that points start at 1.
async fn publish(tx: &mut dyn Transaction, item: NewItem) -> Result<Item> {
    let item = tx.insert_item(item).await?;
    tx.relate(Relation::Likes, item.id, &item.user_id).await?;
    Ok(item)
}

/// Submit a link or a text post.
pub async fn submit(
    tx: &mut dyn Transaction,
    author: &str,
    title: &str,
    url: Option<String>,
    text: Option<String>,
) -> Result<Item> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ServerError::InvalidInput("'title' cannot be blank".into()));
    }

    let url = url.filter(|u| !u.trim().is_empty());
    let text = text.filter(|t| !t.trim().is_empty());
    if url.is_some() == text.is_some() {
        return Err(ServerError::InvalidInput(
            "exactly one of 'url' or 'text' must be set".into(),
        ));
    }

    let item =
        publish(tx, NewItem::contribution(author, title, url, text))
            .await?;

    crate::telemetry::record_submission(item.url.is_some());
    tracing::info!(item = item.id, %author, "contribution submitted");

    Ok(item)
}

/// Comment on `contribution`, replying to `parent` when set.
///
/// `parent` must be a comment of the same contribution.
pub async fn comment(
    tx: &mut dyn Transaction,
    author: &str,
    contribution: ItemId,
    parent: Option<ItemId>,
    text: &str,
) -> Result<Item> {
    let root = tx
        .find_item(contribution)
        .await?
        .filter(|item| !item.is_comment())
        .ok_or_else(|| ServerError::not_found("contribution", contribution))?;

    if let Some(parent) = parent {
        tx.find_item(parent)
            .await?
            .filter(|p| p.contribution_id == Some(root.id))
            .ok_or_else(|| ServerError::not_found("comment", parent))?;
    }

    let comment =
        publish(tx, NewItem::comment(author, root.id, parent, text)).await?;
    propagate_count(tx, &comment, 1).await?;

    crate::telemetry::record_comment(comment.parent_id.is_some());
    tracing::info!(
        item = comment.id,
        contribution = root.id,
        parent = comment.parent_id,
        %author,
        "comment posted"
    );

    Ok(comment)
}

/// Reply to comment `parent`.
pub async fn reply(
    tx: &mut dyn Transaction,
    author: &str,
    parent: ItemId,
    text: &str,
) -> Result<Item> {
    let Some(contribution) = tx
        .find_item(parent)
        .await?
        .and_then(|p| p.contribution_id)
    else {
        return Err(ServerError::not_found("comment", parent));
    };

    comment(tx, author, contribution, Some(parent), text).await
}

/// Owned comment `id`.
async fn owned_comment(
    tx: &mut dyn Transaction,
    actor: &str,
    id: ItemId,
) -> Result<Item> {
    let comment = tx
        .lock_item(id)
        .await?
        .filter(Item::is_comment)
        .ok_or_else(|| ServerError::not_found("comment", id))?;

    if comment.user_id != actor {
        return Err(ServerError::Forbidden("comment"));
    }

    Ok(comment)
}

/// Replace the text of comment `id`.
pub async fn edit_comment(
    tx: &mut dyn Transaction,
    actor: &str,
    id: ItemId,
    text: &str,
) -> Result<Item> {
    let mut comment = owned_comment(tx, actor, id).await?;
    comment.text = Some(text.to_owned());
    tx.update_item(&comment).await?;

    Ok(comment)
}

/// Delete comment `id` and its replies. Returns the number of removed
/// comments.
pub async fn delete_comment(
    tx: &mut dyn Transaction,
    actor: &str,
    id: ItemId,
) -> Result<usize> {
    let comment = owned_comment(tx, actor, id).await?;
    let contribution = comment.contribution_id.unwrap_or_default();

    let thread = tx.items(&ItemQuery::comments().thread(contribution)).await?;
    let tree = CommentTree::new(&thread);
    let mut removed = tree.descendants(id);
    removed.push(id);

    tx.delete_items(&removed).await?;
    propagate_count(tx, &comment, -(removed.len() as i32)).await?;

    tracing::info!(item = id, %actor, removed = removed.len(), "comment deleted");

    Ok(removed.len())
}
