use std::cmp::Ordering;
use std::str::FromStr;

use serde::Deserialize;

use super::{Item, ItemId};
use crate::ServerError;

/// Many-to-many relations between users and items.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Relation {
    Likes,
    Hidden,
}

impl Relation {
    /// Table holding the relation.
    pub fn table(&self) -> &'static str {
        match self {
            Relation::Likes => "item_likes",
            Relation::Hidden => "item_hidden",
        }
    }
}

/// Which kind of items a listing considers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scope {
    /// Only items that are not comments.
    #[default]
    Contributions,
    Comments,
}

impl Scope {
    /// Whether `item` is of this kind.
    pub fn admits(&self, item: &Item) -> bool {
        match self {
            Scope::Contributions => !item.is_comment(),
            Scope::Comments => item.is_comment(),
        }
    }
}

/// Restrict contributions to one body kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// Text posts.
    Ask,
    /// Link posts.
    Show,
}

/// Ranking key of a listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum Order {
    /// Score, highest first.
    #[default]
    Points,
    /// Recency, newest first.
    Newest,
    /// Recency, oldest first.
    Oldest,
    Title,
    /// Discussion size, largest first.
    Comments,
}

impl Order {
    /// `ORDER BY` clause; ties are broken by id so pages are stable.
    pub fn sql(&self) -> &'static str {
        match self {
            Order::Points => "i.points DESC, i.id DESC",
            Order::Newest => "i.publication_time DESC, i.id DESC",
            Order::Oldest => "i.publication_time ASC, i.id ASC",
            Order::Title => "i.title ASC, i.id ASC",
            Order::Comments => "i.comments DESC, i.id DESC",
        }
    }

    /// Same ordering as [`Order::sql`], for in-memory sorting.
    pub fn compare(&self, a: &Item, b: &Item) -> Ordering {
        match self {
            Order::Points => b.points.cmp(&a.points).then(b.id.cmp(&a.id)),
            Order::Newest => b
                .publication_time
                .cmp(&a.publication_time)
                .then(b.id.cmp(&a.id)),
            Order::Oldest => a
                .publication_time
                .cmp(&b.publication_time)
                .then(a.id.cmp(&b.id)),
            Order::Title => a.title.cmp(&b.title).then(a.id.cmp(&b.id)),
            Order::Comments => {
                b.comments.cmp(&a.comments).then(b.id.cmp(&a.id))
            },
        }
    }
}

impl FromStr for Order {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "points" | "-points" => Ok(Order::Points),
            "newest" | "-publication_time" => Ok(Order::Newest),
            "oldest" | "publication_time" => Ok(Order::Oldest),
            "title" => Ok(Order::Title),
            "comments" | "-comments" => Ok(Order::Comments),
            other => Err(ServerError::InvalidInput(format!(
                "unknown ordering '{other}'"
            ))),
        }
    }
}

impl TryFrom<String> for Order {
    type Error = ServerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Filtered and ordered selection of items.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ItemQuery {
    pub scope: Scope,
    pub format: Option<Format>,
    pub author: Option<String>,
    pub contribution: Option<ItemId>,
    pub liked_by: Option<String>,
    pub hidden_by: Option<String>,
    pub order: Order,
}

impl ItemQuery {
    pub fn contributions() -> Self {
        Self::default()
    }

    pub fn comments() -> Self {
        Self {
            scope: Scope::Comments,
            ..Default::default()
        }
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn format(mut self, format: Format) -> Self {
        self.format = Some(format);
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Every comment of one contribution.
    pub fn thread(mut self, contribution: ItemId) -> Self {
        self.scope = Scope::Comments;
        self.contribution = Some(contribution);
        self
    }

    pub fn liked_by(mut self, username: impl Into<String>) -> Self {
        self.liked_by = Some(username.into());
        self
    }

    pub fn hidden_by(mut self, username: impl Into<String>) -> Self {
        self.hidden_by = Some(username.into());
        self
    }

    /// Whether `item` passes every filter except relation ones.
    pub fn matches(&self, item: &Item) -> bool {
        let format = match self.format {
            Some(Format::Ask) => item.url.is_none(),
            Some(Format::Show) => item.url.is_some(),
            None => true,
        };

        self.scope.admits(item)
            && format
            && self.author.as_ref().is_none_or(|a| a == &item.user_id)
            && self
                .contribution
                .is_none_or(|c| item.contribution_id == Some(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_parsing() {
        assert_eq!("-points".parse::<Order>().unwrap(), Order::Points);
        assert_eq!(
            "publication_time".parse::<Order>().unwrap(),
            Order::Oldest
        );
        assert_eq!("newest".parse::<Order>().unwrap(), Order::Newest);
        assert!(matches!(
            "karma".parse::<Order>(),
            Err(ServerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_scope_excludes_comments() {
        let contribution =
            crate::item::NewItem::contribution("bob", "Rust", None, Some("?".into()))
                .into_item(1);
        let comment =
            crate::item::NewItem::comment("bob", 1, None, "!").into_item(2);

        let query = ItemQuery::contributions();
        assert!(query.matches(&contribution));
        assert!(!query.matches(&comment));

        let query = ItemQuery::comments().thread(1);
        assert!(query.matches(&comment));
        assert!(!query.matches(&contribution));
    }
}
