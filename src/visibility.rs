//! Per-viewer visibility of ranked items.

use std::collections::HashSet;

use crate::item::{ItemId, ItemView};

/// Which candidates a listing shows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Regular feeds: skip what the viewer hid.
    #[default]
    UnlessHidden,
    /// Hidden-items view: keep only what the viewer hid.
    OnlyHidden,
}

impl Mode {
    fn eligible(&self, hidden: bool) -> bool {
        match self {
            Mode::UnlessHidden => !hidden,
            Mode::OnlyHidden => hidden,
        }
    }
}

/// Mark `show` on ranked `views` until `border` of them are shown.
///
/// Candidates are visited in rank order. Ineligible ones are marked not
/// shown; once the budget is spent the remaining candidates are left
/// unvisited with `show = false`. Returns the number of shown items.
pub fn update_show(
    views: &mut [ItemView],
    hidden: &HashSet<ItemId>,
    border: usize,
    mode: Mode,
) -> usize {
    let mut shown = 0;

    for view in views.iter_mut() {
        view.show = false;
    }

    for view in views.iter_mut() {
        if shown == border {
            break;
        }

        view.show = mode.eligible(hidden.contains(&view.id()));
        if view.show {
            shown += 1;
        }
    }

    shown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::NewItem;

    fn views(ids: impl IntoIterator<Item = ItemId>) -> Vec<ItemView> {
        ids.into_iter()
            .map(|id| {
                let item = NewItem::contribution(
                    "alice",
                    format!("Story {id}"),
                    Some(format!("https://example.com/{id}")),
                    None,
                )
                .into_item(id);
                ItemView::new(item, false)
            })
            .collect()
    }

    fn shown(views: &[ItemView]) -> Vec<ItemId> {
        views.iter().filter(|v| v.show).map(|v| v.id()).collect()
    }

    #[test]
    fn test_skips_hidden_items_within_budget() {
        let mut views = views(1..=10);
        let hidden = HashSet::from([3, 7]);

        let count = update_show(&mut views, &hidden, 5, Mode::UnlessHidden);

        assert_eq!(count, 5);
        assert_eq!(shown(&views), vec![1, 2, 4, 5, 6]);
        // Visited but hidden.
        assert!(!views[2].show);
        // Never visited.
        assert!(views[6..].iter().all(|v| !v.show));
    }

    #[test]
    fn test_only_hidden_mode() {
        let mut views = views(1..=10);
        let hidden = HashSet::from([3, 7, 9]);

        let count = update_show(&mut views, &hidden, 2, Mode::OnlyHidden);

        assert_eq!(count, 2);
        assert_eq!(shown(&views), vec![3, 7]);
    }

    #[test]
    fn test_fewer_candidates_than_budget() {
        let mut views = views(1..=4);
        let hidden = HashSet::from([2]);

        let count = update_show(&mut views, &hidden, 30, Mode::UnlessHidden);

        assert_eq!(count, 3);
        assert_eq!(shown(&views), vec![1, 3, 4]);
    }
}
