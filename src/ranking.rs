//! Fixed-size pages over ranked listings.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 30;

/// Bounds of one 1-based page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageWindow {
    page: usize,
    size: usize,
    legacy_offset: bool,
}

impl PageWindow {
    /// Window of `page`, or `None` when `page` is lower than 1.
    ///
    /// With `legacy_offset`, pages after the first start one item past
    /// the previous page end, matching the historical listing order.
    pub fn new(page: i64, size: usize, legacy_offset: bool) -> Option<Self> {
        let page = usize::try_from(page).ok().filter(|p| *p >= 1)?;

        Some(Self {
            page,
            size: size.max(1),
            legacy_offset,
        })
    }

    /// First page with `size` items per page.
    pub fn first(size: usize, legacy_offset: bool) -> Self {
        Self {
            page: 1,
            size: size.max(1),
            legacy_offset,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Offset of the first item of the page.
    pub fn start(&self) -> usize {
        match self.page {
            1 => 0,
            page if self.legacy_offset => {
                (page - 1).saturating_mul(self.size).saturating_add(1)
            },
            page => (page - 1).saturating_mul(self.size),
        }
    }

    /// Offset right after the last item of the page.
    pub fn end(&self) -> usize {
        self.page.saturating_mul(self.size)
    }

    /// Visibility budget needed to know whether a next page exists.
    pub fn border(&self) -> usize {
        self.end().saturating_add(1)
    }
}

/// One page of a listing.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub page: usize,
    pub more: bool,
    pub items: Vec<T>,
}

/// Slice `shown` (already ranked and filtered) to `window`.
pub fn paginate<T>(shown: Vec<T>, window: &PageWindow) -> Page<T> {
    let more = shown.len() > window.end();
    let items = shown
        .into_iter()
        .take(window.end())
        .skip(window.start())
        .collect();

    Page {
        page: window.page(),
        more,
        items,
    }
}
