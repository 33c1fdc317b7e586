// Offset pagination for list views
//
// Client pagination slices the filtered list; server pagination turns the
// page number into an offset/limit window and trusts the reported total.

use crate::query::Range;
use serde::Serialize;

pub const DEFAULT_PER_PAGE: usize = 10;

/// `max(1, ceil(total / per_page))`
pub fn total_pages(total: usize, per_page: usize) -> usize {
    let per_page = per_page.max(1);
    total.div_ceil(per_page).max(1)
}

/// Clamp a 1-based page into `[1, total_pages]`.
pub fn clamp_page(page: usize, total_pages: usize) -> usize {
    page.clamp(1, total_pages.max(1))
}

/// Position of a page within its list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub page: usize,
    pub per_page: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageMeta {
    pub fn new(page: usize, per_page: usize, total: usize) -> Self {
        let per_page = per_page.max(1);
        let pages = total_pages(total, per_page);
        let page = clamp_page(page, pages);
        PageMeta {
            page,
            per_page,
            total,
            total_pages: pages,
            has_next: page < pages,
            has_prev: page > 1,
        }
    }
}

/// One page of items.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    /// Everything on a single page (views without pagination).
    pub fn single(items: Vec<T>) -> Self {
        let total = items.len();
        Page {
            meta: PageMeta::new(1, total.max(1), total),
            items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Slice a fully loaded list. The page is clamped first, so an
/// out-of-range request shows the nearest real page.
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> Page<T> {
    let meta = PageMeta::new(page, per_page, items.len());
    let start = (meta.page - 1) * meta.per_page;
    let end = (start + meta.per_page).min(items.len());
    let slice = if start < items.len() {
        items[start..end].to_vec()
    } else {
        Vec::new()
    };
    Page { items: slice, meta }
}

/// Server-side window for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: usize,
    pub per_page: usize,
}

impl PageWindow {
    pub fn new(page: usize, per_page: usize) -> Self {
        PageWindow {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// `offset = (page - 1) * per_page`, `limit = per_page`. Saturates for
    /// absurd page numbers; the view clamps once the total is known.
    pub fn range(&self) -> Range {
        Range {
            offset: self.offset(),
            limit: self.per_page,
        }
    }

    fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.per_page)
    }

    /// Page metadata for a fetched window. Without a reported total the
    /// next page is assumed to exist when this one came back full.
    pub fn meta(&self, fetched: usize, reported_total: Option<u64>) -> PageMeta {
        match reported_total {
            Some(total) => PageMeta::new(self.page, self.per_page, total as usize),
            None => {
                let seen = self.offset().saturating_add(fetched);
                let full = fetched >= self.per_page;
                PageMeta {
                    page: self.page,
                    per_page: self.per_page,
                    total: seen,
                    total_pages: if full { self.page.saturating_add(1) } else { self.page },
                    has_next: full,
                    has_prev: self.page > 1,
                }
            }
        }
    }
}
