//! Page-number pagination for the post, comment, book, blog and
//! notification listings.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 50;

/// Caller-supplied page selection. Page numbers are 1-based.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
        }
    }

    /// Page number with `0`/missing treated as the first page.
    pub fn page_number(&self) -> u32 {
        self.page.filter(|page| *page > 0).unwrap_or(1)
    }

    /// Effective page size: defaults to `default_size`, clamps to [`MAX_PAGE_SIZE`].
    pub fn size_or(&self, default_size: u32) -> u32 {
        match self.page_size {
            None | Some(0) => default_size.min(MAX_PAGE_SIZE),
            Some(value) => value.min(MAX_PAGE_SIZE),
        }
    }

    /// Returns `(limit, offset)` for SQL binding.
    pub fn window(&self, default_size: u32) -> (i64, i64) {
        let size = self.size_or(default_size);
        let offset = u64::from(self.page_number() - 1) * u64::from(size);
        (i64::from(size), i64::try_from(offset).unwrap_or(i64::MAX))
    }
}

/// One page of results plus navigation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    /// Total number of matching rows across all pages.
    pub count: u64,
    pub page: u32,
    pub page_size: u32,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(request: &PageRequest, default_size: u32, count: u64, results: Vec<T>) -> Self {
        let page = request.page_number();
        let page_size = request.size_or(default_size);
        let seen = u64::from(page) * u64::from(page_size);
        Self {
            count,
            page,
            page_size,
            next: (seen < count).then_some(page + 1),
            previous: (page > 1).then(|| page - 1),
            results,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            page: self.page,
            page_size: self.page_size,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}
