//! Pagination

use serde::Serialize;

/// Largest page size a caller can request
pub const MAX_PAGE_LIMIT: u32 = 100;

/// 1-based page request, clamped on construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// `page < 1` becomes 1; `limit` outside `1..=100` becomes 100
    pub fn new(page: i64, limit: i64) -> Self {
        let page = if page < 1 {
            1
        } else {
            u32::try_from(page).unwrap_or(u32::MAX)
        };
        let limit = if (1..=i64::from(MAX_PAGE_LIMIT)).contains(&limit) {
            limit as u32
        } else {
            MAX_PAGE_LIMIT
        };
        Self { page, limit }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, i64::from(MAX_PAGE_LIMIT))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            items,
            page: request.page(),
            limit: request.limit(),
            total,
            total_pages: total.div_ceil(u64::from(request.limit())),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}
