use serde::Serialize;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// 0-based page request as it arrives in `?page=&size=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, size: Option<i64>) -> Self {
        Self::with_default(page, size, DEFAULT_PAGE_SIZE)
    }

    pub fn with_default(page: Option<i64>, size: Option<i64>, default_size: i64) -> Self {
        PageRequest {
            page: page.unwrap_or(0).max(0),
            size: size.unwrap_or(default_size).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn limit(&self) -> i64 {
        self.size
    }

    pub fn offset(&self) -> i64 {
        self.page.saturating_mul(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Paged<T> {
    pub records: Vec<T>,
    pub total: i64,
    pub size: i64,
    pub current: i64,
    pub pages: i64,
}

impl<T> Paged<T> {
    pub fn new(records: Vec<T>, total: i64, req: PageRequest) -> Self {
        let pages = if total <= 0 {
            0
        } else {
            (total + req.size - 1) / req.size
        };
        Paged {
            records,
            total,
            size: req.size,
            current: req.page,
            pages,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Paged<U> {
        Paged {
            records: self.records.into_iter().map(f).collect(),
            total: self.total,
            size: self.size,
            current: self.current,
            pages: self.pages,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.current > 0
    }

    pub fn has_next(&self) -> bool {
        self.current < self.pages - 1
    }
}
