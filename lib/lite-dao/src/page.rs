use serde::{Deserialize, Serialize};

/// Window requested from a paged query: skip `start` rows, return at most `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub start: u64,
    pub limit: u64,
}

impl PageRequest {
    pub fn new(start: u64, limit: u64) -> Self {
        Self { start, limit }
    }

    /// One-based page number of `size` rows.
    pub fn page(number: u64, size: u64) -> Self {
        Self {
            start: number.saturating_sub(1).saturating_mul(size),
            limit: size,
        }
    }
}

/// One page of a query plus the row count of the unpaged query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedResult<T> {
    pub start: u64,
    pub limit: u64,
    pub total: u64,
    pub data: Vec<T>,
}

impl<T> PagedResult<T> {
    pub fn empty(request: PageRequest) -> Self {
        Self {
            start: request.start,
            limit: request.limit,
            total: 0,
            data: Vec::new(),
        }
    }

    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(self.limit)
    }
}
