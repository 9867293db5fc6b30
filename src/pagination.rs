use serde::{Deserialize, Serialize};
use utoipa::IntoParams;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_SIZE: i64 = 10;
pub const MAX_SIZE: i64 = 100;

/// PageQuery
///
/// Raw `?page=&size=` query parameters. Kept as strings so that unparsable values fall
/// back to the defaults instead of rejecting the request.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number (default 1).
    pub page: Option<String>,
    /// Items per page, 1..=100 (default 10).
    pub size: Option<String>,
}

/// PageRequest
///
/// A normalized page selection: `page >= 1` and `1 <= size <= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            size: DEFAULT_SIZE,
        }
    }
}

impl PageRequest {
    /// Clamps out-of-range input to the defaults. Never fails.
    pub fn normalize(page: i64, size: i64) -> Self {
        let page = if page < 1 { DEFAULT_PAGE } else { page };
        let size = if (1..=MAX_SIZE).contains(&size) {
            size
        } else {
            DEFAULT_SIZE
        };
        Self { page, size }
    }

    pub fn from_query(query: &PageQuery) -> Self {
        let parse = |raw: &Option<String>, default: i64| {
            raw.as_deref()
                .and_then(|v| v.trim().parse::<i64>().ok())
                .unwrap_or(default)
        };
        Self::normalize(
            parse(&query.page, DEFAULT_PAGE),
            parse(&query.size, DEFAULT_SIZE),
        )
    }

    /// `(offset, limit)` for the data store: `offset = (page - 1) * size`, `limit = size`.
    /// The offset saturates at `i64::MAX`; such a page is simply empty.
    pub fn to_offset_limit(&self) -> (i64, i64) {
        ((self.page - 1).saturating_mul(self.size), self.size)
    }
}

/// PageResult
///
/// Wire shape of every paginated listing: `{list, total, page, size, total_page}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult<T> {
    pub list: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub size: i64,
    pub total_page: i64,
}

impl<T> PageResult<T> {
    /// `total_page = ceil(total / size)`. A non-positive `size` is treated as the default.
    pub fn build(list: Vec<T>, total: i64, page: i64, size: i64) -> Self {
        let size = if size <= 0 { DEFAULT_SIZE } else { size };
        let total = total.max(0);
        Self {
            list,
            total,
            page,
            size,
            total_page: (total + size - 1) / size,
        }
    }

    pub fn from_request(list: Vec<T>, total: i64, request: PageRequest) -> Self {
        Self::build(list, total, request.page, request.size)
    }
}
