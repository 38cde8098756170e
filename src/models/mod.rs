//! Domain models and DTOs

pub mod book;
pub mod borrow;
pub mod user;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Sort direction for listing queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Desc
    }
}

/// Pagination block returned by every listing endpoint
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub items_per_page: i64,
}

impl Pagination {
    /// Build the block for a page of `limit` items out of `total`.
    /// `total_pages` is `ceil(total / limit)`.
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        Self {
            current_page: page,
            total_pages: (total + limit - 1) / limit,
            total_items: total,
            items_per_page: limit,
        }
    }
}

/// Normalize page/limit query values: both are clamped to >= 1.
pub fn normalize_page_limit(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    (page.unwrap_or(1).max(1), limit.unwrap_or(10).max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_rounds_up_partial_pages() {
        let p = Pagination::new(3, 10, 25);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.total_items, 25);
        assert_eq!(p.items_per_page, 10);
    }

    #[test]
    fn pagination_exact_multiple() {
        assert_eq!(Pagination::new(1, 10, 30).total_pages, 3);
        assert_eq!(Pagination::new(1, 10, 0).total_pages, 0);
    }

    #[test]
    fn page_and_limit_are_clamped() {
        assert_eq!(normalize_page_limit(None, None), (1, 10));
        assert_eq!(normalize_page_limit(Some(0), Some(-5)), (1, 1));
        assert_eq!(normalize_page_limit(Some(4), Some(25)), (4, 25));
    }
}
