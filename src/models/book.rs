//! Book model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::{user::UserSummary, SortOrder};

/// Book availability status.
/// The only transitions are available -> borrowed (borrow) and
/// borrowed -> available (return); both go through the loans service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Available,
    Borrowed,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "available",
            BookStatus::Borrowed => "borrowed",
        }
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "available" => Ok(BookStatus::Available),
            "borrowed" => Ok(BookStatus::Borrowed),
            _ => Err(format!("Invalid book status: {}", s)),
        }
    }
}

// SQLx conversions: status is stored as TEXT
impl sqlx::Type<Postgres> for BookStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for BookStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for BookStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <String as Encode<Postgres>>::encode(self.as_str().to_string(), buf)
    }
}

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i32,
    /// Catalog number, unique
    pub number: String,
    pub title: String,
    /// Level/grade classification
    pub level: String,
    pub author: String,
    pub title_code: String,
    pub author_code: String,
    pub status: BookStatus,
    /// Current borrower; set iff status is borrowed
    pub borrowed_by: Option<i32>,
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Book joined with its current borrower for listings and detail views
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookWithBorrower {
    #[serde(flatten)]
    pub book: Book,
    pub borrower: Option<UserSummary>,
}

/// Short book representation joined into ledger listings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookSummary {
    pub id: i32,
    pub number: String,
    pub title: String,
    pub level: String,
    pub author: String,
    pub title_code: String,
    pub author_code: String,
}

/// Book listing query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookQuery {
    /// Page number (>= 1)
    pub page: Option<i64>,
    /// Items per page (>= 1)
    pub limit: Option<i64>,
    /// Status filter; "all" disables the filter
    pub status: Option<String>,
    /// Level filter; "all" disables the filter
    pub level: Option<String>,
    /// Case-insensitive substring match over title, author and number
    pub search: Option<String>,
    /// Sort field (number, title, level, author, status, created_at)
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

/// Per-status counts under the listing filters
#[derive(Debug, Serialize, ToSchema)]
pub struct BookListStats {
    pub total: i64,
    pub available: i64,
    pub borrowed: i64,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(length(min = 1, message = "number is required"))]
    pub number: String,
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, message = "level is required"))]
    pub level: String,
    #[validate(length(min = 1, message = "author is required"))]
    pub author: String,
    #[validate(length(min = 1, message = "titleCode is required"))]
    pub title_code: String,
    #[validate(length(min = 1, message = "authorCode is required"))]
    pub author_code: String,
}

/// Update book request; omitted fields keep their current value.
/// Status and borrower are deliberately absent: only the loans
/// service mutates those.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "number cannot be empty"))]
    pub number: Option<String>,
    pub title: Option<String>,
    pub level: Option<String>,
    pub author: Option<String>,
    pub title_code: Option<String>,
    pub author_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("available".parse::<BookStatus>().unwrap(), BookStatus::Available);
        assert_eq!("Borrowed".parse::<BookStatus>().unwrap(), BookStatus::Borrowed);
        assert!("reserved".parse::<BookStatus>().is_err());
    }
}
