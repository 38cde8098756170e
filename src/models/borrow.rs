//! Borrow ledger model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};

use super::{book::BookSummary, user::UserSummary, SortOrder};

/// Status of one ledger entry. An entry is mutated exactly once,
/// borrowed -> returned, and never deleted except by cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BorrowStatus {
    Borrowed,
    Returned,
}

impl BorrowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BorrowStatus::Borrowed => "borrowed",
            BorrowStatus::Returned => "returned",
        }
    }
}

impl std::fmt::Display for BorrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BorrowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "borrowed" => Ok(BorrowStatus::Borrowed),
            "returned" => Ok(BorrowStatus::Returned),
            _ => Err(format!("Invalid borrow status: {}", s)),
        }
    }
}

// SQLx conversions: status is stored as TEXT
impl sqlx::Type<Postgres> for BorrowStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }
}

impl<'r> Decode<'r, Postgres> for BorrowStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for BorrowStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <String as Encode<Postgres>>::encode(self.as_str().to_string(), buf)
    }
}

/// Ledger entry from database: the authoritative record of one loan
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowedBook {
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    pub status: BorrowStatus,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

/// Ledger entry joined with book and user summaries for listings
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDetails {
    pub id: i32,
    pub status: BorrowStatus,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub book: Option<BookSummary>,
    pub user: Option<UserSummary>,
}

/// Transaction listing query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionQuery {
    /// Page number (>= 1)
    pub page: Option<i64>,
    /// Items per page (>= 1)
    pub limit: Option<i64>,
    /// Status filter; "all" disables the filter
    pub status: Option<String>,
    /// Matches book title/author/number or user username/email
    pub search: Option<String>,
    /// Sort field (borrowed_at, due_date, returned_at, status)
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    /// Inclusive lower bound on borrowed_at (ISO 8601 date or datetime)
    pub date_from: Option<String>,
    /// Inclusive upper bound on borrowed_at
    pub date_to: Option<String>,
}

/// Per-status counts under the listing filters
#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionListStats {
    pub total: i64,
    pub borrowed: i64,
    pub returned: i64,
}
