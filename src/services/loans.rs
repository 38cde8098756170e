//! Loan service: borrow/return state machine and ledger listings

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookStatus},
        borrow::{BorrowedBook, TransactionDetails, TransactionListStats, TransactionQuery},
        normalize_page_limit, Pagination,
    },
    repository::{borrows::TransactionFilter, Repository},
};

/// Loan period applied when the caller does not pick a due date
const DEFAULT_LOAN_DAYS: i64 = 7;

/// Parse an ISO 8601 datetime or a plain `YYYY-MM-DD` date (taken as
/// UTC midnight).
fn parse_date_bound(value: &str) -> AppResult<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .ok_or_else(|| AppError::Validation(format!("Invalid date: {}", value)))?);
    }
    Err(AppError::Validation(format!("Invalid date: {}", value)))
}

#[derive(Clone)]
pub struct LoanService {
    repository: Repository,
}

impl LoanService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Borrow a book for a user. The due date defaults to one week
    /// out and is validated before any lookups so a bad date never
    /// depends on what else exists.
    pub async fn borrow(
        &self,
        book_id: i32,
        user_id: i32,
        due_date: Option<&str>,
    ) -> AppResult<(Book, BorrowedBook)> {
        let now = Utc::now();
        let due_date = match due_date.filter(|s| !s.is_empty()) {
            Some(raw) => {
                let parsed = parse_date_bound(raw)?;
                if parsed < now {
                    return Err(AppError::Validation(
                        "Due date cannot be in the past".to_string(),
                    ));
                }
                parsed
            }
            None => now + Duration::days(DEFAULT_LOAN_DAYS),
        };

        self.repository.users.get_by_id(user_id).await?;
        let book = self.repository.books.get_by_id(book_id).await?;
        if book.status == BookStatus::Borrowed {
            return Err(AppError::Conflict("Book is already borrowed".to_string()));
        }

        let (book, entry) = self
            .repository
            .borrows
            .create_loan(book_id, user_id, now, due_date)
            .await?;

        tracing::info!(book_id, user_id, entry_id = entry.id, "Book borrowed");
        Ok((book, entry))
    }

    /// Return a borrowed book. The book is reset even when its open
    /// ledger entry is missing, but that anomaly is logged.
    pub async fn return_book(&self, book_id: i32) -> AppResult<(Book, Option<BorrowedBook>)> {
        let book = self.repository.books.get_by_id(book_id).await?;
        if book.status == BookStatus::Available {
            return Err(AppError::Conflict(
                "Book is not currently borrowed".to_string(),
            ));
        }

        let (book, closed) = self.repository.borrows.close_loan(book_id).await?;
        match &closed {
            Some(entry) => {
                tracing::info!(book_id, entry_id = entry.id, "Book returned");
            }
            None => {
                tracing::warn!(book_id, "Book marked borrowed but no open ledger entry found");
            }
        }
        Ok((book, closed))
    }

    /// List ledger entries across all users (admin view)
    pub async fn list_transactions(
        &self,
        query: &TransactionQuery,
    ) -> AppResult<(Vec<TransactionDetails>, TransactionListStats, Pagination)> {
        let filter = self.build_filter(query, None).await?;
        let (page, limit) = (filter.page, filter.limit);
        let (transactions, stats, total) = self.repository.borrows.list(&filter).await?;
        Ok((transactions, stats, Pagination::new(page, limit, total)))
    }

    /// List one user's ledger entries. Search covers book fields
    /// only; the user is already fixed.
    pub async fn list_user_transactions(
        &self,
        user_id: i32,
        query: &TransactionQuery,
    ) -> AppResult<(Vec<TransactionDetails>, TransactionListStats, Pagination)> {
        self.repository.users.get_by_id(user_id).await?;
        let filter = self.build_filter(query, Some(user_id)).await?;
        let (page, limit) = (filter.page, filter.limit);
        let (transactions, stats, total) = self.repository.borrows.list(&filter).await?;
        Ok((transactions, stats, Pagination::new(page, limit, total)))
    }

    async fn build_filter(
        &self,
        query: &TransactionQuery,
        user_id: Option<i32>,
    ) -> AppResult<TransactionFilter> {
        let (page, limit) = normalize_page_limit(query.page, query.limit);

        let (book_ids, user_ids) = match query.search.as_deref().filter(|s| !s.is_empty()) {
            Some(term) => {
                let book_ids = self.repository.books.ids_matching(term).await?;
                // When scoped to one user, matching other users is moot
                let user_ids = if user_id.is_none() {
                    Some(self.repository.users.ids_matching(term).await?)
                } else {
                    None
                };
                (Some(book_ids), user_ids)
            }
            None => (None, None),
        };

        let date_from = query
            .date_from
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(parse_date_bound)
            .transpose()?;
        let date_to = query
            .date_to
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(parse_date_bound)
            .transpose()?;

        Ok(TransactionFilter {
            page,
            limit,
            status: query.status.clone(),
            user_id,
            book_ids,
            user_ids,
            date_from,
            date_to,
            sort_by: query.sort_by.clone(),
            sort_order: query.sort_order.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_bounds_accept_both_formats() {
        assert!(parse_date_bound("2026-03-15").is_ok());
        assert!(parse_date_bound("2026-03-15T10:30:00Z").is_ok());
        assert!(parse_date_bound("15/03/2026").is_err());
        assert!(parse_date_bound("soon").is_err());
    }

    #[test]
    fn plain_dates_are_utc_midnight() {
        let parsed = parse_date_bound("2026-03-15").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-03-15T00:00:00+00:00");
    }
}
