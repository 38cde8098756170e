//! Borrow ledger repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookSummary},
        borrow::{BorrowedBook, TransactionDetails, TransactionListStats},
        user::UserSummary,
        SortOrder,
    },
};

/// Resolved filters for ledger listings. Search terms are resolved to
/// ID sets by the caller before the final query is built.
#[derive(Debug, Default)]
pub struct TransactionFilter {
    pub page: i64,
    pub limit: i64,
    pub status: Option<String>,
    pub user_id: Option<i32>,
    pub book_ids: Option<Vec<i32>>,
    pub user_ids: Option<Vec<i32>>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
}

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn sort_column(sort_by: Option<&str>) -> &'static str {
        match sort_by.unwrap_or("borrowed_at") {
            "due_date" | "dueDate" => "due_date",
            "returned_at" | "returnedAt" => "returned_at",
            "status" => "status",
            _ => "borrowed_at",
        }
    }

    /// Open a loan: flip the book to borrowed and insert the ledger
    /// entry in one transaction. The status flip is a conditional
    /// update keyed on the current status, so two concurrent borrows
    /// on the same book cannot both succeed.
    pub async fn create_loan(
        &self,
        book_id: i32,
        user_id: i32,
        borrowed_at: DateTime<Utc>,
        due_date: DateTime<Utc>,
    ) -> AppResult<(Book, BorrowedBook)> {
        let mut tx = self.pool.begin().await?;

        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET status = 'borrowed', borrowed_by = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'available'
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::Conflict("Book is already borrowed".to_string()))?;

        let entry = sqlx::query_as::<_, BorrowedBook>(
            r#"
            INSERT INTO borrows (book_id, user_id, status, borrowed_at, due_date)
            VALUES ($1, $2, 'borrowed', $3, $4)
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .bind(borrowed_at)
        .bind(due_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok((book, entry))
    }

    /// Close the open loan for a book: mark the most recently started
    /// open entry as returned and reset the book. The book is reset
    /// even when no open entry exists; the caller decides how loudly
    /// to report that anomaly.
    pub async fn close_loan(&self, book_id: i32) -> AppResult<(Book, Option<BorrowedBook>)> {
        let mut tx = self.pool.begin().await?;

        let closed = sqlx::query_as::<_, BorrowedBook>(
            r#"
            UPDATE borrows
            SET status = 'returned', returned_at = NOW()
            WHERE id = (
                SELECT id FROM borrows
                WHERE book_id = $1 AND status = 'borrowed'
                ORDER BY borrowed_at DESC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?;

        let book = sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET status = 'available', borrowed_by = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(book_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        tx.commit().await?;
        Ok((book, closed))
    }

    /// The open ledger entry for a book, if any (most recent first)
    pub async fn open_loan_for_book(&self, book_id: i32) -> AppResult<Option<BorrowedBook>> {
        let entry = sqlx::query_as::<_, BorrowedBook>(
            r#"
            SELECT * FROM borrows
            WHERE book_id = $1 AND status = 'borrowed'
            ORDER BY borrowed_at DESC
            LIMIT 1
            "#,
        )
        .bind(book_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    /// Number of open loans referencing a book
    pub async fn count_open_for_book(&self, book_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrows WHERE book_id = $1 AND status = 'borrowed'",
        )
        .bind(book_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Number of open loans held by a user
    pub async fn count_open_for_user(&self, user_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrows WHERE user_id = $1 AND status = 'borrowed'",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Recent loan history for a book, newest first
    pub async fn history_for_book(&self, book_id: i32, limit: i64) -> AppResult<Vec<TransactionDetails>> {
        let rows = sqlx::query(&format!(
            "{} WHERE br.book_id = $1 ORDER BY br.borrowed_at DESC LIMIT $2",
            Self::DETAILS_SELECT
        ))
        .bind(book_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::details_from_row).collect())
    }

    /// A user's open loans, newest first
    pub async fn open_loans_for_user(&self, user_id: i32) -> AppResult<Vec<TransactionDetails>> {
        let rows = sqlx::query(&format!(
            "{} WHERE br.user_id = $1 AND br.status = 'borrowed' ORDER BY br.borrowed_at DESC",
            Self::DETAILS_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::details_from_row).collect())
    }

    /// Recent loan history for a user, newest first
    pub async fn history_for_user(&self, user_id: i32, limit: i64) -> AppResult<Vec<TransactionDetails>> {
        let rows = sqlx::query(&format!(
            "{} WHERE br.user_id = $1 ORDER BY br.borrowed_at DESC LIMIT $2",
            Self::DETAILS_SELECT
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(Self::details_from_row).collect())
    }

    /// Total/open/returned counts for one user's ledger
    pub async fn user_loan_counts(&self, user_id: i32) -> AppResult<(i64, i64, i64)> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as total,
                   COUNT(*) FILTER (WHERE status = 'borrowed') as borrowed,
                   COUNT(*) FILTER (WHERE status = 'returned') as returned
            FROM borrows
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok((row.get("total"), row.get("borrowed"), row.get("returned")))
    }

    const DETAILS_SELECT: &'static str = r#"
        SELECT br.id, br.status, br.borrowed_at, br.due_date, br.returned_at,
               b.id as book_id, b.number as book_number, b.title as book_title,
               b.level as book_level, b.author as book_author,
               b.title_code as book_title_code, b.author_code as book_author_code,
               u.id as user_id, u.username as user_username,
               u.email as user_email, u.avatar as user_avatar
        FROM borrows br
        LEFT JOIN books b ON br.book_id = b.id
        LEFT JOIN users u ON br.user_id = u.id
    "#;

    fn details_from_row(row: &sqlx::postgres::PgRow) -> TransactionDetails {
        let book = row.get::<Option<i32>, _>("book_id").map(|id| BookSummary {
            id,
            number: row.get("book_number"),
            title: row.get("book_title"),
            level: row.get("book_level"),
            author: row.get("book_author"),
            title_code: row.get("book_title_code"),
            author_code: row.get("book_author_code"),
        });
        let user = row.get::<Option<i32>, _>("user_id").map(|id| UserSummary {
            id,
            username: row.get("user_username"),
            email: row.get("user_email"),
            avatar: row.get("user_avatar"),
        });
        TransactionDetails {
            id: row.get("id"),
            status: row.get("status"),
            borrowed_at: row.get("borrowed_at"),
            due_date: row.get("due_date"),
            returned_at: row.get("returned_at"),
            book,
            user,
        }
    }

    /// List ledger entries with filters, search ID sets, sorting and
    /// pagination. Returns the page, status counts under the same
    /// filters, and the filtered total.
    pub async fn list(
        &self,
        filter: &TransactionFilter,
    ) -> AppResult<(Vec<TransactionDetails>, TransactionListStats, i64)> {
        let status = filter
            .status
            .as_deref()
            .filter(|s| !s.is_empty() && *s != "all");

        let mut conditions: Vec<String> = Vec::new();
        let mut idx = 0usize;
        if status.is_some() {
            idx += 1;
            conditions.push(format!("br.status = ${}", idx));
        }
        if filter.user_id.is_some() {
            idx += 1;
            conditions.push(format!("br.user_id = ${}", idx));
        }
        if filter.date_from.is_some() {
            idx += 1;
            conditions.push(format!("br.borrowed_at >= ${}", idx));
        }
        if filter.date_to.is_some() {
            idx += 1;
            conditions.push(format!("br.borrowed_at <= ${}", idx));
        }
        match (&filter.book_ids, &filter.user_ids) {
            (Some(_), Some(_)) => {
                conditions.push(format!(
                    "(br.book_id = ANY(${}) OR br.user_id = ANY(${}))",
                    idx + 1,
                    idx + 2
                ));
                idx += 2;
            }
            (Some(_), None) => {
                idx += 1;
                conditions.push(format!("br.book_id = ANY(${})", idx));
            }
            (None, Some(_)) => {
                idx += 1;
                conditions.push(format!("br.user_id = ANY(${})", idx));
            }
            (None, None) => {}
        }
        let where_clause = if conditions.is_empty() {
            "TRUE".to_string()
        } else {
            conditions.join(" AND ")
        };

        let sort_col = Self::sort_column(filter.sort_by.as_deref());
        let sort_dir = filter.sort_order.as_sql();

        let rows_query = format!(
            "{} WHERE {} ORDER BY br.{} {} LIMIT ${} OFFSET ${}",
            Self::DETAILS_SELECT,
            where_clause,
            sort_col,
            sort_dir,
            idx + 1,
            idx + 2,
        );

        let mut rows = sqlx::query(&rows_query);
        if let Some(s) = status {
            rows = rows.bind(s);
        }
        if let Some(uid) = filter.user_id {
            rows = rows.bind(uid);
        }
        if let Some(from) = filter.date_from {
            rows = rows.bind(from);
        }
        if let Some(to) = filter.date_to {
            rows = rows.bind(to);
        }
        if let Some(ref ids) = filter.book_ids {
            rows = rows.bind(ids);
        }
        if let Some(ref ids) = filter.user_ids {
            rows = rows.bind(ids);
        }
        let rows = rows
            .bind(filter.limit)
            .bind((filter.page - 1) * filter.limit)
            .fetch_all(&self.pool)
            .await?;

        let transactions = rows.iter().map(Self::details_from_row).collect();

        // The status counts keep the other filters but ignore the
        // status filter itself, so a status-filtered page still shows
        // both sides of the split
        let mut stats_conditions: Vec<String> = Vec::new();
        let mut sidx = 0usize;
        if filter.user_id.is_some() {
            sidx += 1;
            stats_conditions.push(format!("br.user_id = ${}", sidx));
        }
        if filter.date_from.is_some() {
            sidx += 1;
            stats_conditions.push(format!("br.borrowed_at >= ${}", sidx));
        }
        if filter.date_to.is_some() {
            sidx += 1;
            stats_conditions.push(format!("br.borrowed_at <= ${}", sidx));
        }
        match (&filter.book_ids, &filter.user_ids) {
            (Some(_), Some(_)) => {
                stats_conditions.push(format!(
                    "(br.book_id = ANY(${}) OR br.user_id = ANY(${}))",
                    sidx + 1,
                    sidx + 2
                ));
            }
            (Some(_), None) => {
                sidx += 1;
                stats_conditions.push(format!("br.book_id = ANY(${})", sidx));
            }
            (None, Some(_)) => {
                sidx += 1;
                stats_conditions.push(format!("br.user_id = ANY(${})", sidx));
            }
            (None, None) => {}
        }
        let stats_where = if stats_conditions.is_empty() {
            "TRUE".to_string()
        } else {
            stats_conditions.join(" AND ")
        };

        let stats_query = format!(
            r#"
            SELECT COUNT(*) as total,
                   COUNT(*) FILTER (WHERE br.status = 'borrowed') as borrowed,
                   COUNT(*) FILTER (WHERE br.status = 'returned') as returned
            FROM borrows br
            WHERE {stats_where}
            "#,
        );
        let mut stats_row = sqlx::query(&stats_query);
        if let Some(uid) = filter.user_id {
            stats_row = stats_row.bind(uid);
        }
        if let Some(from) = filter.date_from {
            stats_row = stats_row.bind(from);
        }
        if let Some(to) = filter.date_to {
            stats_row = stats_row.bind(to);
        }
        if let Some(ref ids) = filter.book_ids {
            stats_row = stats_row.bind(ids);
        }
        if let Some(ref ids) = filter.user_ids {
            stats_row = stats_row.bind(ids);
        }
        let stats_row = stats_row.fetch_one(&self.pool).await?;

        let borrowed: i64 = stats_row.get("borrowed");
        let returned: i64 = stats_row.get("returned");
        // Pagination still needs the fully filtered total
        let total = match status {
            Some("borrowed") => borrowed,
            Some("returned") => returned,
            Some(_) => 0,
            None => stats_row.get("total"),
        };
        let stats = TransactionListStats {
            total,
            borrowed,
            returned,
        };

        Ok((transactions, stats, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_column_accepts_wire_aliases() {
        assert_eq!(BorrowsRepository::sort_column(Some("dueDate")), "due_date");
        assert_eq!(BorrowsRepository::sort_column(Some("returned_at")), "returned_at");
        assert_eq!(BorrowsRepository::sort_column(Some("bogus")), "borrowed_at");
        assert_eq!(BorrowsRepository::sort_column(None), "borrowed_at");
    }
}
