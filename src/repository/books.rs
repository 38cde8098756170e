//! Books repository for database operations

use sqlx::{Pool, Postgres, Row};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookListStats, BookQuery, BookWithBorrower, CreateBook, UpdateBook},
        normalize_page_limit,
        user::UserSummary,
        SortOrder,
    },
};

/// Escape LIKE metacharacters so search terms match literally
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn sort_column(sort_by: Option<&str>) -> &'static str {
        match sort_by.unwrap_or("created_at") {
            "number" => "number",
            "title" => "title",
            "level" => "level",
            "author" => "author",
            "status" => "status",
            "updated_at" | "updatedAt" => "updated_at",
            _ => "created_at",
        }
    }

    /// Get book by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Get book by ID joined with its current borrower
    pub async fn get_with_borrower(&self, id: i32) -> AppResult<BookWithBorrower> {
        let row = sqlx::query(
            r#"
            SELECT b.*,
                   u.id as borrower_id, u.username as borrower_username,
                   u.email as borrower_email, u.avatar as borrower_avatar
            FROM books b
            LEFT JOIN users u ON b.borrowed_by = u.id
            WHERE b.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        Ok(Self::with_borrower_from_row(&row))
    }

    fn with_borrower_from_row(row: &sqlx::postgres::PgRow) -> BookWithBorrower {
        let book = Book {
            id: row.get("id"),
            number: row.get("number"),
            title: row.get("title"),
            level: row.get("level"),
            author: row.get("author"),
            title_code: row.get("title_code"),
            author_code: row.get("author_code"),
            status: row.get("status"),
            borrowed_by: row.get("borrowed_by"),
            cover_image: row.get("cover_image"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        };
        let borrower = row
            .get::<Option<i32>, _>("borrower_id")
            .map(|id| UserSummary {
                id,
                username: row.get("borrower_username"),
                email: row.get("borrower_email"),
                avatar: row.get("borrower_avatar"),
            });
        BookWithBorrower { book, borrower }
    }

    /// Check if a catalog number already exists
    pub async fn number_exists(&self, number: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = if let Some(id) = exclude_id {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE number = $1 AND id != $2)")
                .bind(number)
                .bind(id)
                .fetch_one(&self.pool)
                .await?
        } else {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE number = $1)")
                .bind(number)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(exists)
    }

    /// Create a new book
    pub async fn create(&self, book: &CreateBook, cover_image: Option<&str>) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (number, title, level, author, title_code, author_code, status, cover_image)
            VALUES ($1, $2, $3, $4, $5, $6, 'available', $7)
            RETURNING *
            "#,
        )
        .bind(&book.number)
        .bind(&book.title)
        .bind(&book.level)
        .bind(&book.author)
        .bind(&book.title_code)
        .bind(&book.author_code)
        .bind(cover_image)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Update catalog fields; status/borrowed_by are never touched here
    pub async fn update(
        &self,
        id: i32,
        book: &UpdateBook,
        cover_image: Option<&str>,
    ) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books
            SET number = COALESCE($2, number),
                title = COALESCE($3, title),
                level = COALESCE($4, level),
                author = COALESCE($5, author),
                title_code = COALESCE($6, title_code),
                author_code = COALESCE($7, author_code),
                cover_image = COALESCE($8, cover_image),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&book.number)
        .bind(&book.title)
        .bind(&book.level)
        .bind(&book.author)
        .bind(&book.title_code)
        .bind(&book.author_code)
        .bind(cover_image)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    /// Delete a book and cascade-delete its ledger history
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM borrows WHERE book_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }

        tx.commit().await?;
        Ok(())
    }

    /// List books with filters, search, sorting and pagination.
    /// Returns the page, status counts under the same filters, the
    /// distinct level values, and the filtered total.
    pub async fn list(
        &self,
        query: &BookQuery,
    ) -> AppResult<(Vec<BookWithBorrower>, BookListStats, Vec<String>, i64)> {
        let (page, limit) = normalize_page_limit(query.page, query.limit);

        let status = query
            .status
            .as_deref()
            .filter(|s| !s.is_empty() && *s != "all");
        let level = query
            .level
            .as_deref()
            .filter(|s| !s.is_empty() && *s != "all");
        let pattern = query
            .search
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let mut conditions: Vec<String> = Vec::new();
        let mut idx = 0usize;
        if status.is_some() {
            idx += 1;
            conditions.push(format!("b.status = ${}", idx));
        }
        if level.is_some() {
            idx += 1;
            conditions.push(format!("b.level = ${}", idx));
        }
        if pattern.is_some() {
            idx += 1;
            conditions.push(format!(
                "(b.title ILIKE ${i} OR b.author ILIKE ${i} OR b.number ILIKE ${i})",
                i = idx
            ));
        }
        let where_clause = if conditions.is_empty() {
            "TRUE".to_string()
        } else {
            conditions.join(" AND ")
        };

        let sort_col = Self::sort_column(query.sort_by.as_deref());
        let sort_dir = query.sort_order.unwrap_or(SortOrder::Desc).as_sql();

        let rows_query = format!(
            r#"
            SELECT b.*,
                   u.id as borrower_id, u.username as borrower_username,
                   u.email as borrower_email, u.avatar as borrower_avatar
            FROM books b
            LEFT JOIN users u ON b.borrowed_by = u.id
            WHERE {where_clause}
            ORDER BY b.{sort_col} {sort_dir}
            LIMIT ${} OFFSET ${}
            "#,
            idx + 1,
            idx + 2,
        );

        let mut rows = sqlx::query(&rows_query);
        if let Some(s) = status {
            rows = rows.bind(s);
        }
        if let Some(l) = level {
            rows = rows.bind(l);
        }
        if let Some(ref p) = pattern {
            rows = rows.bind(p);
        }
        let rows = rows
            .bind(limit)
            .bind((page - 1) * limit)
            .fetch_all(&self.pool)
            .await?;

        let books = rows.iter().map(Self::with_borrower_from_row).collect();

        // The status counts keep the level/search filters but ignore
        // the status filter itself
        let mut stats_conditions: Vec<String> = Vec::new();
        let mut sidx = 0usize;
        if level.is_some() {
            sidx += 1;
            stats_conditions.push(format!("b.level = ${}", sidx));
        }
        if pattern.is_some() {
            sidx += 1;
            stats_conditions.push(format!(
                "(b.title ILIKE ${i} OR b.author ILIKE ${i} OR b.number ILIKE ${i})",
                i = sidx
            ));
        }
        let stats_where = if stats_conditions.is_empty() {
            "TRUE".to_string()
        } else {
            stats_conditions.join(" AND ")
        };

        let stats_query = format!(
            r#"
            SELECT COUNT(*) as total,
                   COUNT(*) FILTER (WHERE b.status = 'available') as available,
                   COUNT(*) FILTER (WHERE b.status = 'borrowed') as borrowed
            FROM books b
            WHERE {stats_where}
            "#,
        );
        let mut stats_row = sqlx::query(&stats_query);
        if let Some(l) = level {
            stats_row = stats_row.bind(l);
        }
        if let Some(ref p) = pattern {
            stats_row = stats_row.bind(p);
        }
        let stats_row = stats_row.fetch_one(&self.pool).await?;

        let available: i64 = stats_row.get("available");
        let borrowed: i64 = stats_row.get("borrowed");
        // Pagination still needs the fully filtered total
        let total = match status {
            Some("available") => available,
            Some("borrowed") => borrowed,
            Some(_) => 0,
            None => stats_row.get("total"),
        };
        let stats = BookListStats {
            total,
            available,
            borrowed,
        };

        let levels: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT level FROM books WHERE level IS NOT NULL AND level != '' ORDER BY level",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok((books, stats, levels, total))
    }

    /// Book IDs whose title, author or number match the search term
    pub async fn ids_matching(&self, term: &str) -> AppResult<Vec<i32>> {
        let pattern = like_pattern(term);
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM books WHERE title ILIKE $1 OR author ILIKE $1 OR number ILIKE $1",
        )
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Total/available book counts for the dashboard
    pub async fn dashboard_counts(&self) -> AppResult<(i64, i64)> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) as total,
                   COUNT(*) FILTER (WHERE status = 'available') as available
            FROM books
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok((row.get("total"), row.get("available")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_metacharacters() {
        assert_eq!(like_pattern("abc"), "%abc%");
        assert_eq!(like_pattern("50%"), "%50\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
    }

    #[test]
    fn sort_column_falls_back_on_unknown_fields() {
        assert_eq!(BooksRepository::sort_column(Some("title")), "title");
        assert_eq!(BooksRepository::sort_column(Some("updatedAt")), "updated_at");
        // never interpolate caller input into SQL
        assert_eq!(
            BooksRepository::sort_column(Some("title; DROP TABLE books")),
            "created_at"
        );
        assert_eq!(BooksRepository::sort_column(None), "created_at");
    }
}
