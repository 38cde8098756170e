//! Catalog service: book CRUD and cover image lifecycle

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{
            Book, BookListStats, BookQuery, BookStatus, BookWithBorrower, CreateBook, UpdateBook,
        },
        borrow::TransactionDetails,
        Pagination,
    },
    repository::Repository,
    services::media::MediaService,
};

/// Ledger entries shown on a book's detail page
const HISTORY_LIMIT: i64 = 10;

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    media: MediaService,
}

impl CatalogService {
    pub fn new(repository: Repository, media: MediaService) -> Self {
        Self { repository, media }
    }

    /// Get a book with its current borrower and recent loan history
    pub async fn get_book(&self, id: i32) -> AppResult<(BookWithBorrower, Vec<TransactionDetails>)> {
        let book = self.repository.books.get_with_borrower(id).await?;
        let history = self
            .repository
            .borrows
            .history_for_book(id, HISTORY_LIMIT)
            .await?;
        Ok((book, history))
    }

    /// List books with filters, search, sorting and pagination
    pub async fn list_books(
        &self,
        query: &BookQuery,
    ) -> AppResult<(Vec<BookWithBorrower>, BookListStats, Vec<String>, Pagination)> {
        let (page, limit) = crate::models::normalize_page_limit(query.page, query.limit);
        let (books, stats, levels, total) = self.repository.books.list(query).await?;
        Ok((books, stats, levels, Pagination::new(page, limit, total)))
    }

    /// Create a book, optionally with a cover image. The image is
    /// uploaded only after validation passes, and removed again if
    /// the insert fails.
    pub async fn create_book(
        &self,
        data: CreateBook,
        cover: Option<(String, Vec<u8>)>,
    ) -> AppResult<Book> {
        data.validate()?;

        if self.repository.books.number_exists(&data.number, None).await? {
            return Err(AppError::Conflict(format!(
                "Book number {} already exists",
                data.number
            )));
        }

        let uploaded = match cover {
            Some((filename, bytes)) => Some(self.media.upload(&filename, bytes).await?),
            None => None,
        };

        let result = self
            .repository
            .books
            .create(&data, uploaded.as_ref().map(|img| img.url.as_str()))
            .await;

        match result {
            Ok(book) => {
                tracing::info!(book_id = book.id, number = %book.number, "Book created");
                Ok(book)
            }
            Err(e) => {
                if let Some(img) = uploaded {
                    self.media.delete_by_url(&img.url).await;
                }
                Err(e)
            }
        }
    }

    /// Update catalog fields and/or replace the cover image. The old
    /// cover is deleted only after the new state is committed.
    pub async fn update_book(
        &self,
        id: i32,
        data: UpdateBook,
        cover: Option<(String, Vec<u8>)>,
    ) -> AppResult<Book> {
        data.validate()?;

        let existing = self.repository.books.get_by_id(id).await?;

        if let Some(ref number) = data.number {
            if self.repository.books.number_exists(number, Some(id)).await? {
                return Err(AppError::Conflict(format!(
                    "Book number {} already exists",
                    number
                )));
            }
        }

        let uploaded = match cover {
            Some((filename, bytes)) => Some(self.media.upload(&filename, bytes).await?),
            None => None,
        };

        let result = self
            .repository
            .books
            .update(id, &data, uploaded.as_ref().map(|img| img.url.as_str()))
            .await;

        match result {
            Ok(book) => {
                if uploaded.is_some() {
                    if let Some(old) = existing.cover_image {
                        self.media.delete_by_url(&old).await;
                    }
                }
                tracing::info!(book_id = book.id, "Book updated");
                Ok(book)
            }
            Err(e) => {
                if let Some(img) = uploaded {
                    self.media.delete_by_url(&img.url).await;
                }
                Err(e)
            }
        }
    }

    /// Delete a book. Borrowed books cannot be deleted; the ledger
    /// history and cover image go with it.
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        let book = self.repository.books.get_by_id(id).await?;

        let open = self.repository.borrows.count_open_for_book(id).await?;
        if book.status == BookStatus::Borrowed || open > 0 {
            return Err(AppError::Conflict(
                "Cannot delete a book that is currently borrowed".to_string(),
            ));
        }

        self.repository.books.delete(id).await?;
        if let Some(cover) = book.cover_image {
            self.media.delete_by_url(&cover).await;
        }

        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }
}
