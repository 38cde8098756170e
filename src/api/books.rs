//! Book catalog endpoints

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{
        book::{
            Book, BookListStats, BookQuery, BookWithBorrower, CreateBook, UpdateBook,
        },
        borrow::TransactionDetails,
        Pagination,
    },
    AppState,
};

use super::{parse_multipart, ApiResponse, AuthenticatedUser, MessageResponse};

/// Book listing envelope with stats, filter values and pagination
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookListResponse {
    pub success: bool,
    pub data: Vec<BookWithBorrower>,
    pub stats: BookListStats,
    pub filters: BookFilters,
    pub pagination: Pagination,
}

/// Distinct filter values available in the catalog
#[derive(Serialize, ToSchema)]
pub struct BookFilters {
    pub levels: Vec<String>,
}

/// Book detail payload: the book plus its recent loan history
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookDetail {
    #[serde(flatten)]
    pub book: BookWithBorrower,
    pub history: Vec<TransactionDetails>,
}

/// List books with filters, search, sorting and pagination
#[utoipa::path(
    get,
    path = "/api/book",
    tag = "books",
    security(("bearer_auth" = [])),
    params(BookQuery),
    responses(
        (status = 200, description = "Page of books with stats and pagination"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<BookListResponse>> {
    let (books, stats, levels, pagination) = state.services.catalog.list_books(&query).await?;

    Ok(Json(BookListResponse {
        success: true,
        data: books,
        stats,
        filters: BookFilters { levels },
        pagination,
    }))
}

/// Get a book with its borrower and recent loan history
#[utoipa::path(
    get,
    path = "/api/book/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = BookDetail),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<BookDetail>>> {
    let (book, history) = state.services.catalog.get_book(id).await?;
    Ok(Json(ApiResponse::new(BookDetail { book, history })))
}

fn create_from_fields(fields: &std::collections::HashMap<String, String>) -> CreateBook {
    let text = |key: &str| fields.get(key).cloned().unwrap_or_default();
    CreateBook {
        number: text("number"),
        title: text("title"),
        level: text("level"),
        author: text("author"),
        title_code: text("titleCode"),
        author_code: text("authorCode"),
    }
}

fn update_from_fields(fields: &std::collections::HashMap<String, String>) -> UpdateBook {
    let text = |key: &str| fields.get(key).cloned().filter(|v| !v.is_empty());
    UpdateBook {
        number: text("number"),
        title: text("title"),
        level: text("level"),
        author: text("author"),
        title_code: text("titleCode"),
        author_code: text("authorCode"),
    }
}

/// Create a book, optionally with a cover image (multipart form)
#[utoipa::path(
    post,
    path = "/api/book",
    tag = "books",
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid request"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Book number already exists")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<Book>>)> {
    claims.require_admin()?;

    let (fields, cover) = parse_multipart(multipart).await?;
    let data = create_from_fields(&fields);

    let book = state.services.catalog.create_book(data, cover).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(book))))
}

/// Update a book's catalog fields and/or cover image (multipart form)
#[utoipa::path(
    put,
    path = "/api/book/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book number already exists")
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Book>>> {
    claims.require_admin()?;

    let (fields, cover) = parse_multipart(multipart).await?;
    let data = update_from_fields(&fields);

    let book = state.services.catalog.update_book(id, data, cover).await?;
    Ok(Json(ApiResponse::new(book)))
}

/// Delete a book that is not currently borrowed
#[utoipa::path(
    delete,
    path = "/api/book/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book deleted", body = MessageResponse),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book is currently borrowed")
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    claims.require_admin()?;

    state.services.catalog.delete_book(id).await?;
    Ok(Json(MessageResponse::new("Book deleted successfully")))
}
