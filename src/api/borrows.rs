//! Borrow and return endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{
        book::Book,
        borrow::{BorrowedBook, TransactionDetails, TransactionListStats, TransactionQuery},
        Pagination,
    },
    AppState,
};

use super::{ApiResponse, AuthenticatedUser};

/// Borrow request: who borrows and until when
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequest {
    /// Borrowing user
    pub user_id: i32,
    /// Due date (ISO 8601); defaults to one week out
    pub due_date: Option<String>,
}

/// Borrow payload: the updated book and the new ledger entry
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BorrowPayload {
    pub book: Book,
    pub transaction: BorrowedBook,
}

/// Return payload: the reset book and the closed ledger entry, when
/// one existed
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReturnPayload {
    pub book: Book,
    pub transaction: Option<BorrowedBook>,
}

/// Transaction listing envelope with stats and pagination
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionListResponse {
    pub success: bool,
    pub data: Vec<TransactionDetails>,
    pub stats: TransactionListStats,
    pub pagination: Pagination,
}

/// Borrow a book for a user (admin)
#[utoipa::path(
    post,
    path = "/api/borrow/{bookId}/borrow",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("bookId" = i32, Path, description = "Book ID")),
    request_body = BorrowRequest,
    responses(
        (status = 201, description = "Book borrowed", body = BorrowPayload),
        (status = 400, description = "Due date in the past"),
        (status = 404, description = "Book or user not found"),
        (status = 409, description = "Book is already borrowed")
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<i32>,
    Json(request): Json<BorrowRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<BorrowPayload>>)> {
    claims.require_admin()?;

    let (book, transaction) = state
        .services
        .loans
        .borrow(book_id, request.user_id, request.due_date.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(BorrowPayload { book, transaction })),
    ))
}

/// Return a borrowed book (admin)
#[utoipa::path(
    post,
    path = "/api/borrow/{bookId}/return",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(("bookId" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book returned", body = ReturnPayload),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book is not currently borrowed")
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(book_id): Path<i32>,
) -> AppResult<Json<ApiResponse<ReturnPayload>>> {
    claims.require_admin()?;

    let (book, transaction) = state.services.loans.return_book(book_id).await?;
    Ok(Json(ApiResponse::new(ReturnPayload { book, transaction })))
}

/// List all ledger entries (admin)
#[utoipa::path(
    get,
    path = "/api/borrow/transactions",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(TransactionQuery),
    responses(
        (status = 200, description = "Page of transactions with stats and pagination"),
        (status = 403, description = "Admin only")
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<TransactionQuery>,
) -> AppResult<Json<TransactionListResponse>> {
    claims.require_admin()?;

    let (transactions, stats, pagination) =
        state.services.loans.list_transactions(&query).await?;
    Ok(Json(TransactionListResponse {
        success: true,
        data: transactions,
        stats,
        pagination,
    }))
}

/// List one user's ledger entries
#[utoipa::path(
    get,
    path = "/api/borrow/{userId}",
    tag = "borrows",
    security(("bearer_auth" = [])),
    params(
        ("userId" = i32, Path, description = "User ID"),
        TransactionQuery
    ),
    responses(
        (status = 200, description = "Page of the user's transactions"),
        (status = 404, description = "User not found")
    )
)]
pub async fn list_user_transactions(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(user_id): Path<i32>,
    Query(query): Query<TransactionQuery>,
) -> AppResult<Json<TransactionListResponse>> {
    let (transactions, stats, pagination) = state
        .services
        .loans
        .list_user_transactions(user_id, &query)
        .await?;
    Ok(Json(TransactionListResponse {
        success: true,
        data: transactions,
        stats,
        pagination,
    }))
}
