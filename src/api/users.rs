//! User management endpoints

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::{AppError, AppResult},
    models::{
        borrow::TransactionDetails,
        user::{CreateUser, Role, UpdateUser, User, UserListStats, UserQuery},
        Pagination,
    },
    AppState,
};

use super::{parse_multipart, ApiResponse, AuthenticatedUser, MessageResponse};

/// User listing envelope with stats and pagination
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListResponse {
    pub success: bool,
    pub data: Vec<User>,
    pub stats: UserListStats,
    pub pagination: Pagination,
}

/// Loan counts shown on the member detail page
#[derive(Serialize, ToSchema)]
pub struct UserLoanStats {
    pub total: i64,
    pub borrowed: i64,
    pub returned: i64,
}

/// Member detail payload: profile, open loans, recent history and
/// loan counts
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub current_loans: Vec<TransactionDetails>,
    pub history: Vec<TransactionDetails>,
    pub stats: UserLoanStats,
}

/// Get the authenticated user's own profile
#[utoipa::path(
    get,
    path = "/api/user/profile",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Own profile", body = User),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ApiResponse<User>>> {
    let user = state.services.users.get_user(claims.user_id).await?;
    Ok(Json(ApiResponse::new(user)))
}

/// List members with filters, search, sorting and pagination
#[utoipa::path(
    get,
    path = "/api/user",
    tag = "users",
    security(("bearer_auth" = [])),
    params(UserQuery),
    responses(
        (status = 200, description = "Page of users with stats and pagination"),
        (status = 403, description = "Admin only")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<UserQuery>,
) -> AppResult<Json<UserListResponse>> {
    claims.require_admin()?;

    let (users, stats, pagination) = state.services.users.list_users(&query).await?;
    Ok(Json(UserListResponse {
        success: true,
        data: users,
        stats,
        pagination,
    }))
}

/// Get a member with their loans, history and loan counts
#[utoipa::path(
    get,
    path = "/api/user/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Member details", body = UserDetail),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ApiResponse<UserDetail>>> {
    if claims.user_id != id {
        claims.require_admin()?;
    }

    let (user, current_loans, history, counts) = state.services.users.get_user_details(id).await?;
    Ok(Json(ApiResponse::new(UserDetail {
        user,
        current_loans,
        history,
        stats: UserLoanStats {
            total: counts.total,
            borrowed: counts.borrowed,
            returned: counts.returned,
        },
    })))
}

/// Create a member (admin)
#[utoipa::path(
    post,
    path = "/api/user",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    claims.require_admin()?;

    let user = state.services.users.create_user(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(user))))
}

/// Update a member's profile and/or avatar (multipart form).
/// Users may edit themselves; only admins may edit others or change
/// roles.
#[utoipa::path(
    put,
    path = "/api/user/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 403, description = "Not allowed"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Email already registered")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<User>>> {
    if claims.user_id != id {
        claims.require_admin()?;
    }

    let (fields, avatar) = parse_multipart(multipart).await?;
    let text = |key: &str| fields.get(key).cloned().filter(|v| !v.is_empty());

    let role = match text("role") {
        Some(raw) => Some(
            raw.parse::<Role>()
                .map_err(AppError::Validation)?,
        ),
        None => None,
    };
    if role.is_some() {
        claims.require_admin()?;
    }

    let data = UpdateUser {
        username: text("username"),
        email: text("email"),
        password: text("password"),
        role,
    };

    let user = state.services.users.update_user(id, data, avatar).await?;
    Ok(Json(ApiResponse::new(user)))
}

/// Delete a member holding no open loans (admin)
#[utoipa::path(
    delete,
    path = "/api/user/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 404, description = "User not found"),
        (status = 409, description = "User has borrowed books")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<MessageResponse>> {
    claims.require_admin()?;

    state.services.users.delete_user(id).await?;
    Ok(Json(MessageResponse::new("User deleted successfully")))
}
