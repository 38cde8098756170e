//! Dashboard statistics endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{error::AppResult, AppState};

use super::{ApiResponse, AuthenticatedUser};

/// One histogram bucket: loans started in `period`, by status
#[derive(Debug, Serialize, ToSchema)]
pub struct HistogramEntry {
    /// `YYYY-MM-DD` for daily buckets, `YYYY-MM` for monthly
    pub period: String,
    pub status: String,
    pub count: i64,
}

/// One of the most borrowed books
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PopularBook {
    pub book_id: i32,
    pub title: String,
    pub level: String,
    pub borrow_count: i64,
}

/// Member counts by role
#[derive(Debug, Serialize, ToSchema)]
pub struct UserCounts {
    pub total: i64,
    pub admin: i64,
    pub user: i64,
}

/// Catalog counts by status
#[derive(Debug, Serialize, ToSchema)]
pub struct BookCounts {
    pub total: i64,
    pub available: i64,
    pub borrowed: i64,
}

/// Full dashboard payload for one reporting range
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// The range token the numbers describe
    pub range: String,
    /// Loans started in the range
    pub borrowed: i64,
    /// Loans started in the range that have since been returned
    pub returned: i64,
    pub total: i64,
    pub users: UserCounts,
    pub books: BookCounts,
    /// Daily buckets inside the range; empty for the unbounded range
    pub daily_data: Vec<HistogramEntry>,
    /// Monthly buckets across all time; only for the unbounded range
    pub monthly_data: Vec<HistogramEntry>,
    pub popular_books: Vec<PopularBook>,
}

/// A selectable reporting range
#[derive(Debug, Serialize, ToSchema)]
pub struct RangeOption {
    pub value: String,
    pub label: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct StatsQuery {
    /// Range token; defaults to 7d, unknown values get a one-day
    /// window ending now
    pub range: Option<String>,
}

/// Get dashboard statistics for a reporting range (admin)
#[utoipa::path(
    get,
    path = "/api/borrow/stats",
    tag = "stats",
    security(("bearer_auth" = [])),
    params(StatsQuery),
    responses(
        (status = 200, description = "Dashboard statistics", body = DashboardStats),
        (status = 403, description = "Admin only")
    )
)]
pub async fn get_dashboard_stats(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<StatsQuery>,
) -> AppResult<Json<ApiResponse<DashboardStats>>> {
    claims.require_admin()?;

    let range = query.range.as_deref().unwrap_or("7d");
    let stats = state.services.stats.get_dashboard_stats(range).await?;
    Ok(Json(ApiResponse::new(stats)))
}

/// Get the selectable reporting ranges (admin)
#[utoipa::path(
    get,
    path = "/api/borrow/getRange",
    tag = "stats",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Available ranges", body = Vec<RangeOption>),
        (status = 403, description = "Admin only")
    )
)]
pub async fn get_ranges(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ApiResponse<Vec<RangeOption>>>> {
    claims.require_admin()?;

    Ok(Json(ApiResponse::new(state.services.stats.get_ranges())))
}
