//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{auth, books, borrows, health, stats, users};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pustaka API",
        version = "1.0.0",
        description = "School library management REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Users
        users::get_profile,
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::delete_user,
        // Borrows
        borrows::borrow_book,
        borrows::return_book,
        borrows::list_transactions,
        borrows::list_user_transactions,
        // Stats
        stats::get_dashboard_stats,
        stats::get_ranges,
    ),
    components(
        schemas(
            // Auth
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::AuthPayload,
            // Books
            crate::models::book::Book,
            crate::models::book::BookStatus,
            crate::models::book::BookWithBorrower,
            crate::models::book::BookSummary,
            crate::models::book::BookListStats,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            books::BookFilters,
            books::BookDetail,
            // Users
            crate::models::user::User,
            crate::models::user::UserSummary,
            crate::models::user::Role,
            crate::models::user::UserListStats,
            crate::models::user::CreateUser,
            crate::models::user::UpdateUser,
            users::UserLoanStats,
            users::UserDetail,
            // Borrows
            crate::models::borrow::BorrowedBook,
            crate::models::borrow::BorrowStatus,
            crate::models::borrow::TransactionDetails,
            crate::models::borrow::TransactionListStats,
            borrows::BorrowRequest,
            borrows::BorrowPayload,
            borrows::ReturnPayload,
            // Stats
            stats::DashboardStats,
            stats::HistogramEntry,
            stats::PopularBook,
            stats::UserCounts,
            stats::BookCounts,
            stats::RangeOption,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
            crate::api::MessageResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "books", description = "Book catalog management"),
        (name = "users", description = "User management"),
        (name = "borrows", description = "Borrow and return operations"),
        (name = "stats", description = "Dashboard statistics")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
