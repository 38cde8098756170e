//! User service: member administration and profile details

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        borrow::TransactionDetails,
        user::{CreateUser, UpdateUser, User, UserListStats, UserQuery},
        Pagination,
    },
    repository::Repository,
    services::{auth::hash_password, media::MediaService},
};

/// Ledger entries shown on a member's detail page
const HISTORY_LIMIT: i64 = 10;

/// Loan counts shown alongside a member's profile
#[derive(Debug, Clone, Copy)]
pub struct LoanCounts {
    pub total: i64,
    pub borrowed: i64,
    pub returned: i64,
}

#[derive(Clone)]
pub struct UserService {
    repository: Repository,
    media: MediaService,
}

impl UserService {
    pub fn new(repository: Repository, media: MediaService) -> Self {
        Self { repository, media }
    }

    pub async fn get_user(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// Get a member with their open loans, recent history and loan
    /// counts, as shown on the member detail page.
    pub async fn get_user_details(
        &self,
        id: i32,
    ) -> AppResult<(User, Vec<TransactionDetails>, Vec<TransactionDetails>, LoanCounts)> {
        let user = self.repository.users.get_by_id(id).await?;
        let current = self.repository.borrows.open_loans_for_user(id).await?;
        let history = self
            .repository
            .borrows
            .history_for_user(id, HISTORY_LIMIT)
            .await?;
        let (total, borrowed, returned) = self.repository.borrows.user_loan_counts(id).await?;
        Ok((
            user,
            current,
            history,
            LoanCounts {
                total,
                borrowed,
                returned,
            },
        ))
    }

    /// List members with filters, search, sorting and pagination
    pub async fn list_users(
        &self,
        query: &UserQuery,
    ) -> AppResult<(Vec<User>, UserListStats, Pagination)> {
        let (page, limit) = crate::models::normalize_page_limit(query.page, query.limit);
        let (users, stats) = self.repository.users.list(query).await?;
        Ok((users, stats, Pagination::new(page, limit, stats.total)))
    }

    /// Create a member (admin operation, role is caller-chosen)
    pub async fn create_user(&self, data: CreateUser) -> AppResult<User> {
        data.validate()?;

        if self.repository.users.email_exists(&data.email, None).await? {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }

        let hash = hash_password(&data.password)?;
        let user = self
            .repository
            .users
            .create(&data.username, &data.email, &hash, data.role, None)
            .await?;

        tracing::info!(user_id = user.id, "User created");
        Ok(user)
    }

    /// Update a member's profile and/or replace their avatar. The
    /// old avatar is deleted only after the new state is committed.
    pub async fn update_user(
        &self,
        id: i32,
        data: UpdateUser,
        avatar: Option<(String, Vec<u8>)>,
    ) -> AppResult<User> {
        data.validate()?;

        let existing = self.repository.users.get_by_id(id).await?;

        if let Some(ref email) = data.email {
            if self.repository.users.email_exists(email, Some(id)).await? {
                return Err(AppError::Conflict("Email is already registered".to_string()));
            }
        }

        let password_hash = match data.password.as_deref() {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };

        let uploaded = match avatar {
            Some((filename, bytes)) => Some(self.media.upload(&filename, bytes).await?),
            None => None,
        };

        let result = self
            .repository
            .users
            .update(
                id,
                data.username.as_deref(),
                data.email.as_deref(),
                password_hash.as_deref(),
                data.role,
                uploaded.as_ref().map(|img| img.url.as_str()),
            )
            .await;

        match result {
            Ok(user) => {
                if uploaded.is_some() {
                    if let Some(old) = existing.avatar {
                        self.media.delete_by_url(&old).await;
                    }
                }
                tracing::info!(user_id = user.id, "User updated");
                Ok(user)
            }
            Err(e) => {
                if let Some(img) = uploaded {
                    self.media.delete_by_url(&img.url).await;
                }
                Err(e)
            }
        }
    }

    /// Delete a member. Members holding open loans cannot be
    /// deleted; their ledger history and avatar go with them.
    pub async fn delete_user(&self, id: i32) -> AppResult<()> {
        let user = self.repository.users.get_by_id(id).await?;

        let open = self.repository.borrows.count_open_for_user(id).await?;
        if open > 0 {
            return Err(AppError::Conflict(
                "Cannot delete a user with borrowed books".to_string(),
            ));
        }

        self.repository.users.delete(id).await?;
        if let Some(avatar) = user.avatar {
            self.media.delete_by_url(&avatar).await;
        }

        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }
}
