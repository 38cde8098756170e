//! Authentication service: registration, login and password hashing

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    models::user::{Role, User, UserClaims},
    repository::Repository,
};

/// Hash a password with argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: Arc<AppConfig>,
}

impl AuthService {
    pub fn new(repository: Repository, config: Arc<AppConfig>) -> Self {
        Self { repository, config }
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AppError::Internal(format!("Stored password hash is invalid: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Issue a signed token for a user
    pub fn issue_token(&self, user: &User) -> AppResult<String> {
        let now = chrono::Utc::now().timestamp();
        let claims = UserClaims {
            sub: user.email.clone(),
            user_id: user.id,
            role: user.role,
            exp: now + self.config.auth.jwt_expiration_hours as i64 * 3600,
            iat: now,
        };
        claims
            .create_token(&self.config.auth.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Token creation failed: {}", e)))
    }

    /// Self-service registration. Accounts created here are always
    /// regular users; admin accounts are created by an admin.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> AppResult<(User, String)> {
        if self.repository.users.email_exists(email, None).await? {
            return Err(AppError::Conflict("Email is already registered".to_string()));
        }

        let hash = hash_password(password)?;
        let user = self
            .repository
            .users
            .create(username, email, &hash, Role::User, None)
            .await?;

        tracing::info!(user_id = user.id, "User registered");
        let token = self.issue_token(&user)?;
        Ok((user, token))
    }

    /// Login with email and password. Both a missing account and a
    /// wrong password map to the same error.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<(User, String)> {
        let user = self
            .repository
            .users
            .get_by_email(email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !self.verify_password(password, &user.password)? {
            return Err(AppError::Authentication(
                "Invalid email or password".to_string(),
            ));
        }

        tracing::info!(user_id = user.id, "User logged in");
        let token = self.issue_token(&user)?;
        Ok((user, token))
    }
}
