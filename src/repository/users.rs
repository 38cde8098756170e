//! Users repository for database operations

use sqlx::{Pool, Postgres, Row};

use crate::{
    error::{AppError, AppResult},
    models::{
        normalize_page_limit,
        user::{Role, User, UserListStats, UserQuery},
        SortOrder,
    },
};

use super::books::like_pattern;

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn sort_column(sort_by: Option<&str>) -> &'static str {
        match sort_by.unwrap_or("created_at") {
            "username" => "username",
            "email" => "email",
            "role" => "role",
            "updated_at" | "updatedAt" => "updated_at",
            _ => "created_at",
        }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get user by email (primary authentication lookup)
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Check if email already exists
    pub async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = if let Some(id) = exclude_id {
            sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1) AND id != $2)",
            )
            .bind(email)
            .bind(id)
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE LOWER(email) = LOWER($1))")
                .bind(email)
                .fetch_one(&self.pool)
                .await?
        };
        Ok(exists)
    }

    /// Create a new user; `password_hash` must already be hashed
    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role: Role,
        avatar: Option<&str>,
    ) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password, role, avatar)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .bind(avatar)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    /// Update profile fields; omitted fields keep their current value
    pub async fn update(
        &self,
        id: i32,
        username: Option<&str>,
        email: Option<&str>,
        password_hash: Option<&str>,
        role: Option<Role>,
        avatar: Option<&str>,
    ) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                email = COALESCE($3, email),
                password = COALESCE($4, password),
                role = COALESCE($5, role),
                avatar = COALESCE($6, avatar),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .bind(avatar)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Delete a user and cascade-delete their ledger history
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM borrows WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }

        tx.commit().await?;
        Ok(())
    }

    /// List users with filters, search, sorting and pagination
    pub async fn list(&self, query: &UserQuery) -> AppResult<(Vec<User>, UserListStats)> {
        let (page, limit) = normalize_page_limit(query.page, query.limit);

        let role = query
            .role
            .as_deref()
            .filter(|s| !s.is_empty() && *s != "all");
        let pattern = query
            .search
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let mut conditions: Vec<String> = Vec::new();
        let mut idx = 0usize;
        if role.is_some() {
            idx += 1;
            conditions.push(format!("role = ${}", idx));
        }
        if pattern.is_some() {
            idx += 1;
            conditions.push(format!(
                "(username ILIKE ${i} OR email ILIKE ${i})",
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
            SELECT * FROM users
            WHERE {where_clause}
            ORDER BY {sort_col} {sort_dir}
            LIMIT ${} OFFSET ${}
            "#,
            idx + 1,
            idx + 2,
        );

        let mut rows = sqlx::query_as::<_, User>(&rows_query);
        if let Some(r) = role {
            rows = rows.bind(r);
        }
        if let Some(ref p) = pattern {
            rows = rows.bind(p);
        }
        let users = rows
            .bind(limit)
            .bind((page - 1) * limit)
            .fetch_all(&self.pool)
            .await?;

        // The role counts keep the search filter but ignore the role
        // filter itself
        let stats_where = if pattern.is_some() {
            "(username ILIKE $1 OR email ILIKE $1)"
        } else {
            "TRUE"
        };

        let stats_query = format!(
            r#"
            SELECT COUNT(*) as total,
                   COUNT(*) FILTER (WHERE role = 'admin') as admin,
                   COUNT(*) FILTER (WHERE role = 'user') as "user"
            FROM users
            WHERE {stats_where}
            "#,
        );
        let mut stats_row = sqlx::query(&stats_query);
        if let Some(ref p) = pattern {
            stats_row = stats_row.bind(p);
        }
        let stats_row = stats_row.fetch_one(&self.pool).await?;

        let admin: i64 = stats_row.get("admin");
        let user: i64 = stats_row.get("user");
        // Pagination still needs the fully filtered total
        let total = match role {
            Some("admin") => admin,
            Some("user") => user,
            Some(_) => 0,
            None => stats_row.get("total"),
        };
        let stats = UserListStats { total, admin, user };

        Ok((users, stats))
    }

    /// User IDs whose username or email match the search term
    pub async fn ids_matching(&self, term: &str) -> AppResult<Vec<i32>> {
        let pattern = like_pattern(term);
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM users WHERE username ILIKE $1 OR email ILIKE $1",
        )
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Total user count for the dashboard
    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Role distribution for the dashboard
    pub async fn role_distribution(&self) -> AppResult<Vec<(String, i64)>> {
        let rows = sqlx::query("SELECT role, COUNT(*) as count FROM users GROUP BY role")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.get("role"), row.get("count")))
            .collect())
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_column_whitelist() {
        assert_eq!(UsersRepository::sort_column(Some("email")), "email");
        assert_eq!(UsersRepository::sort_column(Some("createAt")), "created_at");
    }
}
