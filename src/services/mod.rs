//! Service layer holding the business logic

pub mod auth;
pub mod catalog;
pub mod loans;
pub mod media;
pub mod stats;
pub mod users;

use std::sync::Arc;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub users: users::UserService,
    pub loans: loans::LoanService,
    pub stats: stats::StatsService,
    repository: Repository,
}

impl Services {
    /// Wire up all services around one repository
    pub fn new(repository: Repository, config: Arc<AppConfig>) -> Self {
        let media = media::MediaService::new(config.media.clone());
        Self {
            auth: auth::AuthService::new(repository.clone(), config),
            catalog: catalog::CatalogService::new(repository.clone(), media.clone()),
            users: users::UserService::new(repository.clone(), media),
            loans: loans::LoanService::new(repository.clone()),
            stats: stats::StatsService::new(repository.clone()),
            repository,
        }
    }

    /// Round-trip to the database, for readiness probes
    pub async fn ping_database(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1")
            .execute(&self.repository.pool)
            .await
            .map(|_| ())
    }
}
