//! Business logic services

pub mod auth;
pub mod export;
pub mod notify;
pub mod qr;
pub mod stats;
pub mod visitors;

use crate::{config::AppConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub auth: auth::AuthService,
    pub visitors: visitors::VisitorsService,
    pub notify: notify::NotifyService,
    pub stats: stats::StatsService,
    pub export: export::ExportService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> AppResult<Self> {
        let notify = notify::NotifyService::new(config.email.clone(), &config.notify)?;

        Ok(Self {
            auth: auth::AuthService::new(repository.clone(), config.auth.clone()),
            visitors: visitors::VisitorsService::new(
                repository.clone(),
                notify.clone(),
                config.visitor.clone(),
            ),
            stats: stats::StatsService::new(repository.clone()),
            export: export::ExportService::new(
                repository.clone(),
                config.visitor.export_default_days,
            ),
            notify,
            repository,
        })
    }

    /// True when the store answers a trivial query
    pub async fn database_reachable(&self) -> bool {
        sqlx::query("SELECT 1")
            .execute(&self.repository.pool)
            .await
            .is_ok()
    }
}
