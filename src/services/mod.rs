//! Business logic services

pub mod auth;
pub mod availability;
pub mod catalog;
pub mod email;
pub mod loans;
pub mod members;
pub mod overdue;
pub mod redis;
pub mod reports;
pub mod reservations;

use std::sync::Arc;

use crate::{
    config::{AuthConfig, EmailConfig},
    error::AppResult,
    repository::Repository,
};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub catalog: catalog::CatalogService,
    pub members: members::MembersService,
    pub loans: loans::LoansService,
    pub reservations: reservations::ReservationsService,
    pub reports: reports::ReportsService,
    pub overdue: overdue::OverdueScan,
    repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub async fn new(
        repository: Repository,
        auth_config: AuthConfig,
        email_config: EmailConfig,
        redis_service: redis::RedisService,
    ) -> AppResult<Self> {
        let store = Arc::new(repository.clone());
        let availability = availability::AvailabilityService::new(store.clone());
        let sink = Arc::new(email::EmailService::new(email_config));

        Ok(Self {
            auth: auth::AuthService::new(repository.clone(), auth_config, redis_service),
            catalog: catalog::CatalogService::new(repository.clone()),
            members: members::MembersService::new(repository.clone()),
            loans: loans::LoansService::new(repository.clone(), availability.clone()),
            reservations: reservations::ReservationsService::new(repository.clone(), availability),
            reports: reports::ReportsService::new(repository.clone()),
            overdue: overdue::OverdueScan::new(store, sink),
            repository,
        })
    }

    /// Whether the database answers
    pub async fn ready(&self) -> AppResult<()> {
        self.repository.ping().await
    }
}
