//! Libris: multi-library book lending server
//!
//! Owners create libraries and admins, admins manage inventory and readers,
//! readers borrow through issue requests that an admin approves. Approvals
//! and returns move copies atomically with the request record.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

use repository::Repository;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
    pub repository: Repository,
}

impl AppState {
    pub fn new(config: AppConfig, repository: Repository) -> Self {
        let services = services::Services::new(repository.clone(), config.auth.clone());
        Self {
            config: Arc::new(config),
            services: Arc::new(services),
            repository,
        }
    }
}
