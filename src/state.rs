use std::sync::Arc;

use chrono::{Local, NaiveDate};

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::database::DocumentStore;
use crate::services::{AnalyticsService, AuthService, DriveService, StudentService};

/// Shared handles for every request
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub tokens: Arc<TokenService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, tokens: TokenService, config: AppConfig) -> Self {
        Self {
            store,
            tokens: Arc::new(tokens),
            config: Arc::new(config),
        }
    }

    pub fn auth_service(&self) -> AuthService {
        AuthService::new(
            self.store.clone(),
            self.tokens.clone(),
            self.config.security.open_registration,
        )
    }

    pub fn student_service(&self) -> StudentService {
        StudentService::new(self.store.clone())
    }

    pub fn drive_service(&self) -> DriveService {
        DriveService::new(self.store.clone())
    }

    pub fn analytics_service(&self) -> AnalyticsService {
        AnalyticsService::new(self.store.clone())
    }

    /// Calendar date the drive rules are checked against
    pub fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}
