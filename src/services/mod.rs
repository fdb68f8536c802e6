pub mod analytics_service;
pub mod auth_service;
pub mod drive_service;
pub mod student_service;

use thiserror::Error;
use uuid::Uuid;

use crate::auth::password::PasswordError;
use crate::auth::{DenyReason, TokenError};
use crate::database::StoreError;
use crate::filter::FilterError;
use crate::import::ImportError;
use crate::rules::{DriveRejection, VaccinationRejection};

pub use analytics_service::{AnalyticsService, AnalyticsSummary};
pub use auth_service::{AuthService, LoginRequest, RegisterRequest};
pub use drive_service::DriveService;
pub use student_service::{BulkImportReport, NewStudentRequest, StudentPatch, StudentQuery, StudentService};

/// Failure kinds surfaced by the services. Business-rule rejections arrive
/// here as values; only `Store` and `Internal` represent faults.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{message}")]
    Validation {
        message: String,
        field: Option<&'static str>,
    },

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    MalformedClaim(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(StoreError),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            field: None,
        }
    }

    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            field: Some(field),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate { key, .. } => ServiceError::Conflict(format!("{} already exists", key)),
            StoreError::Filter(e) => e.into(),
            other => ServiceError::Store(other),
        }
    }
}

impl From<FilterError> for ServiceError {
    fn from(err: FilterError) -> Self {
        ServiceError::validation(err.to_string())
    }
}

impl From<DriveRejection> for ServiceError {
    fn from(rejection: DriveRejection) -> Self {
        ServiceError::invalid_field(rejection.field(), rejection.to_string())
    }
}

impl From<VaccinationRejection> for ServiceError {
    fn from(rejection: VaccinationRejection) -> Self {
        match rejection {
            VaccinationRejection::NotFound => ServiceError::NotFound("Student not found".to_string()),
            VaccinationRejection::AlreadyVaccinated => ServiceError::Conflict("Already vaccinated".to_string()),
            VaccinationRejection::MissingField(field) => ServiceError::invalid_field(field, rejection.to_string()),
            VaccinationRejection::InvalidDate => {
                ServiceError::invalid_field("date_of_vaccination", rejection.to_string())
            }
        }
    }
}

impl From<DenyReason> for ServiceError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::InvalidTokenStructure => ServiceError::MalformedClaim(reason.message().to_string()),
            DenyReason::RoleMismatch => ServiceError::Forbidden(reason.message().to_string()),
        }
    }
}

impl From<ImportError> for ServiceError {
    fn from(err: ImportError) -> Self {
        ServiceError::invalid_field("file", err.to_string())
    }
}

impl From<PasswordError> for ServiceError {
    fn from(err: PasswordError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired | TokenError::Invalid(_) => ServiceError::Unauthorized(err.to_string()),
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

/// Parse a record id from a path segment
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, ServiceError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ServiceError::invalid_field("id", format!("Invalid {} ID", what)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Collection;

    #[test]
    fn duplicates_become_conflicts() {
        let err: ServiceError = StoreError::Duplicate {
            collection: Collection::Students,
            key: "student_id".to_string(),
        }
        .into();
        assert!(matches!(err, ServiceError::Conflict(ref m) if m == "student_id already exists"));
    }

    #[test]
    fn rejections_keep_their_reason() {
        let err: ServiceError = DriveRejection::TooSoon.into();
        assert!(matches!(
            err,
            ServiceError::Validation { ref message, field: Some("date") } if message == "must be at least 16 days ahead"
        ));

        let err: ServiceError = VaccinationRejection::AlreadyVaccinated.into();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[test]
    fn ids_must_be_uuids() {
        assert!(parse_id("abc", "drive").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string(), "drive").unwrap(), id);
    }
}
