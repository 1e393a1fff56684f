// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Service Errors
//!
//! The error vocabulary every application service speaks. The presentation
//! layer maps each variant onto one HTTP status.

use thiserror::Error;

use crate::domain::application::ApplicationError;
use crate::domain::repository::RepositoryError;
use crate::domain::runtime::RuntimeError;
use crate::domain::volume::VolumeError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input rejected before any mutation
    #[error("{0}")]
    Validation(String),

    /// Another lifecycle action is in flight, or the record changed underneath
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    /// Store or container runtime failure
    #[error("{message}")]
    Service {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn service(message: impl Into<String>) -> Self {
        Self::Service {
            message: message.into(),
            source: None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(m) => Self::NotFound(m),
            RepositoryError::Duplicate(m) => Self::Validation(format!("Already in use: {}", m)),
            e @ (RepositoryError::StaleVersion(_)
            | RepositoryError::Busy(_)
            | RepositoryError::OwnerBusy(_)) => Self::Conflict(e.to_string()),
            e => Self::Service {
                message: format!("Store failure: {}", e),
                source: Some(Box::new(e)),
            },
        }
    }
}

impl From<RuntimeError> for ServiceError {
    fn from(err: RuntimeError) -> Self {
        Self::Service {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<ApplicationError> for ServiceError {
    fn from(err: ApplicationError) -> Self {
        if err.is_not_found() {
            return Self::NotFound(err.to_string());
        }
        match err {
            ApplicationError::InvalidStateTransition { .. } => Self::Conflict(err.to_string()),
            e => Self::Validation(e.to_string()),
        }
    }
}

impl From<VolumeError> for ServiceError {
    fn from(err: VolumeError) -> Self {
        match err {
            VolumeError::MountNotFound { .. } => Self::NotFound(err.to_string()),
            e => Self::Validation(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::application::Status;

    #[test]
    fn test_repository_error_mapping() {
        assert!(ServiceError::from(RepositoryError::Busy("shop".into())).is_conflict());
        assert!(ServiceError::from(RepositoryError::StaleVersion("shop".into())).is_conflict());
        assert!(ServiceError::from(RepositoryError::Duplicate("alias".into())).is_validation());
        assert!(ServiceError::from(RepositoryError::NotFound("x".into())).is_not_found());
        assert!(matches!(
            ServiceError::from(RepositoryError::Database("down".into())),
            ServiceError::Service { source: Some(_), .. }
        ));
    }

    #[test]
    fn test_domain_error_mapping() {
        assert!(ServiceError::from(ApplicationError::PortNotFound(80)).is_not_found());
        assert!(ServiceError::from(ApplicationError::PortAlreadyOpen(80)).is_validation());
        assert!(ServiceError::from(ApplicationError::InvalidStateTransition {
            from: Status::Start,
            to: Status::Stop,
        })
        .is_conflict());
    }
}
