// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates concrete repository implementations based on the storage backend
//! configuration, keeping the domain layer free of infrastructure types.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Select in-memory or PostgreSQL persistence at startup

use anyhow::{bail, Result};
use std::sync::Arc;

use crate::domain::repository::{ApplicationRepository, StorageBackend, VolumeRepository};
use crate::infrastructure::db::Database;
use crate::infrastructure::repositories::{
    InMemoryApplicationRepository, InMemoryVolumeRepository, PostgresApplicationRepository,
    PostgresVolumeRepository,
};

/// Creates an ApplicationRepository implementation based on the configured backend
pub fn create_application_repository(
    backend: &StorageBackend,
    database: Option<&Database>,
) -> Result<Arc<dyn ApplicationRepository>> {
    match (backend, database) {
        (StorageBackend::InMemory, _) => Ok(Arc::new(InMemoryApplicationRepository::new())),
        (StorageBackend::PostgreSQL(_), Some(db)) => {
            Ok(Arc::new(PostgresApplicationRepository::new(db.get_pool().clone())))
        }
        (StorageBackend::PostgreSQL(_), None) => {
            bail!("PostgreSQL backend selected but no database connection was opened")
        }
    }
}

/// Creates a VolumeRepository implementation based on the configured backend
pub fn create_volume_repository(
    backend: &StorageBackend,
    database: Option<&Database>,
) -> Result<Arc<dyn VolumeRepository>> {
    match (backend, database) {
        (StorageBackend::InMemory, _) => Ok(Arc::new(InMemoryVolumeRepository::new())),
        (StorageBackend::PostgreSQL(_), Some(db)) => {
            Ok(Arc::new(PostgresVolumeRepository::new(db.get_pool().clone())))
        }
        (StorageBackend::PostgreSQL(_), None) => {
            bail!("PostgreSQL backend selected but no database connection was opened")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repository::PostgresConfig;

    #[test]
    fn test_in_memory_backend_needs_no_database() {
        assert!(create_application_repository(&StorageBackend::InMemory, None).is_ok());
        assert!(create_volume_repository(&StorageBackend::InMemory, None).is_ok());
    }

    #[test]
    fn test_postgres_backend_requires_database() {
        let backend = StorageBackend::PostgreSQL(PostgresConfig {
            connection_string: "postgres://localhost/appfleet".to_string(),
        });
        assert!(create_application_repository(&backend, None).is_err());
        assert!(create_volume_repository(&backend, None).is_err());
    }
}
