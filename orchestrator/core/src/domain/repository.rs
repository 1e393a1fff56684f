// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts for each aggregate root: one repository per
//! aggregate, interface defined in the domain layer, implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `ApplicationRepository` | `Application` | `InMemoryApplicationRepository`, `PostgresApplicationRepository` |
//! | `VolumeRepository` | `Volume` | `InMemoryVolumeRepository`, `PostgresVolumeRepository` |
//!
//! ## Concurrency contract
//!
//! Every persisted `Application` write goes through `update`, which compares
//! the caller's `version` with the stored one and fails with
//! `RepositoryError::StaleVersion` on mismatch. `begin_action` and
//! `begin_creation` are the only places a record becomes `PENDING`;
//! implementations must perform their owner checks and the write as one
//! atomic step, serialized per owner with each other.

use async_trait::async_trait;

use crate::domain::application::{Application, ApplicationId, OwnerId, Status};
use crate::domain::volume::Volume;

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
}

/// Result of successfully claiming a lifecycle action
#[derive(Debug, Clone)]
pub struct ActionClaim {
    /// The application, now `PENDING`, carrying the bumped version
    pub application: Application,
    /// Status the application was in before the claim
    pub previous_status: Status,
}

/// Repository interface for Application aggregates
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn find_by_id(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError>;

    /// All applications of an owner, oldest first
    async fn find_all_by_owner(&self, owner: &OwnerId) -> Result<Vec<Application>, RepositoryError>;

    async fn find_by_name(
        &self,
        owner: &OwnerId,
        name: &str,
    ) -> Result<Option<Application>, RepositoryError>;

    /// Application routing `hostname` (alias or quick-access port), across all owners
    async fn find_by_alias(&self, hostname: &str) -> Result<Option<Application>, RepositoryError>;

    /// Every `PENDING` application, across owners
    async fn find_pending(&self) -> Result<Vec<Application>, RepositoryError>;

    /// Persist a new application.
    ///
    /// Fails with `Duplicate` when the owner already has an application of
    /// that name or when one of its aliases is taken.
    async fn insert(&self, application: &Application) -> Result<(), RepositoryError>;

    /// Persist a `PENDING` placeholder for an application being created.
    ///
    /// Fails with `OwnerBusy` when another application of the owner is
    /// `PENDING`, and with `Duplicate` like `insert`. The placeholder is what
    /// other claims of the owner see until the creation settles.
    async fn begin_creation(&self, application: &Application) -> Result<(), RepositoryError>;

    /// Optimistic write; bumps `application.version` on success
    async fn update(&self, application: &mut Application) -> Result<(), RepositoryError>;

    /// Atomically move an application to `PENDING`.
    ///
    /// Fails with `Busy` when the application is already `PENDING` and with
    /// `OwnerBusy` when another application of `owner` is.
    async fn begin_action(
        &self,
        id: ApplicationId,
        owner: &OwnerId,
    ) -> Result<ActionClaim, RepositoryError>;

    async fn delete(&self, id: ApplicationId) -> Result<(), RepositoryError>;
}

/// Repository interface for Volume aggregates
#[async_trait]
pub trait VolumeRepository: Send + Sync {
    /// Save volume (create or update)
    async fn save(&self, volume: &Volume) -> Result<(), RepositoryError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<Volume>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<Volume>, RepositoryError>;

    async fn delete(&self, name: &str) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entity: {0}")]
    Duplicate(String),

    #[error("Stale write: {0} was modified concurrently")]
    StaleVersion(String),

    #[error("Application {0} already has an action in progress")]
    Busy(String),

    #[error("User {0} already has an action in progress")]
    OwnerBusy(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepositoryError::Duplicate(db.message().to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
