// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Application
//!
//! Applications are stored as a JSONB document next to the columns queries
//! filter on. Every routed hostname (aliases and quick-access port forwards)
//! lives in `application_aliases`, so its primary key enforces fleet-wide
//! uniqueness.
//!
//! `begin_action` and `begin_creation` take `pg_advisory_xact_lock` on the
//! owner, so claims of one owner are serialized across every instance
//! sharing the database.
//!
//! Expected schema:
//!
//! ```sql
//! CREATE TABLE applications (
//!     id          UUID PRIMARY KEY,
//!     owner       TEXT NOT NULL,
//!     name        TEXT NOT NULL,
//!     status      TEXT NOT NULL,
//!     version     BIGINT NOT NULL,
//!     document    JSONB NOT NULL,
//!     created_at  TIMESTAMPTZ NOT NULL,
//!     UNIQUE (owner, name)
//! );
//!
//! CREATE TABLE application_aliases (
//!     alias           TEXT PRIMARY KEY,
//!     application_id  UUID NOT NULL REFERENCES applications(id) ON DELETE CASCADE
//! );
//! ```

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{PgConnection, Row};

use crate::domain::application::{Application, ApplicationId, OwnerId, Status};
use crate::domain::repository::{ActionClaim, ApplicationRepository, RepositoryError};

pub struct PostgresApplicationRepository {
    pool: PgPool,
}

impl PostgresApplicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_application_row(row: &PgRow) -> Result<Application, RepositoryError> {
    let document: serde_json::Value = row.try_get("document")?;
    let version: i64 = row.try_get("version")?;
    let mut application: Application = serde_json::from_value(document)?;
    application.version = version as u64;
    application.rehydrate();
    Ok(application)
}

/// Replace the hostname rows of an application
async fn write_hostnames(
    conn: &mut PgConnection,
    application: &Application,
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM application_aliases WHERE application_id = $1")
        .bind(application.id.0)
        .execute(&mut *conn)
        .await?;

    for hostname in application.hostnames() {
        sqlx::query("INSERT INTO application_aliases (alias, application_id) VALUES ($1, $2)")
            .bind(hostname)
            .bind(application.id.0)
            .execute(&mut *conn)
            .await
            .map_err(|e| match RepositoryError::from(e) {
                RepositoryError::Duplicate(_) => {
                    RepositoryError::Duplicate(format!("hostname {}", hostname))
                }
                other => other,
            })?;
    }
    Ok(())
}

async fn insert_row(
    conn: &mut PgConnection,
    application: &Application,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO applications (id, owner, name, status, version, document, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(application.id.0)
    .bind(application.owner.as_str())
    .bind(&application.name)
    .bind(application.status().as_str())
    .bind(application.version as i64)
    .bind(serde_json::to_value(application)?)
    .bind(application.created_at)
    .execute(&mut *conn)
    .await?;

    write_hostnames(conn, application).await
}

/// Block until no other claim of `owner` is running
async fn lock_owner(conn: &mut PgConnection, owner: &OwnerId) -> Result<(), RepositoryError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(owner.as_str())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

#[async_trait]
impl ApplicationRepository for PostgresApplicationRepository {
    async fn find_by_id(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        let row = sqlx::query("SELECT document, version FROM applications WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(parse_application_row).transpose()
    }

    async fn find_all_by_owner(&self, owner: &OwnerId) -> Result<Vec<Application>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT document, version FROM applications WHERE owner = $1 ORDER BY created_at ASC",
        )
        .bind(owner.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(parse_application_row).collect()
    }

    async fn find_by_name(
        &self,
        owner: &OwnerId,
        name: &str,
    ) -> Result<Option<Application>, RepositoryError> {
        let row = sqlx::query(
            "SELECT document, version FROM applications WHERE owner = $1 AND name = $2",
        )
        .bind(owner.as_str())
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(parse_application_row).transpose()
    }

    async fn find_by_alias(&self, hostname: &str) -> Result<Option<Application>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT a.document, a.version
            FROM applications a
            JOIN application_aliases al ON al.application_id = a.id
            WHERE al.alias = $1
            "#,
        )
        .bind(hostname)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(parse_application_row).transpose()
    }

    async fn find_pending(&self) -> Result<Vec<Application>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT document, version FROM applications WHERE status = $1 ORDER BY created_at ASC",
        )
        .bind(Status::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(parse_application_row).collect()
    }

    async fn insert(&self, application: &Application) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        insert_row(&mut tx, application).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn begin_creation(&self, application: &Application) -> Result<(), RepositoryError> {
        if !application.is_pending() {
            return Err(RepositoryError::Busy(format!(
                "creation placeholder {} is {}",
                application.name,
                application.status()
            )));
        }

        let mut tx = self.pool.begin().await?;
        lock_owner(&mut tx, &application.owner).await?;

        let owner_busy: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM applications WHERE owner = $1 AND status = $2)",
        )
        .bind(application.owner.as_str())
        .bind(Status::Pending.as_str())
        .fetch_one(&mut *tx)
        .await?;
        if owner_busy {
            return Err(RepositoryError::OwnerBusy(application.owner.to_string()));
        }

        insert_row(&mut tx, application).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update(&self, application: &mut Application) -> Result<(), RepositoryError> {
        let next_version = application.version + 1;
        let mut snapshot = application.clone();
        snapshot.version = next_version;
        let document = serde_json::to_value(&snapshot)?;

        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE applications
            SET name = $2, status = $3, version = $4, document = $5
            WHERE id = $1 AND version = $6
            "#,
        )
        .bind(application.id.0)
        .bind(&application.name)
        .bind(application.status().as_str())
        .bind(next_version as i64)
        .bind(document)
        .bind(application.version as i64)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM applications WHERE id = $1)")
                    .bind(application.id.0)
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(if exists {
                RepositoryError::StaleVersion(format!("application {}", application.id))
            } else {
                RepositoryError::NotFound(format!("application {}", application.id))
            });
        }

        write_hostnames(&mut tx, application).await?;
        tx.commit().await?;

        application.version = next_version;
        Ok(())
    }

    async fn begin_action(
        &self,
        id: ApplicationId,
        owner: &OwnerId,
    ) -> Result<ActionClaim, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        lock_owner(&mut tx, owner).await?;

        let row = sqlx::query(
            "SELECT status, document, version FROM applications WHERE id = $1 FOR UPDATE",
        )
        .bind(id.0)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("application {}", id)))?;

        let status: String = row.try_get("status")?;
        if status == Status::Pending.as_str() {
            return Err(RepositoryError::Busy(id.to_string()));
        }

        let owner_busy: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM applications WHERE owner = $1 AND status = $2 AND id <> $3)",
        )
        .bind(owner.as_str())
        .bind(Status::Pending.as_str())
        .bind(id.0)
        .fetch_one(&mut *tx)
        .await?;
        if owner_busy {
            return Err(RepositoryError::OwnerBusy(owner.to_string()));
        }

        let mut application = parse_application_row(&row)?;
        let previous_status = application.status();
        application
            .mark_pending()
            .map_err(|e| RepositoryError::Busy(e.to_string()))?;
        application.version += 1;

        sqlx::query("UPDATE applications SET status = $2, version = $3, document = $4 WHERE id = $1")
            .bind(id.0)
            .bind(application.status().as_str())
            .bind(application.version as i64)
            .bind(serde_json::to_value(&application)?)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(ActionClaim {
            application,
            previous_status,
        })
    }

    async fn delete(&self, id: ApplicationId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM applications WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Application {} not found", id)));
        }
        Ok(())
    }
}
