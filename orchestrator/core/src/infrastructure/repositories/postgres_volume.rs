// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Volume
//!
//! ```sql
//! CREATE TABLE volumes (
//!     id          UUID PRIMARY KEY,
//!     name        TEXT NOT NULL UNIQUE,
//!     mounts      JSONB NOT NULL DEFAULT '[]',
//!     created_at  TIMESTAMPTZ NOT NULL
//! );
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::repository::{RepositoryError, VolumeRepository};
use crate::domain::volume::{Volume, VolumeId};

pub struct PostgresVolumeRepository {
    pool: PgPool,
}

impl PostgresVolumeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VolumeRepository for PostgresVolumeRepository {
    async fn save(&self, volume: &Volume) -> Result<(), RepositoryError> {
        let mounts_json = serde_json::to_value(volume.mounts())
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO volumes (id, name, mounts, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                mounts = EXCLUDED.mounts
            "#,
        )
        .bind(volume.id.0)
        .bind(&volume.name)
        .bind(mounts_json)
        .bind(volume.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Volume>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, mounts, created_at
            FROM volumes
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        row.map(parse_volume_row).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Volume>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, mounts, created_at
            FROM volumes
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(e.to_string()))?;

        rows.into_iter().map(parse_volume_row).collect()
    }

    async fn delete(&self, name: &str) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM volumes WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("Volume {} not found", name)));
        }

        Ok(())
    }
}

/// Parse a volume from a database row
fn parse_volume_row(row: sqlx::postgres::PgRow) -> Result<Volume, RepositoryError> {
    let id: uuid::Uuid = row.try_get("id")?;
    let name: String = row.try_get("name")?;
    let mounts: serde_json::Value = row.try_get("mounts")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;

    // Mounts are private to the aggregate, so go through its serde form
    let volume: Volume = serde_json::from_value(json!({
        "id": VolumeId(id),
        "name": name,
        "created_at": created_at,
        "mounts": mounts,
    }))
    .map_err(|e| RepositoryError::Serialization(format!("Failed to deserialize volume: {}", e)))?;

    Ok(volume)
}
