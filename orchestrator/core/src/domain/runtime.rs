// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Name or id a container is addressed by
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerRef(pub String);

impl ContainerRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the driver needs to create one container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    /// `KEY=value` pairs
    pub env: Vec<String>,
    pub labels: HashMap<String, String>,
}

impl ContainerSpec {
    pub fn new(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            ..Default::default()
        }
    }

    pub fn with_env(mut self, env: Vec<String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Failed to create container {container}: {reason}")]
    CreateFailed { container: String, reason: String },
    #[error("Failed to start container {container}: {reason}")]
    StartFailed { container: String, reason: String },
    #[error("Failed to stop container {container}: {reason}")]
    StopFailed { container: String, reason: String },
    #[error("Failed to remove container {container}: {reason}")]
    RemoveFailed { container: String, reason: String },
    #[error("Container not found: {0}")]
    ContainerNotFound(String),
    #[error("Volume operation on {volume} failed: {reason}")]
    VolumeFailed { volume: String, reason: String },
    #[error("Runtime unavailable: {0}")]
    Unavailable(String),
}

impl RuntimeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ContainerNotFound(_))
    }
}

/// Container runtime driver
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerRef, RuntimeError>;
    async fn start_container(&self, container: &ContainerRef) -> Result<(), RuntimeError>;
    async fn stop_container(&self, container: &ContainerRef) -> Result<(), RuntimeError>;
    async fn remove_container(&self, container: &ContainerRef) -> Result<(), RuntimeError>;
    async fn create_volume(&self, name: &str) -> Result<(), RuntimeError>;
    async fn remove_volume(&self, name: &str) -> Result<(), RuntimeError>;
    async fn mount_volume(
        &self,
        volume: &str,
        path: &str,
        read_only: bool,
        container: &ContainerRef,
    ) -> Result<(), RuntimeError>;
    async fn unmount_volume(&self, volume: &str, container: &ContainerRef) -> Result<(), RuntimeError>;
}
