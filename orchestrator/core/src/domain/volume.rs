// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::application::ApplicationId;
use crate::domain::runtime::ContainerRef;

// ============================================================================
// Value Objects
// ============================================================================

/// Unique identifier for a volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VolumeId(pub Uuid);

impl VolumeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for VolumeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VolumeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Volume access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessMode {
    /// Read-only access
    ReadOnly,
    /// Read-write access
    ReadWrite,
}

impl AccessMode {
    pub fn from_read_only(read_only: bool) -> Self {
        if read_only {
            Self::ReadOnly
        } else {
            Self::ReadWrite
        }
    }

    pub fn is_writable(&self) -> bool {
        matches!(self, Self::ReadWrite)
    }
}

impl Default for AccessMode {
    fn default() -> Self {
        Self::ReadWrite
    }
}

/// Where a volume is mounted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub application_id: ApplicationId,
    pub container: ContainerRef,
    /// Absolute mount point inside the container
    pub path: String,
    pub access_mode: AccessMode,
    pub mounted_at: DateTime<Utc>,
}

impl VolumeMount {
    pub fn new(
        application_id: ApplicationId,
        container: ContainerRef,
        path: impl Into<String>,
        access_mode: AccessMode,
    ) -> Result<Self, VolumeError> {
        let path = path.into();
        validate_mount_path(&path)?;
        Ok(Self {
            application_id,
            container,
            path,
            access_mode,
            mounted_at: Utc::now(),
        })
    }

    pub fn read_only(&self) -> bool {
        !self.access_mode.is_writable()
    }
}

// ============================================================================
// Aggregate Root: Volume
// ============================================================================

/// Named storage that can be mounted into application containers.
///
/// The volume outlives the containers it is mounted into; it can only be
/// removed once every mount has been released.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    pub id: VolumeId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    mounts: Vec<VolumeMount>,
}

impl Volume {
    pub fn new(name: impl Into<String>) -> Result<Self, VolumeError> {
        let name = name.into();
        validate_volume_name(&name)?;
        Ok(Self {
            id: VolumeId::new(),
            name,
            created_at: Utc::now(),
            mounts: Vec::new(),
        })
    }

    pub fn mounts(&self) -> &[VolumeMount] {
        &self.mounts
    }

    pub fn is_mounted(&self) -> bool {
        !self.mounts.is_empty()
    }

    pub fn ensure_removable(&self) -> Result<(), VolumeError> {
        if self.is_mounted() {
            return Err(VolumeError::StillMounted {
                name: self.name.clone(),
                mounts: self.mounts.len(),
            });
        }
        Ok(())
    }

    pub fn attach(&mut self, mount: VolumeMount) -> Result<(), VolumeError> {
        if self
            .mounts
            .iter()
            .any(|m| m.container == mount.container && m.path == mount.path)
        {
            return Err(VolumeError::AlreadyMounted {
                container: mount.container.to_string(),
                path: mount.path,
            });
        }
        self.mounts.push(mount);
        Ok(())
    }

    pub fn detach(
        &mut self,
        application_id: ApplicationId,
        container: &ContainerRef,
    ) -> Result<VolumeMount, VolumeError> {
        let index = self
            .mounts
            .iter()
            .position(|m| m.application_id == application_id && &m.container == container)
            .ok_or_else(|| VolumeError::MountNotFound {
                volume: self.name.clone(),
                container: container.to_string(),
            })?;
        Ok(self.mounts.remove(index))
    }

    /// Drop every mount held by an application, returning what was released
    pub fn detach_application(&mut self, application_id: ApplicationId) -> Vec<VolumeMount> {
        let (released, kept) = std::mem::take(&mut self.mounts)
            .into_iter()
            .partition(|m| m.application_id == application_id);
        self.mounts = kept;
        released
    }
}

pub fn validate_volume_name(name: &str) -> Result<(), VolumeError> {
    let valid = !name.is_empty()
        && name.len() <= 128
        && name.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if !valid {
        return Err(VolumeError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Mount points must be absolute and may not climb out with `..`
pub fn validate_mount_path(path: &str) -> Result<(), VolumeError> {
    let p = Path::new(path);
    if !p.is_absolute() {
        return Err(VolumeError::InvalidMountPath(format!("{} is not absolute", path)));
    }
    if p.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(VolumeError::InvalidMountPath(format!("{} contains '..'", path)));
    }
    if p.parent().is_none() {
        return Err(VolumeError::InvalidMountPath("cannot mount over /".to_string()));
    }
    Ok(())
}

// ============================================================================
// Domain Errors
// ============================================================================

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VolumeError {
    #[error("Invalid volume name: '{0}'")]
    InvalidName(String),

    #[error("Invalid mount path: {0}")]
    InvalidMountPath(String),

    #[error("Volume already mounted at {path} in {container}")]
    AlreadyMounted { container: String, path: String },

    #[error("Volume {volume} is not mounted in {container}")]
    MountNotFound { volume: String, container: String },

    #[error("Volume {name} still has {mounts} mount(s)")]
    StillMounted { name: String, mounts: usize },
}
