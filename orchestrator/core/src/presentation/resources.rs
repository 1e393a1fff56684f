// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Read-only projections returned by the HTTP API.
//!
//! Application resources carry `_links` describing which lifecycle actions
//! the current status allows, so clients never have to re-derive the state
//! machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::application::{
    Application, ApplicationId, Deployment, PortToOpen, ServerType, Status,
};
use crate::domain::module::{Module, ModuleKind};
use crate::domain::volume::{Volume, VolumeId, VolumeMount};

pub const API_PREFIX: &str = "/api";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl Link {
    fn get(href: String) -> Self {
        Self { href, method: None }
    }

    fn post(href: String) -> Self {
        Self {
            href,
            method: Some("POST".to_string()),
        }
    }
}

pub type Links = BTreeMap<String, Link>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleResource {
    pub name: String,
    pub image: String,
    pub kind: ModuleKind,
    pub container: String,
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl From<&Module> for ModuleResource {
    fn from(module: &Module) -> Self {
        Self {
            name: module.name.clone(),
            image: module.image.clone(),
            kind: module.kind,
            container: module.container.to_string(),
            started_at: module.started_at,
            metadata: module.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationResource {
    pub id: ApplicationId,
    pub name: String,
    pub display_name: String,
    pub owner: String,
    pub server_type: ServerType,
    pub status: Status,
    pub modules: Vec<ModuleResource>,
    pub aliases: Vec<String>,
    pub ports: Vec<PortToOpen>,
    pub deployments: Vec<Deployment>,
    pub created_at: DateTime<Utc>,
    pub version: u64,
    #[serde(rename = "_links", default)]
    pub links: Links,
}

impl From<&Application> for ApplicationResource {
    fn from(application: &Application) -> Self {
        Self {
            id: application.id,
            name: application.name.clone(),
            display_name: application.display_name.clone(),
            owner: application.owner.to_string(),
            server_type: application.server_type,
            status: application.status(),
            modules: application.modules().iter().map(ModuleResource::from).collect(),
            aliases: application.aliases().to_vec(),
            ports: application.ports().to_vec(),
            deployments: application.deployments().to_vec(),
            created_at: application.created_at,
            version: application.version,
            links: application_links(application),
        }
    }
}

pub fn application_path(id: ApplicationId) -> String {
    format!("{}/applications/{}", API_PREFIX, id)
}

/// Links offered for an application in its current status
pub fn application_links(application: &Application) -> Links {
    let base = application_path(application.id);
    let mut links = Links::new();
    links.insert("self".into(), Link::get(base.clone()));
    for sub in ["aliases", "ports", "deployments", "modules"] {
        links.insert(sub.into(), Link::get(format!("{}/{}", base, sub)));
    }

    let status = application.status();
    if matches!(status, Status::Start | Status::Stop) {
        links.insert("restart".into(), Link::post(format!("{}/restart", base)));
    }
    if status == Status::Start {
        links.insert("stop".into(), Link::post(format!("{}/stop", base)));
    }
    if matches!(status, Status::Stop | Status::Fail) {
        links.insert("start".into(), Link::post(format!("{}/start", base)));
    }
    links
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasResource {
    pub alias: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeResource {
    pub id: VolumeId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub mounts: Vec<VolumeMount>,
    #[serde(rename = "_links", default)]
    pub links: Links,
}

impl From<&Volume> for VolumeResource {
    fn from(volume: &Volume) -> Self {
        let base = format!("{}/volumes/{}", API_PREFIX, volume.name);
        let mut links = Links::new();
        links.insert("mounts".into(), Link::get(format!("{}/mounts", base)));
        links.insert("self".into(), Link::get(base));
        Self {
            id: volume.id,
            name: volume.name.clone(),
            created_at: volume.created_at,
            mounts: volume.mounts().to_vec(),
            links,
        }
    }
}
