// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Module
//!
//! Containers owned by an application. Every application has exactly one
//! `Server` module; databases, caches and build tools are attached as
//! auxiliary `Module`s. Kind-specific behaviour (seeded connection metadata,
//! tool classification) is looked up through [`ModuleProfile`] instead of
//! being stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::domain::application::OwnerId;
use crate::domain::runtime::ContainerRef;

pub const META_LINK_ALIAS: &str = "linkAlias";
pub const META_USERNAME: &str = "username";
pub const META_PASSWORD: &str = "password";
pub const META_DATABASE: &str = "database";
pub const META_PORT: &str = "port";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Server,
    Module,
}

/// Behaviour resolved from the module image after the record is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleProfile {
    Database { port: u16 },
    Cache { port: u16 },
    Tool,
    #[default]
    Generic,
}

impl ModuleProfile {
    /// Classify an image reference such as `mysql:8` or `registry/redis:7`
    pub fn for_image(image: &str) -> Self {
        let repository = image.rsplit('/').next().unwrap_or(image);
        let base = repository.split([':', '@']).next().unwrap_or(repository);
        match base {
            "mysql" | "mariadb" => Self::Database { port: 3306 },
            "postgres" => Self::Database { port: 5432 },
            "mongo" => Self::Database { port: 27017 },
            "redis" => Self::Cache { port: 6379 },
            "git" | "maven" => Self::Tool,
            _ => Self::Generic,
        }
    }

    pub fn is_tool(&self) -> bool {
        matches!(self, Self::Tool)
    }

    /// Initial metadata for a freshly created module.
    ///
    /// Databases get a generated account scoped to the application.
    pub fn seed_metadata(&self, module_name: &str, application_name: &str) -> BTreeMap<String, String> {
        let mut metadata = BTreeMap::new();
        match self {
            Self::Database { port } => {
                metadata.insert(META_LINK_ALIAS.to_string(), module_name.to_string());
                metadata.insert(META_PORT.to_string(), port.to_string());
                metadata.insert(META_DATABASE.to_string(), application_name.replace('-', "_"));
                metadata.insert(
                    META_USERNAME.to_string(),
                    format!("admin{}", &Uuid::new_v4().simple().to_string()[..6]),
                );
                metadata.insert(
                    META_PASSWORD.to_string(),
                    Uuid::new_v4().simple().to_string()[..16].to_string(),
                );
            }
            Self::Cache { port } => {
                metadata.insert(META_LINK_ALIAS.to_string(), module_name.to_string());
                metadata.insert(META_PORT.to_string(), port.to_string());
            }
            Self::Tool | Self::Generic => {}
        }
        metadata
    }

    /// Environment passed to the container so it boots with the seeded account
    pub fn container_env(&self, image: &str, metadata: &BTreeMap<String, String>) -> Vec<String> {
        let get = |key: &str| metadata.get(key).cloned().unwrap_or_default();
        match self {
            Self::Database { .. } if image.contains("postgres") => vec![
                format!("POSTGRES_USER={}", get(META_USERNAME)),
                format!("POSTGRES_PASSWORD={}", get(META_PASSWORD)),
                format!("POSTGRES_DB={}", get(META_DATABASE)),
            ],
            Self::Database { .. } if image.contains("mongo") => vec![
                format!("MONGO_INITDB_ROOT_USERNAME={}", get(META_USERNAME)),
                format!("MONGO_INITDB_ROOT_PASSWORD={}", get(META_PASSWORD)),
            ],
            Self::Database { .. } => vec![
                format!("MYSQL_USER={}", get(META_USERNAME)),
                format!("MYSQL_PASSWORD={}", get(META_PASSWORD)),
                format!("MYSQL_DATABASE={}", get(META_DATABASE)),
                "MYSQL_RANDOM_ROOT_PASSWORD=yes".to_string(),
            ],
            Self::Cache { .. } | Self::Tool | Self::Generic => Vec::new(),
        }
    }
}

/// A container owned by an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    pub image: String,
    pub kind: ModuleKind,
    pub container: ContainerRef,
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(skip)]
    profile: ModuleProfile,
}

impl Module {
    pub fn server(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self::build(name.into(), image.into(), ModuleKind::Server)
    }

    pub fn auxiliary(name: impl Into<String>, image: impl Into<String>) -> Self {
        Self::build(name.into(), image.into(), ModuleKind::Module)
    }

    fn build(name: String, image: String, kind: ModuleKind) -> Self {
        let profile = ModuleProfile::for_image(&image);
        Self {
            container: ContainerRef::new(name.clone()),
            name,
            image,
            kind,
            started_at: None,
            metadata: BTreeMap::new(),
            profile,
        }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_server(&self) -> bool {
        self.kind == ModuleKind::Server
    }

    pub fn profile(&self) -> ModuleProfile {
        self.profile
    }

    pub fn is_tool(&self) -> bool {
        self.profile.is_tool()
    }

    pub(crate) fn resolve_profile(&mut self) {
        self.profile = ModuleProfile::for_image(&self.image);
    }
}

/// Deterministic container name: `{owner}-{application}-{image}[-{n}]`.
///
/// Characters Docker refuses in names are replaced by `-`; index 0 means
/// no instance suffix (used for the server).
pub fn container_name(owner: &OwnerId, application: &str, image: &str, index: usize) -> String {
    let image = image
        .rsplit('/')
        .next()
        .unwrap_or(image)
        .split([':', '@'])
        .next()
        .unwrap_or(image);
    let raw = if index == 0 {
        format!("{}-{}-{}", owner, application, image)
    } else {
        format!("{}-{}-{}-{}", owner, application, image, index)
    };
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_lookup() {
        assert_eq!(ModuleProfile::for_image("mysql:8"), ModuleProfile::Database { port: 3306 });
        assert_eq!(
            ModuleProfile::for_image("docker.io/library/postgres:16"),
            ModuleProfile::Database { port: 5432 }
        );
        assert_eq!(ModuleProfile::for_image("redis"), ModuleProfile::Cache { port: 6379 });
        assert!(ModuleProfile::for_image("maven:3-eclipse-temurin-21").is_tool());
        assert_eq!(ModuleProfile::for_image("tomcat:10.1"), ModuleProfile::Generic);
    }

    #[test]
    fn test_database_metadata_seeding() {
        let profile = ModuleProfile::for_image("postgres:16");
        let metadata = profile.seed_metadata("jdoe-shop-postgres-1", "my-shop");

        assert_eq!(metadata[META_LINK_ALIAS], "jdoe-shop-postgres-1");
        assert_eq!(metadata[META_DATABASE], "my_shop");
        assert_eq!(metadata[META_PORT], "5432");
        assert_eq!(metadata[META_PASSWORD].len(), 16);

        let env = profile.container_env("postgres:16", &metadata);
        assert!(env.iter().any(|e| e == "POSTGRES_DB=my_shop"));
    }

    #[test]
    fn test_tool_has_no_metadata() {
        assert!(ModuleProfile::Tool.seed_metadata("git-1", "shop").is_empty());
    }

    #[test]
    fn test_container_name_is_docker_safe() {
        let owner = OwnerId::new("John.Doe@corp");
        assert_eq!(container_name(&owner, "shop", "tomcat", 0), "john.doe-corp-shop-tomcat");
        assert_eq!(
            container_name(&owner, "shop", "registry.local/mysql:8", 2),
            "john.doe-corp-shop-mysql-2"
        );
    }

    #[test]
    fn test_profile_is_restored_after_deserialization() {
        let module = Module::auxiliary("jdoe-shop-redis-1", "redis:7");
        let json = serde_json::to_string(&module).unwrap();

        let mut loaded: Module = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.profile(), ModuleProfile::Generic);
        loaded.resolve_profile();
        assert_eq!(loaded.profile(), ModuleProfile::Cache { port: 6379 });
    }
}
