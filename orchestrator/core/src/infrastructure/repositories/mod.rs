// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository abstractions defined in
//! the domain layer.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve domain aggregates
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## PostgreSQL Repositories
//!
//! - **PostgresApplicationRepository** - applications stored as JSONB documents
//!   with indexed owner/name/status/version columns and an alias table
//! - **PostgresVolumeRepository** - volumes and their mounts
//!
//! ## In-Memory Repositories
//!
//! Mutex-guarded maps for development and tests. Each operation runs inside
//! one critical section, which is what makes `begin_action` and
//! `begin_creation` atomic here.

pub mod postgres_application;
pub mod postgres_volume;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::application::{Application, ApplicationId, OwnerId, Status};
use crate::domain::repository::{
    ActionClaim, ApplicationRepository, RepositoryError, VolumeRepository,
};
use crate::domain::volume::Volume;

pub use postgres_application::PostgresApplicationRepository;
pub use postgres_volume::PostgresVolumeRepository;

#[derive(Clone, Default)]
pub struct InMemoryApplicationRepository {
    applications: Arc<Mutex<HashMap<ApplicationId, Application>>>,
}

impl InMemoryApplicationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

/// First hostname of `application` already routed to another record
fn taken_hostname<'a>(
    applications: &HashMap<ApplicationId, Application>,
    application: &'a Application,
) -> Option<&'a str> {
    application.hostnames().find(|hostname| {
        applications
            .values()
            .any(|other| other.id != application.id && other.holds_hostname(hostname))
    })
}

fn check_insertable(
    applications: &HashMap<ApplicationId, Application>,
    application: &Application,
) -> Result<(), RepositoryError> {
    if applications.contains_key(&application.id) {
        return Err(RepositoryError::Duplicate(format!("application {}", application.id)));
    }
    if applications
        .values()
        .any(|a| a.owner == application.owner && a.name == application.name)
    {
        return Err(RepositoryError::Duplicate(format!(
            "application name '{}' for {}",
            application.name, application.owner
        )));
    }
    if let Some(hostname) = taken_hostname(applications, application) {
        return Err(RepositoryError::Duplicate(format!("hostname {}", hostname)));
    }
    Ok(())
}

fn loaded(application: &Application) -> Application {
    let mut application = application.clone();
    application.rehydrate();
    application
}

#[async_trait]
impl ApplicationRepository for InMemoryApplicationRepository {
    async fn find_by_id(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(self.applications.lock().get(&id).map(loaded))
    }

    async fn find_all_by_owner(&self, owner: &OwnerId) -> Result<Vec<Application>, RepositoryError> {
        let applications = self.applications.lock();
        let mut owned: Vec<Application> = applications
            .values()
            .filter(|a| &a.owner == owner)
            .map(loaded)
            .collect();
        owned.sort_by_key(|a| a.created_at);
        Ok(owned)
    }

    async fn find_by_name(
        &self,
        owner: &OwnerId,
        name: &str,
    ) -> Result<Option<Application>, RepositoryError> {
        let applications = self.applications.lock();
        Ok(applications
            .values()
            .find(|a| &a.owner == owner && a.name == name)
            .map(loaded))
    }

    async fn find_by_alias(&self, hostname: &str) -> Result<Option<Application>, RepositoryError> {
        let applications = self.applications.lock();
        Ok(applications
            .values()
            .find(|a| a.holds_hostname(hostname))
            .map(loaded))
    }

    async fn find_pending(&self) -> Result<Vec<Application>, RepositoryError> {
        let applications = self.applications.lock();
        let mut pending: Vec<Application> = applications
            .values()
            .filter(|a| a.is_pending())
            .map(loaded)
            .collect();
        pending.sort_by_key(|a| a.created_at);
        Ok(pending)
    }

    async fn insert(&self, application: &Application) -> Result<(), RepositoryError> {
        let mut applications = self.applications.lock();
        check_insertable(&applications, application)?;
        applications.insert(application.id, application.clone());
        Ok(())
    }

    async fn begin_creation(&self, application: &Application) -> Result<(), RepositoryError> {
        let mut applications = self.applications.lock();
        if applications
            .values()
            .any(|a| a.owner == application.owner && a.is_pending())
        {
            return Err(RepositoryError::OwnerBusy(application.owner.to_string()));
        }
        if !application.is_pending() {
            return Err(RepositoryError::Busy(format!(
                "creation placeholder {} is {}",
                application.name,
                application.status()
            )));
        }
        check_insertable(&applications, application)?;
        applications.insert(application.id, application.clone());
        Ok(())
    }

    async fn update(&self, application: &mut Application) -> Result<(), RepositoryError> {
        let mut applications = self.applications.lock();
        let stored_version = applications
            .get(&application.id)
            .map(|a| a.version)
            .ok_or_else(|| RepositoryError::NotFound(format!("application {}", application.id)))?;
        if stored_version != application.version {
            return Err(RepositoryError::StaleVersion(format!(
                "application {}",
                application.id
            )));
        }
        if let Some(hostname) = taken_hostname(&applications, application) {
            return Err(RepositoryError::Duplicate(format!("hostname {}", hostname)));
        }

        application.version += 1;
        applications.insert(application.id, application.clone());
        Ok(())
    }

    async fn begin_action(
        &self,
        id: ApplicationId,
        owner: &OwnerId,
    ) -> Result<ActionClaim, RepositoryError> {
        let mut applications = self.applications.lock();

        let current = applications
            .get(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("application {}", id)))?;
        if current.status() == Status::Pending {
            return Err(RepositoryError::Busy(current.name.clone()));
        }
        if applications
            .values()
            .any(|a| a.id != id && &a.owner == owner && a.is_pending())
        {
            return Err(RepositoryError::OwnerBusy(owner.to_string()));
        }

        let mut application = loaded(current);
        let previous_status = application.status();
        application
            .mark_pending()
            .map_err(|e| RepositoryError::Busy(e.to_string()))?;
        application.version += 1;
        applications.insert(id, application.clone());

        Ok(ActionClaim {
            application,
            previous_status,
        })
    }

    async fn delete(&self, id: ApplicationId) -> Result<(), RepositoryError> {
        self.applications
            .lock()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("application {}", id)))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryVolumeRepository {
    volumes: Arc<Mutex<HashMap<String, Volume>>>,
}

impl InMemoryVolumeRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VolumeRepository for InMemoryVolumeRepository {
    async fn save(&self, volume: &Volume) -> Result<(), RepositoryError> {
        let mut volumes = self.volumes.lock();
        if let Some(existing) = volumes.get(&volume.name) {
            if existing.id != volume.id {
                return Err(RepositoryError::Duplicate(format!("volume {}", volume.name)));
            }
        }
        volumes.insert(volume.name.clone(), volume.clone());
        Ok(())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Volume>, RepositoryError> {
        Ok(self.volumes.lock().get(name).cloned())
    }

    async fn list_all(&self) -> Result<Vec<Volume>, RepositoryError> {
        let mut volumes: Vec<Volume> = self.volumes.lock().values().cloned().collect();
        volumes.sort_by_key(|v| v.created_at);
        Ok(volumes)
    }

    async fn delete(&self, name: &str) -> Result<(), RepositoryError> {
        self.volumes
            .lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RepositoryError::NotFound(format!("volume {}", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::application::{PortNature, ServerType};
    use crate::domain::module::Module;

    fn pending(owner: &str, name: &str) -> Application {
        Application::new(
            name,
            None,
            OwnerId::new(owner),
            ServerType::Tomcat,
            Module::server(format!("{}-{}-tomcat", owner, name), "tomcat:10.1"),
        )
        .unwrap()
    }

    fn started(owner: &str, name: &str) -> Application {
        let mut app = pending(owner, name);
        app.mark_started().unwrap();
        app
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_name_per_owner() {
        let repo = InMemoryApplicationRepository::new();
        repo.insert(&started("jdoe", "shop")).await.unwrap();

        assert!(matches!(
            repo.insert(&started("jdoe", "shop")).await,
            Err(RepositoryError::Duplicate(_))
        ));
        // Same name for another owner is fine
        repo.insert(&started("asmith", "shop")).await.unwrap();
    }

    #[tokio::test]
    async fn test_update_detects_stale_version() {
        let repo = InMemoryApplicationRepository::new();
        let app = started("jdoe", "shop");
        repo.insert(&app).await.unwrap();

        let mut first = repo.find_by_id(app.id).await.unwrap().unwrap();
        let mut second = first.clone();

        first.add_alias("shop.example.com".into()).unwrap();
        repo.update(&mut first).await.unwrap();
        assert_eq!(first.version, 1);

        second.add_alias("other.example.com".into()).unwrap();
        assert!(matches!(
            repo.update(&mut second).await,
            Err(RepositoryError::StaleVersion(_))
        ));
    }

    #[tokio::test]
    async fn test_update_rejects_alias_held_elsewhere() {
        let repo = InMemoryApplicationRepository::new();
        let mut a = started("jdoe", "shop");
        a.add_alias("www.example.com".into()).unwrap();
        repo.insert(&a).await.unwrap();

        let mut b = started("asmith", "blog");
        repo.insert(&b).await.unwrap();
        b.add_alias("www.example.com".into()).unwrap();
        assert!(matches!(
            repo.update(&mut b).await,
            Err(RepositoryError::Duplicate(_))
        ));

        let holder = repo.find_by_alias("www.example.com").await.unwrap().unwrap();
        assert_eq!(holder.id, a.id);
    }

    #[tokio::test]
    async fn test_update_rejects_port_hostname_held_as_alias() {
        let repo = InMemoryApplicationRepository::new();
        let mut squatter = started("mallory", "evil");
        squatter
            .add_alias("shop-jdoe-forward-8080.apps.localhost".into())
            .unwrap();
        repo.insert(&squatter).await.unwrap();

        let mut shop = started("jdoe", "shop");
        repo.insert(&shop).await.unwrap();
        shop.open_port(PortNature::Web, 8080, true, "apps.localhost")
            .unwrap();
        assert!(matches!(
            repo.update(&mut shop).await,
            Err(RepositoryError::Duplicate(_))
        ));

        let mut blog = started("jdoe", "blog");
        blog.open_port(PortNature::Web, 9000, true, "apps.localhost")
            .unwrap();
        repo.insert(&blog).await.unwrap();
        let holder = repo
            .find_by_alias("blog-jdoe-forward-9000.apps.localhost")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(holder.id, blog.id);
    }

    #[tokio::test]
    async fn test_begin_creation_is_exclusive_with_claims_of_the_owner() {
        let repo = InMemoryApplicationRepository::new();
        let owner = OwnerId::new("jdoe");
        let shop = started("jdoe", "shop");
        repo.insert(&shop).await.unwrap();

        let placeholder = pending("jdoe", "blog");
        repo.begin_creation(&placeholder).await.unwrap();
        assert!(repo.find_by_id(placeholder.id).await.unwrap().unwrap().is_pending());

        assert!(matches!(
            repo.begin_action(shop.id, &owner).await,
            Err(RepositoryError::OwnerBusy(_))
        ));
        assert!(matches!(
            repo.begin_creation(&pending("jdoe", "wiki")).await,
            Err(RepositoryError::OwnerBusy(_))
        ));
        repo.begin_creation(&pending("asmith", "wiki")).await.unwrap();

        repo.delete(placeholder.id).await.unwrap();
        repo.begin_action(shop.id, &owner).await.unwrap();
        assert!(matches!(
            repo.begin_creation(&pending("jdoe", "wiki")).await,
            Err(RepositoryError::OwnerBusy(_))
        ));
        assert_eq!(repo.find_pending().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_begin_creation_rejects_duplicate_name() {
        let repo = InMemoryApplicationRepository::new();
        repo.insert(&started("jdoe", "shop")).await.unwrap();

        assert!(matches!(
            repo.begin_creation(&pending("jdoe", "shop")).await,
            Err(RepositoryError::Duplicate(_))
        ));
        assert!(repo.find_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_begin_action_is_exclusive() {
        let repo = InMemoryApplicationRepository::new();
        let owner = OwnerId::new("jdoe");
        let shop = started("jdoe", "shop");
        let blog = started("jdoe", "blog");
        repo.insert(&shop).await.unwrap();
        repo.insert(&blog).await.unwrap();

        let claim = repo.begin_action(shop.id, &owner).await.unwrap();
        assert_eq!(claim.previous_status, Status::Start);
        assert!(claim.application.is_pending());
        assert_eq!(claim.application.version, 1);

        assert!(matches!(
            repo.begin_action(shop.id, &owner).await,
            Err(RepositoryError::Busy(_))
        ));
        assert!(matches!(
            repo.begin_action(blog.id, &owner).await,
            Err(RepositoryError::OwnerBusy(_))
        ));
        assert!(matches!(
            repo.begin_action(ApplicationId::new(), &owner).await,
            Err(RepositoryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_find_all_by_owner_is_ordered_by_creation() {
        let repo = InMemoryApplicationRepository::new();
        let owner = OwnerId::new("jdoe");
        for name in ["first", "second", "third"] {
            repo.insert(&started("jdoe", name)).await.unwrap();
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let names: Vec<String> = repo
            .find_all_by_owner(&owner)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_volume_repository_round_trip() {
        let repo = InMemoryVolumeRepository::new();
        let volume = Volume::new("data").unwrap();
        repo.save(&volume).await.unwrap();

        assert!(matches!(
            repo.save(&Volume::new("data").unwrap()).await,
            Err(RepositoryError::Duplicate(_))
        ));
        assert_eq!(repo.list_all().await.unwrap().len(), 1);

        repo.delete("data").await.unwrap();
        assert!(repo.find_by_name("data").await.unwrap().is_none());
        assert!(matches!(
            repo.delete("data").await,
            Err(RepositoryError::NotFound(_))
        ));
    }
}
