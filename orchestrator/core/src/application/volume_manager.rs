// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Volume Manager Application Service
//!
//! Orchestrates volume lifecycle operations coordinating:
//! - Domain layer: Volume aggregate, ContainerRuntime trait
//! - Infrastructure layer: VolumeRepository, DockerRuntime
//! - Event bus: Publishing VolumeEvents for observability
//!
//! Mounting into an application is a mutation of that application: it holds
//! the application's action claim while the runtime is called and hands the
//! application back in its previous status afterwards.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::action_guard::ActionGuard;
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::{abandon_claim, find_owned, release_claim};
use crate::domain::application::{Application, ApplicationId, OwnerId};
use crate::domain::events::VolumeEvent;
use crate::domain::repository::{ApplicationRepository, VolumeRepository};
use crate::domain::runtime::{ContainerRef, ContainerRuntime};
use crate::domain::volume::{validate_volume_name, AccessMode, Volume, VolumeMount};
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountVolumeRequest {
    pub application_id: ApplicationId,
    /// Absolute path inside the container
    pub path: String,
    #[serde(default)]
    pub read_only: bool,
    /// Module name; the server when omitted
    #[serde(default)]
    pub container: Option<String>,
}

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait VolumeService: Send + Sync {
    async fn create(&self, name: &str) -> ServiceResult<Volume>;

    async fn list(&self) -> ServiceResult<Vec<Volume>>;

    async fn get(&self, name: &str) -> ServiceResult<Volume>;

    /// Remove a volume that is no longer mounted anywhere
    async fn remove(&self, name: &str) -> ServiceResult<()>;

    async fn mount(
        &self,
        user: &OwnerId,
        volume: &str,
        request: MountVolumeRequest,
    ) -> ServiceResult<VolumeMount>;

    /// `container` is the module name the volume was mounted into
    async fn unmount(
        &self,
        user: &OwnerId,
        volume: &str,
        application_id: ApplicationId,
        container: &str,
    ) -> ServiceResult<()>;
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardVolumeService {
    volumes: Arc<dyn VolumeRepository>,
    applications: Arc<dyn ApplicationRepository>,
    runtime: Arc<dyn ContainerRuntime>,
    guard: Arc<ActionGuard>,
    event_bus: Arc<EventBus>,
}

impl StandardVolumeService {
    pub fn new(
        volumes: Arc<dyn VolumeRepository>,
        applications: Arc<dyn ApplicationRepository>,
        runtime: Arc<dyn ContainerRuntime>,
        guard: Arc<ActionGuard>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            volumes,
            applications,
            runtime,
            guard,
            event_bus,
        }
    }

    async fn find(&self, name: &str) -> ServiceResult<Volume> {
        self.volumes
            .find_by_name(name)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Volume {} not found", name)))
    }

    async fn mount_into(
        &self,
        volume: &mut Volume,
        application: &Application,
        request: MountVolumeRequest,
    ) -> ServiceResult<VolumeMount> {
        let container = module_container(application, request.container.as_deref())?;
        let mount = VolumeMount::new(
            application.id,
            container.clone(),
            request.path,
            AccessMode::from_read_only(request.read_only),
        )?;
        volume.attach(mount.clone())?;

        self.runtime
            .mount_volume(&volume.name, &mount.path, mount.read_only(), &container)
            .await?;
        self.volumes.save(volume).await?;
        Ok(mount)
    }

    async fn unmount_from(
        &self,
        volume: &mut Volume,
        application: &Application,
        container: &str,
    ) -> ServiceResult<VolumeMount> {
        let container = module_container(application, Some(container))?;
        let mount = volume.detach(application.id, &container)?;

        self.runtime.unmount_volume(&volume.name, &container).await?;
        self.volumes.save(volume).await?;
        Ok(mount)
    }
}

fn module_container(application: &Application, module: Option<&str>) -> ServiceResult<ContainerRef> {
    match module {
        None => Ok(application.server().container.clone()),
        Some(name) => application
            .module(name)
            .map(|m| m.container.clone())
            .ok_or_else(|| ServiceError::not_found(format!("Module not found: {}", name))),
    }
}

#[async_trait]
impl VolumeService for StandardVolumeService {
    async fn create(&self, name: &str) -> ServiceResult<Volume> {
        validate_volume_name(name)?;
        if self.volumes.find_by_name(name).await?.is_some() {
            return Err(ServiceError::validation(format!(
                "Volume name '{}' is already used",
                name
            )));
        }

        info!("Creating volume '{}'", name);
        let volume = Volume::new(name)?;
        self.runtime.create_volume(name).await?;

        if let Err(e) = self.volumes.save(&volume).await {
            if let Err(cleanup) = self.runtime.remove_volume(name).await {
                warn!("Failed to remove volume '{}' after store failure: {}", name, cleanup);
            }
            return Err(e.into());
        }

        self.event_bus.publish_volume_event(VolumeEvent::VolumeCreated {
            volume_id: volume.id,
            name: volume.name.clone(),
            created_at: volume.created_at,
        });
        Ok(volume)
    }

    async fn list(&self) -> ServiceResult<Vec<Volume>> {
        debug!("Listing volumes");
        Ok(self.volumes.list_all().await?)
    }

    async fn get(&self, name: &str) -> ServiceResult<Volume> {
        debug!("Fetching volume {}", name);
        self.find(name).await
    }

    async fn remove(&self, name: &str) -> ServiceResult<()> {
        let volume = self.find(name).await?;
        volume.ensure_removable()?;

        self.runtime.remove_volume(name).await?;
        self.volumes.delete(name).await?;

        info!("Volume '{}' removed", name);
        self.event_bus.publish_volume_event(VolumeEvent::VolumeRemoved {
            volume_id: volume.id,
            name: volume.name,
            removed_at: Utc::now(),
        });
        Ok(())
    }

    async fn mount(
        &self,
        user: &OwnerId,
        volume: &str,
        request: MountVolumeRequest,
    ) -> ServiceResult<VolumeMount> {
        let mut volume = self.find(volume).await?;
        let application_id = request.application_id;
        find_owned(self.applications.as_ref(), user, application_id).await?;

        let claim = self.guard.begin(user, application_id).await?;
        let previous = claim.previous_status;
        let mount = match self.mount_into(&mut volume, &claim.application, request).await {
            Ok(mount) => mount,
            Err(e) => {
                abandon_claim(self.applications.as_ref(), claim.application, previous).await;
                return Err(e);
            }
        };
        release_claim(self.applications.as_ref(), claim.application, previous).await?;

        info!(
            "Volume '{}' mounted at {} in {} ({:?})",
            volume.name, mount.path, mount.container, mount.access_mode
        );
        self.event_bus.publish_volume_event(VolumeEvent::VolumeMounted {
            volume_id: volume.id,
            name: volume.name.clone(),
            application_id,
            container: mount.container.to_string(),
            path: mount.path.clone(),
            read_only: mount.read_only(),
            mounted_at: mount.mounted_at,
        });
        Ok(mount)
    }

    async fn unmount(
        &self,
        user: &OwnerId,
        volume: &str,
        application_id: ApplicationId,
        container: &str,
    ) -> ServiceResult<()> {
        let mut volume = self.find(volume).await?;
        find_owned(self.applications.as_ref(), user, application_id).await?;

        let claim = self.guard.begin(user, application_id).await?;
        let previous = claim.previous_status;
        let mount = match self.unmount_from(&mut volume, &claim.application, container).await {
            Ok(mount) => mount,
            Err(e) => {
                abandon_claim(self.applications.as_ref(), claim.application, previous).await;
                return Err(e);
            }
        };
        release_claim(self.applications.as_ref(), claim.application, previous).await?;

        info!("Volume '{}' unmounted from {} ({})", volume.name, mount.container, mount.path);
        self.event_bus.publish_volume_event(VolumeEvent::VolumeUnmounted {
            volume_id: volume.id,
            name: volume.name.clone(),
            application_id,
            container: mount.container.to_string(),
            unmounted_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::lifecycle::{
        ApplicationLifecycleService, StandardApplicationLifecycleService,
    };
    use crate::application::testing::{stored_application, YieldingRepository};
    use crate::domain::application::{ServerType, Status};
    use crate::infrastructure::repositories::{InMemoryApplicationRepository, InMemoryVolumeRepository};
    use crate::infrastructure::runtime::{MockContainerRuntime, RuntimeCall};

    struct Fixture {
        service: StandardVolumeService,
        applications: Arc<InMemoryApplicationRepository>,
        runtime: MockContainerRuntime,
        guard: Arc<ActionGuard>,
        user: OwnerId,
    }

    fn fixture() -> Fixture {
        let applications = Arc::new(InMemoryApplicationRepository::new());
        let runtime = MockContainerRuntime::new();
        let guard = Arc::new(ActionGuard::new(applications.clone()));
        let service = StandardVolumeService::new(
            Arc::new(InMemoryVolumeRepository::new()),
            applications.clone(),
            Arc::new(runtime.clone()),
            guard.clone(),
            Arc::new(EventBus::with_default_capacity()),
        );
        Fixture {
            service,
            applications,
            runtime,
            guard,
            user: OwnerId::new("jdoe"),
        }
    }

    fn mount_at(application_id: ApplicationId, path: &str) -> MountVolumeRequest {
        MountVolumeRequest {
            application_id,
            path: path.to_string(),
            read_only: false,
            container: None,
        }
    }

    #[tokio::test]
    async fn test_create_list_and_reject_duplicates() {
        let f = fixture();
        f.service.create("shop-data").await.unwrap();

        assert!(f.service.create("shop-data").await.unwrap_err().is_validation());
        assert!(f.service.create("../etc").await.unwrap_err().is_validation());
        assert_eq!(f.service.list().await.unwrap().len(), 1);
        assert_eq!(f.service.get("shop-data").await.unwrap().name, "shop-data");
        assert!(f.service.get("missing").await.unwrap_err().is_not_found());
        assert_eq!(
            f.runtime.calls(),
            vec![RuntimeCall::CreateVolume("shop-data".into())]
        );
    }

    #[tokio::test]
    async fn test_mounted_volume_cannot_be_removed() {
        let f = fixture();
        let app = stored_application(f.applications.as_ref(), "jdoe", "shop", ServerType::Tomcat).await;
        f.service.create("shop-data").await.unwrap();

        let mount = f
            .service
            .mount(&f.user, "shop-data", mount_at(app.id, "/var/lib/shop"))
            .await
            .unwrap();
        assert_eq!(mount.container, app.server().container);
        let stored = f.applications.find_by_id(app.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), Status::Start);

        assert!(f.service.remove("shop-data").await.unwrap_err().is_validation());

        f.service
            .unmount(&f.user, "shop-data", app.id, &app.server().name)
            .await
            .unwrap();
        f.service.remove("shop-data").await.unwrap();
        assert!(f.service.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mount_path_must_be_absolute_without_parent_segments() {
        let f = fixture();
        let app = stored_application(f.applications.as_ref(), "jdoe", "shop", ServerType::Tomcat).await;
        f.service.create("shop-data").await.unwrap();

        for path in ["relative/dir", "/srv/../etc", "/"] {
            let err = f
                .service
                .mount(&f.user, "shop-data", mount_at(app.id, path))
                .await
                .unwrap_err();
            assert!(err.is_validation(), "{} should be rejected", path);
        }
        assert!(!f.service.get("shop-data").await.unwrap().is_mounted());
    }

    #[tokio::test]
    async fn test_duplicate_mount_is_rejected() {
        let f = fixture();
        let app = stored_application(f.applications.as_ref(), "jdoe", "shop", ServerType::Tomcat).await;
        f.service.create("shop-data").await.unwrap();
        f.service
            .mount(&f.user, "shop-data", mount_at(app.id, "/data"))
            .await
            .unwrap();

        assert!(f
            .service
            .mount(&f.user, "shop-data", mount_at(app.id, "/data"))
            .await
            .unwrap_err()
            .is_validation());
    }

    #[tokio::test]
    async fn test_unmount_without_mount_is_not_found() {
        let f = fixture();
        let app = stored_application(f.applications.as_ref(), "jdoe", "shop", ServerType::Tomcat).await;
        f.service.create("shop-data").await.unwrap();

        let err = f
            .service
            .unmount(&f.user, "shop-data", app.id, &app.server().name)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_mount_refused_while_action_in_flight() {
        let f = fixture();
        let app = stored_application(f.applications.as_ref(), "jdoe", "shop", ServerType::Tomcat).await;
        f.service.create("shop-data").await.unwrap();
        f.guard.begin(&f.user, app.id).await.unwrap();

        assert!(f
            .service
            .mount(&f.user, "shop-data", mount_at(app.id, "/data"))
            .await
            .unwrap_err()
            .is_conflict());
    }

    #[tokio::test]
    async fn test_failed_mount_hands_the_application_back() {
        let f = fixture();
        let app = stored_application(f.applications.as_ref(), "jdoe", "shop", ServerType::Tomcat).await;
        f.service.create("shop-data").await.unwrap();

        let err = f
            .service
            .mount(&f.user, "shop-data", mount_at(app.id, "relative"))
            .await
            .unwrap_err();

        assert!(err.is_validation());
        let stored = f.applications.find_by_id(app.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), Status::Start);
        f.guard.begin(&f.user, app.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_mount_is_exclusive_with_lifecycle_actions() {
        let applications = Arc::new(YieldingRepository::default());
        let volumes = Arc::new(InMemoryVolumeRepository::new());
        let runtime = MockContainerRuntime::new();
        let guard = Arc::new(ActionGuard::new(applications.clone()));
        let event_bus = Arc::new(EventBus::with_default_capacity());
        let service = StandardVolumeService::new(
            volumes.clone(),
            applications.clone(),
            Arc::new(runtime.clone()),
            guard.clone(),
            event_bus.clone(),
        );
        let lifecycle = StandardApplicationLifecycleService::new(
            applications.clone(),
            volumes,
            Arc::new(runtime.clone()),
            guard,
            event_bus,
        );
        let user = OwnerId::new("jdoe");
        let app = stored_application(applications.as_ref(), "jdoe", "shop", ServerType::Tomcat).await;
        service.create("shop-data").await.unwrap();
        runtime.clear_calls();

        let (mounted, stopped) = tokio::join!(
            service.mount(&user, "shop-data", mount_at(app.id, "/data")),
            lifecycle.stop(&user, app.id)
        );

        assert!(mounted.is_ok() != stopped.is_ok(), "{:?} {:?}", mounted, stopped);
        let loser = mounted.err().or(stopped.err()).unwrap();
        assert!(loser.is_conflict());
        let calls = runtime.calls();
        let did_mount = calls.iter().any(|c| matches!(c, RuntimeCall::Mount { .. }));
        let did_stop = calls.iter().any(|c| matches!(c, RuntimeCall::Stop(_)));
        assert!(did_mount != did_stop, "{:?}", calls);
        let stored = applications.find_by_id(app.id).await.unwrap().unwrap();
        assert!(!stored.is_pending());
    }
}
