// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application Lifecycle Service
//!
//! Owns the status state machine of an application:
//!
//! ```text
//! create  (placeholder) PENDING ─▶ START | (gone)
//! start   STOP|FAIL ─▶ PENDING ─▶ START | FAIL
//! stop    START     ─▶ PENDING ─▶ STOP  | FAIL
//! restart START|STOP|FAIL ─▶ PENDING ─▶ START | FAIL
//! delete  START|STOP|FAIL ─▶ PENDING ─▶ (gone) | FAIL
//! ```
//!
//! Every action is claimed through the [`ActionGuard`] before any container
//! is touched, and leaves the persisted status in START, STOP or FAIL before
//! returning. Runtime failures are terminal for the action: the application
//! is marked FAIL, a `Failed` event is published and the originating error
//! is returned. Nothing is retried.
//!
//! A creation is claimed by persisting the new application as a `PENDING`
//! placeholder; a failed creation deletes it again. Records a crashed process
//! left `PENDING` are moved to FAIL by `recover_interrupted` at startup.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::application::action_guard::ActionGuard;
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::{find_owned, module_container_spec};
use crate::domain::application::{
    validate_application_name, Application, ApplicationError, ApplicationId, OwnerId, ServerType,
    Status,
};
use crate::domain::events::{ApplicationEvent, VolumeEvent};
use crate::domain::module::{container_name, Module};
use crate::domain::repository::{ApplicationRepository, RepositoryError, VolumeRepository};
use crate::domain::runtime::{ContainerRef, ContainerRuntime, RuntimeError};
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateApplicationRequest {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub server_type: ServerType,
}

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait ApplicationLifecycleService: Send + Sync {
    /// Create the server container, start it and persist the application
    async fn create(
        &self,
        user: &OwnerId,
        request: CreateApplicationRequest,
    ) -> ServiceResult<Application>;

    /// Applications of `user`, oldest first
    async fn list(&self, user: &OwnerId) -> ServiceResult<Vec<Application>>;

    async fn detail(&self, user: &OwnerId, id: ApplicationId) -> ServiceResult<Application>;

    async fn start(&self, user: &OwnerId, id: ApplicationId) -> ServiceResult<Application>;

    async fn stop(&self, user: &OwnerId, id: ApplicationId) -> ServiceResult<Application>;

    async fn restart(&self, user: &OwnerId, id: ApplicationId) -> ServiceResult<Application>;

    async fn delete(&self, user: &OwnerId, id: ApplicationId) -> ServiceResult<()>;

    /// Move every `PENDING` record no running action owns to FAIL.
    ///
    /// Only sound while no other instance is executing actions on the store.
    async fn recover_interrupted(&self) -> ServiceResult<Vec<Application>>;
}

// ============================================================================
// Standard Implementation
// ============================================================================

pub struct StandardApplicationLifecycleService {
    repository: Arc<dyn ApplicationRepository>,
    volumes: Arc<dyn VolumeRepository>,
    runtime: Arc<dyn ContainerRuntime>,
    guard: Arc<ActionGuard>,
    event_bus: Arc<EventBus>,
}

impl StandardApplicationLifecycleService {
    pub fn new(
        repository: Arc<dyn ApplicationRepository>,
        volumes: Arc<dyn VolumeRepository>,
        runtime: Arc<dyn ContainerRuntime>,
        guard: Arc<ActionGuard>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            repository,
            volumes,
            runtime,
            guard,
            event_bus,
        }
    }

    /// Auxiliary modules in declared order, then the server
    async fn start_modules(&self, application: &Application) -> Result<(), RuntimeError> {
        for module in application.start_order() {
            debug!(container = %module.container, "Starting module");
            self.runtime.start_container(&module.container).await?;
        }
        Ok(())
    }

    /// The server first, then auxiliary modules in reverse order
    async fn stop_modules(&self, application: &Application) -> Result<(), RuntimeError> {
        for module in application.stop_order() {
            debug!(container = %module.container, "Stopping module");
            self.runtime.stop_container(&module.container).await?;
        }
        Ok(())
    }

    /// Remove every container, release volume mounts, delete the record
    async fn teardown(&self, application: &Application) -> ServiceResult<()> {
        for module in application.stop_order() {
            tolerate_missing(self.runtime.stop_container(&module.container).await)?;
            tolerate_missing(self.runtime.remove_container(&module.container).await)?;
        }
        self.release_mounts(application.id).await?;
        self.repository.delete(application.id).await?;
        Ok(())
    }

    async fn release_mounts(&self, id: ApplicationId) -> ServiceResult<()> {
        for mut volume in self.volumes.list_all().await? {
            let released = volume.detach_application(id);
            if released.is_empty() {
                continue;
            }
            self.volumes.save(&volume).await?;
            for mount in released {
                self.event_bus.publish_volume_event(VolumeEvent::VolumeUnmounted {
                    volume_id: volume.id,
                    name: volume.name.clone(),
                    application_id: id,
                    container: mount.container.to_string(),
                    unmounted_at: chrono::Utc::now(),
                });
            }
        }
        Ok(())
    }

    /// Apply the closing transition, persist it and announce it
    async fn finish(
        &self,
        mut application: Application,
        transition: fn(&mut Application) -> Result<(), ApplicationError>,
    ) -> ServiceResult<Application> {
        if let Err(e) = transition(&mut application) {
            return Err(self.fail(application, e.into()).await);
        }
        if let Err(e) = self.repository.update(&mut application).await {
            return Err(self.fail(application, e.into()).await);
        }

        let event = match application.status() {
            Status::Stop => ApplicationEvent::stopped(&application),
            _ => ApplicationEvent::started(&application),
        };
        info!(
            application_id = %application.id,
            status = %application.status(),
            "Lifecycle action completed"
        );
        self.event_bus.publish_application_event(event).await;
        Ok(application)
    }

    /// Persist FAIL (best effort), publish `Failed` and hand the error back
    async fn fail(&self, mut application: Application, error: ServiceError) -> ServiceError {
        let reason = error.to_string();
        error!(
            application_id = %application.id,
            application = %application.name,
            error = %reason,
            "Lifecycle action failed"
        );

        application.mark_failed();
        if let Err(e) = self.repository.update(&mut application).await {
            error!(
                application_id = %application.id,
                error = %e,
                "Failed to persist FAIL status"
            );
        }
        self.event_bus
            .publish_application_event(ApplicationEvent::failed(&application, reason))
            .await;
        error
    }

    /// Creation failed: drop the placeholder and announce the failure
    async fn abandon(&self, mut application: Application, error: ServiceError) -> ServiceError {
        warn!(
            application = %application.name,
            owner = %application.owner,
            error = %error,
            "Application creation abandoned"
        );
        if let Err(e) = self.repository.delete(application.id).await {
            error!(
                application_id = %application.id,
                error = %e,
                "Failed to delete creation placeholder"
            );
        }
        application.mark_failed();
        self.event_bus
            .publish_application_event(ApplicationEvent::failed(&application, error.to_string()))
            .await;
        error
    }

    /// Start the new server container and settle the placeholder as START
    async fn settle_creation(
        &self,
        application: &mut Application,
        module: &str,
        container: &ContainerRef,
    ) -> ServiceResult<()> {
        application.bind_container(module, container.clone())?;
        self.runtime.start_container(container).await?;
        application.mark_started()?;
        self.repository.update(application).await?;
        Ok(())
    }

    async fn discard_container(&self, container: &ContainerRef) {
        if let Err(e) = self.runtime.remove_container(container).await {
            warn!(container = %container, error = %e, "Failed to remove container after aborted creation");
        }
    }

    async fn claim(&self, user: &OwnerId, application: &Application) -> ServiceResult<(Application, Status)> {
        if application.is_pending() {
            return Err(busy(application));
        }
        let claim = self.guard.begin(user, application.id).await?;
        self.event_bus
            .publish_application_event(ApplicationEvent::pending(&claim.application))
            .await;
        Ok((claim.application, claim.previous_status))
    }
}

fn busy(application: &Application) -> ServiceError {
    ServiceError::conflict(format!(
        "Application {} already has an action in progress",
        application.name
    ))
}

/// A container that is already gone counts as torn down
fn tolerate_missing(result: Result<(), RuntimeError>) -> Result<(), RuntimeError> {
    match result {
        Err(e) if e.is_not_found() => {
            warn!(error = %e, "Container already gone");
            Ok(())
        }
        other => other,
    }
}

#[async_trait]
impl ApplicationLifecycleService for StandardApplicationLifecycleService {
    async fn create(
        &self,
        user: &OwnerId,
        request: CreateApplicationRequest,
    ) -> ServiceResult<Application> {
        validate_application_name(&request.name)?;
        if self
            .repository
            .find_by_name(user, &request.name)
            .await?
            .is_some()
        {
            return Err(ServiceError::validation(format!(
                "Application name '{}' is already used",
                request.name
            )));
        }

        info!(
            application = %request.name,
            owner = %user,
            server_type = %request.server_type,
            "Creating application"
        );

        let server = Module::server(
            container_name(user, &request.name, request.server_type.as_str(), 0),
            request.server_type.image(),
        );
        let mut application = Application::new(
            request.name,
            request.display_name,
            user.clone(),
            request.server_type,
            server,
        )?;
        self.guard.begin_creation(&application).await?;
        self.event_bus
            .publish_application_event(ApplicationEvent::pending(&application))
            .await;

        let spec = module_container_spec(&application, application.server());
        let container = match self.runtime.create_container(&spec).await {
            Ok(container) => container,
            Err(e) => return Err(self.abandon(application, e.into()).await),
        };

        if let Err(e) = self
            .settle_creation(&mut application, &spec.name, &container)
            .await
        {
            self.discard_container(&container).await;
            return Err(self.abandon(application, e).await);
        }

        info!(application_id = %application.id, "Application created");
        self.event_bus
            .publish_application_event(ApplicationEvent::started(&application))
            .await;
        Ok(application)
    }

    async fn list(&self, user: &OwnerId) -> ServiceResult<Vec<Application>> {
        debug!(owner = %user, "Listing applications");
        Ok(self.repository.find_all_by_owner(user).await?)
    }

    async fn detail(&self, user: &OwnerId, id: ApplicationId) -> ServiceResult<Application> {
        debug!(application_id = %id, "Fetching application");
        find_owned(self.repository.as_ref(), user, id).await
    }

    async fn start(&self, user: &OwnerId, id: ApplicationId) -> ServiceResult<Application> {
        let application = find_owned(self.repository.as_ref(), user, id).await?;
        if application.status() == Status::Start {
            return Err(ServiceError::not_found(format!(
                "Application {} is already started",
                application.name
            )));
        }

        let (application, _) = self.claim(user, &application).await?;
        info!(application_id = %id, "Starting application");

        if let Err(e) = self.start_modules(&application).await {
            return Err(self.fail(application, e.into()).await);
        }
        self.finish(application, Application::mark_started).await
    }

    async fn stop(&self, user: &OwnerId, id: ApplicationId) -> ServiceResult<Application> {
        let application = find_owned(self.repository.as_ref(), user, id).await?;
        match application.status() {
            Status::Start => {}
            Status::Pending => return Err(busy(&application)),
            status => {
                return Err(ServiceError::not_found(format!(
                    "Application {} is not started ({})",
                    application.name, status
                )))
            }
        }

        let (application, _) = self.claim(user, &application).await?;
        info!(application_id = %id, "Stopping application");

        if let Err(e) = self.stop_modules(&application).await {
            return Err(self.fail(application, e.into()).await);
        }
        self.finish(application, Application::mark_stopped).await
    }

    async fn restart(&self, user: &OwnerId, id: ApplicationId) -> ServiceResult<Application> {
        let application = find_owned(self.repository.as_ref(), user, id).await?;
        let (application, previous_status) = self.claim(user, &application).await?;
        info!(application_id = %id, from = %previous_status, "Restarting application");

        if previous_status == Status::Start {
            if let Err(e) = self.stop_modules(&application).await {
                return Err(self.fail(application, e.into()).await);
            }
        }
        if let Err(e) = self.start_modules(&application).await {
            return Err(self.fail(application, e.into()).await);
        }
        self.finish(application, Application::mark_started).await
    }

    async fn delete(&self, user: &OwnerId, id: ApplicationId) -> ServiceResult<()> {
        let application = find_owned(self.repository.as_ref(), user, id).await?;
        let (application, _) = self.claim(user, &application).await?;
        info!(application_id = %id, "Deleting application");

        if let Err(e) = self.teardown(&application).await {
            return Err(self.fail(application, e).await);
        }

        self.event_bus
            .publish_application_event(ApplicationEvent::deleted(&application))
            .await;
        Ok(())
    }

    async fn recover_interrupted(&self) -> ServiceResult<Vec<Application>> {
        let mut recovered = Vec::new();
        for mut application in self.repository.find_pending().await? {
            application.mark_failed();
            match self.repository.update(&mut application).await {
                Ok(()) => {
                    warn!(
                        application_id = %application.id,
                        application = %application.name,
                        owner = %application.owner,
                        "Interrupted action recovered, application marked FAIL"
                    );
                    recovered.push(application);
                }
                Err(RepositoryError::StaleVersion(_) | RepositoryError::NotFound(_)) => {
                    debug!(application_id = %application.id, "Pending application settled meanwhile");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(recovered)
    }
}
