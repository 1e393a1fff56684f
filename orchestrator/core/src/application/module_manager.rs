// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Module Manager
//!
//! Auxiliary containers (databases, caches, build tools) attached to an
//! application. Both operations claim the application like a lifecycle
//! action; the record is written when the claim is released, and a runtime
//! failure releases it unchanged.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::action_guard::ActionGuard;
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::{abandon_claim, find_owned, module_container_spec, release_claim};
use crate::domain::application::{Application, ApplicationError, ApplicationId, OwnerId, Status};
use crate::domain::module::{container_name, Module, ModuleProfile};
use crate::domain::repository::ApplicationRepository;
use crate::domain::runtime::{ContainerRef, ContainerRuntime, RuntimeError};

#[async_trait]
pub trait ModuleService: Send + Sync {
    /// Create a module container from `image`, started if the application is
    async fn add(&self, user: &OwnerId, id: ApplicationId, image: &str) -> ServiceResult<Module>;

    async fn list(&self, user: &OwnerId, id: ApplicationId) -> ServiceResult<Vec<Module>>;

    async fn remove(&self, user: &OwnerId, id: ApplicationId, name: &str) -> ServiceResult<()>;
}

pub struct StandardModuleService {
    repository: Arc<dyn ApplicationRepository>,
    runtime: Arc<dyn ContainerRuntime>,
    guard: Arc<ActionGuard>,
}

impl StandardModuleService {
    pub fn new(
        repository: Arc<dyn ApplicationRepository>,
        runtime: Arc<dyn ContainerRuntime>,
        guard: Arc<ActionGuard>,
    ) -> Self {
        Self {
            repository,
            runtime,
            guard,
        }
    }

    /// Create the container of a new `image` module, started when `running`
    async fn install(
        &self,
        application: &mut Application,
        image: &str,
        running: bool,
    ) -> ServiceResult<(Module, ContainerRef)> {
        let mut index = application.next_module_index(image);
        let mut name = container_name(&application.owner, &application.name, image, index);
        while application.module(&name).is_some() {
            index += 1;
            name = container_name(&application.owner, &application.name, image, index);
        }

        let metadata = ModuleProfile::for_image(image).seed_metadata(&name, &application.name);
        let module = Module::auxiliary(name.clone(), image).with_metadata(metadata);
        let spec = module_container_spec(application, &module);
        application.add_module(module)?;

        let container = self.runtime.create_container(&spec).await?;
        application.bind_container(&name, container.clone())?;

        if running {
            if let Err(e) = self.runtime.start_container(&container).await {
                self.discard(&container).await;
                return Err(e.into());
            }
        }

        let module = application
            .module(&name)
            .cloned()
            .ok_or_else(|| ServiceError::service(format!("Module {} vanished after bind", name)))?;
        Ok((module, container))
    }

    async fn uninstall(&self, application: &mut Application, name: &str) -> ServiceResult<()> {
        let module = application.remove_module(name)?;
        tolerate_missing(self.runtime.stop_container(&module.container).await)?;
        tolerate_missing(self.runtime.remove_container(&module.container).await)?;
        Ok(())
    }

    async fn discard(&self, container: &ContainerRef) {
        if let Err(e) = self.runtime.remove_container(container).await {
            warn!(container = %container, error = %e, "Failed to remove module container");
        }
    }
}

fn tolerate_missing(result: Result<(), RuntimeError>) -> Result<(), RuntimeError> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

#[async_trait]
impl ModuleService for StandardModuleService {
    async fn add(&self, user: &OwnerId, id: ApplicationId, image: &str) -> ServiceResult<Module> {
        let image = image.trim();
        if image.is_empty() || image.contains(char::is_whitespace) {
            return Err(ServiceError::validation(format!("Invalid module image '{}'", image)));
        }

        find_owned(self.repository.as_ref(), user, id).await?;
        let claim = self.guard.begin(user, id).await?;
        let previous = claim.previous_status;
        let mut application = claim.application.clone();

        let (module, container) = match self
            .install(&mut application, image, previous == Status::Start)
            .await
        {
            Ok(installed) => installed,
            Err(e) => {
                abandon_claim(self.repository.as_ref(), claim.application, previous).await;
                return Err(e);
            }
        };

        if let Err(e) = release_claim(self.repository.as_ref(), application, previous).await {
            self.discard(&container).await;
            abandon_claim(self.repository.as_ref(), claim.application, previous).await;
            return Err(e);
        }

        info!(application_id = %id, module = %module.name, image = %image, "Module added");
        Ok(module)
    }

    async fn list(&self, user: &OwnerId, id: ApplicationId) -> ServiceResult<Vec<Module>> {
        let application = find_owned(self.repository.as_ref(), user, id).await?;
        Ok(application.modules().to_vec())
    }

    async fn remove(&self, user: &OwnerId, id: ApplicationId, name: &str) -> ServiceResult<()> {
        let application = find_owned(self.repository.as_ref(), user, id).await?;
        match application.module(name) {
            None => return Err(ServiceError::not_found(format!("Module not found: {}", name))),
            Some(module) if module.is_server() => {
                return Err(ApplicationError::ServerModuleRemoval.into())
            }
            Some(_) => {}
        }

        let claim = self.guard.begin(user, id).await?;
        let previous = claim.previous_status;
        let mut application = claim.application.clone();

        if let Err(e) = self.uninstall(&mut application, name).await {
            abandon_claim(self.repository.as_ref(), claim.application, previous).await;
            return Err(e);
        }
        release_claim(self.repository.as_ref(), application, previous).await?;

        info!(application_id = %id, module = %name, "Module removed");
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
    use crate::infrastructure::event_bus::EventBus;
    use crate::infrastructure::repositories::InMemoryVolumeRepository;
    use crate::domain::application::ServerType;
    use crate::domain::module::{META_DATABASE, META_LINK_ALIAS, META_PASSWORD};
    use crate::infrastructure::repositories::InMemoryApplicationRepository;
    use crate::infrastructure::runtime::{MockContainerRuntime, RuntimeCall, RuntimeOp};

    struct Fixture {
        service: StandardModuleService,
        repository: Arc<InMemoryApplicationRepository>,
        runtime: MockContainerRuntime,
        user: OwnerId,
    }

    fn fixture() -> Fixture {
        let repository = Arc::new(InMemoryApplicationRepository::new());
        let runtime = MockContainerRuntime::new();
        let guard = Arc::new(ActionGuard::new(repository.clone()));
        Fixture {
            service: StandardModuleService::new(repository.clone(), Arc::new(runtime.clone()), guard),
            repository,
            runtime,
            user: OwnerId::new("jdoe"),
        }
    }

    #[tokio::test]
    async fn test_database_module_is_seeded_created_and_started() {
        let f = fixture();
        let app = stored_application(f.repository.as_ref(), "jdoe", "shop", ServerType::Tomcat).await;

        let module = f.service.add(&f.user, app.id, "mysql:8").await.unwrap();

        assert_eq!(module.name, "jdoe-shop-mysql-1");
        assert_eq!(module.metadata[META_LINK_ALIAS], "jdoe-shop-mysql-1");
        assert_eq!(module.metadata[META_DATABASE], "shop");
        assert!(module.metadata.contains_key(META_PASSWORD));
        assert_eq!(
            f.runtime.calls(),
            vec![
                RuntimeCall::Create("jdoe-shop-mysql-1".into()),
                RuntimeCall::Start("jdoe-shop-mysql-1".into()),
            ]
        );
        assert_eq!(f.service.list(&f.user, app.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_module_names_are_numbered_per_image() {
        let f = fixture();
        let app = stored_application(f.repository.as_ref(), "jdoe", "shop", ServerType::Tomcat).await;

        f.service.add(&f.user, app.id, "redis:7").await.unwrap();
        let second = f.service.add(&f.user, app.id, "redis:7").await.unwrap();
        assert_eq!(second.name, "jdoe-shop-redis-2");

        f.service.remove(&f.user, app.id, "jdoe-shop-redis-1").await.unwrap();
        let third = f.service.add(&f.user, app.id, "redis:7").await.unwrap();
        assert_eq!(third.name, "jdoe-shop-redis-3");
    }

    #[tokio::test]
    async fn test_driver_failure_leaves_application_untouched() {
        let f = fixture();
        let app = stored_application(f.repository.as_ref(), "jdoe", "shop", ServerType::Tomcat).await;
        f.runtime.fail_on(RuntimeOp::Start, "mysql");

        let err = f.service.add(&f.user, app.id, "mysql:8").await.unwrap_err();

        assert!(matches!(err, ServiceError::Service { .. }));
        assert!(f
            .runtime
            .calls()
            .contains(&RuntimeCall::Remove("jdoe-shop-mysql-1".into())));
        let stored = f.repository.find_by_id(app.id).await.unwrap().unwrap();
        assert_eq!(stored.modules().len(), 1);
        assert_eq!(stored.status(), Status::Start);
    }

    #[tokio::test]
    async fn test_stopped_application_gets_a_stopped_module() {
        let f = fixture();
        let mut app =
            stored_application(f.repository.as_ref(), "jdoe", "shop", ServerType::Tomcat).await;
        app.mark_pending().unwrap();
        app.mark_stopped().unwrap();
        f.repository.update(&mut app).await.unwrap();

        f.service.add(&f.user, app.id, "redis:7").await.unwrap();

        assert_eq!(
            f.runtime.calls(),
            vec![RuntimeCall::Create("jdoe-shop-redis-1".into())]
        );
        let stored = f.repository.find_by_id(app.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), Status::Stop);
        assert_eq!(stored.modules().len(), 2);
    }

    #[tokio::test]
    async fn test_module_change_is_exclusive_with_lifecycle_actions() {
        let repository = Arc::new(YieldingRepository::default());
        let runtime = MockContainerRuntime::new();
        let guard = Arc::new(ActionGuard::new(repository.clone()));
        let modules =
            StandardModuleService::new(repository.clone(), Arc::new(runtime.clone()), guard.clone());
        let lifecycle = StandardApplicationLifecycleService::new(
            repository.clone(),
            Arc::new(InMemoryVolumeRepository::new()),
            Arc::new(runtime.clone()),
            guard,
            Arc::new(EventBus::with_default_capacity()),
        );
        let user = OwnerId::new("jdoe");
        let app = stored_application(repository.as_ref(), "jdoe", "shop", ServerType::Tomcat).await;

        let (added, stopped) = tokio::join!(
            modules.add(&user, app.id, "redis:7"),
            lifecycle.stop(&user, app.id)
        );

        assert!(added.is_ok() != stopped.is_ok(), "{:?} {:?}", added, stopped);
        let loser = added.err().or(stopped.err()).unwrap();
        assert!(loser.is_conflict());
        let stored = repository.find_by_id(app.id).await.unwrap().unwrap();
        assert!(!stored.is_pending());
        let calls = runtime.calls();
        assert!(
            !(calls.contains(&RuntimeCall::Start("jdoe-shop-redis-1".into()))
                && calls.contains(&RuntimeCall::Stop(app.server().name.clone()))),
            "{:?}",
            calls
        );
    }

    #[tokio::test]
    async fn test_server_module_cannot_be_removed() {
        let f = fixture();
        let app = stored_application(f.repository.as_ref(), "jdoe", "shop", ServerType::Tomcat).await;

        let err = f
            .service
            .remove(&f.user, app.id, &app.server().name)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(f
            .service
            .remove(&f.user, app.id, "jdoe-shop-git-1")
            .await
            .unwrap_err()
            .is_not_found());
        assert!(f.runtime.calls().is_empty());
    }
}
