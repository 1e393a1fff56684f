// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod action_guard;
pub mod alias_manager;
pub mod deployment_manager;
pub mod error;
pub mod lifecycle;
pub mod module_manager;
pub mod port_manager;
pub mod repository_factory;
pub mod volume_manager;

pub use action_guard::ActionGuard;
pub use alias_manager::{AliasService, StandardAliasService};
pub use deployment_manager::{DeploymentService, StandardDeploymentService};
pub use error::{ServiceError, ServiceResult};
pub use lifecycle::{
    ApplicationLifecycleService, CreateApplicationRequest, StandardApplicationLifecycleService,
};
pub use module_manager::{ModuleService, StandardModuleService};
pub use port_manager::{PortService, StandardPortService};
pub use volume_manager::{MountVolumeRequest, StandardVolumeService, VolumeService};

use tracing::error;

use crate::domain::application::{Application, ApplicationId, OwnerId, Status};
use crate::domain::module::Module;
use crate::domain::repository::ApplicationRepository;
use crate::domain::runtime::ContainerSpec;

pub const LABEL_APPLICATION: &str = "io.appfleet.application";
pub const LABEL_OWNER: &str = "io.appfleet.owner";
pub const LABEL_MODULE: &str = "io.appfleet.module";

/// Load an application on behalf of `user`.
///
/// Applications of other owners are reported as absent.
pub(crate) async fn find_owned(
    repository: &dyn ApplicationRepository,
    user: &OwnerId,
    id: ApplicationId,
) -> ServiceResult<Application> {
    match repository.find_by_id(id).await? {
        Some(application) if &application.owner == user => Ok(application),
        _ => Err(ServiceError::not_found(format!("Application {} not found", id))),
    }
}

/// Settle a claimed application back into the status it was claimed from
pub(crate) async fn release_claim(
    repository: &dyn ApplicationRepository,
    mut application: Application,
    previous_status: Status,
) -> ServiceResult<Application> {
    application.release_to(previous_status)?;
    repository.update(&mut application).await?;
    Ok(application)
}

/// Release a claim whose change did not go through, keeping the record as claimed
pub(crate) async fn abandon_claim(
    repository: &dyn ApplicationRepository,
    claimed: Application,
    previous_status: Status,
) {
    let id = claimed.id;
    if let Err(e) = release_claim(repository, claimed, previous_status).await {
        error!(application_id = %id, error = %e, "Failed to release action claim");
    }
}

/// Runtime description of one module container
pub(crate) fn module_container_spec(application: &Application, module: &Module) -> ContainerSpec {
    ContainerSpec::new(module.name.clone(), module.image.clone())
        .with_env(module.profile().container_env(&module.image, &module.metadata))
        .with_label(LABEL_APPLICATION, application.name.clone())
        .with_label(LABEL_OWNER, application.owner.to_string())
        .with_label(LABEL_MODULE, module.name.clone())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::domain::application::ServerType;
    use crate::domain::module::container_name;
    use crate::domain::repository::{ActionClaim, RepositoryError};
    use crate::infrastructure::repositories::InMemoryApplicationRepository;
    use async_trait::async_trait;

    /// In-memory store that yields before every write, the way a database
    /// round trip would, so concurrent actions interleave.
    #[derive(Clone, Default)]
    pub(crate) struct YieldingRepository {
        inner: InMemoryApplicationRepository,
    }

    #[async_trait]
    impl ApplicationRepository for YieldingRepository {
        async fn find_by_id(
            &self,
            id: ApplicationId,
        ) -> Result<Option<Application>, RepositoryError> {
            self.inner.find_by_id(id).await
        }

        async fn find_all_by_owner(
            &self,
            owner: &OwnerId,
        ) -> Result<Vec<Application>, RepositoryError> {
            self.inner.find_all_by_owner(owner).await
        }

        async fn find_by_name(
            &self,
            owner: &OwnerId,
            name: &str,
        ) -> Result<Option<Application>, RepositoryError> {
            self.inner.find_by_name(owner, name).await
        }

        async fn find_by_alias(&self, hostname: &str) -> Result<Option<Application>, RepositoryError> {
            self.inner.find_by_alias(hostname).await
        }

        async fn find_pending(&self) -> Result<Vec<Application>, RepositoryError> {
            self.inner.find_pending().await
        }

        async fn insert(&self, application: &Application) -> Result<(), RepositoryError> {
            tokio::task::yield_now().await;
            self.inner.insert(application).await
        }

        async fn begin_creation(&self, application: &Application) -> Result<(), RepositoryError> {
            tokio::task::yield_now().await;
            self.inner.begin_creation(application).await
        }

        async fn update(&self, application: &mut Application) -> Result<(), RepositoryError> {
            tokio::task::yield_now().await;
            self.inner.update(application).await
        }

        async fn begin_action(
            &self,
            id: ApplicationId,
            owner: &OwnerId,
        ) -> Result<ActionClaim, RepositoryError> {
            tokio::task::yield_now().await;
            self.inner.begin_action(id, owner).await
        }

        async fn delete(&self, id: ApplicationId) -> Result<(), RepositoryError> {
            tokio::task::yield_now().await;
            self.inner.delete(id).await
        }
    }

    /// Insert a started application straight into the store
    pub(crate) async fn stored_application(
        repository: &dyn ApplicationRepository,
        owner: &str,
        name: &str,
        server_type: ServerType,
    ) -> Application {
        let owner = OwnerId::new(owner);
        let server = Module::server(
            container_name(&owner, name, server_type.as_str(), 0),
            server_type.image(),
        );
        let mut application = Application::new(name, None, owner, server_type, server).unwrap();
        application.mark_started().unwrap();
        repository.insert(&application).await.unwrap();
        application
    }
}
