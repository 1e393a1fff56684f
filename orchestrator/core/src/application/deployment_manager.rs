// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Deployment Manager
//!
//! Append-only deployment history. A deployment is recorded on the owning
//! application and persisted with it in one write.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::application::action_guard::ActionGuard;
use crate::application::error::ServiceResult;
use crate::application::find_owned;
use crate::domain::application::{ApplicationId, Deployment, DeploymentType, OwnerId};
use crate::domain::repository::ApplicationRepository;

#[async_trait]
pub trait DeploymentService: Send + Sync {
    async fn create(
        &self,
        user: &OwnerId,
        id: ApplicationId,
        deployment_type: DeploymentType,
        context_path: &str,
    ) -> ServiceResult<Deployment>;

    /// Deployments of an application, oldest first
    async fn find_by_application(
        &self,
        user: &OwnerId,
        id: ApplicationId,
    ) -> ServiceResult<Vec<Deployment>>;
}

pub struct StandardDeploymentService {
    repository: Arc<dyn ApplicationRepository>,
    guard: Arc<ActionGuard>,
}

impl StandardDeploymentService {
    pub fn new(repository: Arc<dyn ApplicationRepository>, guard: Arc<ActionGuard>) -> Self {
        Self { repository, guard }
    }
}

#[async_trait]
impl DeploymentService for StandardDeploymentService {
    async fn create(
        &self,
        user: &OwnerId,
        id: ApplicationId,
        deployment_type: DeploymentType,
        context_path: &str,
    ) -> ServiceResult<Deployment> {
        let mut application = find_owned(self.repository.as_ref(), user, id).await?;
        self.guard
            .can_start_new_action(user, Some(&application))
            .await?;

        let deployment = application.add_deployment(deployment_type, context_path)?;
        self.repository.update(&mut application).await?;

        info!(
            application_id = %id,
            deployment_id = %deployment.id,
            context_path = %deployment.context_path,
            deployment_type = %deployment.deployment_type,
            "Deployment recorded"
        );
        Ok(deployment)
    }

    async fn find_by_application(
        &self,
        user: &OwnerId,
        id: ApplicationId,
    ) -> ServiceResult<Vec<Deployment>> {
        let application = find_owned(self.repository.as_ref(), user, id).await?;
        Ok(application.deployments().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::stored_application;
    use crate::domain::application::ServerType;
    use crate::infrastructure::repositories::InMemoryApplicationRepository;

    #[tokio::test]
    async fn test_deployments_listed_in_creation_order() {
        let repository = Arc::new(InMemoryApplicationRepository::new());
        let guard = Arc::new(ActionGuard::new(repository.clone()));
        let service = StandardDeploymentService::new(repository.clone(), guard);
        let app = stored_application(repository.as_ref(), "jdoe", "shop", ServerType::Wildfly).await;
        let user = OwnerId::new("jdoe");

        for path in ["/shop", "/admin", "/api"] {
            service
                .create(&user, app.id, DeploymentType::War, path)
                .await
                .unwrap();
        }

        let paths: Vec<String> = service
            .find_by_application(&user, app.id)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.context_path)
            .collect();
        assert_eq!(paths, vec!["/shop", "/admin", "/api"]);
    }

    #[tokio::test]
    async fn test_invalid_context_path_records_nothing() {
        let repository = Arc::new(InMemoryApplicationRepository::new());
        let guard = Arc::new(ActionGuard::new(repository.clone()));
        let service = StandardDeploymentService::new(repository.clone(), guard);
        let app = stored_application(repository.as_ref(), "jdoe", "shop", ServerType::Java).await;
        let user = OwnerId::new("jdoe");

        let err = service
            .create(&user, app.id, DeploymentType::Jar, "no-slash")
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(service
            .find_by_application(&user, app.id)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_deploy_refused_while_action_in_flight() {
        let repository = Arc::new(InMemoryApplicationRepository::new());
        let guard = Arc::new(ActionGuard::new(repository.clone()));
        let service = StandardDeploymentService::new(repository.clone(), guard.clone());
        let app = stored_application(repository.as_ref(), "jdoe", "shop", ServerType::Tomcat).await;
        let user = OwnerId::new("jdoe");
        guard.begin(&user, app.id).await.unwrap();

        assert!(service
            .create(&user, app.id, DeploymentType::War, "/shop")
            .await
            .unwrap_err()
            .is_conflict());
    }
}
