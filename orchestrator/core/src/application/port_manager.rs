// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Port Manager
//!
//! Ports opened on an application's server. Opening with quick access also
//! allocates a forwarding hostname under the configured domain suffix; that
//! hostname shares the fleet-wide namespace with aliases.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::application::action_guard::ActionGuard;
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::find_owned;
use crate::domain::application::{ApplicationId, OwnerId, PortNature, PortToOpen};
use crate::domain::repository::ApplicationRepository;

#[async_trait]
pub trait PortService: Send + Sync {
    /// `number` is checked against 1-65535 here, not by the caller
    async fn add(
        &self,
        user: &OwnerId,
        id: ApplicationId,
        nature: PortNature,
        number: u32,
        quick_access: bool,
    ) -> ServiceResult<PortToOpen>;

    async fn list(&self, user: &OwnerId, id: ApplicationId) -> ServiceResult<Vec<PortToOpen>>;

    async fn get(&self, user: &OwnerId, id: ApplicationId, number: u16) -> ServiceResult<PortToOpen>;

    async fn remove(&self, user: &OwnerId, id: ApplicationId, number: u16) -> ServiceResult<()>;
}

pub struct StandardPortService {
    repository: Arc<dyn ApplicationRepository>,
    guard: Arc<ActionGuard>,
    domain_suffix: String,
}

impl StandardPortService {
    pub fn new(
        repository: Arc<dyn ApplicationRepository>,
        guard: Arc<ActionGuard>,
        domain_suffix: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            guard,
            domain_suffix: domain_suffix.into(),
        }
    }
}

#[async_trait]
impl PortService for StandardPortService {
    async fn add(
        &self,
        user: &OwnerId,
        id: ApplicationId,
        nature: PortNature,
        number: u32,
        quick_access: bool,
    ) -> ServiceResult<PortToOpen> {
        let mut application = find_owned(self.repository.as_ref(), user, id).await?;
        self.guard
            .can_start_new_action(user, Some(&application))
            .await?;

        let port = application.open_port(nature, number, quick_access, &self.domain_suffix)?;
        if let Some(hostname) = &port.alias {
            if self.repository.find_by_alias(hostname).await?.is_some() {
                return Err(ServiceError::validation(format!(
                    "Hostname {} is already used by another application",
                    hostname
                )));
            }
        }
        self.repository.update(&mut application).await?;

        info!(
            application_id = %id,
            port = port.number,
            nature = %port.nature,
            quick_access = port.quick_access,
            "Port opened"
        );
        Ok(port)
    }

    async fn list(&self, user: &OwnerId, id: ApplicationId) -> ServiceResult<Vec<PortToOpen>> {
        let application = find_owned(self.repository.as_ref(), user, id).await?;
        Ok(application.ports().to_vec())
    }

    async fn get(&self, user: &OwnerId, id: ApplicationId, number: u16) -> ServiceResult<PortToOpen> {
        let application = find_owned(self.repository.as_ref(), user, id).await?;
        application
            .port(number)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(format!("Port not found: {}", number)))
    }

    async fn remove(&self, user: &OwnerId, id: ApplicationId, number: u16) -> ServiceResult<()> {
        let mut application = find_owned(self.repository.as_ref(), user, id).await?;
        if application.port(number).is_none() {
            return Err(ServiceError::not_found(format!("Port not found: {}", number)));
        }
        self.guard
            .can_start_new_action(user, Some(&application))
            .await?;

        application.close_port(number)?;
        self.repository.update(&mut application).await?;

        info!(application_id = %id, port = number, "Port closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::stored_application;
    use crate::domain::application::ServerType;
    use crate::infrastructure::repositories::InMemoryApplicationRepository;

    fn service() -> (StandardPortService, Arc<InMemoryApplicationRepository>, Arc<ActionGuard>) {
        let repository = Arc::new(InMemoryApplicationRepository::new());
        let guard = Arc::new(ActionGuard::new(repository.clone()));
        (
            StandardPortService::new(repository.clone(), guard.clone(), "apps.example.net"),
            repository,
            guard,
        )
    }

    #[tokio::test]
    async fn test_open_with_quick_access_allocates_alias() {
        let (service, repository, _) = service();
        let app = stored_application(repository.as_ref(), "jdoe", "shop", ServerType::Tomcat).await;
        let user = OwnerId::new("jdoe");

        let port = service
            .add(&user, app.id, PortNature::Web, 8080, true)
            .await
            .unwrap();

        assert_eq!(
            port.alias.as_deref(),
            Some("shop-jdoe-forward-8080.apps.example.net")
        );
        assert_eq!(service.get(&user, app.id, 8080).await.unwrap(), port);
    }

    #[tokio::test]
    async fn test_quick_access_hostname_held_as_alias_is_rejected() {
        let (service, repository, _) = service();
        let app = stored_application(repository.as_ref(), "jdoe", "shop", ServerType::Tomcat).await;
        let mut other =
            stored_application(repository.as_ref(), "mallory", "site", ServerType::Nginx).await;
        other
            .add_alias("shop-jdoe-forward-8080.apps.example.net".into())
            .unwrap();
        repository.update(&mut other).await.unwrap();
        let user = OwnerId::new("jdoe");

        let err = service
            .add(&user, app.id, PortNature::Web, 8080, true)
            .await
            .unwrap_err();

        assert!(err.is_validation());
        assert!(service.list(&user, app.id).await.unwrap().is_empty());
        service
            .add(&user, app.id, PortNature::Web, 8080, false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_port_leaves_set_unchanged() {
        let (service, repository, _) = service();
        let app = stored_application(repository.as_ref(), "jdoe", "shop", ServerType::Tomcat).await;
        let user = OwnerId::new("jdoe");
        service
            .add(&user, app.id, PortNature::Web, 8080, false)
            .await
            .unwrap();

        let err = service
            .add(&user, app.id, PortNature::Debug, 8080, false)
            .await
            .unwrap_err();

        assert!(err.is_validation());
        let ports = service.list(&user, app.id).await.unwrap();
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].nature, PortNature::Web);
    }

    #[tokio::test]
    async fn test_out_of_range_and_incompatible_ports_are_rejected() {
        let (service, repository, _) = service();
        let app = stored_application(repository.as_ref(), "jdoe", "site", ServerType::Nginx).await;
        let user = OwnerId::new("jdoe");

        for number in [0, 65536] {
            assert!(service
                .add(&user, app.id, PortNature::Web, number, false)
                .await
                .unwrap_err()
                .is_validation());
        }
        assert!(service
            .add(&user, app.id, PortNature::Jmx, 9010, false)
            .await
            .unwrap_err()
            .is_validation());
        assert!(service.list(&user, app.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_removing_missing_port_is_not_found() {
        let (service, repository, _) = service();
        let app = stored_application(repository.as_ref(), "jdoe", "shop", ServerType::Tomcat).await;
        let user = OwnerId::new("jdoe");
        service
            .add(&user, app.id, PortNature::Web, 8080, false)
            .await
            .unwrap();

        assert!(service.remove(&user, app.id, 9090).await.unwrap_err().is_not_found());
        assert_eq!(service.list(&user, app.id).await.unwrap().len(), 1);

        service.remove(&user, app.id, 8080).await.unwrap();
        assert!(service.list(&user, app.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_refused_while_action_in_flight() {
        let (service, repository, guard) = service();
        let app = stored_application(repository.as_ref(), "jdoe", "shop", ServerType::Tomcat).await;
        let user = OwnerId::new("jdoe");
        guard.begin(&user, app.id).await.unwrap();

        assert!(service
            .add(&user, app.id, PortNature::Web, 8080, false)
            .await
            .unwrap_err()
            .is_conflict());
    }
}
