// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Alias Manager
//!
//! Hostname aliases routed to an application. Aliases and quick-access port
//! hostnames are unique across the whole fleet; mutations are refused while
//! a lifecycle action is in flight.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::action_guard::ActionGuard;
use crate::application::error::{ServiceError, ServiceResult};
use crate::application::find_owned;
use crate::domain::application::{normalize_alias, ApplicationId, OwnerId};
use crate::domain::repository::ApplicationRepository;

#[async_trait]
pub trait AliasService: Send + Sync {
    /// Add an alias, returning its normalized form
    async fn add(&self, user: &OwnerId, id: ApplicationId, alias: &str) -> ServiceResult<String>;

    /// Aliases in insertion order
    async fn list(&self, user: &OwnerId, id: ApplicationId) -> ServiceResult<Vec<String>>;

    async fn get(&self, user: &OwnerId, id: ApplicationId, alias: &str) -> ServiceResult<String>;

    async fn remove(&self, user: &OwnerId, id: ApplicationId, alias: &str) -> ServiceResult<()>;
}

pub struct StandardAliasService {
    repository: Arc<dyn ApplicationRepository>,
    guard: Arc<ActionGuard>,
}

impl StandardAliasService {
    pub fn new(repository: Arc<dyn ApplicationRepository>, guard: Arc<ActionGuard>) -> Self {
        Self { repository, guard }
    }
}

#[async_trait]
impl AliasService for StandardAliasService {
    async fn add(&self, user: &OwnerId, id: ApplicationId, alias: &str) -> ServiceResult<String> {
        let mut application = find_owned(self.repository.as_ref(), user, id).await?;
        self.guard
            .can_start_new_action(user, Some(&application))
            .await?;

        let alias = normalize_alias(alias)?;
        if let Some(holder) = self.repository.find_by_alias(&alias).await? {
            let message = if holder.id == application.id {
                format!("Alias {} is already assigned to this application", alias)
            } else {
                format!("Alias {} is already used by another application", alias)
            };
            return Err(ServiceError::validation(message));
        }

        application.add_alias(alias.clone())?;
        self.repository.update(&mut application).await?;

        info!(application_id = %id, alias = %alias, "Alias added");
        Ok(alias)
    }

    async fn list(&self, user: &OwnerId, id: ApplicationId) -> ServiceResult<Vec<String>> {
        let application = find_owned(self.repository.as_ref(), user, id).await?;
        Ok(application.aliases().to_vec())
    }

    async fn get(&self, user: &OwnerId, id: ApplicationId, alias: &str) -> ServiceResult<String> {
        debug!(application_id = %id, alias = %alias, "Fetching alias");
        let application = find_owned(self.repository.as_ref(), user, id).await?;
        let alias = alias.trim().to_ascii_lowercase();
        if application.has_alias(&alias) {
            Ok(alias)
        } else {
            Err(ServiceError::not_found(format!("Alias not found: {}", alias)))
        }
    }

    async fn remove(&self, user: &OwnerId, id: ApplicationId, alias: &str) -> ServiceResult<()> {
        let mut application = find_owned(self.repository.as_ref(), user, id).await?;
        let alias = alias.trim().to_ascii_lowercase();
        if !application.has_alias(&alias) {
            return Err(ServiceError::not_found(format!("Alias not found: {}", alias)));
        }
        self.guard
            .can_start_new_action(user, Some(&application))
            .await?;

        application.remove_alias(&alias)?;
        self.repository.update(&mut application).await?;

        info!(application_id = %id, alias = %alias, "Alias removed");
        Ok(())
    }
}
