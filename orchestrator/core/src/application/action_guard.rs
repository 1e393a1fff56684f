// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Action Guard
//!
//! Decides whether a lifecycle action may begin. A user runs at most one
//! action at a time, and an application is never acted upon while it is
//! `PENDING`.
//!
//! Both claims are delegated to the store, which checks the owner and
//! writes `PENDING` as one conditional step:
//!
//! - `begin` moves an existing application to `PENDING`
//!   ([`ApplicationRepository::begin_action`])
//! - `begin_creation` persists the `PENDING` placeholder of a new
//!   application ([`ApplicationRepository::begin_creation`])
//!
//! No claim state lives in the process, so every instance sharing the store
//! sees the same claims. `can_start_new_action` is the read-only variant
//! record-only managers consult before an optimistic write.

use std::sync::Arc;
use tracing::debug;

use crate::application::error::{ServiceError, ServiceResult};
use crate::domain::application::{Application, ApplicationId, OwnerId};
use crate::domain::repository::{ActionClaim, ApplicationRepository};

pub struct ActionGuard {
    repository: Arc<dyn ApplicationRepository>,
}

impl ActionGuard {
    pub fn new(repository: Arc<dyn ApplicationRepository>) -> Self {
        Self { repository }
    }

    /// Read-only check; `target` is the application about to be touched.
    pub async fn can_start_new_action(
        &self,
        user: &OwnerId,
        target: Option<&Application>,
    ) -> ServiceResult<()> {
        if let Some(application) = target {
            if application.is_pending() {
                return Err(ServiceError::conflict(format!(
                    "Application {} already has an action in progress",
                    application.name
                )));
            }
        }

        let target_id = target.map(|a| a.id);
        let owned = self.repository.find_all_by_owner(user).await?;
        if owned
            .iter()
            .any(|a| a.is_pending() && Some(a.id) != target_id)
        {
            return Err(ServiceError::conflict(format!(
                "User {} already has an action in progress",
                user
            )));
        }
        Ok(())
    }

    /// Atomically move the application to `PENDING`
    pub async fn begin(&self, user: &OwnerId, id: ApplicationId) -> ServiceResult<ActionClaim> {
        let claim = self.repository.begin_action(id, user).await?;
        debug!(
            application_id = %id,
            previous_status = %claim.previous_status,
            "Lifecycle action claimed"
        );
        Ok(claim)
    }

    /// Persist `application` as the `PENDING` placeholder of its creation.
    ///
    /// The claim lasts until the placeholder is settled or deleted.
    pub async fn begin_creation(&self, application: &Application) -> ServiceResult<()> {
        self.repository.begin_creation(application).await?;
        debug!(
            application_id = %application.id,
            owner = %application.owner,
            "Creation claimed"
        );
        Ok(())
    }
}
