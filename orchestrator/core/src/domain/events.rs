// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::application::{Application, ApplicationId, OwnerId};
use crate::domain::volume::VolumeId;

/// Application lifecycle events.
///
/// Every event except `ApplicationDeleted` carries a snapshot of the
/// application as it was when the event was published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ApplicationEvent {
    ApplicationPending {
        application: Application,
        pending_at: DateTime<Utc>,
    },
    ApplicationStarted {
        application: Application,
        started_at: DateTime<Utc>,
    },
    ApplicationStopped {
        application: Application,
        stopped_at: DateTime<Utc>,
    },
    ApplicationFailed {
        application: Application,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    ApplicationDeleted {
        application_id: ApplicationId,
        name: String,
        owner: OwnerId,
        deleted_at: DateTime<Utc>,
    },
}

impl ApplicationEvent {
    pub fn pending(application: &Application) -> Self {
        Self::ApplicationPending {
            application: application.clone(),
            pending_at: Utc::now(),
        }
    }

    pub fn started(application: &Application) -> Self {
        Self::ApplicationStarted {
            application: application.clone(),
            started_at: Utc::now(),
        }
    }

    pub fn stopped(application: &Application) -> Self {
        Self::ApplicationStopped {
            application: application.clone(),
            stopped_at: Utc::now(),
        }
    }

    pub fn failed(application: &Application, reason: impl Into<String>) -> Self {
        Self::ApplicationFailed {
            application: application.clone(),
            reason: reason.into(),
            failed_at: Utc::now(),
        }
    }

    pub fn deleted(application: &Application) -> Self {
        Self::ApplicationDeleted {
            application_id: application.id,
            name: application.name.clone(),
            owner: application.owner.clone(),
            deleted_at: Utc::now(),
        }
    }

    /// Short kind label used in logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApplicationPending { .. } => "pending",
            Self::ApplicationStarted { .. } => "started",
            Self::ApplicationStopped { .. } => "stopped",
            Self::ApplicationFailed { .. } => "failed",
            Self::ApplicationDeleted { .. } => "deleted",
        }
    }

    pub fn application_id(&self) -> ApplicationId {
        match self {
            Self::ApplicationPending { application, .. }
            | Self::ApplicationStarted { application, .. }
            | Self::ApplicationStopped { application, .. }
            | Self::ApplicationFailed { application, .. } => application.id,
            Self::ApplicationDeleted { application_id, .. } => *application_id,
        }
    }

    pub fn owner(&self) -> &OwnerId {
        match self {
            Self::ApplicationPending { application, .. }
            | Self::ApplicationStarted { application, .. }
            | Self::ApplicationStopped { application, .. }
            | Self::ApplicationFailed { application, .. } => &application.owner,
            Self::ApplicationDeleted { owner, .. } => owner,
        }
    }

    /// The snapshot carried by the event, absent once deleted
    pub fn application(&self) -> Option<&Application> {
        match self {
            Self::ApplicationPending { application, .. }
            | Self::ApplicationStarted { application, .. }
            | Self::ApplicationStopped { application, .. }
            | Self::ApplicationFailed { application, .. } => Some(application),
            Self::ApplicationDeleted { .. } => None,
        }
    }

    /// Whether the event closes a lifecycle action
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::ApplicationPending { .. })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VolumeEvent {
    VolumeCreated {
        volume_id: VolumeId,
        name: String,
        created_at: DateTime<Utc>,
    },
    VolumeMounted {
        volume_id: VolumeId,
        name: String,
        application_id: ApplicationId,
        container: String,
        path: String,
        read_only: bool,
        mounted_at: DateTime<Utc>,
    },
    VolumeUnmounted {
        volume_id: VolumeId,
        name: String,
        application_id: ApplicationId,
        container: String,
        unmounted_at: DateTime<Utc>,
    },
    VolumeRemoved {
        volume_id: VolumeId,
        name: String,
        removed_at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::application::ServerType;
    use crate::domain::module::Module;

    fn application() -> Application {
        Application::new(
            "shop",
            None,
            OwnerId::new("jdoe"),
            ServerType::Tomcat,
            Module::server("jdoe-shop-tomcat", "tomcat:10.1"),
        )
        .unwrap()
    }

    #[test]
    fn test_failed_event_serialization_keeps_reason_and_snapshot() {
        let app = application();
        let event = ApplicationEvent::failed(&app, "container exited");
        let json = serde_json::to_string(&event).unwrap();
        let deserialized: ApplicationEvent = serde_json::from_str(&json).unwrap();
        if let ApplicationEvent::ApplicationFailed {
            application, reason, ..
        } = deserialized
        {
            assert_eq!(application.id, app.id);
            assert_eq!(reason, "container exited");
        } else {
            panic!("unexpected variant");
        }
    }

    #[test]
    fn test_deleted_event_has_no_snapshot() {
        let app = application();
        let event = ApplicationEvent::deleted(&app);
        assert_eq!(event.kind(), "deleted");
        assert_eq!(event.application_id(), app.id);
        assert_eq!(event.owner().as_str(), "jdoe");
        assert!(event.application().is_none());
        assert!(event.is_terminal());
        assert!(!ApplicationEvent::pending(&app).is_terminal());
    }

    #[test]
    fn test_volume_event_mounted_serialization() {
        let event = VolumeEvent::VolumeMounted {
            volume_id: VolumeId::new(),
            name: "data".to_string(),
            application_id: ApplicationId::new(),
            container: "jdoe-shop-tomcat".to_string(),
            path: "/data".to_string(),
            read_only: true,
            mounted_at: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("VolumeMounted"));
    }
}
