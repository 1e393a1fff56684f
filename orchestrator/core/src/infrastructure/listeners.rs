// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Bundled application event listeners
//!
//! - [`AuditListener`]: one structured log line per lifecycle event
//! - [`MetricsListener`]: lifecycle counters and the in-flight actions gauge

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::events::ApplicationEvent;
use crate::infrastructure::event_bus::ApplicationEventListener;

pub struct AuditListener;

#[async_trait]
impl ApplicationEventListener for AuditListener {
    fn name(&self) -> &str {
        "audit"
    }

    async fn on_event(&self, event: &ApplicationEvent) -> anyhow::Result<()> {
        match event {
            ApplicationEvent::ApplicationFailed {
                application,
                reason,
                ..
            } => warn!(
                application_id = %application.id,
                application = %application.name,
                owner = %application.owner,
                reason = %reason,
                "Application action failed"
            ),
            ApplicationEvent::ApplicationDeleted {
                application_id,
                name,
                owner,
                ..
            } => info!(
                application_id = %application_id,
                application = %name,
                owner = %owner,
                "Application deleted"
            ),
            other => {
                if let Some(application) = other.application() {
                    info!(
                        application_id = %application.id,
                        application = %application.name,
                        owner = %application.owner,
                        status = %application.status(),
                        event = other.kind(),
                        "Application lifecycle event"
                    );
                }
            }
        }
        Ok(())
    }
}

pub struct MetricsListener;

#[async_trait]
impl ApplicationEventListener for MetricsListener {
    fn name(&self) -> &str {
        "metrics"
    }

    async fn on_event(&self, event: &ApplicationEvent) -> anyhow::Result<()> {
        metrics::counter!("appfleet_lifecycle_events_total", "kind" => event.kind()).increment(1);

        let in_flight = metrics::gauge!("appfleet_actions_in_flight");
        if event.is_terminal() {
            in_flight.decrement(1.0);
        } else {
            in_flight.increment(1.0);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::application::{Application, OwnerId, ServerType};
    use crate::domain::module::Module;

    #[tokio::test]
    async fn test_bundled_listeners_accept_every_event_kind() {
        let app = Application::new(
            "shop",
            None,
            OwnerId::new("jdoe"),
            ServerType::Apache,
            Module::server("jdoe-shop-apache", "httpd:2.4"),
        )
        .unwrap();

        let events = vec![
            ApplicationEvent::pending(&app),
            ApplicationEvent::started(&app),
            ApplicationEvent::stopped(&app),
            ApplicationEvent::failed(&app, "driver error"),
            ApplicationEvent::deleted(&app),
        ];

        for event in &events {
            AuditListener.on_event(event).await.unwrap();
            MetricsListener.on_event(event).await.unwrap();
        }
    }
}
