// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Dispatch of Domain Events
//
// Application events are first delivered synchronously, in publish order, to
// every registered listener. A failing listener is logged and counted; it
// never stops later listeners and never reaches the publisher. Every event is
// then fanned out on a tokio broadcast channel for SSE and CLI observers.
//
// In-memory only: events are lost on restart.

use crate::domain::events::{ApplicationEvent, VolumeEvent};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

/// Unified domain event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Application(ApplicationEvent),
    Volume(VolumeEvent),
}

/// Synchronous consumer of application lifecycle events
#[async_trait]
pub trait ApplicationEventListener: Send + Sync {
    /// Name used in logs and the failure counter
    fn name(&self) -> &str;

    async fn on_event(&self, event: &ApplicationEvent) -> anyhow::Result<()>;
}

/// Event bus for publishing and subscribing to domain events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
    listeners: Arc<RwLock<Vec<Arc<dyn ApplicationEventListener>>>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Listeners are invoked in registration order
    pub fn register_listener(&self, listener: Arc<dyn ApplicationEventListener>) {
        debug!(listener = listener.name(), "Registering application event listener");
        self.listeners.write().push(listener);
    }

    /// Deliver an application event to every listener, then broadcast it.
    ///
    /// Returns once all listeners have run.
    pub async fn publish_application_event(&self, event: ApplicationEvent) {
        // Snapshot so the lock is not held across listener awaits
        let listeners: Vec<Arc<dyn ApplicationEventListener>> = self.listeners.read().clone();

        for listener in listeners {
            if let Err(e) = listener.on_event(&event).await {
                error!(
                    listener = listener.name(),
                    event = event.kind(),
                    application_id = %event.application_id(),
                    error = %e,
                    "Application event listener failed"
                );
                metrics::counter!(
                    "appfleet_listener_failures_total",
                    "listener" => listener.name().to_string()
                )
                .increment(1);
            }
        }

        self.publish(DomainEvent::Application(event));
    }

    /// Publish a volume event to broadcast subscribers
    pub fn publish_volume_event(&self, event: VolumeEvent) {
        self.publish(DomainEvent::Volume(event));
    }

    fn publish(&self, event: DomainEvent) {
        debug!("Publishing event: {:?}", event);

        // send() only fails when nobody is subscribed
        let receiver_count = self.sender.send(event).unwrap_or(0);

        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all domain events
    pub fn subscribe(&self) -> EventReceiver {
        let receiver = self.sender.subscribe();
        EventReceiver { receiver }
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Receiver for all domain events
pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    pub fn into_inner(self) -> broadcast::Receiver<DomainEvent> {
        self.receiver
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
