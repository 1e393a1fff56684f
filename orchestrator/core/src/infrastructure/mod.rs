// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod db;
pub mod event_bus;
pub mod listeners;
pub mod repositories;
pub mod runtime;

pub use event_bus::{ApplicationEventListener, DomainEvent, EventBus, EventBusError};
pub use listeners::{AuditListener, MetricsListener};
