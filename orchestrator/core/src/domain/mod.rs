// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Aggregates, value objects, events and the ports (repository and runtime
//! traits) the application layer is written against.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure business rules, no I/O

pub mod application;
pub mod events;
pub mod fleet_config;
pub mod module;
pub mod repository;
pub mod runtime;
pub mod volume;
