// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! appfleet core
//!
//! Lifecycle orchestration for multi-container applications hosted on behalf
//! of many users.
//!
//! # Architecture
//!
//! - **domain:** aggregates, events, repository and runtime ports
//! - **application:** action guard, lifecycle orchestrator, sub-resource managers
//! - **infrastructure:** event bus, repositories, Docker runtime
//! - **presentation:** HTTP API

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

