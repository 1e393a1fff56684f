// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`appfleet-core`)
//!
//! HTTP surface that translates requests into application service calls.
//! No business logic lives here.
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`api`] | Axum router, acting-user extractor, error mapping, SSE event stream |
//! | [`resources`] | Serialized projections with `_links` |

pub mod api;
pub mod resources;
