// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! appfleet CLI library - exposes testable components
//!
//! - [`client`]: typed HTTP client for the `/api` surface
//! - [`commands`]: clap subcommands and their handlers
//! - [`server`]: `appfleet serve` wiring

pub mod client;
pub mod commands;
pub mod server;
