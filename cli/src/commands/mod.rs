// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the appfleet CLI

pub mod alias;
pub mod app;
pub mod config;
pub mod deploy;
pub mod module;
pub mod port;
pub mod volume;

pub use self::alias::AliasCommand;
pub use self::app::AppCommand;
pub use self::config::ConfigCommand;
pub use self::deploy::DeployCommand;
pub use self::module::ModuleCommand;
pub use self::port::PortCommand;
pub use self::volume::VolumeCommand;

use anyhow::Result;
use colored::{ColoredString, Colorize};
use uuid::Uuid;

use appfleet_core::domain::application::Status;

use crate::client::FleetClient;

/// Accept either an application id or the name of one of the user's applications
pub async fn resolve_application(client: &FleetClient, reference: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(reference) {
        return Ok(id);
    }

    client
        .list_applications()
        .await?
        .into_iter()
        .find(|application| application.name == reference)
        .map(|application| application.id.0)
        .ok_or_else(|| anyhow::anyhow!("Application '{}' not found", reference))
}

pub fn colored_status(status: Status) -> ColoredString {
    match status {
        Status::Start => status.as_str().green(),
        Status::Stop => status.as_str().yellow(),
        Status::Fail => status.as_str().red(),
        Status::Pending => status.as_str().cyan(),
    }
}
