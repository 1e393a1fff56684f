// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::resolve_application;
use crate::client::FleetClient;

#[derive(Subcommand)]
pub enum AliasCommand {
    /// Add a hostname alias to an application
    Add {
        #[arg(value_name = "APP")]
        app: String,

        #[arg(value_name = "ALIAS")]
        alias: String,
    },

    List {
        #[arg(value_name = "APP")]
        app: String,
    },

    #[command(name = "rm")]
    Remove {
        #[arg(value_name = "APP")]
        app: String,

        #[arg(value_name = "ALIAS")]
        alias: String,
    },
}

pub async fn handle_command(command: AliasCommand, client: &FleetClient) -> Result<()> {
    match command {
        AliasCommand::Add { app, alias } => {
            let id = resolve_application(client, &app).await?;
            let alias = client.add_alias(id, &alias).await?;
            println!("{}", format!("✓ Alias {} added", alias).green());
        }
        AliasCommand::List { app } => {
            let id = resolve_application(client, &app).await?;
            let aliases = client.list_aliases(id).await?;
            if aliases.is_empty() {
                println!("{}", "No aliases".yellow());
            }
            for alias in aliases {
                println!("{}", alias);
            }
        }
        AliasCommand::Remove { app, alias } => {
            let id = resolve_application(client, &app).await?;
            client.remove_alias(id, &alias).await?;
            println!("{}", format!("✓ Alias {} removed", alias).green());
        }
    }
    Ok(())
}
