// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::resolve_application;
use crate::client::FleetClient;

#[derive(Subcommand)]
pub enum ModuleCommand {
    /// Add an auxiliary container (mysql:8, redis:7, ...)
    Add {
        #[arg(value_name = "APP")]
        app: String,

        #[arg(value_name = "IMAGE")]
        image: String,
    },

    List {
        #[arg(value_name = "APP")]
        app: String,
    },

    #[command(name = "rm")]
    Remove {
        #[arg(value_name = "APP")]
        app: String,

        #[arg(value_name = "MODULE")]
        name: String,
    },
}

pub async fn handle_command(command: ModuleCommand, client: &FleetClient) -> Result<()> {
    match command {
        ModuleCommand::Add { app, image } => {
            let id = resolve_application(client, &app).await?;
            let module = client.add_module(id, &image).await?;
            println!("{}", format!("✓ Module {} added", module.name).green());
            for (key, value) in &module.metadata {
                println!("  {}: {}", key, value);
            }
        }
        ModuleCommand::List { app } => {
            let id = resolve_application(client, &app).await?;
            println!("{:<32} {:<24} {}", "NAME", "IMAGE", "KIND");
            for module in client.list_modules(id).await? {
                println!("{:<32} {:<24} {:?}", module.name.bold(), module.image, module.kind);
            }
        }
        ModuleCommand::Remove { app, name } => {
            let id = resolve_application(client, &app).await?;
            client.remove_module(id, &name).await?;
            println!("{}", format!("✓ Module {} removed", name).green());
        }
    }
    Ok(())
}
