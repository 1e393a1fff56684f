// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::resolve_application;
use crate::client::FleetClient;

#[derive(Subcommand)]
pub enum PortCommand {
    /// Open a port on the application server
    Open {
        #[arg(value_name = "APP")]
        app: String,

        #[arg(value_name = "NUMBER")]
        number: u32,

        /// web, jmx or debug
        #[arg(short, long, default_value = "web")]
        nature: String,

        /// Allocate a forwarding hostname for the port
        #[arg(long)]
        quick_access: bool,
    },

    List {
        #[arg(value_name = "APP")]
        app: String,
    },

    Close {
        #[arg(value_name = "APP")]
        app: String,

        #[arg(value_name = "NUMBER")]
        number: u16,
    },
}

pub async fn handle_command(command: PortCommand, client: &FleetClient) -> Result<()> {
    match command {
        PortCommand::Open {
            app,
            number,
            nature,
            quick_access,
        } => {
            let id = resolve_application(client, &app).await?;
            let port = client.open_port(id, number, &nature, quick_access).await?;
            println!("{}", format!("✓ Port {} opened", port.number).green());
            if let Some(alias) = port.alias {
                println!("  Quick access: {}", alias.bold());
            }
        }
        PortCommand::List { app } => {
            let id = resolve_application(client, &app).await?;
            let ports = client.list_ports(id).await?;
            if ports.is_empty() {
                println!("{}", "No open ports".yellow());
                return Ok(());
            }
            println!("{:<8} {:<8} {}", "PORT", "NATURE", "QUICK ACCESS");
            for port in ports {
                println!(
                    "{:<8} {:<8} {}",
                    port.number,
                    port.nature,
                    port.alias.as_deref().unwrap_or("-")
                );
            }
        }
        PortCommand::Close { app, number } => {
            let id = resolve_application(client, &app).await?;
            client.close_port(id, number).await?;
            println!("{}", format!("✓ Port {} closed", number).green());
        }
    }
    Ok(())
}
