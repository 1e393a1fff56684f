// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Application lifecycle commands
//!
//! Commands: create, list, show, start, stop, restart, delete

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use appfleet_core::presentation::resources::ApplicationResource;

use super::{colored_status, resolve_application};
use crate::client::FleetClient;

#[derive(Subcommand)]
pub enum AppCommand {
    /// Create an application and start its server
    Create {
        #[arg(value_name = "NAME")]
        name: String,

        /// java, tomcat, wildfly, apache, nginx or node
        #[arg(short = 't', long, default_value = "tomcat")]
        server_type: String,

        #[arg(long)]
        display_name: Option<String>,
    },

    /// List your applications
    List,

    /// Show one application
    Show {
        /// Application id or name
        #[arg(value_name = "APP")]
        app: String,
    },

    Start {
        #[arg(value_name = "APP")]
        app: String,
    },

    Stop {
        #[arg(value_name = "APP")]
        app: String,
    },

    Restart {
        #[arg(value_name = "APP")]
        app: String,
    },

    /// Delete an application with its containers
    Delete {
        #[arg(value_name = "APP")]
        app: String,
    },
}

pub async fn handle_command(command: AppCommand, client: &FleetClient) -> Result<()> {
    match command {
        AppCommand::Create {
            name,
            server_type,
            display_name,
        } => {
            println!("Creating application: {}", name.bold());
            let application = client
                .create_application(&name, display_name.as_deref(), &server_type)
                .await?;
            println!(
                "{}",
                format!("✓ Application created: {}", application.id).green()
            );
            Ok(())
        }
        AppCommand::List => list(client).await,
        AppCommand::Show { app } => {
            let id = resolve_application(client, &app).await?;
            print_application(&client.get_application(id).await?);
            Ok(())
        }
        AppCommand::Start { app } => action(client, &app, "start", "started").await,
        AppCommand::Stop { app } => action(client, &app, "stop", "stopped").await,
        AppCommand::Restart { app } => action(client, &app, "restart", "restarted").await,
        AppCommand::Delete { app } => {
            let id = resolve_application(client, &app).await?;
            client.delete_application(id).await?;
            println!("{}", format!("✓ Application {} deleted", app).green());
            Ok(())
        }
    }
}

async fn action(client: &FleetClient, app: &str, verb: &str, done: &str) -> Result<()> {
    let id = resolve_application(client, app).await?;
    client.lifecycle_action(id, verb).await?;
    println!("{}", format!("✓ Application {} {}", app, done).green());
    Ok(())
}

async fn list(client: &FleetClient) -> Result<()> {
    let applications = client.list_applications().await?;

    if applications.is_empty() {
        println!("{}", "No applications found".yellow());
        return Ok(());
    }

    println!("{:<38} {:<20} {:<10} {}", "ID", "NAME", "SERVER", "STATUS");
    for application in applications {
        println!(
            "{:<38} {:<20} {:<10} {}",
            application.id,
            application.name.bold(),
            application.server_type.as_str(),
            colored_status(application.status)
        );
    }

    Ok(())
}

fn print_application(application: &ApplicationResource) {
    println!("{}", application.display_name.bold());
    println!("  ID:      {}", application.id);
    println!("  Name:    {}", application.name);
    println!("  Server:  {}", application.server_type.as_str());
    println!("  Status:  {}", colored_status(application.status));
    println!("  Created: {}", application.created_at.to_rfc3339());

    println!("  Modules:");
    for module in &application.modules {
        println!("    - {} ({})", module.name, module.image);
    }
    if !application.aliases.is_empty() {
        println!("  Aliases: {}", application.aliases.join(", "));
    }
    if !application.ports.is_empty() {
        println!("  Ports:");
        for port in &application.ports {
            println!("    - {} ({})", port.number, port.nature);
        }
    }

    let actions: Vec<&str> = ["start", "stop", "restart"]
        .into_iter()
        .filter(|action| application.links.contains_key(*action))
        .collect();
    if !actions.is_empty() {
        println!("  Actions: {}", actions.join(", ").dimmed());
    }
}
