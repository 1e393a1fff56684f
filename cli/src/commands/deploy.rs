// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::resolve_application;
use crate::client::FleetClient;

#[derive(Subcommand)]
pub enum DeployCommand {
    /// Record a deployment of an artifact
    Create {
        #[arg(value_name = "APP")]
        app: String,

        /// Context path, starting with `/`
        #[arg(value_name = "CONTEXT_PATH")]
        context_path: String,

        /// war, ear or jar
        #[arg(short = 't', long = "type", default_value = "war")]
        deployment_type: String,
    },

    /// Deployment history, oldest first
    List {
        #[arg(value_name = "APP")]
        app: String,
    },
}

pub async fn handle_command(command: DeployCommand, client: &FleetClient) -> Result<()> {
    match command {
        DeployCommand::Create {
            app,
            context_path,
            deployment_type,
        } => {
            let id = resolve_application(client, &app).await?;
            let deployment = client
                .create_deployment(id, &deployment_type, &context_path)
                .await?;
            println!(
                "{}",
                format!("✓ Deployed {} ({})", deployment.context_path, deployment.id).green()
            );
        }
        DeployCommand::List { app } => {
            let id = resolve_application(client, &app).await?;
            let deployments = client.list_deployments(id).await?;
            if deployments.is_empty() {
                println!("{}", "No deployments".yellow());
                return Ok(());
            }
            println!("{:<26} {:<6} {}", "DEPLOYED AT", "TYPE", "CONTEXT PATH");
            for deployment in deployments {
                println!(
                    "{:<26} {:<6} {}",
                    deployment.deployed_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    deployment.deployment_type,
                    deployment.context_path
                );
            }
        }
    }
    Ok(())
}
