// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::resolve_application;
use crate::client::FleetClient;

#[derive(Subcommand)]
pub enum VolumeCommand {
    Create {
        #[arg(value_name = "NAME")]
        name: String,
    },

    List,

    #[command(name = "rm")]
    Remove {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Mount a volume into one of an application's containers
    Mount {
        #[arg(value_name = "NAME")]
        name: String,

        #[arg(value_name = "APP")]
        app: String,

        /// Absolute path inside the container
        #[arg(value_name = "PATH")]
        path: String,

        #[arg(long)]
        read_only: bool,

        /// Module name; the server when omitted
        #[arg(long)]
        container: Option<String>,
    },

    Unmount {
        #[arg(value_name = "NAME")]
        name: String,

        #[arg(value_name = "APP")]
        app: String,

        /// Module name the volume is mounted into
        #[arg(value_name = "CONTAINER")]
        container: String,
    },
}

pub async fn handle_command(command: VolumeCommand, client: &FleetClient) -> Result<()> {
    match command {
        VolumeCommand::Create { name } => {
            let volume = client.create_volume(&name).await?;
            println!("{}", format!("✓ Volume {} created", volume.name).green());
        }
        VolumeCommand::List => {
            let volumes = client.list_volumes().await?;
            if volumes.is_empty() {
                println!("{}", "No volumes".yellow());
                return Ok(());
            }
            println!("{:<24} {}", "NAME", "MOUNTS");
            for volume in volumes {
                println!("{:<24} {}", volume.name.bold(), volume.mounts.len());
                for mount in &volume.mounts {
                    let mode = if mount.read_only() { "ro" } else { "rw" };
                    println!("  {} -> {} ({})", mount.container, mount.path, mode.dimmed());
                }
            }
        }
        VolumeCommand::Remove { name } => {
            client.remove_volume(&name).await?;
            println!("{}", format!("✓ Volume {} removed", name).green());
        }
        VolumeCommand::Mount {
            name,
            app,
            path,
            read_only,
            container,
        } => {
            let id = resolve_application(client, &app).await?;
            let mount = client
                .mount_volume(&name, id, &path, read_only, container.as_deref())
                .await?;
            println!(
                "{}",
                format!("✓ Volume {} mounted at {} in {}", name, mount.path, mount.container).green()
            );
        }
        VolumeCommand::Unmount {
            name,
            app,
            container,
        } => {
            let id = resolve_application(client, &app).await?;
            client.unmount_volume(&name, id, &container).await?;
            println!("{}", format!("✓ Volume {} unmounted", name).green());
        }
    }
    Ok(())
}
