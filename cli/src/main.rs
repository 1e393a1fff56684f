// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # appfleet CLI
//!
//! The `appfleet` binary runs the API server (`appfleet serve`) and talks to
//! a running server for everything else.
//!
//! ## Commands
//!
//! - `appfleet serve` - Run the HTTP API against Docker
//! - `appfleet app create|list|show|start|stop|restart|delete` - Application lifecycle
//! - `appfleet alias|port|deploy|module|volume ...` - Application sub-resources
//! - `appfleet config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use appfleet::client::FleetClient;
use appfleet::commands::{
    self, AliasCommand, AppCommand, ConfigCommand, DeployCommand, ModuleCommand, PortCommand,
    VolumeCommand,
};
use appfleet_core::domain::fleet_config::{FleetConfigManifest, LoggingConfig};

/// appfleet - host and operate multi-container applications
#[derive(Parser)]
#[command(name = "appfleet")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "APPFLEET_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// API server port
    #[arg(long, global = true, env = "APPFLEET_PORT", default_value = "8000")]
    port: u16,

    /// API server host
    #[arg(long, global = true, env = "APPFLEET_HOST", default_value = "127.0.0.1")]
    host: String,

    /// User the requests act on behalf of
    #[arg(short, long, global = true, env = "APPFLEET_USER")]
    user: Option<String>,

    /// Log level (trace, debug, info, warn, error); config value when omitted
    #[arg(long, global = true, env = "APPFLEET_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server
    Serve,

    /// Application lifecycle
    App {
        #[command(subcommand)]
        command: AppCommand,
    },

    /// Hostname aliases
    Alias {
        #[command(subcommand)]
        command: AliasCommand,
    },

    /// Opened ports
    Port {
        #[command(subcommand)]
        command: PortCommand,
    },

    /// Deployment history
    Deploy {
        #[command(subcommand)]
        command: DeployCommand,
    },

    /// Auxiliary containers
    Module {
        #[command(subcommand)]
        command: ModuleCommand,
    },

    /// Named volumes
    Volume {
        #[command(subcommand)]
        command: VolumeCommand,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let command = match cli.command {
        Some(command) => command,
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    };

    // Only the server reads the configuration for its logging settings
    let serve_config = match command {
        Commands::Serve => Some(
            FleetConfigManifest::load_or_default(cli.config.clone())
                .context("Failed to load configuration")?,
        ),
        _ => None,
    };
    let mut logging = serve_config
        .as_ref()
        .map(|config| config.spec.observability.logging.clone())
        .unwrap_or_else(|| LoggingConfig {
            level: "warn".to_string(),
            format: "text".to_string(),
        });
    if let Some(level) = cli.log_level {
        logging.level = level;
    }
    init_logging(&logging)?;

    let client = || FleetClient::new(&cli.host, cli.port, cli.user.clone());
    match command {
        Commands::Serve => {
            let config = match serve_config {
                Some(config) => config,
                None => FleetConfigManifest::load_or_default(cli.config)?,
            };
            appfleet::server::serve(config).await
        }
        Commands::App { command } => commands::app::handle_command(command, &client()?).await,
        Commands::Alias { command } => commands::alias::handle_command(command, &client()?).await,
        Commands::Port { command } => commands::port::handle_command(command, &client()?).await,
        Commands::Deploy { command } => commands::deploy::handle_command(command, &client()?).await,
        Commands::Module { command } => commands::module::handle_command(command, &client()?).await,
        Commands::Volume { command } => commands::volume::handle_command(command, &client()?).await,
        Commands::Config { command } => commands::config::handle_command(command, cli.config).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&logging.level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().with_current_span(false).init();
    } else {
        builder.with_target(false).compact().init();
    }

    Ok(())
}
