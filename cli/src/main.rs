// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # moim CLI
//!
//! Operator and scripting front-end for the group lifecycle service.
//!
//! ## Commands
//!
//! - `moim config show|validate|generate` - Configuration management
//! - `moim update [--dry-run]` - Apply database migrations
//! - `moim group create|show|edit|delete` - Group lifecycle
//! - `moim membership apply|approve|reject|role|leave|show` - Membership lifecycle

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use moim_core::domain::service_config::{LogFormat, ServiceConfigManifest};
use std::path::PathBuf;

mod commands;

use commands::{ConfigCommand, GroupCommand, MembershipCommand};

/// moim - group membership lifecycle
#[derive(Parser)]
#[command(name = "moim")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "MOIM_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level.
    #[arg(long, global = true, env = "MOIM_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Apply database migrations
    #[command(name = "update")]
    Update {
        #[command(flatten)]
        command: commands::UpdateCommand,
    },

    /// Group lifecycle operations
    #[command(name = "group")]
    Group {
        #[command(subcommand)]
        command: GroupCommand,
    },

    /// Membership lifecycle operations
    #[command(name = "membership")]
    Membership {
        #[command(subcommand)]
        command: MembershipCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Logging comes from the manifest when it loads; a broken manifest is
    // reported by the command itself.
    let loaded = ServiceConfigManifest::load_or_default(cli.config.clone());
    let (level, format) = match &loaded {
        Ok(config) => (
            cli.log_level
                .clone()
                .unwrap_or_else(|| config.spec.observability.log_level.clone()),
            config.spec.observability.log_format,
        ),
        Err(_) => (
            cli.log_level.clone().unwrap_or_else(|| "info".to_string()),
            LogFormat::Compact,
        ),
    };
    init_logging(&level, format)?;

    match cli.command {
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::Update { command }) => {
            let config = loaded.context("Failed to load configuration")?;
            commands::update::execute(command, &config).await
        }
        Some(Commands::Group { command }) => {
            let config = loaded.context("Failed to load configuration")?;
            commands::group::handle_command(command, &config).await
        }
        Some(Commands::Membership { command }) => {
            let config = loaded.context("Failed to load configuration")?;
            commands::membership::handle_command(command, &config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }

    Ok(())
}
