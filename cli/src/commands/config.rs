// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use moim_core::domain::service_config::{LockBackendKind, ServiceConfigManifest};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective manifest as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./moim-config.yaml)
        #[arg(short, long, default_value = "./moim-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = ServiceConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. MOIM_CONFIG_PATH: {}",
            std::env::var("MOIM_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./moim-config.yaml");
        println!("  4. ~/.moim/config.yaml");
        println!("  5. /etc/moim/config.yaml");
        println!();
    }

    if as_yaml {
        print!("{}", serde_yaml::to_string(&config)?);
        return Ok(());
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "Storage:".bold());
    println!("  Backend: {:?}", config.spec.storage.backend);
    match config.spec.storage.database_url.as_deref() {
        Some(url) if url.starts_with("env:") => println!("  Database URL: {}", url),
        Some(_) => println!("  Database URL: {}", "(set)".dimmed()),
        None => println!("  Database URL: {}", "(not set)".dimmed()),
    }
    println!("  Max connections: {}", config.spec.storage.max_connections);
    println!();

    println!("{}", "Locking:".bold());
    println!("  Backend: {:?}", config.spec.locking.backend);
    println!("  Wait: {:?}", config.spec.locking.wait);
    if config.spec.locking.backend == LockBackendKind::PostgresAdvisory {
        println!("  Initial backoff: {:?}", config.spec.locking.initial_backoff);
    }
    println!();

    println!("{}", "Observability:".bold());
    println!("  Log level: {}", config.spec.observability.log_level);
    println!("  Log format: {:?}", config.spec.observability.log_format);
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = ServiceConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        include_str!("../../templates/config-with-examples.yaml")
    } else {
        include_str!("../../templates/config-minimal.yaml")
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_parse_and_validate() {
        for template in [
            include_str!("../../templates/config-minimal.yaml"),
            include_str!("../../templates/config-with-examples.yaml"),
        ] {
            let config = ServiceConfigManifest::from_yaml_str(template).unwrap();
            assert_eq!(config.metadata.name, "moim-local");
            assert!(config.requires_database());
        }
    }

    #[tokio::test]
    async fn test_generate_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("moim-config.yaml");
        generate(output.clone(), false).await.unwrap();
        let written = ServiceConfigManifest::from_yaml_file(&output).unwrap();
        assert_eq!(written.api_version, "moim/v1");
    }
}
