// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Database Update Command
//!
//! Implements `moim update`, which applies the schema migrations embedded in
//! `moim-core` to the configured PostgreSQL database.
//!
//! # Usage
//!
//! ```bash
//! # Apply all pending migrations
//! moim update
//!
//! # Preview migrations without applying
//! moim update --dry-run
//! ```
//!
//! The database URL comes from `spec.storage.database_url` or
//! `MOIM_DATABASE_URL`.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use moim_core::domain::service_config::ServiceConfigManifest;
use moim_core::infrastructure::db::{Database, MIGRATOR};

#[derive(Args)]
pub struct UpdateCommand {
    /// Perform a dry run without applying changes
    #[arg(long)]
    dry_run: bool,
}

pub async fn execute(cmd: UpdateCommand, config: &ServiceConfigManifest) -> Result<()> {
    println!("{}", "moim update".bold().green());

    let database_url = config.resolved_database_url()?.context(
        "No database URL configured. Set spec.storage.database_url or MOIM_DATABASE_URL.",
    )?;

    println!("Connecting to database...");
    let db = Database::with_max_connections(&database_url, 1).await?;

    let applied_count = sqlx::query("SELECT version FROM _sqlx_migrations")
        .fetch_all(db.get_pool())
        .await
        .map(|rows| rows.len())
        .unwrap_or(0);
    let total_migrations = MIGRATOR.iter().count();

    println!(
        "Migration status: {} applied, {} total available.",
        applied_count, total_migrations
    );

    if applied_count >= total_migrations {
        println!("{}", "✓ Database is up to date.".green());
        return Ok(());
    }

    if cmd.dry_run {
        println!("Pending migrations found (Dry Run):");
        for migration in MIGRATOR.iter().skip(applied_count) {
            println!(" - {} {}", migration.version, migration.description);
        }
        println!("Skipping application due to --dry-run");
        return Ok(());
    }

    println!("Applying pending migrations...");
    db.migrate().await?;
    println!("{}", "✓ Database updated successfully.".green());

    Ok(())
}
