// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates the concrete store, directories and lock coordinator selected by
//! the service configuration, and assembles the lifecycle service from them.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Keep backend selection out of the domain and the binaries

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::application::group_lifecycle::StandardGroupLifecycleService;
use crate::domain::directory::{CategoryDirectory, MemberDirectory};
use crate::domain::lock::LockCoordinator;
use crate::domain::repository::{GroupStore, PostgresConfig, StorageBackend};
use crate::domain::service_config::{LockBackendKind, LockingConfig, ServiceConfigManifest};
use crate::infrastructure::db::Database;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::locks::{InProcessLockCoordinator, PostgresAdvisoryLockCoordinator};
use crate::infrastructure::repositories::{
    InMemoryCategoryDirectory, InMemoryGroupStore, InMemoryMemberDirectory,
    PostgresCategoryDirectory, PostgresGroupStore, PostgresMemberDirectory,
};

fn require_database<'a>(db: Option<&'a Database>, component: &str) -> Result<&'a Database> {
    db.with_context(|| format!("{} requires a PostgreSQL connection", component))
}

/// Creates a GroupStore implementation based on the configured backend
pub fn create_group_store(
    backend: &StorageBackend,
    db: Option<&Database>,
) -> Result<Arc<dyn GroupStore>> {
    Ok(match backend {
        StorageBackend::InMemory => Arc::new(InMemoryGroupStore::new()),
        StorageBackend::PostgreSQL(_) => {
            let db = require_database(db, "postgres storage")?;
            Arc::new(PostgresGroupStore::new(db.get_pool().clone()))
        }
    })
}

/// Creates a MemberDirectory implementation based on the configured backend
pub fn create_member_directory(
    backend: &StorageBackend,
    db: Option<&Database>,
) -> Result<Arc<dyn MemberDirectory>> {
    Ok(match backend {
        StorageBackend::InMemory => Arc::new(InMemoryMemberDirectory::new()),
        StorageBackend::PostgreSQL(_) => {
            let db = require_database(db, "postgres member directory")?;
            Arc::new(PostgresMemberDirectory::new(db.get_pool().clone()))
        }
    })
}

/// Creates a CategoryDirectory implementation based on the configured backend
pub fn create_category_directory(
    backend: &StorageBackend,
    db: Option<&Database>,
) -> Result<Arc<dyn CategoryDirectory>> {
    Ok(match backend {
        StorageBackend::InMemory => Arc::new(InMemoryCategoryDirectory::new()),
        StorageBackend::PostgreSQL(_) => {
            let db = require_database(db, "postgres category directory")?;
            Arc::new(PostgresCategoryDirectory::new(db.get_pool().clone()))
        }
    })
}

/// Creates the LockCoordinator selected by `spec.locking.backend`.
///
/// `lock_db` must be a pool reserved for lock sessions, never the store's.
pub fn create_lock_coordinator(
    config: &LockingConfig,
    lock_db: Option<&Database>,
) -> Result<Arc<dyn LockCoordinator>> {
    Ok(match config.backend {
        LockBackendKind::InProcess => Arc::new(InProcessLockCoordinator::new(config.wait)),
        LockBackendKind::PostgresAdvisory => {
            let db = require_database(lock_db, "postgres-advisory locking")?;
            Arc::new(PostgresAdvisoryLockCoordinator::new(
                db.get_pool().clone(),
                config.wait,
                config.initial_backoff,
            ))
        }
    })
}

/// Connect to PostgreSQL if the configuration needs it and assemble the
/// lifecycle service. The returned `Database` (if any) is the store's pool.
///
/// Advisory locking gets a second pool of `spec.locking.max_connections`
/// sessions so that lock holders never compete with their own transactions.
pub async fn build_group_lifecycle_service(
    config: &ServiceConfigManifest,
    event_bus: Arc<EventBus>,
) -> Result<(StandardGroupLifecycleService, Option<Database>)> {
    let backend = config.storage_backend()?;

    let db = match &backend {
        StorageBackend::PostgreSQL(pg) => {
            info!("Connecting to PostgreSQL (pool size {})", pg.max_connections);
            Some(
                Database::connect(pg)
                    .await
                    .context("Failed to initialize database")?,
            )
        }
        StorageBackend::InMemory => None,
    };

    let lock_db = match config.spec.locking.backend {
        LockBackendKind::PostgresAdvisory => {
            let url = config
                .resolved_database_url()?
                .context("a database URL is required by postgres-advisory locking")?;
            let lock_pool = PostgresConfig {
                connection_string: url,
                max_connections: config.spec.locking.max_connections,
            };
            info!(
                "Connecting advisory lock pool (pool size {})",
                lock_pool.max_connections
            );
            Some(
                Database::connect(&lock_pool)
                    .await
                    .context("Failed to initialize lock pool")?,
            )
        }
        LockBackendKind::InProcess => None,
    };

    let service = StandardGroupLifecycleService::new(
        create_group_store(&backend, db.as_ref())?,
        create_member_directory(&backend, db.as_ref())?,
        create_category_directory(&backend, db.as_ref())?,
        create_lock_coordinator(&config.spec.locking, lock_db.as_ref())?,
        event_bus,
    );

    info!(
        "Group service ready (storage: {:?}, locking: {:?})",
        config.spec.storage.backend, config.spec.locking.backend
    );
    Ok((service, db))
}
