// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the moim CLI

pub mod config;
pub mod group;
pub mod membership;
pub mod update;

pub use self::config::ConfigCommand;
pub use self::group::GroupCommand;
pub use self::membership::MembershipCommand;
pub use self::update::UpdateCommand;

use anyhow::{bail, Result};
use moim_core::application::repository_factory::build_group_lifecycle_service;
use moim_core::application::StandardGroupLifecycleService;
use moim_core::domain::error::GroupError;
use moim_core::domain::group::GroupId;
use moim_core::domain::membership::MemberId;
use moim_core::domain::service_config::{ServiceConfigManifest, StorageBackendKind};
use moim_core::infrastructure::event_bus::EventBus;
use std::sync::Arc;
use tracing::info;

/// Build the lifecycle service for a one-shot command.
///
/// The in-memory backend starts empty on every run, so lifecycle commands
/// only make sense against PostgreSQL.
pub(crate) async fn connect_service(
    config: &ServiceConfigManifest,
) -> Result<StandardGroupLifecycleService> {
    config.validate()?;
    if config.spec.storage.backend != StorageBackendKind::Postgres {
        bail!("Lifecycle commands need spec.storage.backend: postgres (found in-memory)");
    }
    info!("Using configuration '{}'", config.metadata.name);
    let (service, _db) =
        build_group_lifecycle_service(config, Arc::new(EventBus::with_default_capacity())).await?;
    Ok(service)
}

/// Prefix a lifecycle failure with its stable code
pub(crate) fn describe(err: GroupError) -> anyhow::Error {
    if err.is_retryable() {
        anyhow::anyhow!("[{}] {} (retry the command)", err.code(), err)
    } else {
        anyhow::anyhow!("[{}] {}", err.code(), err)
    }
}

pub(crate) fn parse_group_id(value: &str) -> Result<GroupId, String> {
    let raw: i64 = value.parse().map_err(|e| format!("{}", e))?;
    GroupId::new(raw).map_err(|e| e.to_string())
}

pub(crate) fn parse_member_id(value: &str) -> Result<MemberId, String> {
    let raw: i64 = value.parse().map_err(|e| format!("{}", e))?;
    MemberId::new(raw).map_err(|e| e.to_string())
}
