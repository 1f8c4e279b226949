// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Service Configuration Types
//
// Kubernetes-style manifest (apiVersion/kind/metadata/spec) selecting:
// - the storage backend for groups and memberships
// - the lock coordinator scope and its wait bounds
// - logging level and format

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::repository::{PostgresConfig, StorageBackend};

pub const API_VERSION: &str = "moim/v1";
pub const KIND: &str = "ServiceConfig";

/// Top-level service configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfigManifest {
    /// API version (must be "moim/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "ServiceConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: ServiceConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Deployment name, used in logs
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfigSpec {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub locking: LockingConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StorageBackendKind {
    InMemory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackendKind,

    /// Connection string, or "env:VAR_NAME" to read it from the environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

/// Scope of mutual exclusion between lifecycle operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockBackendKind {
    /// Single service instance; locks live in process memory
    InProcess,
    /// Several instances sharing one database; PostgreSQL advisory locks
    PostgresAdvisory,
}

impl std::str::FromStr for LockBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in-process" => Ok(Self::InProcess),
            "postgres-advisory" => Ok(Self::PostgresAdvisory),
            other => Err(format!("unknown lock backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockingConfig {
    #[serde(default = "default_lock_backend")]
    pub backend: LockBackendKind,

    /// Longest time a caller waits for a lock before failing with a retryable error
    #[serde(default = "default_lock_wait", with = "humantime_serde")]
    pub wait: Duration,

    /// First retry delay when polling a distributed lock; doubles each attempt
    #[serde(default = "default_initial_backoff", with = "humantime_serde")]
    pub initial_backoff: Duration,

    /// Size of the dedicated pool whose sessions own advisory locks.
    /// Bounds how many groups can be locked at once by this instance.
    #[serde(default = "default_lock_max_connections")]
    pub max_connections: u32,
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            backend: default_lock_backend(),
            wait: default_lock_wait(),
            initial_backoff: default_initial_backoff(),
            max_connections: default_lock_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (e.g., "info", "debug", "moim_core=trace")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_storage_backend() -> StorageBackendKind {
    StorageBackendKind::InMemory
}

fn default_max_connections() -> u32 {
    5
}

fn default_lock_backend() -> LockBackendKind {
    LockBackendKind::InProcess
}

fn default_lock_wait() -> Duration {
    Duration::from_millis(1000)
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(100)
}

fn default_lock_max_connections() -> u32 {
    16
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

impl Default for ServiceConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "moim".to_string(),
                labels: None,
            },
            spec: ServiceConfigSpec::default(),
        }
    }
}

impl ServiceConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. MOIM_CONFIG_PATH environment variable
    /// 2. ./moim-config.yaml (working directory)
    /// 3. ~/.moim/config.yaml (user home)
    /// 4. /etc/moim/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("MOIM_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./moim-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".moim").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/moim/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("MOIM_DATABASE_URL") {
            tracing::info!("Environment override: MOIM_DATABASE_URL");
            self.spec.storage.database_url = Some(url);
        }

        if let Some(val) = lookup("MOIM_LOCK_WAIT_MS") {
            match val.parse::<u64>() {
                Ok(ms) => {
                    tracing::info!("Environment override: MOIM_LOCK_WAIT_MS={}", ms);
                    self.spec.locking.wait = Duration::from_millis(ms);
                }
                Err(_) => tracing::warn!(
                    "Invalid value for MOIM_LOCK_WAIT_MS: '{}'. Expected milliseconds. Ignoring.",
                    val
                ),
            }
        }

        if let Some(val) = lookup("MOIM_LOCK_BACKEND") {
            match val.parse::<LockBackendKind>() {
                Ok(kind) => {
                    tracing::info!("Environment override: MOIM_LOCK_BACKEND={}", val);
                    self.spec.locking.backend = kind;
                }
                Err(e) => tracing::warn!("Invalid value for MOIM_LOCK_BACKEND: {}. Ignoring.", e),
            }
        }
    }

    /// Database URL with any "env:VAR_NAME" indirection resolved
    pub fn resolved_database_url(&self) -> anyhow::Result<Option<String>> {
        match self.spec.storage.database_url.as_deref() {
            None => Ok(None),
            Some(url) => match url.strip_prefix("env:") {
                Some(var) => std::env::var(var).map(Some).map_err(|_| {
                    anyhow::anyhow!("database_url refers to unset environment variable {}", var)
                }),
                None => Ok(Some(url.to_string())),
            },
        }
    }

    /// True if any configured component needs a PostgreSQL connection
    pub fn requires_database(&self) -> bool {
        self.spec.storage.backend == StorageBackendKind::Postgres
            || self.spec.locking.backend == LockBackendKind::PostgresAdvisory
    }

    pub fn storage_backend(&self) -> anyhow::Result<StorageBackend> {
        match self.spec.storage.backend {
            StorageBackendKind::InMemory => Ok(StorageBackend::InMemory),
            StorageBackendKind::Postgres => {
                let connection_string = self
                    .resolved_database_url()?
                    .ok_or_else(|| anyhow::anyhow!("spec.storage.database_url is required for postgres"))?;
                Ok(StorageBackend::PostgreSQL(PostgresConfig {
                    connection_string,
                    max_connections: self.spec.storage.max_connections,
                }))
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.trim().is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.locking.wait.is_zero() {
            anyhow::bail!("spec.locking.wait must be greater than zero");
        }

        if self.spec.locking.initial_backoff.is_zero() {
            anyhow::bail!("spec.locking.initial_backoff must be greater than zero");
        }

        if self.spec.storage.max_connections == 0 {
            anyhow::bail!("spec.storage.max_connections must be at least 1");
        }

        if self.spec.locking.backend == LockBackendKind::PostgresAdvisory
            && self.spec.locking.max_connections < self.spec.storage.max_connections
        {
            anyhow::bail!(
                "spec.locking.max_connections ({}) must be at least spec.storage.max_connections ({})",
                self.spec.locking.max_connections,
                self.spec.storage.max_connections
            );
        }

        if self.requires_database() && self.spec.storage.database_url.is_none() {
            anyhow::bail!(
                "spec.storage.database_url is required when storage or locking uses PostgreSQL"
            );
        }

        Ok(())
    }
}
