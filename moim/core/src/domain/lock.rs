// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Lock coordinator contract
//!
//! At most one holder per key at a time, a bounded wait to acquire, and a
//! release that happens whenever the [`LockGuard`] is dropped: on return, on
//! error, while unwinding from a panic, or when the holding future is
//! cancelled. Locks are not reentrant and acquisition order is not fair.
//!
//! Implementations live in `crate::infrastructure::locks`.

use std::any::Any;
use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::error::GroupError;
use crate::domain::group::GroupId;
use crate::domain::membership::MemberId;
use crate::domain::repository::RepositoryError;

/// Name of a lockable resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey(String);

impl LockKey {
    /// Key guarding every write to a group and its memberships
    pub fn group(id: GroupId) -> Self {
        Self(format!("group:{}", id))
    }

    /// Key guarding a single membership row
    pub fn membership(group_id: GroupId, member_id: MemberId) -> Self {
        Self(format!("group:{}-member:{}", group_id, member_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("timed out after {waited:?} waiting for lock '{key}'")]
    Timeout { key: String, waited: Duration },

    #[error("lock backend error: {0}")]
    Backend(String),
}

impl From<LockError> for GroupError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::Timeout { key, waited } => GroupError::LockTimeout { key, waited },
            LockError::Backend(msg) => GroupError::Storage(RepositoryError::Database(msg)),
        }
    }
}

/// Proof of holding a lock. The backend-specific lease is released when the
/// guard is dropped.
pub struct LockGuard {
    key: LockKey,
    acquired_at: Instant,
    _lease: Box<dyn Any + Send>,
}

impl LockGuard {
    pub fn new<L>(key: LockKey, lease: L) -> Self
    where
        L: Any + Send,
    {
        Self {
            key,
            acquired_at: Instant::now(),
            _lease: Box::new(lease),
        }
    }

    pub fn key(&self) -> &LockKey {
        &self.key
    }

    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        debug!("Releasing lock {} after {:?}", self.key, self.held_for());
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("key", &self.key)
            .field("held_for", &self.held_for())
            .finish()
    }
}

#[async_trait]
pub trait LockCoordinator: Send + Sync {
    /// Wait up to the configured bound for exclusive ownership of `key`
    async fn acquire(&self, key: &LockKey) -> Result<LockGuard, LockError>;
}

/// Run `body` while holding `key`.
///
/// The guard lives on this future's stack, so it is released however `body`
/// ends, including when the caller drops the returned future.
pub async fn with_lock<T, E, F, Fut>(
    locks: &dyn LockCoordinator,
    key: LockKey,
    body: F,
) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<LockError>,
{
    let guard = locks.acquire(&key).await?;
    let result = body().await;
    drop(guard);
    result
}
