// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contract for the `Group` and `GroupMembership` aggregates.
//! Both aggregates change together (an approval recounts members and may close
//! recruitment), so they share one transactional store instead of one
//! repository each.
//!
//! | Trait | Scope | Implementations |
//! |-------|-------|----------------|
//! | `GroupStore` | committed reads, id allocation, transaction start | `InMemoryGroupStore`, `PostgresGroupStore` |
//! | `GroupTransaction` | reads and writes inside one unit of work | `InMemoryGroupTransaction`, `PostgresGroupTransaction` |
//!
//! ## Storage Backend Abstraction
//!
//! The concrete store is selected at startup from `moim-config.yaml`.
//! The in-memory store backs development and tests; PostgreSQL backs
//! production.
//!
//! Counts are always answered by the store (`count_by_status`,
//! `count_by_role`) so they observe every write made earlier in the same
//! transaction, never by filtering a loaded collection.

use async_trait::async_trait;

use crate::domain::group::{Group, GroupId};
use crate::domain::membership::{GroupMembership, GroupRole, MemberId, MembershipStatus};

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

/// Entry point to group persistence
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// Reserve a fresh group id before the group row exists
    async fn allocate_group_id(&self) -> Result<GroupId, RepositoryError>;

    /// Open a unit of work. Writes become visible to other transactions only
    /// after `commit`.
    async fn begin(&self) -> Result<Box<dyn GroupTransaction>, RepositoryError>;

    /// Committed, active group together with its approved member count,
    /// both read at the same instant
    async fn find_group_with_approved_count(
        &self,
        id: GroupId,
    ) -> Result<Option<(Group, u64)>, RepositoryError>;

    /// Committed, active membership
    async fn find_membership(
        &self,
        group_id: GroupId,
        member_id: MemberId,
    ) -> Result<Option<GroupMembership>, RepositoryError>;

}

/// One unit of work over groups and memberships.
///
/// Finders only return rows that are not disabled. Dropping a transaction
/// without calling `commit` discards its writes.
#[async_trait]
pub trait GroupTransaction: Send {
    /// Active group; the row stays locked against other writers until the
    /// transaction ends
    async fn find_group(&mut self, id: GroupId) -> Result<Option<Group>, RepositoryError>;

    async fn find_membership(
        &mut self,
        group_id: GroupId,
        member_id: MemberId,
    ) -> Result<Option<GroupMembership>, RepositoryError>;

    async fn count_by_status(
        &mut self,
        group_id: GroupId,
        status: MembershipStatus,
    ) -> Result<u64, RepositoryError>;

    async fn count_by_role(
        &mut self,
        group_id: GroupId,
        role: GroupRole,
        status: MembershipStatus,
    ) -> Result<u64, RepositoryError>;

    async fn insert_group(&mut self, group: &Group) -> Result<(), RepositoryError>;

    async fn update_group(&mut self, group: &Group) -> Result<(), RepositoryError>;

    /// Insert or update the membership keyed by `(group_id, member_id)`
    async fn save_membership(&mut self, membership: &GroupMembership) -> Result<(), RepositoryError>;

    /// Disable every membership row of the group in one statement.
    /// Returns the number of rows touched.
    async fn disable_memberships(&mut self, group_id: GroupId) -> Result<u64, RepositoryError>;

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Duplicate entity: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt row: {0}")]
    Decode(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            if db.is_unique_violation() {
                return RepositoryError::Conflict(db.message().to_string());
            }
        }
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}
