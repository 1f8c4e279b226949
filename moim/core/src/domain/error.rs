// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain error taxonomy for group and membership operations.
//!
//! Every lifecycle operation returns [`GroupError`]. Each variant carries a
//! stable machine code (see [`GroupError::code`]) so an outer presentation
//! layer can map it to a status and localized message without matching on
//! display strings.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::domain::group::GroupId;
use crate::domain::membership::{MemberId, MembershipStatus};
use crate::domain::repository::RepositoryError;

/// Kind of entity a lookup failed to resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Group,
    Membership,
    Member,
    Category,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Group => "group",
            Self::Membership => "membership",
            Self::Member => "member",
            Self::Category => "category",
        };
        f.write_str(name)
    }
}

/// Membership state machine transition that was attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Apply,
    Approve,
    Reject,
    ChangeRole,
    Leave,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Apply => "apply",
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::ChangeRole => "change role of",
            Self::Leave => "leave",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("{resource} not found: {id}")]
    NotFound { resource: Resource, id: String },

    #[error("member {member_id} is not an approved leader of group {group_id}")]
    PermissionDenied { group_id: GroupId, member_id: MemberId },

    #[error("cannot {action} membership in state {from:?}")]
    InvalidStateTransition {
        from: MembershipStatus,
        action: Transition,
    },

    #[error("group {group_id} is at capacity ({approved}/{max})")]
    CapacityExceeded {
        group_id: GroupId,
        approved: u64,
        max: u32,
    },

    #[error("group {0} is not recruiting")]
    GroupNotRecruiting(GroupId),

    #[error("member {member_id} is the only leader of group {group_id} and cannot leave")]
    UnableToLeave { group_id: GroupId, member_id: MemberId },

    #[error("member {member_id} is the only leader of group {group_id} and cannot be demoted")]
    SoleLeaderDemotion { group_id: GroupId, member_id: MemberId },

    #[error("timed out after {waited:?} waiting for lock '{key}'")]
    LockTimeout { key: String, waited: Duration },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

impl GroupError {
    pub fn not_found(resource: Resource, id: impl fmt::Display) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn group_not_found(id: GroupId) -> Self {
        Self::not_found(Resource::Group, id)
    }

    pub fn membership_not_found(group_id: GroupId, member_id: MemberId) -> Self {
        Self::not_found(Resource::Membership, format!("{}/{}", group_id, member_id))
    }

    /// Only lock contention is worth retrying; every other failure reflects
    /// state that a retry would observe again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { resource, .. } => match resource {
                Resource::Group => "GR001",
                Resource::Membership => "GM001",
                Resource::Member => "MB001",
                Resource::Category => "CT001",
            },
            Self::GroupNotRecruiting(_) => "GR002",
            Self::CapacityExceeded { .. } => "GR003",
            Self::InvalidInput(_) => "GR004",
            Self::PermissionDenied { .. } => "GM002",
            Self::InvalidStateTransition { action, .. } => match action {
                Transition::ChangeRole => "GM004",
                Transition::Leave => "GM005",
                _ => "GM003",
            },
            Self::SoleLeaderDemotion { .. } => "GM004",
            Self::UnableToLeave { .. } => "GM005",
            Self::LockTimeout { .. } => "LK001",
            Self::Storage(_) => "ST001",
        }
    }
}
