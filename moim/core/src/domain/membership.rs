// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Group membership aggregate and its state machine.
//!
//! ```text
//!            apply                 approve(accept)
//!   (none) ─────────▶ PENDING ───────────────────▶ APPROVED ──leave──▶ LEAVE
//!                       │  ▲                          │                  │
//!        approve(reject)│  └──────── apply ───────────┼──────────────────┘
//!                       ▼                             │
//!                    REJECTED ─────── apply ──────────┘ (back to PENDING)
//! ```
//!
//! Role changes are only legal on an approved membership. The group's last
//! approved leader can neither leave nor be demoted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::capacity;
use crate::domain::error::{GroupError, Transition};
use crate::domain::group::{Group, GroupId};

// ============================================================================
// Value Objects
// ============================================================================

/// Identifier of a member account (owned by the member directory)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId(pub i64);

impl MemberId {
    pub fn new(value: i64) -> Result<Self, GroupError> {
        if value <= 0 {
            return Err(GroupError::InvalidInput(format!(
                "member id must be positive, got {}",
                value
            )));
        }
        Ok(Self(value))
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupRole {
    Leader,
    Participant,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leader => "LEADER",
            Self::Participant => "PARTICIPANT",
        }
    }

    fn toggled(self) -> Self {
        match self {
            Self::Leader => Self::Participant,
            Self::Participant => Self::Leader,
        }
    }
}

impl std::str::FromStr for GroupRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LEADER" => Ok(Self::Leader),
            "PARTICIPANT" => Ok(Self::Participant),
            other => Err(format!("unknown group role '{}'", other)),
        }
    }
}

impl std::fmt::Display for GroupRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipStatus {
    Pending,
    Approved,
    Rejected,
    Leave,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Leave => "LEAVE",
        }
    }

    /// Statuses from which a member may (re)apply
    pub fn can_apply(&self) -> bool {
        matches!(self, Self::Rejected | Self::Leave)
    }

    pub fn can_decide(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl std::str::FromStr for MembershipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            "LEAVE" => Ok(Self::Leave),
            other => Err(format!("unknown membership status '{}'", other)),
        }
    }
}

impl std::fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flat persisted form of a membership
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipRecord {
    pub group_id: GroupId,
    pub member_id: MemberId,
    pub role: GroupRole,
    pub status: MembershipStatus,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Aggregate Root: GroupMembership
// ============================================================================

/// A member's standing in one group, keyed by `(group_id, member_id)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMembership {
    group_id: GroupId,
    member_id: MemberId,
    role: GroupRole,
    status: MembershipStatus,
    disabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupMembership {
    /// First application of a member to a group
    pub fn pending(group_id: GroupId, member_id: MemberId) -> Self {
        Self::with(group_id, member_id, GroupRole::Participant, MembershipStatus::Pending)
    }

    /// Membership of the member who created the group
    pub fn founding_leader(group_id: GroupId, member_id: MemberId) -> Self {
        Self::with(group_id, member_id, GroupRole::Leader, MembershipStatus::Approved)
    }

    fn with(group_id: GroupId, member_id: MemberId, role: GroupRole, status: MembershipStatus) -> Self {
        let now = Utc::now();
        Self {
            group_id,
            member_id,
            role,
            status,
            disabled: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn from_record(record: MembershipRecord) -> Self {
        Self {
            group_id: record.group_id,
            member_id: record.member_id,
            role: record.role,
            status: record.status,
            disabled: record.disabled,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    pub fn to_record(&self) -> MembershipRecord {
        MembershipRecord {
            group_id: self.group_id,
            member_id: self.member_id,
            role: self.role,
            status: self.status,
            disabled: self.disabled,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    // ========================================================================
    // Aggregate Commands (State Mutations)
    // ========================================================================

    /// Re-apply after a rejection or departure. The member comes back as a
    /// participant regardless of the role held before.
    pub fn reapply(&mut self) -> Result<(), GroupError> {
        if !self.status.can_apply() {
            return Err(self.invalid(Transition::Apply));
        }
        self.status = MembershipStatus::Pending;
        self.role = GroupRole::Participant;
        self.touch();
        Ok(())
    }

    /// Accept or reject a pending application.
    ///
    /// `approved` must be the group's approved count read inside the current
    /// transaction. State is checked first, then capacity, then recruitment.
    /// Rejection needs neither capacity nor an open recruitment.
    pub fn decide(&mut self, accept: bool, group: &Group, approved: u64) -> Result<(), GroupError> {
        let action = if accept { Transition::Approve } else { Transition::Reject };
        if !self.status.can_decide() {
            return Err(self.invalid(action));
        }
        if accept {
            if !capacity::can_admit_one(approved, group.max_recruit_count()) {
                return Err(GroupError::CapacityExceeded {
                    group_id: group.id(),
                    approved,
                    max: group.max_recruit_count(),
                });
            }
            group.ensure_recruiting()?;
            self.status = MembershipStatus::Approved;
        } else {
            self.status = MembershipStatus::Rejected;
        }
        self.touch();
        Ok(())
    }

    /// Toggle between leader and participant. `approved_leaders` is the
    /// group's current approved leader count.
    pub fn change_role(&mut self, approved_leaders: u64) -> Result<GroupRole, GroupError> {
        if self.status != MembershipStatus::Approved {
            return Err(self.invalid(Transition::ChangeRole));
        }
        if self.role == GroupRole::Leader && approved_leaders <= 1 {
            return Err(GroupError::SoleLeaderDemotion {
                group_id: self.group_id,
                member_id: self.member_id,
            });
        }
        self.role = self.role.toggled();
        self.touch();
        Ok(self.role)
    }

    pub fn leave(&mut self, approved_leaders: u64) -> Result<(), GroupError> {
        if self.status != MembershipStatus::Approved {
            return Err(self.invalid(Transition::Leave));
        }
        if self.role == GroupRole::Leader && approved_leaders <= 1 {
            return Err(GroupError::UnableToLeave {
                group_id: self.group_id,
                member_id: self.member_id,
            });
        }
        self.status = MembershipStatus::Leave;
        self.touch();
        Ok(())
    }

    /// Soft-delete; used when the owning group is deleted
    pub fn disable(&mut self) {
        self.disabled = true;
        self.touch();
    }

    fn invalid(&self, action: Transition) -> GroupError {
        GroupError::InvalidStateTransition {
            from: self.status,
            action,
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    // ========================================================================
    // Aggregate Queries (State Inspection)
    // ========================================================================

    pub fn group_id(&self) -> GroupId {
        self.group_id
    }

    pub fn member_id(&self) -> MemberId {
        self.member_id
    }

    pub fn role(&self) -> GroupRole {
        self.role
    }

    pub fn status(&self) -> MembershipStatus {
        self.status
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn is_approved_leader(&self) -> bool {
        !self.disabled && self.status == MembershipStatus::Approved && self.role == GroupRole::Leader
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// ============================================================================
// Tests
// ============================================================================
