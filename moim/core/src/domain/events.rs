// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain events emitted by the group lifecycle. Published only after the
//! transaction that produced them has committed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::group::GroupId;
use crate::domain::membership::{GroupRole, MemberId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GroupEvent {
    GroupCreated {
        group_id: GroupId,
        leader_id: MemberId,
        name: String,
        created_at: DateTime<Utc>,
    },
    GroupModified {
        group_id: GroupId,
        modified_by: MemberId,
        modified_at: DateTime<Utc>,
    },
    GroupDeleted {
        group_id: GroupId,
        deleted_by: MemberId,
        memberships_disabled: u64,
        deleted_at: DateTime<Utc>,
    },
    RecruitmentClosed {
        group_id: GroupId,
        forced: bool,
        closed_at: DateTime<Utc>,
    },
    RecruitmentReopened {
        group_id: GroupId,
        reopened_at: DateTime<Utc>,
    },
    MembershipApplied {
        group_id: GroupId,
        member_id: MemberId,
        applied_at: DateTime<Utc>,
    },
    MembershipApproved {
        group_id: GroupId,
        member_id: MemberId,
        approved_by: MemberId,
        approved_at: DateTime<Utc>,
    },
    MembershipRejected {
        group_id: GroupId,
        member_id: MemberId,
        rejected_by: MemberId,
        rejected_at: DateTime<Utc>,
    },
    MembershipRoleChanged {
        group_id: GroupId,
        member_id: MemberId,
        role: GroupRole,
        changed_by: MemberId,
        changed_at: DateTime<Utc>,
    },
    MembershipLeft {
        group_id: GroupId,
        member_id: MemberId,
        left_at: DateTime<Utc>,
    },
}

impl GroupEvent {
    pub fn group_id(&self) -> GroupId {
        match self {
            Self::GroupCreated { group_id, .. }
            | Self::GroupModified { group_id, .. }
            | Self::GroupDeleted { group_id, .. }
            | Self::RecruitmentClosed { group_id, .. }
            | Self::RecruitmentReopened { group_id, .. }
            | Self::MembershipApplied { group_id, .. }
            | Self::MembershipApproved { group_id, .. }
            | Self::MembershipRejected { group_id, .. }
            | Self::MembershipRoleChanged { group_id, .. }
            | Self::MembershipLeft { group_id, .. } => *group_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = GroupEvent::MembershipRoleChanged {
            group_id: GroupId(4),
            member_id: MemberId(9),
            role: GroupRole::Leader,
            changed_by: MemberId(1),
            changed_at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "membership_role_changed");
        assert_eq!(json["group_id"], 4);
        assert_eq!(json["role"], "LEADER");

        let back: GroupEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.group_id(), GroupId(4));
    }
}
