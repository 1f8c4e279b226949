// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Read models returned across the service boundary. Plain data; no
//! aggregate or persistence types leak out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::group::{Group, GroupId, GroupRegion, RecruitStatus};
use crate::domain::membership::{GroupMembership, GroupRole, MemberId, MembershipStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupView {
    pub id: GroupId,
    pub name: String,
    pub region: GroupRegion,
    pub description: String,
    pub recruit_status: RecruitStatus,
    pub max_recruit_count: u32,
    pub approved_count: u64,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GroupView {
    pub fn new(group: &Group, approved_count: u64, category: impl Into<String>) -> Self {
        Self {
            id: group.id(),
            name: group.name().to_string(),
            region: group.region().clone(),
            description: group.description().to_string(),
            recruit_status: group.recruit_status(),
            max_recruit_count: group.max_recruit_count(),
            approved_count,
            category: category.into(),
            created_at: group.created_at(),
            updated_at: group.updated_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipView {
    pub group_id: GroupId,
    pub member_id: MemberId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub role: GroupRole,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MembershipView {
    pub fn new(membership: &GroupMembership, display_name: Option<String>) -> Self {
        Self {
            group_id: membership.group_id(),
            member_id: membership.member_id(),
            display_name,
            role: membership.role(),
            status: membership.status(),
            created_at: membership.created_at(),
            updated_at: membership.updated_at(),
        }
    }
}
