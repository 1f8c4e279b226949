// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::capacity;
use crate::domain::directory::CategoryId;
use crate::domain::error::GroupError;

// ============================================================================
// Value Objects
// ============================================================================

/// Unique identifier for a group (positive, allocated by the store)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub i64);

impl GroupId {
    pub fn new(value: i64) -> Result<Self, GroupError> {
        if value <= 0 {
            return Err(GroupError::InvalidInput(format!(
                "group id must be positive, got {}",
                value
            )));
        }
        Ok(Self(value))
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Three-level administrative region a group meets in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRegion {
    pub province: String,
    pub city: String,
    pub town: String,
}

impl GroupRegion {
    pub fn new(
        province: impl Into<String>,
        city: impl Into<String>,
        town: impl Into<String>,
    ) -> Self {
        Self {
            province: province.into(),
            city: city.into(),
            town: town.into(),
        }
    }
}

impl std::fmt::Display for GroupRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.province, self.city, self.town)
    }
}

/// Recruitment status of a group
///
/// A closed group remembers whether a leader closed it explicitly (`forced`)
/// or whether it closed because the approved count reached capacity. Only an
/// automatic closure is lifted when a member leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RecruitStatus {
    Recruiting,
    Closed { forced: bool },
}

impl RecruitStatus {
    pub fn is_recruiting(&self) -> bool {
        matches!(self, Self::Recruiting)
    }

    pub fn is_forced_closed(&self) -> bool {
        matches!(self, Self::Closed { forced: true })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recruiting => "RECRUITING",
            Self::Closed { .. } => "CLOSED",
        }
    }
}

impl std::fmt::Display for RecruitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Recruiting => f.write_str("RECRUITING"),
            Self::Closed { forced: true } => f.write_str("CLOSED (by leader)"),
            Self::Closed { forced: false } => f.write_str("CLOSED (full)"),
        }
    }
}

/// Recruitment status a leader may request through a group edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecruitRequest {
    Recruiting,
    Closed,
}

impl std::str::FromStr for RecruitRequest {
    type Err = GroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RECRUITING" => Ok(Self::Recruiting),
            "CLOSED" => Ok(Self::Closed),
            other => Err(GroupError::InvalidInput(format!(
                "unknown recruit status '{}'",
                other
            ))),
        }
    }
}

/// Largest capacity a group may declare; capacities are stored as INTEGER
pub const MAX_RECRUIT_COUNT_LIMIT: u32 = i32::MAX as u32;

fn check_max_recruit_count(max: u32) -> Result<(), GroupError> {
    if max == 0 {
        return Err(GroupError::InvalidInput(
            "max recruit count must be at least 1".to_string(),
        ));
    }
    if max > MAX_RECRUIT_COUNT_LIMIT {
        return Err(GroupError::InvalidInput(format!(
            "max recruit count must be at most {}, got {}",
            MAX_RECRUIT_COUNT_LIMIT, max
        )));
    }
    Ok(())
}

/// Input for creating a group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGroup {
    pub name: String,
    pub region: GroupRegion,
    pub description: String,
    pub max_recruit_count: u32,
    pub category_name: String,
}

impl NewGroup {
    pub fn validate(&self) -> Result<(), GroupError> {
        if self.name.trim().is_empty() {
            return Err(GroupError::InvalidInput("group name cannot be empty".to_string()));
        }
        if self.category_name.trim().is_empty() {
            return Err(GroupError::InvalidInput("category name cannot be empty".to_string()));
        }
        check_max_recruit_count(self.max_recruit_count)
    }
}

/// Edit payload for an existing group
///
/// `None` and blank strings leave the current value untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub town: Option<String>,
    pub description: Option<String>,
    pub recruit_status: Option<RecruitRequest>,
    pub max_recruit_count: Option<u32>,
    pub category_name: Option<String>,
}

/// Flat persisted form of a group, used by storage adapters to rehydrate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub id: GroupId,
    pub name: String,
    pub region: GroupRegion,
    pub description: String,
    pub recruit_status: RecruitStatus,
    pub max_recruit_count: u32,
    pub category_id: CategoryId,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Aggregate Root: Group
// ============================================================================

/// Group aggregate root
///
/// Fields are private; recruitment and lifecycle changes go through the
/// guarded commands below so capacity and status can never disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    id: GroupId,
    name: String,
    region: GroupRegion,
    description: String,
    recruit_status: RecruitStatus,
    max_recruit_count: u32,
    category_id: CategoryId,
    disabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Group {
    /// Create a new recruiting group with a pre-allocated id
    pub fn new(id: GroupId, spec: NewGroup, category_id: CategoryId) -> Result<Self, GroupError> {
        spec.validate()?;
        let now = Utc::now();
        Ok(Self {
            id,
            name: spec.name.trim().to_string(),
            region: spec.region,
            description: spec.description,
            recruit_status: RecruitStatus::Recruiting,
            max_recruit_count: spec.max_recruit_count,
            category_id,
            disabled: false,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn from_record(record: GroupRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            region: record.region,
            description: record.description,
            recruit_status: record.recruit_status,
            max_recruit_count: record.max_recruit_count,
            category_id: record.category_id,
            disabled: record.disabled,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    pub fn to_record(&self) -> GroupRecord {
        GroupRecord {
            id: self.id,
            name: self.name.clone(),
            region: self.region.clone(),
            description: self.description.clone(),
            recruit_status: self.recruit_status,
            max_recruit_count: self.max_recruit_count,
            category_id: self.category_id,
            disabled: self.disabled,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    // ========================================================================
    // Aggregate Commands (State Mutations)
    // ========================================================================

    /// Close recruitment once `approved` has reached capacity.
    /// Returns true if the status changed.
    pub fn close_if_full(&mut self, approved: u64) -> bool {
        if self.recruit_status.is_recruiting()
            && capacity::is_full(approved, self.max_recruit_count)
        {
            self.recruit_status = RecruitStatus::Closed { forced: false };
            self.touch();
            return true;
        }
        false
    }

    /// Reopen an automatically closed group when a seat has been freed.
    /// A leader's explicit closure is left alone. Returns true if the status changed.
    pub fn reopen_if_room(&mut self, approved: u64) -> bool {
        if self.recruit_status == (RecruitStatus::Closed { forced: false })
            && capacity::can_admit_one(approved, self.max_recruit_count)
        {
            self.recruit_status = RecruitStatus::Recruiting;
            self.touch();
            return true;
        }
        false
    }

    /// Fail unless the group currently accepts new members
    pub fn ensure_recruiting(&self) -> Result<(), GroupError> {
        if !self.recruit_status.is_recruiting() {
            return Err(GroupError::GroupNotRecruiting(self.id));
        }
        Ok(())
    }

    /// Apply a leader's edit. `category_id` is the already-resolved category
    /// for `update.category_name`, if one was given. Nothing is mutated when
    /// the new capacity would fall below the current approved count.
    pub fn apply_update(
        &mut self,
        update: &GroupUpdate,
        category_id: Option<CategoryId>,
        approved: u64,
    ) -> Result<(), GroupError> {
        let max = update.max_recruit_count.unwrap_or(self.max_recruit_count);
        check_max_recruit_count(max)?;
        if !capacity::can_lower_capacity_to(approved, max) {
            return Err(GroupError::CapacityExceeded {
                group_id: self.id,
                approved,
                max,
            });
        }

        if let Some(name) = non_blank(&update.name) {
            self.name = name.to_string();
        }
        if let Some(province) = non_blank(&update.province) {
            self.region.province = province.to_string();
        }
        if let Some(city) = non_blank(&update.city) {
            self.region.city = city.to_string();
        }
        if let Some(town) = non_blank(&update.town) {
            self.region.town = town.to_string();
        }
        if let Some(description) = non_blank(&update.description) {
            self.description = description.to_string();
        }
        if let Some(category_id) = category_id {
            self.category_id = category_id;
        }
        self.max_recruit_count = max;

        match update.recruit_status {
            Some(RecruitRequest::Closed) => {
                self.recruit_status = RecruitStatus::Closed { forced: true };
            }
            Some(RecruitRequest::Recruiting) => {
                self.recruit_status = RecruitStatus::Recruiting;
            }
            None => {
                // A capacity raise lifts an automatic closure.
                if self.recruit_status == (RecruitStatus::Closed { forced: false }) {
                    self.recruit_status = RecruitStatus::Recruiting;
                }
            }
        }
        if self.recruit_status.is_recruiting()
            && capacity::is_full(approved, self.max_recruit_count)
        {
            self.recruit_status = RecruitStatus::Closed { forced: false };
        }

        self.touch();
        Ok(())
    }

    /// Soft-delete the group
    pub fn deactivate(&mut self) {
        self.disabled = true;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    // ========================================================================
    // Aggregate Queries (State Inspection)
    // ========================================================================

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region(&self) -> &GroupRegion {
        &self.region
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn recruit_status(&self) -> RecruitStatus {
        self.recruit_status
    }

    pub fn max_recruit_count(&self) -> u32 {
        self.max_recruit_count
    }

    pub fn category_id(&self) -> CategoryId {
        self.category_id
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(max: u32) -> NewGroup {
        NewGroup {
            name: "Sunday hikers".to_string(),
            region: GroupRegion::new("Seoul", "Gangnam-gu", "Yeoksam-dong"),
            description: "Weekly trail walks".to_string(),
            max_recruit_count: max,
            category_name: "Outdoors".to_string(),
        }
    }

    fn group(max: u32) -> Group {
        Group::new(GroupId(1), spec(max), CategoryId(1)).unwrap()
    }

    #[test]
    fn test_group_id_must_be_positive() {
        assert!(GroupId::new(0).is_err());
        assert!(GroupId::new(-4).is_err());
        assert_eq!(GroupId::new(7).unwrap(), GroupId(7));
    }

    #[test]
    fn test_new_group_validation() {
        let mut blank = spec(5);
        blank.name = "   ".to_string();
        assert!(matches!(
            Group::new(GroupId(1), blank, CategoryId(1)),
            Err(GroupError::InvalidInput(_))
        ));
        assert!(Group::new(GroupId(1), spec(0), CategoryId(1)).is_err());
    }

    #[test]
    fn test_capacity_above_storable_limit_is_invalid_input() {
        assert!(matches!(
            Group::new(GroupId(1), spec(u32::MAX), CategoryId(1)),
            Err(GroupError::InvalidInput(_))
        ));
        Group::new(GroupId(1), spec(MAX_RECRUIT_COUNT_LIMIT), CategoryId(1)).unwrap();

        let mut group = group(5);
        let update = GroupUpdate {
            max_recruit_count: Some(MAX_RECRUIT_COUNT_LIMIT + 1),
            ..Default::default()
        };
        assert!(matches!(
            group.apply_update(&update, None, 1),
            Err(GroupError::InvalidInput(_))
        ));
        assert_eq!(group.max_recruit_count(), 5);
    }

    #[test]
    fn test_new_group_is_recruiting() {
        let group = group(5);
        assert!(group.recruit_status().is_recruiting());
        assert!(!group.is_disabled());
        assert_eq!(group.max_recruit_count(), 5);
    }

    #[test]
    fn test_close_if_full() {
        let mut group = group(2);
        assert!(!group.close_if_full(1));
        assert!(group.close_if_full(2));
        assert_eq!(group.recruit_status(), RecruitStatus::Closed { forced: false });
        assert!(!group.close_if_full(2));
    }

    #[test]
    fn test_reopen_only_after_automatic_close() {
        let mut group = group(2);
        group.close_if_full(2);
        assert!(!group.reopen_if_room(2));
        assert!(group.reopen_if_room(1));
        assert!(group.recruit_status().is_recruiting());

        let update = GroupUpdate {
            recruit_status: Some(RecruitRequest::Closed),
            ..Default::default()
        };
        group.apply_update(&update, None, 1).unwrap();
        assert!(group.recruit_status().is_forced_closed());
        assert!(!group.reopen_if_room(0));
    }

    #[test]
    fn test_update_skips_blank_values() {
        let mut group = group(5);
        let update = GroupUpdate {
            name: Some("  ".to_string()),
            city: Some("Mapo-gu".to_string()),
            description: None,
            ..Default::default()
        };
        group.apply_update(&update, None, 1).unwrap();
        assert_eq!(group.name(), "Sunday hikers");
        assert_eq!(group.region().city, "Mapo-gu");
        assert_eq!(group.description(), "Weekly trail walks");
    }

    #[test]
    fn test_update_rejects_capacity_below_approved() {
        let mut group = group(5);
        let update = GroupUpdate {
            name: Some("Renamed".to_string()),
            max_recruit_count: Some(2),
            ..Default::default()
        };
        let err = group.apply_update(&update, None, 3).unwrap_err();
        assert!(matches!(err, GroupError::CapacityExceeded { approved: 3, max: 2, .. }));
        assert_eq!(group.name(), "Sunday hikers");
        assert_eq!(group.max_recruit_count(), 5);
    }

    #[test]
    fn test_update_to_recruiting_when_full_closes_automatically() {
        let mut group = group(5);
        let update = GroupUpdate {
            max_recruit_count: Some(3),
            recruit_status: Some(RecruitRequest::Recruiting),
            ..Default::default()
        };
        group.apply_update(&update, None, 3).unwrap();
        assert_eq!(group.recruit_status(), RecruitStatus::Closed { forced: false });
    }

    #[test]
    fn test_capacity_raise_lifts_automatic_close() {
        let mut group = group(2);
        group.close_if_full(2);
        let update = GroupUpdate {
            max_recruit_count: Some(4),
            ..Default::default()
        };
        group.apply_update(&update, None, 2).unwrap();
        assert!(group.recruit_status().is_recruiting());
    }

    #[test]
    fn test_recruit_request_parse() {
        assert_eq!("closed".parse::<RecruitRequest>().unwrap(), RecruitRequest::Closed);
        assert_eq!(" Recruiting ".parse::<RecruitRequest>().unwrap(), RecruitRequest::Recruiting);
        assert!("open".parse::<RecruitRequest>().is_err());
    }

    #[test]
    fn test_record_roundtrip_preserves_state() {
        let mut group = group(3);
        group.deactivate();
        let restored = Group::from_record(group.to_record());
        assert_eq!(restored, group);
        assert!(restored.is_disabled());
    }
}
