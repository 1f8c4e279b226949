// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Group Lifecycle Application Service
//!
//! Orchestrates every write to groups and memberships:
//! - Lock coordinator: one `group:{id}` lock around each operation
//! - Group store: one transaction per operation, fresh reads inside the lock
//! - Domain layer: `Group` / `GroupMembership` commands and the capacity guard
//! - Event bus: `GroupEvent`s published after commit
//!
//! Any failure inside the lock rolls the transaction back, so a rejected
//! operation leaves no partial state and publishes nothing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::application::views::{GroupView, MembershipView};
use crate::domain::directory::{CategoryDirectory, CategoryId, MemberDirectory};
use crate::domain::error::{GroupError, Resource};
use crate::domain::events::GroupEvent;
use crate::domain::group::{Group, GroupId, GroupUpdate, NewGroup, RecruitStatus};
use crate::domain::lock::{with_lock, LockCoordinator, LockKey};
use crate::domain::membership::{GroupMembership, GroupRole, MemberId, MembershipStatus};
use crate::domain::repository::{GroupStore, GroupTransaction};
use crate::infrastructure::event_bus::EventBus;

// ============================================================================
// Service Trait
// ============================================================================

#[async_trait]
pub trait GroupLifecycleService: Send + Sync {
    /// Create a group led by `creator_id`
    async fn create_group(&self, creator_id: MemberId, spec: NewGroup) -> Result<GroupId, GroupError>;

    /// Submit (or resubmit) a join request
    async fn apply_for_membership(
        &self,
        group_id: GroupId,
        member_id: MemberId,
    ) -> Result<MembershipView, GroupError>;

    /// Accept or reject a pending join request. Returns whether the
    /// applicant was accepted.
    async fn approve_joining(
        &self,
        leader_id: MemberId,
        group_id: GroupId,
        applicant_id: MemberId,
        accept: bool,
    ) -> Result<bool, GroupError>;

    /// Toggle an approved member between leader and participant
    async fn modify_group_role(
        &self,
        leader_id: MemberId,
        group_id: GroupId,
        target_id: MemberId,
    ) -> Result<bool, GroupError>;

    async fn leave_group(&self, group_id: GroupId, member_id: MemberId) -> Result<bool, GroupError>;

    async fn modify_group(
        &self,
        group_id: GroupId,
        leader_id: MemberId,
        update: GroupUpdate,
    ) -> Result<GroupView, GroupError>;

    /// Soft-delete the group and all its memberships. Returns the group's
    /// final disabled flag.
    async fn delete_group(&self, group_id: GroupId, leader_id: MemberId) -> Result<bool, GroupError>;

    async fn get_group(&self, group_id: GroupId) -> Result<GroupView, GroupError>;

    async fn get_membership(
        &self,
        group_id: GroupId,
        member_id: MemberId,
    ) -> Result<MembershipView, GroupError>;
}

// ============================================================================
// Standard Implementation
// ============================================================================

type Outcome<T> = Result<(T, Vec<GroupEvent>), GroupError>;

pub struct StandardGroupLifecycleService {
    store: Arc<dyn GroupStore>,
    members: Arc<dyn MemberDirectory>,
    categories: Arc<dyn CategoryDirectory>,
    locks: Arc<dyn LockCoordinator>,
    event_bus: Arc<EventBus>,
}

impl StandardGroupLifecycleService {
    pub fn new(
        store: Arc<dyn GroupStore>,
        members: Arc<dyn MemberDirectory>,
        categories: Arc<dyn CategoryDirectory>,
        locks: Arc<dyn LockCoordinator>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            members,
            categories,
            locks,
            event_bus,
        }
    }

    /// Record the outcome and publish events of a committed operation
    fn complete<T>(&self, operation: &'static str, outcome: Outcome<T>) -> Result<T, GroupError> {
        match outcome {
            Ok((value, events)) => {
                metrics::counter!(
                    "moim_group_operations_total",
                    "operation" => operation,
                    "outcome" => "ok"
                )
                .increment(1);
                self.event_bus.publish_all(events);
                Ok(value)
            }
            Err(err) => {
                metrics::counter!(
                    "moim_group_operations_total",
                    "operation" => operation,
                    "outcome" => err.code()
                )
                .increment(1);
                if err.is_retryable() {
                    warn!("{} could not acquire its lock: {}", operation, err);
                } else {
                    debug!("{} rejected [{}]: {}", operation, err.code(), err);
                }
                Err(err)
            }
        }
    }

    async fn category_name(&self, id: CategoryId) -> Result<String, GroupError> {
        Ok(self
            .categories
            .find_by_id(id)
            .await?
            .map(|c| c.name)
            .unwrap_or_default())
    }

    // ------------------------------------------------------------------------
    // Transaction bodies (run inside the group lock)
    // ------------------------------------------------------------------------

    async fn create_in(
        &self,
        tx: &mut dyn GroupTransaction,
        group_id: GroupId,
        creator_id: MemberId,
        spec: NewGroup,
        category_id: CategoryId,
    ) -> Outcome<GroupId> {
        let mut group = Group::new(group_id, spec, category_id)?;
        tx.insert_group(&group).await?;
        tx.save_membership(&GroupMembership::founding_leader(group_id, creator_id))
            .await?;

        let mut events = vec![GroupEvent::GroupCreated {
            group_id,
            leader_id: creator_id,
            name: group.name().to_string(),
            created_at: group.created_at(),
        }];

        let approved = tx.count_by_status(group_id, MembershipStatus::Approved).await?;
        if group.close_if_full(approved) {
            tx.update_group(&group).await?;
            events.push(GroupEvent::RecruitmentClosed {
                group_id,
                forced: false,
                closed_at: Utc::now(),
            });
        }
        Ok((group_id, events))
    }

    async fn apply_in(
        &self,
        tx: &mut dyn GroupTransaction,
        group_id: GroupId,
        member_id: MemberId,
        display_name: String,
    ) -> Outcome<MembershipView> {
        let group = require_group(tx, group_id).await?;
        group.ensure_recruiting()?;

        let membership = match tx.find_membership(group_id, member_id).await? {
            None => GroupMembership::pending(group_id, member_id),
            Some(mut existing) => {
                existing.reapply()?;
                existing
            }
        };
        tx.save_membership(&membership).await?;

        let view = MembershipView::new(&membership, Some(display_name));
        let events = vec![GroupEvent::MembershipApplied {
            group_id,
            member_id,
            applied_at: membership.updated_at(),
        }];
        Ok((view, events))
    }

    async fn decide_in(
        &self,
        tx: &mut dyn GroupTransaction,
        leader_id: MemberId,
        group_id: GroupId,
        applicant_id: MemberId,
        accept: bool,
    ) -> Outcome<bool> {
        let mut group = require_group(tx, group_id).await?;
        require_leader(tx, group_id, leader_id).await?;
        let mut applicant = tx
            .find_membership(group_id, applicant_id)
            .await?
            .ok_or_else(|| GroupError::membership_not_found(group_id, applicant_id))?;

        let approved = tx.count_by_status(group_id, MembershipStatus::Approved).await?;
        applicant.decide(accept, &group, approved)?;
        tx.save_membership(&applicant).await?;

        let now = Utc::now();
        let mut events = Vec::new();
        if accept {
            events.push(GroupEvent::MembershipApproved {
                group_id,
                member_id: applicant_id,
                approved_by: leader_id,
                approved_at: now,
            });
            let approved = tx.count_by_status(group_id, MembershipStatus::Approved).await?;
            if group.close_if_full(approved) {
                info!("Group {} reached capacity ({}), closing recruitment", group_id, approved);
                tx.update_group(&group).await?;
                events.push(GroupEvent::RecruitmentClosed {
                    group_id,
                    forced: false,
                    closed_at: now,
                });
            }
        } else {
            events.push(GroupEvent::MembershipRejected {
                group_id,
                member_id: applicant_id,
                rejected_by: leader_id,
                rejected_at: now,
            });
        }
        Ok((accept, events))
    }

    async fn change_role_in(
        &self,
        tx: &mut dyn GroupTransaction,
        leader_id: MemberId,
        group_id: GroupId,
        target_id: MemberId,
    ) -> Outcome<bool> {
        require_group(tx, group_id).await?;
        require_leader(tx, group_id, leader_id).await?;
        let mut target = tx
            .find_membership(group_id, target_id)
            .await?
            .ok_or_else(|| GroupError::membership_not_found(group_id, target_id))?;

        let leaders = tx
            .count_by_role(group_id, GroupRole::Leader, MembershipStatus::Approved)
            .await?;
        let role = target.change_role(leaders)?;
        tx.save_membership(&target).await?;

        let events = vec![GroupEvent::MembershipRoleChanged {
            group_id,
            member_id: target_id,
            role,
            changed_by: leader_id,
            changed_at: target.updated_at(),
        }];
        Ok((true, events))
    }

    async fn leave_in(
        &self,
        tx: &mut dyn GroupTransaction,
        group_id: GroupId,
        member_id: MemberId,
    ) -> Outcome<bool> {
        let mut group = require_group(tx, group_id).await?;
        let mut membership = tx
            .find_membership(group_id, member_id)
            .await?
            .ok_or_else(|| GroupError::membership_not_found(group_id, member_id))?;

        let leaders = tx
            .count_by_role(group_id, GroupRole::Leader, MembershipStatus::Approved)
            .await?;
        membership.leave(leaders)?;
        tx.save_membership(&membership).await?;

        let now = Utc::now();
        let mut events = vec![GroupEvent::MembershipLeft {
            group_id,
            member_id,
            left_at: now,
        }];

        let approved = tx.count_by_status(group_id, MembershipStatus::Approved).await?;
        if group.reopen_if_room(approved) {
            info!("Seat freed in group {}, reopening recruitment", group_id);
            tx.update_group(&group).await?;
            events.push(GroupEvent::RecruitmentReopened {
                group_id,
                reopened_at: now,
            });
        }
        Ok((true, events))
    }

    async fn modify_in(
        &self,
        tx: &mut dyn GroupTransaction,
        group_id: GroupId,
        leader_id: MemberId,
        update: GroupUpdate,
    ) -> Outcome<GroupView> {
        let mut group = require_group(tx, group_id).await?;
        require_leader(tx, group_id, leader_id).await?;

        let category = match update.category_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Some(
                self.categories
                    .find_by_name(name)
                    .await?
                    .ok_or_else(|| GroupError::not_found(Resource::Category, name))?,
            ),
            _ => None,
        };

        let approved = tx.count_by_status(group_id, MembershipStatus::Approved).await?;
        let before = group.recruit_status();
        group.apply_update(&update, category.as_ref().map(|c| c.id), approved)?;
        tx.update_group(&group).await?;

        let now = Utc::now();
        let mut events = vec![GroupEvent::GroupModified {
            group_id,
            modified_by: leader_id,
            modified_at: now,
        }];
        let after = group.recruit_status();
        if before != after {
            events.push(match after {
                RecruitStatus::Recruiting => GroupEvent::RecruitmentReopened {
                    group_id,
                    reopened_at: now,
                },
                RecruitStatus::Closed { forced } => GroupEvent::RecruitmentClosed {
                    group_id,
                    forced,
                    closed_at: now,
                },
            });
        }

        let category_name = match category {
            Some(category) => category.name,
            None => self.category_name(group.category_id()).await?,
        };
        Ok((GroupView::new(&group, approved, category_name), events))
    }

    async fn delete_in(
        &self,
        tx: &mut dyn GroupTransaction,
        group_id: GroupId,
        leader_id: MemberId,
    ) -> Outcome<bool> {
        let mut group = require_group(tx, group_id).await?;
        require_leader(tx, group_id, leader_id).await?;

        group.deactivate();
        tx.update_group(&group).await?;
        let disabled = tx.disable_memberships(group_id).await?;
        info!("Disabled {} memberships of group {}", disabled, group_id);

        let events = vec![GroupEvent::GroupDeleted {
            group_id,
            deleted_by: leader_id,
            memberships_disabled: disabled,
            deleted_at: group.updated_at(),
        }];
        Ok((group.is_disabled(), events))
    }
}

/// Commit on success, roll back on failure
async fn finish<T>(
    tx: Box<dyn GroupTransaction>,
    result: Result<T, GroupError>,
) -> Result<T, GroupError> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!("Rollback failed after '{}': {}", err, rollback_err);
            }
            Err(err)
        }
    }
}

async fn require_group(tx: &mut dyn GroupTransaction, group_id: GroupId) -> Result<Group, GroupError> {
    tx.find_group(group_id)
        .await?
        .ok_or_else(|| GroupError::group_not_found(group_id))
}

async fn require_leader(
    tx: &mut dyn GroupTransaction,
    group_id: GroupId,
    member_id: MemberId,
) -> Result<GroupMembership, GroupError> {
    match tx.find_membership(group_id, member_id).await? {
        Some(membership) if membership.is_approved_leader() => Ok(membership),
        _ => Err(GroupError::PermissionDenied { group_id, member_id }),
    }
}

#[async_trait]
impl GroupLifecycleService for StandardGroupLifecycleService {
    async fn create_group(&self, creator_id: MemberId, spec: NewGroup) -> Result<GroupId, GroupError> {
        info!("Creating group '{}' for member {}", spec.name, creator_id);

        let outcome: Outcome<GroupId> = async {
            spec.validate()?;
            if self.members.find_member(creator_id).await?.is_none() {
                return Err(GroupError::not_found(Resource::Member, creator_id));
            }
            let category = self
                .categories
                .find_by_name(spec.category_name.trim())
                .await?
                .ok_or_else(|| GroupError::not_found(Resource::Category, &spec.category_name))?;
            let group_id = self.store.allocate_group_id().await?;

            with_lock(self.locks.as_ref(), LockKey::group(group_id), || async move {
                let mut tx = self.store.begin().await?;
                let result = self
                    .create_in(tx.as_mut(), group_id, creator_id, spec, category.id)
                    .await;
                finish(tx, result).await
            })
            .await
        }
        .await;

        let group_id = self.complete("create_group", outcome)?;
        info!("Group {} created", group_id);
        Ok(group_id)
    }

    async fn apply_for_membership(
        &self,
        group_id: GroupId,
        member_id: MemberId,
    ) -> Result<MembershipView, GroupError> {
        info!("Member {} applying to group {}", member_id, group_id);

        let outcome: Outcome<MembershipView> = async {
            let member = self
                .members
                .find_member(member_id)
                .await?
                .ok_or_else(|| GroupError::not_found(Resource::Member, member_id))?;

            with_lock(self.locks.as_ref(), LockKey::group(group_id), || async move {
                let mut tx = self.store.begin().await?;
                let result = self
                    .apply_in(tx.as_mut(), group_id, member_id, member.display_name)
                    .await;
                finish(tx, result).await
            })
            .await
        }
        .await;

        self.complete("apply_for_membership", outcome)
    }

    async fn approve_joining(
        &self,
        leader_id: MemberId,
        group_id: GroupId,
        applicant_id: MemberId,
        accept: bool,
    ) -> Result<bool, GroupError> {
        info!(
            "Leader {} {} member {} in group {}",
            leader_id,
            if accept { "approving" } else { "rejecting" },
            applicant_id,
            group_id
        );

        let outcome = with_lock(self.locks.as_ref(), LockKey::group(group_id), || async move {
            let mut tx = self.store.begin().await?;
            let result = self
                .decide_in(tx.as_mut(), leader_id, group_id, applicant_id, accept)
                .await;
            finish(tx, result).await
        })
        .await;

        self.complete("approve_joining", outcome)
    }

    async fn modify_group_role(
        &self,
        leader_id: MemberId,
        group_id: GroupId,
        target_id: MemberId,
    ) -> Result<bool, GroupError> {
        info!(
            "Leader {} changing role of member {} in group {}",
            leader_id, target_id, group_id
        );

        let outcome = with_lock(self.locks.as_ref(), LockKey::group(group_id), || async move {
            let mut tx = self.store.begin().await?;
            let result = self
                .change_role_in(tx.as_mut(), leader_id, group_id, target_id)
                .await;
            finish(tx, result).await
        })
        .await;

        self.complete("modify_group_role", outcome)
    }

    async fn leave_group(&self, group_id: GroupId, member_id: MemberId) -> Result<bool, GroupError> {
        info!("Member {} leaving group {}", member_id, group_id);

        let outcome = with_lock(self.locks.as_ref(), LockKey::group(group_id), || async move {
            let mut tx = self.store.begin().await?;
            let result = self.leave_in(tx.as_mut(), group_id, member_id).await;
            finish(tx, result).await
        })
        .await;

        self.complete("leave_group", outcome)
    }

    async fn modify_group(
        &self,
        group_id: GroupId,
        leader_id: MemberId,
        update: GroupUpdate,
    ) -> Result<GroupView, GroupError> {
        info!("Leader {} modifying group {}", leader_id, group_id);

        let outcome = with_lock(self.locks.as_ref(), LockKey::group(group_id), || async move {
            let mut tx = self.store.begin().await?;
            let result = self.modify_in(tx.as_mut(), group_id, leader_id, update).await;
            finish(tx, result).await
        })
        .await;

        self.complete("modify_group", outcome)
    }

    async fn delete_group(&self, group_id: GroupId, leader_id: MemberId) -> Result<bool, GroupError> {
        info!("Leader {} deleting group {}", leader_id, group_id);

        let outcome = with_lock(self.locks.as_ref(), LockKey::group(group_id), || async move {
            let mut tx = self.store.begin().await?;
            let result = self.delete_in(tx.as_mut(), group_id, leader_id).await;
            finish(tx, result).await
        })
        .await;

        self.complete("delete_group", outcome)
    }

    async fn get_group(&self, group_id: GroupId) -> Result<GroupView, GroupError> {
        let (group, approved) = self
            .store
            .find_group_with_approved_count(group_id)
            .await?
            .ok_or_else(|| GroupError::group_not_found(group_id))?;
        let category = self.category_name(group.category_id()).await?;
        Ok(GroupView::new(&group, approved, category))
    }

    async fn get_membership(
        &self,
        group_id: GroupId,
        member_id: MemberId,
    ) -> Result<MembershipView, GroupError> {
        let membership = self
            .store
            .find_membership(group_id, member_id)
            .await?
            .ok_or_else(|| GroupError::membership_not_found(group_id, member_id))?;
        let display_name = self
            .members
            .find_member(member_id)
            .await?
            .map(|m| m.display_name);
        Ok(MembershipView::new(&membership, display_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::Transition;
    use crate::domain::group::{GroupRegion, RecruitRequest};
    use crate::infrastructure::locks::InProcessLockCoordinator;
    use crate::infrastructure::repositories::{
        InMemoryCategoryDirectory, InMemoryGroupStore, InMemoryMemberDirectory,
    };
    use std::time::Duration;

    const LEADER: MemberId = MemberId(1);

    struct Fixture {
        service: StandardGroupLifecycleService,
        store: InMemoryGroupStore,
        members: InMemoryMemberDirectory,
        event_bus: Arc<EventBus>,
    }

    fn create_test_service() -> Fixture {
        let store = InMemoryGroupStore::new();
        let members = InMemoryMemberDirectory::new();
        for id in 1..=10 {
            members.register(MemberId(id), format!("member-{}", id));
        }
        let categories = InMemoryCategoryDirectory::new();
        categories.register("Outdoors");
        categories.register("Books");
        let event_bus = Arc::new(EventBus::new(100));
        let service = StandardGroupLifecycleService::new(
            Arc::new(store.clone()),
            Arc::new(members.clone()),
            Arc::new(categories),
            Arc::new(InProcessLockCoordinator::new(Duration::from_secs(1))),
            event_bus.clone(),
        );
        Fixture {
            service,
            store,
            members,
            event_bus,
        }
    }

    fn new_group(max: u32) -> NewGroup {
        NewGroup {
            name: "Han river runners".to_string(),
            region: GroupRegion::new("Seoul", "Yeongdeungpo-gu", "Yeouido-dong"),
            description: "5k every Saturday".to_string(),
            max_recruit_count: max,
            category_name: "Outdoors".to_string(),
        }
    }

    async fn group_with_pending(fx: &Fixture, max: u32, applicants: &[i64]) -> GroupId {
        let group_id = fx.service.create_group(LEADER, new_group(max)).await.unwrap();
        for &applicant in applicants {
            fx.service
                .apply_for_membership(group_id, MemberId(applicant))
                .await
                .unwrap();
        }
        group_id
    }

    #[tokio::test]
    async fn test_create_group() {
        let fx = create_test_service();
        let group_id = fx.service.create_group(LEADER, new_group(5)).await.unwrap();

        let view = fx.service.get_group(group_id).await.unwrap();
        assert_eq!(view.name, "Han river runners");
        assert_eq!(view.category, "Outdoors");
        assert_eq!(view.approved_count, 1);
        assert!(view.recruit_status.is_recruiting());

        let leader = fx.service.get_membership(group_id, LEADER).await.unwrap();
        assert_eq!(leader.role, GroupRole::Leader);
        assert_eq!(leader.status, MembershipStatus::Approved);
        assert_eq!(leader.display_name.as_deref(), Some("member-1"));
    }

    #[tokio::test]
    async fn test_create_group_of_one_is_closed() {
        let fx = create_test_service();
        let group_id = fx.service.create_group(LEADER, new_group(1)).await.unwrap();
        let view = fx.service.get_group(group_id).await.unwrap();
        assert_eq!(view.recruit_status, RecruitStatus::Closed { forced: false });
    }

    #[tokio::test]
    async fn test_create_group_requires_member_and_category() {
        let fx = create_test_service();
        let err = fx.service.create_group(MemberId(99), new_group(5)).await.unwrap_err();
        assert!(matches!(err, GroupError::NotFound { resource: Resource::Member, .. }));

        let mut spec = new_group(5);
        spec.category_name = "Cooking".to_string();
        let err = fx.service.create_group(LEADER, spec).await.unwrap_err();
        assert!(matches!(err, GroupError::NotFound { resource: Resource::Category, .. }));

        let err = fx.service.create_group(LEADER, new_group(0)).await.unwrap_err();
        assert!(matches!(err, GroupError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_apply_and_reapply() {
        let fx = create_test_service();
        let group_id = group_with_pending(&fx, 5, &[2]).await;

        let err = fx
            .service
            .apply_for_membership(group_id, MemberId(2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GroupError::InvalidStateTransition { from: MembershipStatus::Pending, action: Transition::Apply }
        ));

        fx.service
            .approve_joining(LEADER, group_id, MemberId(2), false)
            .await
            .unwrap();
        let view = fx
            .service
            .apply_for_membership(group_id, MemberId(2))
            .await
            .unwrap();
        assert_eq!(view.status, MembershipStatus::Pending);
    }

    #[tokio::test]
    async fn test_apply_unknown_member_or_group() {
        let fx = create_test_service();
        let group_id = group_with_pending(&fx, 5, &[]).await;
        assert!(matches!(
            fx.service.apply_for_membership(group_id, MemberId(77)).await,
            Err(GroupError::NotFound { resource: Resource::Member, .. })
        ));
        assert!(matches!(
            fx.service.apply_for_membership(GroupId(999), MemberId(2)).await,
            Err(GroupError::NotFound { resource: Resource::Group, .. })
        ));
    }

    #[tokio::test]
    async fn test_approve_closes_group_at_capacity() {
        let fx = create_test_service();
        let group_id = group_with_pending(&fx, 2, &[2, 3]).await;

        assert!(fx
            .service
            .approve_joining(LEADER, group_id, MemberId(2), true)
            .await
            .unwrap());
        let view = fx.service.get_group(group_id).await.unwrap();
        assert_eq!(view.approved_count, 2);
        assert_eq!(view.recruit_status, RecruitStatus::Closed { forced: false });

        let err = fx
            .service
            .approve_joining(LEADER, group_id, MemberId(3), true)
            .await
            .unwrap_err();
        assert!(matches!(err, GroupError::CapacityExceeded { approved: 2, max: 2, .. }));

        // Rejection is still allowed once the group is full.
        assert!(!fx
            .service
            .approve_joining(LEADER, group_id, MemberId(3), false)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_approve_requires_leader() {
        let fx = create_test_service();
        let group_id = group_with_pending(&fx, 5, &[2, 3]).await;

        let err = fx
            .service
            .approve_joining(MemberId(2), group_id, MemberId(3), true)
            .await
            .unwrap_err();
        assert!(matches!(err, GroupError::PermissionDenied { .. }));

        let err = fx
            .service
            .approve_joining(MemberId(9), group_id, MemberId(3), true)
            .await
            .unwrap_err();
        assert!(matches!(err, GroupError::PermissionDenied { .. }));
        assert_eq!(
            fx.service.get_membership(group_id, MemberId(3)).await.unwrap().status,
            MembershipStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_approve_unknown_applicant() {
        let fx = create_test_service();
        let group_id = group_with_pending(&fx, 5, &[]).await;
        let err = fx
            .service
            .approve_joining(LEADER, group_id, MemberId(4), true)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "GM001");
    }

    #[tokio::test]
    async fn test_forced_close_blocks_approval() {
        let fx = create_test_service();
        let group_id = group_with_pending(&fx, 5, &[2]).await;
        let update = GroupUpdate {
            recruit_status: Some(RecruitRequest::Closed),
            ..Default::default()
        };
        fx.service.modify_group(group_id, LEADER, update).await.unwrap();

        let err = fx
            .service
            .approve_joining(LEADER, group_id, MemberId(2), true)
            .await
            .unwrap_err();
        assert!(matches!(err, GroupError::GroupNotRecruiting(_)));

        let err = fx
            .service
            .apply_for_membership(group_id, MemberId(3))
            .await
            .unwrap_err();
        assert!(matches!(err, GroupError::GroupNotRecruiting(_)));
    }

    #[tokio::test]
    async fn test_role_toggle_and_sole_leader_protection() {
        let fx = create_test_service();
        let group_id = group_with_pending(&fx, 5, &[2]).await;
        fx.service
            .approve_joining(LEADER, group_id, MemberId(2), true)
            .await
            .unwrap();

        let err = fx
            .service
            .modify_group_role(LEADER, group_id, LEADER)
            .await
            .unwrap_err();
        assert!(matches!(err, GroupError::SoleLeaderDemotion { .. }));

        assert!(fx
            .service
            .modify_group_role(LEADER, group_id, MemberId(2))
            .await
            .unwrap());
        assert_eq!(
            fx.service.get_membership(group_id, MemberId(2)).await.unwrap().role,
            GroupRole::Leader
        );

        // With two leaders the original one may step down.
        fx.service
            .modify_group_role(MemberId(2), group_id, LEADER)
            .await
            .unwrap();
        assert_eq!(
            fx.service.get_membership(group_id, LEADER).await.unwrap().role,
            GroupRole::Participant
        );
    }

    #[tokio::test]
    async fn test_role_change_of_pending_member_is_invalid() {
        let fx = create_test_service();
        let group_id = group_with_pending(&fx, 5, &[2]).await;
        let err = fx
            .service
            .modify_group_role(LEADER, group_id, MemberId(2))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "GM004");
    }

    #[tokio::test]
    async fn test_leave_reopens_automatically_closed_group() {
        let fx = create_test_service();
        let group_id = group_with_pending(&fx, 2, &[2]).await;
        fx.service
            .approve_joining(LEADER, group_id, MemberId(2), true)
            .await
            .unwrap();
        assert!(!fx.service.get_group(group_id).await.unwrap().recruit_status.is_recruiting());

        assert!(fx.service.leave_group(group_id, MemberId(2)).await.unwrap());
        let view = fx.service.get_group(group_id).await.unwrap();
        assert!(view.recruit_status.is_recruiting());
        assert_eq!(view.approved_count, 1);
        assert_eq!(
            fx.service.get_membership(group_id, MemberId(2)).await.unwrap().status,
            MembershipStatus::Leave
        );
    }

    #[tokio::test]
    async fn test_leave_keeps_forced_close() {
        let fx = create_test_service();
        let group_id = group_with_pending(&fx, 5, &[2]).await;
        fx.service
            .approve_joining(LEADER, group_id, MemberId(2), true)
            .await
            .unwrap();
        let update = GroupUpdate {
            recruit_status: Some(RecruitRequest::Closed),
            ..Default::default()
        };
        fx.service.modify_group(group_id, LEADER, update).await.unwrap();

        fx.service.leave_group(group_id, MemberId(2)).await.unwrap();
        assert!(fx
            .service
            .get_group(group_id)
            .await
            .unwrap()
            .recruit_status
            .is_forced_closed());
    }

    #[tokio::test]
    async fn test_sole_leader_cannot_leave() {
        let fx = create_test_service();
        let group_id = group_with_pending(&fx, 5, &[]).await;
        let err = fx.service.leave_group(group_id, LEADER).await.unwrap_err();
        assert!(matches!(err, GroupError::UnableToLeave { .. }));
        assert_eq!(
            fx.service.get_membership(group_id, LEADER).await.unwrap().status,
            MembershipStatus::Approved
        );
    }

    #[tokio::test]
    async fn test_modify_group() {
        let fx = create_test_service();
        let group_id = group_with_pending(&fx, 5, &[]).await;
        let update = GroupUpdate {
            name: Some("Book club".to_string()),
            town: Some("  ".to_string()),
            category_name: Some("Books".to_string()),
            max_recruit_count: Some(8),
            ..Default::default()
        };
        let view = fx.service.modify_group(group_id, LEADER, update).await.unwrap();
        assert_eq!(view.name, "Book club");
        assert_eq!(view.region.town, "Yeouido-dong");
        assert_eq!(view.category, "Books");
        assert_eq!(view.max_recruit_count, 8);
        assert_eq!(fx.service.get_group(group_id).await.unwrap(), view);
    }

    #[tokio::test]
    async fn test_modify_group_failures_leave_group_untouched() {
        let fx = create_test_service();
        let group_id = group_with_pending(&fx, 5, &[2]).await;
        fx.service
            .approve_joining(LEADER, group_id, MemberId(2), true)
            .await
            .unwrap();
        let before = fx.service.get_group(group_id).await.unwrap();

        let lower = GroupUpdate {
            name: Some("Renamed".to_string()),
            max_recruit_count: Some(1),
            ..Default::default()
        };
        assert!(matches!(
            fx.service.modify_group(group_id, LEADER, lower).await,
            Err(GroupError::CapacityExceeded { .. })
        ));

        let unknown_category = GroupUpdate {
            name: Some("Renamed".to_string()),
            category_name: Some("Cooking".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            fx.service.modify_group(group_id, LEADER, unknown_category).await,
            Err(GroupError::NotFound { resource: Resource::Category, .. })
        ));

        let by_participant = GroupUpdate {
            name: Some("Renamed".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            fx.service.modify_group(group_id, MemberId(2), by_participant).await,
            Err(GroupError::PermissionDenied { .. })
        ));

        assert_eq!(fx.service.get_group(group_id).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_delete_group_cascades() {
        let fx = create_test_service();
        let group_id = group_with_pending(&fx, 5, &[2, 3]).await;
        fx.service
            .approve_joining(LEADER, group_id, MemberId(2), true)
            .await
            .unwrap();

        assert!(matches!(
            fx.service.delete_group(group_id, MemberId(2)).await,
            Err(GroupError::PermissionDenied { .. })
        ));
        assert!(fx.service.delete_group(group_id, LEADER).await.unwrap());

        assert!(fx.store.raw_group(group_id).unwrap().is_disabled());
        let memberships = fx.store.memberships_of(group_id);
        assert_eq!(memberships.len(), 3);
        assert!(memberships.iter().all(|m| m.is_disabled()));

        let err = fx.service.delete_group(group_id, LEADER).await.unwrap_err();
        assert!(matches!(err, GroupError::NotFound { resource: Resource::Group, .. }));
        assert!(fx.service.get_group(group_id).await.is_err());
    }

    #[tokio::test]
    async fn test_events_published_after_commit_only() {
        let fx = create_test_service();
        let mut events = fx.event_bus.subscribe();
        let group_id = group_with_pending(&fx, 2, &[2]).await;
        fx.service
            .approve_joining(LEADER, group_id, MemberId(2), true)
            .await
            .unwrap();
        let _ = fx.service.leave_group(group_id, LEADER).await;

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert!(matches!(received[0], GroupEvent::GroupCreated { .. }));
        assert!(matches!(received[1], GroupEvent::MembershipApplied { .. }));
        assert!(matches!(received[2], GroupEvent::MembershipApproved { .. }));
        assert!(matches!(
            received[3],
            GroupEvent::RecruitmentClosed { forced: false, .. }
        ));
        // The sole leader's failed leave published nothing.
        assert_eq!(received.len(), 4);
    }

    #[tokio::test]
    async fn test_membership_view_without_directory_entry() {
        let fx = create_test_service();
        let group_id = group_with_pending(&fx, 5, &[2]).await;
        fx.members.remove(MemberId(2));
        let view = fx.service.get_membership(group_id, MemberId(2)).await.unwrap();
        assert_eq!(view.display_name, None);
    }
}
