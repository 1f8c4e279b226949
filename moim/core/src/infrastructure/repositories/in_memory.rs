// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory group store and directories for development and tests.
//!
//! A transaction takes the store's single writer permit, works on a private
//! copy of the committed state and swaps it in on commit. Readers only ever
//! see committed state and never wait on an open transaction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::domain::directory::{
    Category, CategoryDirectory, CategoryId, MemberDirectory, MemberProfile,
};
use crate::domain::group::{Group, GroupId};
use crate::domain::membership::{GroupMembership, GroupRole, MemberId, MembershipStatus};
use crate::domain::repository::{GroupStore, GroupTransaction, RepositoryError};

#[derive(Debug, Clone, Default)]
struct GroupState {
    groups: HashMap<GroupId, Group>,
    memberships: HashMap<(GroupId, MemberId), GroupMembership>,
}

impl GroupState {
    fn active_group(&self, id: GroupId) -> Option<Group> {
        self.groups.get(&id).filter(|g| !g.is_disabled()).cloned()
    }

    fn active_membership(&self, group_id: GroupId, member_id: MemberId) -> Option<GroupMembership> {
        self.memberships
            .get(&(group_id, member_id))
            .filter(|m| !m.is_disabled())
            .cloned()
    }

    fn count(&self, group_id: GroupId, role: Option<GroupRole>, status: MembershipStatus) -> u64 {
        self.memberships
            .values()
            .filter(|m| m.group_id() == group_id && !m.is_disabled() && m.status() == status)
            .filter(|m| role.map_or(true, |r| m.role() == r))
            .count() as u64
    }
}

#[derive(Clone)]
pub struct InMemoryGroupStore {
    committed: Arc<RwLock<GroupState>>,
    writer: Arc<Semaphore>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryGroupStore {
    pub fn new() -> Self {
        Self {
            committed: Arc::new(RwLock::new(GroupState::default())),
            writer: Arc::new(Semaphore::new(1)),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }

    /// Every membership row of a group, disabled ones included
    pub fn memberships_of(&self, group_id: GroupId) -> Vec<GroupMembership> {
        self.committed
            .read()
            .memberships
            .values()
            .filter(|m| m.group_id() == group_id)
            .cloned()
            .collect()
    }

    /// Group row regardless of its disabled flag
    pub fn raw_group(&self, id: GroupId) -> Option<Group> {
        self.committed.read().groups.get(&id).cloned()
    }
}

impl Default for InMemoryGroupStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GroupStore for InMemoryGroupStore {
    async fn allocate_group_id(&self) -> Result<GroupId, RepositoryError> {
        Ok(GroupId(self.next_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn begin(&self) -> Result<Box<dyn GroupTransaction>, RepositoryError> {
        let permit = self
            .writer
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| RepositoryError::Database(e.to_string()))?;
        let working = self.committed.read().clone();
        Ok(Box::new(InMemoryGroupTransaction {
            working,
            committed: self.committed.clone(),
            _permit: permit,
        }))
    }

    async fn find_group_with_approved_count(
        &self,
        id: GroupId,
    ) -> Result<Option<(Group, u64)>, RepositoryError> {
        let state = self.committed.read();
        Ok(state
            .active_group(id)
            .map(|group| (group, state.count(id, None, MembershipStatus::Approved))))
    }

    async fn find_membership(
        &self,
        group_id: GroupId,
        member_id: MemberId,
    ) -> Result<Option<GroupMembership>, RepositoryError> {
        Ok(self.committed.read().active_membership(group_id, member_id))
    }
}

pub struct InMemoryGroupTransaction {
    working: GroupState,
    committed: Arc<RwLock<GroupState>>,
    _permit: OwnedSemaphorePermit,
}

#[async_trait]
impl GroupTransaction for InMemoryGroupTransaction {
    async fn find_group(&mut self, id: GroupId) -> Result<Option<Group>, RepositoryError> {
        Ok(self.working.active_group(id))
    }

    async fn find_membership(
        &mut self,
        group_id: GroupId,
        member_id: MemberId,
    ) -> Result<Option<GroupMembership>, RepositoryError> {
        Ok(self.working.active_membership(group_id, member_id))
    }

    async fn count_by_status(
        &mut self,
        group_id: GroupId,
        status: MembershipStatus,
    ) -> Result<u64, RepositoryError> {
        Ok(self.working.count(group_id, None, status))
    }

    async fn count_by_role(
        &mut self,
        group_id: GroupId,
        role: GroupRole,
        status: MembershipStatus,
    ) -> Result<u64, RepositoryError> {
        Ok(self.working.count(group_id, Some(role), status))
    }

    async fn insert_group(&mut self, group: &Group) -> Result<(), RepositoryError> {
        if self.working.groups.contains_key(&group.id()) {
            return Err(RepositoryError::Conflict(format!("group {}", group.id())));
        }
        self.working.groups.insert(group.id(), group.clone());
        Ok(())
    }

    async fn update_group(&mut self, group: &Group) -> Result<(), RepositoryError> {
        match self.working.groups.get_mut(&group.id()) {
            Some(slot) => {
                *slot = group.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(format!("group {}", group.id()))),
        }
    }

    async fn save_membership(&mut self, membership: &GroupMembership) -> Result<(), RepositoryError> {
        self.working.memberships.insert(
            (membership.group_id(), membership.member_id()),
            membership.clone(),
        );
        Ok(())
    }

    async fn disable_memberships(&mut self, group_id: GroupId) -> Result<u64, RepositoryError> {
        let mut touched = 0;
        for membership in self
            .working
            .memberships
            .values_mut()
            .filter(|m| m.group_id() == group_id)
        {
            membership.disable();
            touched += 1;
        }
        Ok(touched)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let this = *self;
        *this.committed.write() = this.working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        Ok(())
    }
}

// ============================================================================
// Directories
// ============================================================================

#[derive(Clone, Default)]
pub struct InMemoryMemberDirectory {
    members: Arc<RwLock<HashMap<MemberId, MemberProfile>>>,
}

impl InMemoryMemberDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: MemberId, display_name: impl Into<String>) {
        self.members.write().insert(
            id,
            MemberProfile {
                id,
                display_name: display_name.into(),
            },
        );
    }

    pub fn remove(&self, id: MemberId) {
        self.members.write().remove(&id);
    }
}

#[async_trait]
impl MemberDirectory for InMemoryMemberDirectory {
    async fn find_member(&self, id: MemberId) -> Result<Option<MemberProfile>, RepositoryError> {
        Ok(self.members.read().get(&id).cloned())
    }
}

#[derive(Clone)]
pub struct InMemoryCategoryDirectory {
    categories: Arc<RwLock<HashMap<CategoryId, Category>>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryCategoryDirectory {
    pub fn new() -> Self {
        Self {
            categories: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }

    /// Add a category, returning the existing id if the name is taken
    pub fn register(&self, name: impl Into<String>) -> CategoryId {
        let name = name.into();
        let mut categories = self.categories.write();
        if let Some(existing) = categories.values().find(|c| c.name == name) {
            return existing.id;
        }
        let id = CategoryId(self.next_id.fetch_add(1, Ordering::SeqCst));
        categories.insert(id, Category { id, name });
        id
    }
}

impl Default for InMemoryCategoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CategoryDirectory for InMemoryCategoryDirectory {
    async fn find_by_name(&self, name: &str) -> Result<Option<Category>, RepositoryError> {
        Ok(self
            .categories
            .read()
            .values()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn find_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        Ok(self.categories.read().get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::group::{GroupRegion, NewGroup};

    fn group(id: i64) -> Group {
        Group::new(
            GroupId(id),
            NewGroup {
                name: "Climbers".to_string(),
                region: GroupRegion::new("Incheon", "Yeonsu-gu", "Songdo-dong"),
                description: "Indoor bouldering".to_string(),
                max_recruit_count: 4,
                category_name: "Sports".to_string(),
            },
            CategoryId(1),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = InMemoryGroupStore::new();
        let id = store.allocate_group_id().await.unwrap();
        let mut tx = store.begin().await.unwrap();
        tx.insert_group(&group(id.0)).await.unwrap();
        tx.save_membership(&GroupMembership::founding_leader(id, MemberId(1)))
            .await
            .unwrap();
        assert!(store.find_group_with_approved_count(id).await.unwrap().is_none());
        tx.commit().await.unwrap();

        let (group, approved) = store.find_group_with_approved_count(id).await.unwrap().unwrap();
        assert_eq!(group.id(), id);
        assert_eq!(approved, 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = InMemoryGroupStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_group(&group(1)).await.unwrap();
        tx.rollback().await.unwrap();
        assert!(store
            .find_group_with_approved_count(GroupId(1))
            .await
            .unwrap()
            .is_none());

        // Dropping without commit behaves like rollback and frees the writer.
        let mut tx = store.begin().await.unwrap();
        tx.insert_group(&group(1)).await.unwrap();
        drop(tx);
        assert!(store
            .find_group_with_approved_count(GroupId(1))
            .await
            .unwrap()
            .is_none());
        let tx = store.begin().await.unwrap();
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_counts_see_uncommitted_writes_in_same_transaction() {
        let store = InMemoryGroupStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_group(&group(1)).await.unwrap();
        tx.save_membership(&GroupMembership::founding_leader(GroupId(1), MemberId(1)))
            .await
            .unwrap();
        tx.save_membership(&GroupMembership::pending(GroupId(1), MemberId(2)))
            .await
            .unwrap();
        assert_eq!(
            tx.count_by_status(GroupId(1), MembershipStatus::Approved).await.unwrap(),
            1
        );
        assert_eq!(
            tx.count_by_role(GroupId(1), GroupRole::Leader, MembershipStatus::Approved)
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            tx.count_by_role(GroupId(1), GroupRole::Participant, MembershipStatus::Approved)
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_disable_memberships_hides_rows() {
        let store = InMemoryGroupStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_group(&group(1)).await.unwrap();
        for member in 1..=3 {
            tx.save_membership(&GroupMembership::pending(GroupId(1), MemberId(member)))
                .await
                .unwrap();
        }
        tx.save_membership(&GroupMembership::pending(GroupId(2), MemberId(1)))
            .await
            .unwrap();
        assert_eq!(tx.disable_memberships(GroupId(1)).await.unwrap(), 3);
        assert!(tx.find_membership(GroupId(1), MemberId(2)).await.unwrap().is_none());
        assert!(tx.find_membership(GroupId(2), MemberId(1)).await.unwrap().is_some());
        tx.commit().await.unwrap();

        assert!(store.memberships_of(GroupId(1)).iter().all(|m| m.is_disabled()));
    }

    #[tokio::test]
    async fn test_duplicate_group_insert_conflicts() {
        let store = InMemoryGroupStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.insert_group(&group(1)).await.unwrap();
        assert!(matches!(
            tx.insert_group(&group(1)).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_directories() {
        let members = InMemoryMemberDirectory::new();
        members.register(MemberId(1), "jiwoo");
        assert_eq!(
            members.find_member(MemberId(1)).await.unwrap().unwrap().display_name,
            "jiwoo"
        );
        assert!(members.find_member(MemberId(2)).await.unwrap().is_none());

        let categories = InMemoryCategoryDirectory::new();
        let id = categories.register("Books");
        assert_eq!(categories.register("Books"), id);
        assert_eq!(categories.find_by_name("Books").await.unwrap().unwrap().id, id);
        assert!(categories.find_by_name("Cooking").await.unwrap().is_none());
    }
}
