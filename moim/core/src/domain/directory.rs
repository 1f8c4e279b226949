// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Read-only lookups into collaborators this crate does not own: member
//! accounts and group categories.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::membership::MemberId;
use crate::domain::repository::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryId(pub i64);

impl std::fmt::Display for CategoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberProfile {
    pub id: MemberId,
    pub display_name: String,
}

/// Member account lookups
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    /// Find an active member; `None` if the account does not exist or is disabled
    async fn find_member(&self, id: MemberId) -> Result<Option<MemberProfile>, RepositoryError>;
}

/// Category lookups
#[async_trait]
pub trait CategoryDirectory: Send + Sync {
    /// Find an active category by its exact name
    async fn find_by_name(&self, name: &str) -> Result<Option<Category>, RepositoryError>;

    async fn find_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError>;
}
