// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Directories
//!
//! Read-only member and category lookups over the `members` and
//! `categories` tables.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::directory::{
    Category, CategoryDirectory, CategoryId, MemberDirectory, MemberProfile,
};
use crate::domain::membership::MemberId;
use crate::domain::repository::RepositoryError;

pub struct PostgresMemberDirectory {
    pool: PgPool,
}

impl PostgresMemberDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberDirectory for PostgresMemberDirectory {
    async fn find_member(&self, id: MemberId) -> Result<Option<MemberProfile>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, display_name FROM members WHERE id = $1 AND disabled = FALSE",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(MemberProfile {
                id: MemberId(row.try_get("id")?),
                display_name: row.try_get("display_name")?,
            })),
            None => Ok(None),
        }
    }
}

pub struct PostgresCategoryDirectory {
    pool: PgPool,
}

impl PostgresCategoryDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryDirectory for PostgresCategoryDirectory {
    async fn find_by_name(&self, name: &str) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query("SELECT id, name FROM categories WHERE name = $1 AND disabled = FALSE")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Category {
                id: CategoryId(row.try_get("id")?),
                name: row.try_get("name")?,
            })),
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query("SELECT id, name FROM categories WHERE id = $1 AND disabled = FALSE")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Category {
                id: CategoryId(row.try_get("id")?),
                name: row.try_get("name")?,
            })),
            None => Ok(None),
        }
    }
}
