// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Group Store
//!
//! Persists groups and memberships in the `groups` and `group_memberships`
//! tables. Reads of a group inside a transaction take `FOR UPDATE`, so two
//! transactions touching the same group serialize at the row even when the
//! lock coordinator is process-local.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `GroupStore` / `GroupTransaction` over PostgreSQL

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};

use crate::domain::directory::CategoryId;
use crate::domain::group::{Group, GroupId, GroupRecord, GroupRegion, RecruitStatus};
use crate::domain::membership::{
    GroupMembership, GroupRole, MemberId, MembershipRecord, MembershipStatus,
};
use crate::domain::repository::{GroupStore, GroupTransaction, RepositoryError};

const GROUP_COLUMNS: &str = r#"
    id, name, province, city, town, description, recruit_status, recruit_forced,
    max_recruit_count, category_id, disabled, created_at, updated_at
"#;

const MEMBERSHIP_COLUMNS: &str = r#"
    group_id, member_id, group_role, status, disabled, created_at, updated_at
"#;

pub struct PostgresGroupStore {
    pool: PgPool,
}

impl PostgresGroupStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GroupStore for PostgresGroupStore {
    async fn allocate_group_id(&self) -> Result<GroupId, RepositoryError> {
        let id: i64 = sqlx::query_scalar("SELECT nextval('groups_id_seq')")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to allocate group id: {}", e)))?;
        Ok(GroupId(id))
    }

    async fn begin(&self) -> Result<Box<dyn GroupTransaction>, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresGroupTransaction { tx }))
    }

    async fn find_group_with_approved_count(
        &self,
        id: GroupId,
    ) -> Result<Option<(Group, u64)>, RepositoryError> {
        let sql = format!(
            r#"
            SELECT {},
                (SELECT COUNT(*) FROM group_memberships m
                 WHERE m.group_id = groups.id AND m.status = $2 AND m.disabled = FALSE)
                AS approved_count
            FROM groups WHERE id = $1 AND disabled = FALSE
            "#,
            GROUP_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id.0)
            .bind(MembershipStatus::Approved.as_str())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let approved: i64 = row.try_get("approved_count")?;
                Ok(Some((parse_group_row(row)?, approved as u64)))
            }
            None => Ok(None),
        }
    }

    async fn find_membership(
        &self,
        group_id: GroupId,
        member_id: MemberId,
    ) -> Result<Option<GroupMembership>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM group_memberships WHERE group_id = $1 AND member_id = $2 AND disabled = FALSE",
            MEMBERSHIP_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(group_id.0)
            .bind(member_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(parse_membership_row).transpose()
    }
}

pub struct PostgresGroupTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl GroupTransaction for PostgresGroupTransaction {
    async fn find_group(&mut self, id: GroupId) -> Result<Option<Group>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM groups WHERE id = $1 AND disabled = FALSE FOR UPDATE",
            GROUP_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id.0)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(parse_group_row).transpose()
    }

    async fn find_membership(
        &mut self,
        group_id: GroupId,
        member_id: MemberId,
    ) -> Result<Option<GroupMembership>, RepositoryError> {
        let sql = format!(
            "SELECT {} FROM group_memberships \
             WHERE group_id = $1 AND member_id = $2 AND disabled = FALSE FOR UPDATE",
            MEMBERSHIP_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(group_id.0)
            .bind(member_id.0)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.map(parse_membership_row).transpose()
    }

    async fn count_by_status(
        &mut self,
        group_id: GroupId,
        status: MembershipStatus,
    ) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM group_memberships WHERE group_id = $1 AND status = $2 AND disabled = FALSE",
        )
        .bind(group_id.0)
        .bind(status.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count as u64)
    }

    async fn count_by_role(
        &mut self,
        group_id: GroupId,
        role: GroupRole,
        status: MembershipStatus,
    ) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM group_memberships
            WHERE group_id = $1 AND group_role = $2 AND status = $3 AND disabled = FALSE
            "#,
        )
        .bind(group_id.0)
        .bind(role.as_str())
        .bind(status.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count as u64)
    }

    async fn insert_group(&mut self, group: &Group) -> Result<(), RepositoryError> {
        let record = group.to_record();
        sqlx::query(
            r#"
            INSERT INTO groups (
                id, name, province, city, town, description, recruit_status,
                recruit_forced, max_recruit_count, category_id, disabled,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(record.id.0)
        .bind(&record.name)
        .bind(&record.region.province)
        .bind(&record.region.city)
        .bind(&record.region.town)
        .bind(&record.description)
        .bind(record.recruit_status.as_str())
        .bind(record.recruit_status.is_forced_closed())
        .bind(capacity_column(record.max_recruit_count)?)
        .bind(record.category_id.0)
        .bind(record.disabled)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn update_group(&mut self, group: &Group) -> Result<(), RepositoryError> {
        let record = group.to_record();
        let result = sqlx::query(
            r#"
            UPDATE groups SET
                name = $2, province = $3, city = $4, town = $5, description = $6,
                recruit_status = $7, recruit_forced = $8, max_recruit_count = $9,
                category_id = $10, disabled = $11, updated_at = $12
            WHERE id = $1
            "#,
        )
        .bind(record.id.0)
        .bind(&record.name)
        .bind(&record.region.province)
        .bind(&record.region.city)
        .bind(&record.region.town)
        .bind(&record.description)
        .bind(record.recruit_status.as_str())
        .bind(record.recruit_status.is_forced_closed())
        .bind(capacity_column(record.max_recruit_count)?)
        .bind(record.category_id.0)
        .bind(record.disabled)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("group {}", record.id)));
        }
        Ok(())
    }

    async fn save_membership(&mut self, membership: &GroupMembership) -> Result<(), RepositoryError> {
        let record = membership.to_record();
        sqlx::query(
            r#"
            INSERT INTO group_memberships (
                group_id, member_id, group_role, status, disabled, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (group_id, member_id) DO UPDATE SET
                group_role = EXCLUDED.group_role,
                status = EXCLUDED.status,
                disabled = EXCLUDED.disabled,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.group_id.0)
        .bind(record.member_id.0)
        .bind(record.role.as_str())
        .bind(record.status.as_str())
        .bind(record.disabled)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn disable_memberships(&mut self, group_id: GroupId) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE group_memberships SET disabled = TRUE, updated_at = NOW() WHERE group_id = $1",
        )
        .bind(group_id.0)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn capacity_column(max_recruit_count: u32) -> Result<i32, RepositoryError> {
    i32::try_from(max_recruit_count).map_err(|_| {
        RepositoryError::Database(format!(
            "max_recruit_count {} does not fit the column",
            max_recruit_count
        ))
    })
}

fn parse_group_row(row: PgRow) -> Result<Group, RepositoryError> {
    let status: String = row.try_get("recruit_status")?;
    let forced: bool = row.try_get("recruit_forced")?;
    let recruit_status = match status.as_str() {
        "RECRUITING" => RecruitStatus::Recruiting,
        "CLOSED" => RecruitStatus::Closed { forced },
        other => {
            return Err(RepositoryError::Decode(format!(
                "unknown recruit status '{}'",
                other
            )))
        }
    };
    let max_recruit_count: i32 = row.try_get("max_recruit_count")?;
    let max_recruit_count = u32::try_from(max_recruit_count).map_err(|_| {
        RepositoryError::Decode(format!("negative max_recruit_count {}", max_recruit_count))
    })?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    Ok(Group::from_record(GroupRecord {
        id: GroupId(row.try_get("id")?),
        name: row.try_get("name")?,
        region: GroupRegion {
            province: row.try_get("province")?,
            city: row.try_get("city")?,
            town: row.try_get("town")?,
        },
        description: row.try_get("description")?,
        recruit_status,
        max_recruit_count,
        category_id: CategoryId(row.try_get("category_id")?),
        disabled: row.try_get("disabled")?,
        created_at,
        updated_at,
    }))
}

fn parse_membership_row(row: PgRow) -> Result<GroupMembership, RepositoryError> {
    let role: String = row.try_get("group_role")?;
    let status: String = row.try_get("status")?;
    Ok(GroupMembership::from_record(MembershipRecord {
        group_id: GroupId(row.try_get("group_id")?),
        member_id: MemberId(row.try_get("member_id")?),
        role: role.parse::<GroupRole>().map_err(RepositoryError::Decode)?,
        status: status.parse::<MembershipStatus>().map_err(RepositoryError::Decode)?,
        disabled: row.try_get("disabled")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    }))
}
