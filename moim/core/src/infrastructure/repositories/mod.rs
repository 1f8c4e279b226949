// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the persistence and directory
//! contracts defined in the domain layer.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve groups and memberships
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## PostgreSQL
//! - **PostgresGroupStore** - groups and memberships, row-locked transactions
//! - **PostgresMemberDirectory** / **PostgresCategoryDirectory** - read-only lookups
//!
//! ## In-Memory
//! - **InMemoryGroupStore** - single-writer snapshot transactions
//! - **InMemoryMemberDirectory** / **InMemoryCategoryDirectory** - seeded lookups

pub mod in_memory;
pub mod postgres_directory;
pub mod postgres_group;

pub use in_memory::{InMemoryCategoryDirectory, InMemoryGroupStore, InMemoryMemberDirectory};
pub use postgres_directory::{PostgresCategoryDirectory, PostgresMemberDirectory};
pub use postgres_group::PostgresGroupStore;
