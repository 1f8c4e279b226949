// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Lock coordinator implementations
//!
//! - **InProcessLockCoordinator** - per-key async mutexes; one service instance
//! - **PostgresAdvisoryLockCoordinator** - session advisory locks; many instances

pub mod in_process;
pub mod postgres_advisory;

pub use in_process::InProcessLockCoordinator;
pub use postgres_advisory::PostgresAdvisoryLockCoordinator;
