// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Moim Core
//!
//! Group membership lifecycle for the moim service: join requests, approval,
//! role changes, capacity-bounded recruitment and group edit/delete, kept
//! correct while many clients race against the same group.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, lifecycle service and storage/lock adapters

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
