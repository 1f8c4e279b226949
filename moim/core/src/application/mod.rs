// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Application layer: the group lifecycle service, its read models and the
//! factory that wires backends from configuration.

pub mod group_lifecycle;
pub mod repository_factory;
pub mod views;

pub use group_lifecycle::{GroupLifecycleService, StandardGroupLifecycleService};
pub use views::{GroupView, MembershipView};
