// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain layer: aggregates, value objects, domain errors and the
//! persistence/lock contracts implemented in `crate::infrastructure`.

pub mod capacity;
pub mod directory;
pub mod error;
pub mod events;
pub mod group;
pub mod lock;
pub mod membership;
pub mod repository;
pub mod service_config;
