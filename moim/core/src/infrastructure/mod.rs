// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer: storage adapters, lock coordinators, the event bus
//! and the PostgreSQL pool.

pub mod db;
pub mod event_bus;
pub mod locks;
pub mod repositories;
