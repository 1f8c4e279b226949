// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Advisory Lock Coordinator
//!
//! Cross-instance mutual exclusion built on session-level advisory locks.
//! Each held key pins one connection of the coordinator's own pool; the lock
//! is tied to that session, so if the process dies the server drops it with
//! the connection.
//!
//! The pool must not be shared with the store. A lock holder always needs a
//! second connection for its transaction, and a shared pool filled with lock
//! sessions would leave every holder waiting on the others.
//!
//! Acquisition polls `pg_try_advisory_lock` with exponential backoff
//! (initial backoff doubling per attempt, capped by the remaining wait) until
//! the configured wait elapses. A failed attempt hands its connection back to
//! the pool before sleeping, so only holders keep sessions checked out.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Implements `LockCoordinator` for multi-instance deployments

use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, Postgres};
use tracing::{debug, warn};

use crate::domain::lock::{LockCoordinator, LockError, LockGuard, LockKey};

const TRY_LOCK_SQL: &str = "SELECT pg_try_advisory_lock(hashtextextended($1, 0))";
const UNLOCK_SQL: &str = "SELECT pg_advisory_unlock(hashtextextended($1, 0))";

pub struct PostgresAdvisoryLockCoordinator {
    pool: PgPool,
    wait: Duration,
    initial_backoff: Duration,
}

impl PostgresAdvisoryLockCoordinator {
    pub fn new(pool: PgPool, wait: Duration, initial_backoff: Duration) -> Self {
        Self {
            pool,
            wait,
            initial_backoff,
        }
    }

    fn timeout(&self, key: &LockKey) -> LockError {
        warn!("Timed out after {:?} waiting for advisory lock {}", self.wait, key);
        metrics::counter!("moim_lock_timeouts_total", "backend" => "postgres_advisory").increment(1);
        LockError::Timeout {
            key: key.as_str().to_string(),
            waited: self.wait,
        }
    }
}

/// Delay before the next attempt, never sleeping past the deadline
pub(crate) fn next_delay(backoff: Duration, elapsed: Duration, wait: Duration) -> Option<Duration> {
    let remaining = wait.checked_sub(elapsed)?;
    if remaining.is_zero() {
        return None;
    }
    Some(backoff.min(remaining))
}

/// Holds the session that owns the advisory lock
struct AdvisoryLease {
    conn: Option<PoolConnection<Postgres>>,
    key: String,
}

impl Drop for AdvisoryLease {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        let key = std::mem::take(&mut self.key);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let unlocked: Result<bool, sqlx::Error> = sqlx::query_scalar(UNLOCK_SQL)
                        .bind(&key)
                        .fetch_one(&mut *conn)
                        .await;
                    match unlocked {
                        Ok(true) => debug!("Released advisory lock {}", key),
                        Ok(false) => {
                            warn!("Advisory lock {} was not held by this session", key);
                            conn.close_on_drop();
                        }
                        Err(e) => {
                            warn!("Failed to release advisory lock {}: {}", key, e);
                            conn.close_on_drop();
                        }
                    }
                });
            }
            Err(_) => {
                // Closing the session makes the server drop its advisory locks.
                conn.close_on_drop();
            }
        }
    }
}

#[async_trait]
impl LockCoordinator for PostgresAdvisoryLockCoordinator {
    async fn acquire(&self, key: &LockKey) -> Result<LockGuard, LockError> {
        let started = Instant::now();
        let mut backoff = self.initial_backoff;
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let remaining = self.wait.saturating_sub(started.elapsed());
            let mut conn = match tokio::time::timeout(remaining, self.pool.acquire()).await {
                Ok(conn) => conn.map_err(|e| LockError::Backend(e.to_string()))?,
                Err(_) => return Err(self.timeout(key)),
            };

            let locked: bool = sqlx::query_scalar(TRY_LOCK_SQL)
                .bind(key.as_str())
                .fetch_one(&mut *conn)
                .await
                .map_err(|e| LockError::Backend(e.to_string()))?;

            if locked {
                let waited = started.elapsed();
                debug!(
                    "Acquired advisory lock {} after {:?} ({} attempts)",
                    key, waited, attempts
                );
                metrics::counter!("moim_lock_acquired_total", "backend" => "postgres_advisory")
                    .increment(1);
                metrics::histogram!("moim_lock_wait_seconds", "backend" => "postgres_advisory")
                    .record(waited.as_secs_f64());
                return Ok(LockGuard::new(
                    key.clone(),
                    AdvisoryLease {
                        conn: Some(conn),
                        key: key.as_str().to_string(),
                    },
                ));
            }
            drop(conn);

            match next_delay(backoff, started.elapsed(), self.wait) {
                Some(delay) => {
                    tokio::time::sleep(delay).await;
                    backoff = backoff.saturating_mul(2);
                }
                None => return Err(self.timeout(key)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_capped_by_remaining_wait() {
        let wait = Duration::from_millis(1000);
        assert_eq!(
            next_delay(Duration::from_millis(100), Duration::from_millis(0), wait),
            Some(Duration::from_millis(100))
        );
        assert_eq!(
            next_delay(Duration::from_millis(800), Duration::from_millis(700), wait),
            Some(Duration::from_millis(300))
        );
        assert_eq!(next_delay(Duration::from_millis(100), wait, wait), None);
        assert_eq!(
            next_delay(Duration::from_millis(100), Duration::from_millis(1200), wait),
            None
        );
    }
}
