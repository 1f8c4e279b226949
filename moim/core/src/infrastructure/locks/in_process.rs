// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Process-local lock coordinator
//!
//! One async mutex per live key in a `DashMap`. An entry is evicted when the
//! last holder releases and nobody else is waiting on it, so the table only
//! grows with the number of keys contended at the same moment.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::domain::lock::{LockCoordinator, LockError, LockGuard, LockKey};

type LockTable = DashMap<String, Arc<Mutex<()>>>;

pub struct InProcessLockCoordinator {
    table: Arc<LockTable>,
    wait: Duration,
}

impl InProcessLockCoordinator {
    pub fn new(wait: Duration) -> Self {
        Self {
            table: Arc::new(DashMap::new()),
            wait,
        }
    }

    /// Number of keys currently held or waited on
    pub fn active_keys(&self) -> usize {
        self.table.len()
    }
}

/// Releases the mutex, then drops the table entry if it has gone idle
struct InProcessLease {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    table: Arc<LockTable>,
}

impl Drop for InProcessLease {
    fn drop(&mut self) {
        drop(self.guard.take());
        evict_if_idle(&self.table, &self.key);
    }
}

fn evict_if_idle(table: &LockTable, key: &str) {
    // The shard lock held by remove_if keeps new waiters from cloning the
    // mutex between the count check and the removal.
    table.remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
}

#[async_trait]
impl LockCoordinator for InProcessLockCoordinator {
    async fn acquire(&self, key: &LockKey) -> Result<LockGuard, LockError> {
        let mutex = self
            .table
            .entry(key.as_str().to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        let started = Instant::now();
        match tokio::time::timeout(self.wait, mutex.lock_owned()).await {
            Ok(guard) => {
                let waited = started.elapsed();
                debug!("Acquired lock {} after {:?}", key, waited);
                metrics::counter!("moim_lock_acquired_total", "backend" => "in_process").increment(1);
                metrics::histogram!("moim_lock_wait_seconds", "backend" => "in_process")
                    .record(waited.as_secs_f64());
                Ok(LockGuard::new(
                    key.clone(),
                    InProcessLease {
                        guard: Some(guard),
                        key: key.as_str().to_string(),
                        table: self.table.clone(),
                    },
                ))
            }
            Err(_) => {
                warn!("Timed out after {:?} waiting for lock {}", self.wait, key);
                metrics::counter!("moim_lock_timeouts_total", "backend" => "in_process").increment(1);
                evict_if_idle(&self.table, key.as_str());
                Err(LockError::Timeout {
                    key: key.as_str().to_string(),
                    waited: self.wait,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::group::GroupId;
    use crate::domain::lock::with_lock;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_acquire_and_release() {
        let locks = InProcessLockCoordinator::new(Duration::from_millis(100));
        let key = LockKey::group(GroupId(1));
        let guard = locks.acquire(&key).await.unwrap();
        assert_eq!(guard.key(), &key);
        assert_eq!(locks.active_keys(), 1);
        drop(guard);
        assert_eq!(locks.active_keys(), 0);
        locks.acquire(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_second_holder_times_out() {
        let locks = InProcessLockCoordinator::new(Duration::from_millis(50));
        let key = LockKey::group(GroupId(1));
        let _held = locks.acquire(&key).await.unwrap();
        let err = locks.acquire(&key).await.unwrap_err();
        assert!(matches!(err, LockError::Timeout { waited, .. } if waited == Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_contend() {
        let locks = InProcessLockCoordinator::new(Duration::from_millis(50));
        let _a = locks.acquire(&LockKey::group(GroupId(1))).await.unwrap();
        let _b = locks.acquire(&LockKey::group(GroupId(2))).await.unwrap();
        assert_eq!(locks.active_keys(), 2);
    }

    #[tokio::test]
    async fn test_released_on_error() {
        let locks = InProcessLockCoordinator::new(Duration::from_millis(50));
        let key = LockKey::group(GroupId(3));
        let result: Result<(), crate::domain::error::GroupError> =
            with_lock(&locks, key.clone(), || async {
                Err(crate::domain::error::GroupError::GroupNotRecruiting(GroupId(3)))
            })
            .await;
        assert!(result.is_err());
        locks.acquire(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_released_on_cancellation() {
        let locks = Arc::new(InProcessLockCoordinator::new(Duration::from_secs(1)));
        let key = LockKey::group(GroupId(4));

        let task = {
            let locks = locks.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let _: Result<(), LockError> = with_lock(locks.as_ref(), key, || async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                })
                .await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        task.abort();
        let _ = task.await;

        locks.acquire(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_released_on_panic() {
        let locks = Arc::new(InProcessLockCoordinator::new(Duration::from_secs(1)));
        let key = LockKey::group(GroupId(5));

        let task = {
            let locks = locks.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let fail = true;
                let _: Result<(), LockError> = with_lock(locks.as_ref(), key, || async move {
                    if fail {
                        panic!("body failed");
                    }
                    Ok(())
                })
                .await;
            })
        };
        assert!(task.await.is_err());

        locks.acquire(&key).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_mutual_exclusion() {
        let locks = Arc::new(InProcessLockCoordinator::new(Duration::from_secs(5)));
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..32 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            tasks.push(tokio::spawn(async move {
                with_lock(locks.as_ref(), LockKey::group(GroupId(9)), || async {
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    tokio::task::yield_now().await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, LockError>(())
                })
                .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active_keys(), 0);
    }
}
