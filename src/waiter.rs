//! Polling wait for collection readiness.
//!
//! Sync work cannot start before a collection's backing indexes exist, so
//! the reconciliation engine polls the collection row until it goes ACTIVE.
//! A collection that never turns ACTIVE within the window is assumed to be
//! stuck in a recoverable state and the sync proceeds anyway; a deleted or
//! missing collection aborts outright.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::models::{Collection, CollectionStatus};
use crate::store::CollectionStore;

/// Time source, injectable so tests can script the clock.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitState {
    Waiting,
    Ready,
    Failed,
}

fn classify(collection: Option<&Collection>) -> WaitState {
    match collection {
        None => WaitState::Failed,
        Some(c) => match c.status {
            CollectionStatus::Deleted => WaitState::Failed,
            CollectionStatus::Active => WaitState::Ready,
            CollectionStatus::Pending => WaitState::Waiting,
        },
    }
}

pub struct StateWaiter {
    store: CollectionStore,
    clock: Arc<dyn Clock>,
    max_wait: Duration,
    poll_interval: Duration,
}

impl StateWaiter {
    pub fn new(
        store: CollectionStore,
        clock: Arc<dyn Clock>,
        max_wait: Duration,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            max_wait,
            poll_interval,
        }
    }

    /// Returns the collection once it is ACTIVE, or `None` if it is gone.
    /// On timeout the last-seen collection is returned so the caller can
    /// proceed in degraded mode.
    pub async fn wait_for_active(&self, collection_id: &str) -> Result<Option<Collection>> {
        let deadline = self.clock.now() + self.max_wait;
        loop {
            let collection = self.store.get_collection_by_id(collection_id, true).await?;
            match classify(collection.as_ref()) {
                WaitState::Ready => {
                    debug!(collection = collection_id, "collection is active");
                    return Ok(collection);
                }
                WaitState::Failed => {
                    warn!(collection = collection_id, "collection missing or deleted");
                    return Ok(None);
                }
                WaitState::Waiting => {
                    if self.clock.now() >= deadline {
                        warn!(
                            collection = collection_id,
                            waited_secs = self.max_wait.as_secs(),
                            "collection not active after wait window, proceeding anyway"
                        );
                        return Ok(collection);
                    }
                    self.clock.sleep(self.poll_interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate;
    use crate::models::Collection;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Clock that advances one poll interval per sleep and optionally flips
    /// the collection ACTIVE after a set number of sleeps.
    struct ScriptedClock {
        start: Instant,
        ticks: AtomicU64,
        tick: Duration,
        activate_after: Option<u64>,
        store: CollectionStore,
    }

    #[async_trait]
    impl Clock for ScriptedClock {
        fn now(&self) -> Instant {
            self.start + self.tick * self.ticks.load(Ordering::SeqCst) as u32
        }

        async fn sleep(&self, _duration: Duration) {
            let ticks = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
            if Some(ticks) == self.activate_after {
                let mut collection = self
                    .store
                    .get_collection_by_id("c1", true)
                    .await
                    .unwrap()
                    .unwrap();
                collection.status = CollectionStatus::Active;
                self.store.update_collection(&collection).await.unwrap();
            }
        }
    }

    async fn setup(status: CollectionStatus) -> (tempfile::TempDir, CollectionStore) {
        let tmp = tempfile::tempdir().unwrap();
        let pool = crate::db::connect(&tmp.path().join("test.sqlite"))
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        let store = CollectionStore::new(pool);
        store
            .insert_collection(&Collection {
                id: "c1".into(),
                name: "kb".into(),
                user: "alice".into(),
                status,
                config: "{}".into(),
                gmt_created: Utc::now(),
                gmt_updated: Utc::now(),
            })
            .await
            .unwrap();
        (tmp, store)
    }

    fn scripted_waiter(store: CollectionStore, activate_after: Option<u64>) -> StateWaiter {
        let clock = Arc::new(ScriptedClock {
            start: Instant::now(),
            ticks: AtomicU64::new(0),
            tick: Duration::from_secs(5),
            activate_after,
            store: store.clone(),
        });
        StateWaiter::new(store, clock, Duration::from_secs(30), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn waits_until_active() {
        let (_tmp, store) = setup(CollectionStatus::Pending).await;
        let waiter = scripted_waiter(store, Some(2));
        let collection = waiter.wait_for_active("c1").await.unwrap().unwrap();
        assert_eq!(collection.status, CollectionStatus::Active);
    }

    #[tokio::test]
    async fn proceeds_on_timeout_with_pending_collection() {
        let (_tmp, store) = setup(CollectionStatus::Pending).await;
        let waiter = scripted_waiter(store, None);
        let collection = waiter.wait_for_active("c1").await.unwrap().unwrap();
        assert_eq!(collection.status, CollectionStatus::Pending);
    }

    #[tokio::test]
    async fn aborts_when_deleted_or_missing() {
        let (_tmp, store) = setup(CollectionStatus::Deleted).await;
        let waiter = scripted_waiter(store.clone(), None);
        assert!(waiter.wait_for_active("c1").await.unwrap().is_none());

        let waiter = StateWaiter::new(
            store,
            Arc::new(SystemClock),
            Duration::from_secs(1),
            Duration::from_millis(10),
        );
        assert!(waiter.wait_for_active("nope").await.unwrap().is_none());
    }
}
