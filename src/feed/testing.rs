//! In-memory store double for feed tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, watch};

use crate::errors::{RemoteWriteError, SubscriptionError};
use crate::models::{FeedState, Snapshot};
use crate::store::{NotificationStore, SnapshotReceiver, StorePath, WriteBatch};

/// Hands snapshot delivery to the test and records every write batch.
#[derive(Default)]
pub struct FakeStore {
    subscribers: Mutex<Vec<mpsc::Sender<Snapshot>>>,
    writes: Mutex<Vec<WriteBatch>>,
    fail_subscribe: AtomicBool,
    fail_writes: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver a snapshot to the most recent subscriber.
    pub async fn push(&self, revision_id: i64, payload: Option<Value>) {
        let tx = self.latest_subscriber();
        tx.send(Snapshot {
            revision_id,
            payload,
        })
        .await
        .expect("subscriber gone");
    }

    /// Like [`FakeStore::push`], returning false when the subscriber is gone.
    pub fn try_push(&self, revision_id: i64, payload: Option<Value>) -> bool {
        self.latest_subscriber()
            .try_send(Snapshot {
                revision_id,
                payload,
            })
            .is_ok()
    }

    pub fn subscriptions_closed(&self) -> bool {
        self.subscribers.lock().unwrap().iter().all(|tx| tx.is_closed())
    }

    pub fn writes(&self) -> Vec<WriteBatch> {
        self.writes.lock().unwrap().clone()
    }

    pub fn fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn delay_writes(&self, delay: Duration) {
        *self.write_delay.lock().unwrap() = Some(delay);
    }

    fn latest_subscriber(&self) -> mpsc::Sender<Snapshot> {
        self.subscribers
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no subscriber")
    }
}

#[async_trait]
impl NotificationStore for FakeStore {
    async fn subscribe(&self, _path: &StorePath) -> Result<SnapshotReceiver, SubscriptionError> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(SubscriptionError::Rejected("permission denied".to_string()));
        }
        let (tx, rx) = mpsc::channel(16);
        self.subscribers.lock().unwrap().push(tx);
        Ok(rx)
    }

    async fn update(&self, batch: WriteBatch) -> Result<i64, RemoteWriteError> {
        let delay = *self.write_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RemoteWriteError::Rejected("permission denied".to_string()));
        }
        batch.validate()?;
        let mut writes = self.writes.lock().unwrap();
        writes.push(batch);
        Ok(writes.len() as i64)
    }
}

/// Wait for the next published state, failing the test after a second.
pub async fn next_state(rx: &mut watch::Receiver<Arc<FeedState>>) -> Arc<FeedState> {
    tokio::time::timeout(Duration::from_secs(1), rx.changed())
        .await
        .expect("no state change")
        .expect("feed dropped");
    rx.borrow_and_update().clone()
}

/// Poll `condition` until it holds, failing the test after a second.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never held");
}
