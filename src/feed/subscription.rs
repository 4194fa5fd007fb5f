//! Subscription manager: mirrors one store collection into observable feed state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use uuid::Uuid;

use super::materialize::{materialize, unread_count};
use super::ReadStateUpdater;
use crate::errors::SubscriptionError;
use crate::models::{FeedState, Snapshot};
use crate::store::{NotificationStore, SnapshotReceiver, StorePath};

/// The single live subscription of a consuming context.
///
/// State is published through a watch channel and always reflects the last
/// applied snapshot. Dropping the subscription releases it.
pub struct FeedSubscription {
    id: Uuid,
    collection: StorePath,
    store: Arc<dyn NotificationStore>,
    state: watch::Receiver<Arc<FeedState>>,
    update_loop: AbortHandle,
    released: Arc<AtomicBool>,
    write_timeout: Duration,
}

impl FeedSubscription {
    /// Subscribe to `collection` and start the update loop.
    pub async fn activate(
        store: Arc<dyn NotificationStore>,
        collection: StorePath,
        write_timeout: Duration,
    ) -> Result<Self, SubscriptionError> {
        let snapshots = store.subscribe(&collection).await?;

        let id = Uuid::new_v4();
        let (state_tx, state_rx) = watch::channel(Arc::new(FeedState::loading()));
        let released = Arc::new(AtomicBool::new(false));

        let handle = tokio::spawn(run_update_loop(id, snapshots, state_tx, released.clone()));

        tracing::info!(subscription = %id, %collection, "Feed subscription active");

        Ok(Self {
            id,
            collection,
            store,
            state: state_rx,
            update_loop: handle.abort_handle(),
            released,
            write_timeout,
        })
    }

    /// Current feed state.
    pub fn state(&self) -> Arc<FeedState> {
        self.state.borrow().clone()
    }

    /// A receiver notified after every applied snapshot.
    pub fn watch(&self) -> watch::Receiver<Arc<FeedState>> {
        self.state.clone()
    }

    /// Read-state writer bound to this feed's collection and state.
    pub fn updater(&self) -> ReadStateUpdater {
        ReadStateUpdater::new(
            self.store.clone(),
            self.collection.clone(),
            self.state.clone(),
            self.write_timeout,
        )
    }

    pub fn is_active(&self) -> bool {
        !self.released.load(Ordering::Acquire) && !self.update_loop.is_finished()
    }

    /// Stop processing snapshots and drop the store subscription. Idempotent.
    ///
    /// Writes already in flight are left to complete; they never touch feed state.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.update_loop.abort();
        tracing::info!(subscription = %self.id, collection = %self.collection, "Feed subscription released");
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        self.release();
    }
}

async fn run_update_loop(
    id: Uuid,
    mut snapshots: SnapshotReceiver,
    state: watch::Sender<Arc<FeedState>>,
    released: Arc<AtomicBool>,
) {
    while let Some(snapshot) = snapshots.recv().await {
        if released.load(Ordering::Acquire) {
            break;
        }

        let current = state.borrow().clone();
        let revision_id = snapshot.revision_id;
        match apply_snapshot(&current, snapshot) {
            Some(next) => {
                tracing::debug!(
                    subscription = %id,
                    revision_id,
                    notifications = next.notifications.len(),
                    unread = next.unread_count,
                    "Applied snapshot"
                );
                state.send_replace(Arc::new(next));
            }
            None => tracing::warn!(
                subscription = %id,
                revision_id,
                applied = ?current.revision_id,
                "Discarded out-of-order snapshot"
            ),
        }
    }
    tracing::debug!(subscription = %id, "Feed update loop stopped");
}

/// Compute the state that replaces `current` once `snapshot` arrives.
///
/// Returns `None` when the snapshot is not newer than the applied one.
pub fn apply_snapshot(current: &FeedState, snapshot: Snapshot) -> Option<FeedState> {
    if let Some(applied) = current.revision_id {
        if snapshot.revision_id <= applied {
            return None;
        }
    }

    let notifications = materialize(snapshot.payload.as_ref());
    let unread_count = unread_count(&notifications);

    Some(FeedState {
        notifications: notifications.into(),
        unread_count,
        loading: false,
        revision_id: Some(snapshot.revision_id),
        updated_at: Some(Utc::now().to_rfc3339()),
    })
}
