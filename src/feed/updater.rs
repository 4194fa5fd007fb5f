//! Read-state updater: flips read flags in the store, never in local state.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;

use crate::errors::RemoteWriteError;
use crate::models::FeedState;
use crate::store::{NotificationStore, StorePath, WriteBatch};

/// Issues read-flag writes for one feed.
///
/// Holds no state of its own; the feed state is only consulted to compute
/// the mark-all target set at call time.
#[derive(Clone)]
pub struct ReadStateUpdater {
    store: Arc<dyn NotificationStore>,
    collection: StorePath,
    state: watch::Receiver<Arc<FeedState>>,
    write_timeout: Duration,
}

impl ReadStateUpdater {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        collection: StorePath,
        state: watch::Receiver<Arc<FeedState>>,
        write_timeout: Duration,
    ) -> Self {
        Self {
            store,
            collection,
            state,
            write_timeout,
        }
    }

    /// Set `<collection>/<id>/read` to `true`. The id need not be in the local feed.
    pub async fn mark_as_read(&self, id: &str) -> Result<(), RemoteWriteError> {
        let path = self.read_path(id)?;
        self.write(WriteBatch::single(path, Value::Bool(true))).await?;
        tracing::debug!(id, "Marked notification read");
        Ok(())
    }

    /// Mark every currently unread notification read in one atomic batch.
    ///
    /// Returns how many records the batch covered; `0` means nothing was
    /// unread and no write was issued.
    pub async fn mark_all_as_read(&self) -> Result<usize, RemoteWriteError> {
        let unread = self.state.borrow().unread_ids();
        if unread.is_empty() {
            tracing::debug!("Nothing unread, skipping write");
            return Ok(0);
        }

        let mut batch = WriteBatch::new();
        for id in &unread {
            batch.insert(self.read_path(id)?, Value::Bool(true));
        }
        self.write(batch).await?;

        tracing::debug!(count = unread.len(), "Marked all notifications read");
        Ok(unread.len())
    }

    fn read_path(&self, id: &str) -> Result<StorePath, RemoteWriteError> {
        Ok(self.collection.child(id)?.child("read")?)
    }

    /// Run the write on its own task so a timeout or a released feed never cancels it.
    async fn write(&self, batch: WriteBatch) -> Result<i64, RemoteWriteError> {
        let store = self.store.clone();
        let write = tokio::spawn(async move { store.update(batch).await });

        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(result)) => result.inspect_err(|e| tracing::error!("Read-state write failed: {}", e)),
            Ok(Err(join_err)) => {
                tracing::error!("Read-state write task failed: {}", join_err);
                Err(RemoteWriteError::Unavailable)
            }
            Err(_) => {
                tracing::error!(
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "Read-state write timed out"
                );
                Err(RemoteWriteError::Timeout(self.write_timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::feed::testing::{next_state, FakeStore};
    use crate::feed::FeedSubscription;

    async fn feed_with(store: &Arc<FakeStore>, payload: Value) -> FeedSubscription {
        let feed = FeedSubscription::activate(
            store.clone(),
            StorePath::parse("notifications").unwrap(),
            Duration::from_millis(200),
        )
        .await
        .unwrap();
        let mut rx = feed.watch();
        store.push(1, Some(payload)).await;
        next_state(&mut rx).await;
        feed
    }

    fn scenario() -> Value {
        json!({
            "n1": { "title": "A", "message": "m1", "timestamp": 100 },
            "n2": { "title": "B", "message": "m2", "timestamp": 200, "read": true }
        })
    }

    fn written_paths(batch: &WriteBatch) -> Vec<String> {
        batch.paths().map(|p| p.to_string()).collect()
    }

    #[tokio::test]
    async fn test_mark_as_read_writes_one_path() {
        let store = FakeStore::new();
        let feed = feed_with(&store, scenario()).await;

        feed.updater().mark_as_read("n1").await.unwrap();

        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(written_paths(&writes[0]), vec!["notifications/n1/read"]);
        assert_eq!(
            writes[0].iter().next().map(|(_, v)| v.clone()),
            Some(json!(true))
        );
        // No optimistic overlay: local state waits for the next snapshot.
        assert_eq!(feed.state().unread_count, 1);
    }

    #[tokio::test]
    async fn test_mark_as_read_twice_writes_same_value() {
        let store = FakeStore::new();
        let feed = feed_with(&store, scenario()).await;
        let updater = feed.updater();

        updater.mark_as_read("n2").await.unwrap();
        updater.mark_as_read("n2").await.unwrap();

        let writes = store.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], writes[1]);
    }

    #[tokio::test]
    async fn test_mark_as_read_does_not_require_local_record() {
        let store = FakeStore::new();
        let feed = feed_with(&store, scenario()).await;

        feed.updater().mark_as_read("elsewhere").await.unwrap();
        assert_eq!(
            written_paths(&store.writes()[0]),
            vec!["notifications/elsewhere/read"]
        );
    }

    #[tokio::test]
    async fn test_mark_as_read_rejects_unaddressable_id() {
        let store = FakeStore::new();
        let feed = feed_with(&store, scenario()).await;

        for id in ["", "a/b", "a.b"] {
            let err = feed.updater().mark_as_read(id).await.unwrap_err();
            assert!(matches!(err, RemoteWriteError::InvalidPath(_)));
        }
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_mark_all_batches_only_unread() {
        let store = FakeStore::new();
        let feed = feed_with(&store, scenario()).await;

        let count = feed.updater().mark_all_as_read().await.unwrap();
        assert_eq!(count, 1);

        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(written_paths(&writes[0]), vec!["notifications/n1/read"]);
    }

    #[tokio::test]
    async fn test_mark_all_covers_every_unread_in_one_batch() {
        let store = FakeStore::new();
        let feed = feed_with(
            &store,
            json!({
                "a": { "title": "t", "message": "m", "timestamp": 1 },
                "b": { "title": "t", "message": "m", "timestamp": 2, "read": false },
                "c": { "title": "t", "message": "m", "timestamp": 3, "read": true },
                "d": { "title": "t", "message": "m", "timestamp": 4 }
            }),
        )
        .await;

        assert_eq!(feed.updater().mark_all_as_read().await.unwrap(), 3);

        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(
            written_paths(&writes[0]),
            vec![
                "notifications/a/read",
                "notifications/b/read",
                "notifications/d/read"
            ]
        );
    }

    #[tokio::test]
    async fn test_mark_all_with_nothing_unread_issues_no_write() {
        let store = FakeStore::new();
        let feed = feed_with(
            &store,
            json!({ "n2": { "title": "B", "message": "m2", "timestamp": 200, "read": true } }),
        )
        .await;

        assert_eq!(feed.updater().mark_all_as_read().await.unwrap(), 0);
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_mark_all_while_loading_issues_no_write() {
        let store = FakeStore::new();
        let feed = FeedSubscription::activate(
            store.clone(),
            StorePath::parse("notifications").unwrap(),
            Duration::from_millis(200),
        )
        .await
        .unwrap();

        assert_eq!(feed.updater().mark_all_as_read().await.unwrap(), 0);
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_surfaces_to_caller() {
        let store = FakeStore::new();
        let feed = feed_with(&store, scenario()).await;
        store.fail_writes(true);

        let err = feed.updater().mark_as_read("n1").await.unwrap_err();
        assert!(matches!(err, RemoteWriteError::Rejected(_)));

        let err = feed.updater().mark_all_as_read().await.unwrap_err();
        assert!(matches!(err, RemoteWriteError::Rejected(_)));
        assert_eq!(feed.state().unread_count, 1);
    }

    #[tokio::test]
    async fn test_slow_write_times_out() {
        let store = FakeStore::new();
        let feed = feed_with(&store, scenario()).await;
        store.delay_writes(Duration::from_secs(5));

        let err = feed.updater().mark_as_read("n1").await.unwrap_err();
        assert_eq!(err, RemoteWriteError::Timeout(Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_write_in_flight_survives_release() {
        let store = FakeStore::new();
        let feed = feed_with(&store, scenario()).await;
        store.delay_writes(Duration::from_millis(50));

        let updater = feed.updater();
        let pending = tokio::spawn(async move { updater.mark_as_read("n1").await });
        feed.release();

        pending.await.unwrap().unwrap();
        assert_eq!(store.writes().len(), 1);
        assert_eq!(feed.state().revision_id, Some(1));
    }
}
