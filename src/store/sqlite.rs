//! SQLite-backed notification store.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::SqlitePool;
use tokio::sync::{broadcast, mpsc};

use super::{NotificationStore, SnapshotReceiver, StorePath, WriteBatch, SUBSCRIPTION_BUFFER};
use crate::db::Repository;
use crate::errors::{RemoteWriteError, SubscriptionError};

/// A committed write batch, announced to every live subscription.
#[derive(Debug, Clone)]
struct Change {
    revision_id: i64,
    paths: Arc<[StorePath]>,
}

impl Change {
    /// Whether any written path lies at, above, or below `path`.
    fn touches(&self, path: &StorePath) -> bool {
        self.paths
            .iter()
            .any(|p| p == path || p.is_ancestor_of(path) || path.is_ancestor_of(p))
    }
}

/// Notification store persisted in SQLite.
///
/// Writers commit through [`Repository::apply_batch`]; each commit is
/// broadcast so subscription forwarders re-read their subtree.
pub struct SqliteStore {
    repo: Repository,
    changes: broadcast::Sender<Change>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            repo: Repository::new(pool),
            changes,
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }
}

#[async_trait]
impl NotificationStore for SqliteStore {
    async fn subscribe(&self, path: &StorePath) -> Result<SnapshotReceiver, SubscriptionError> {
        // Listen before the first read so no commit falls between the two.
        let mut changes = self.changes.subscribe();
        let initial = self.repo.read_subtree(path).await?;

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let mut last_sent = initial.revision_id;
        if tx.send(initial).await.is_err() {
            return Err(SubscriptionError::Rejected(
                "subscriber dropped before the first snapshot".to_string(),
            ));
        }

        let repo = self.repo.clone();
        let path = path.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    change = changes.recv() => match change {
                        Ok(change) if change.revision_id <= last_sent || !change.touches(&path) => continue,
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::debug!(%path, skipped, "Subscription lagged, re-reading");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }

                match repo.read_subtree(&path).await {
                    Ok(snapshot) if snapshot.revision_id > last_sent => {
                        last_sent = snapshot.revision_id;
                        if tx.send(snapshot).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(%path, "Failed to read subtree: {}", e),
                }
            }
            tracing::debug!(%path, "Store subscription closed");
        });

        Ok(rx)
    }

    async fn update(&self, batch: WriteBatch) -> Result<i64, RemoteWriteError> {
        let revision_id = self.repo.apply_batch(&batch).await?;
        tracing::debug!(revision_id, paths = batch.len(), "Store batch committed");

        // No receivers just means nobody is subscribed.
        let _ = self.changes.send(Change {
            revision_id,
            paths: batch.paths().cloned().collect(),
        });

        Ok(revision_id)
    }
}
