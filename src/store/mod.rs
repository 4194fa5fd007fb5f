//! Notification store client.
//!
//! The store is a multi-writer key-value tree. Consumers hold long-lived
//! subscriptions that receive the full subtree on every change, and write
//! through partial-path batches.

mod path;
mod sqlite;

pub use path::*;
pub use sqlite::*;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::errors::{RemoteWriteError, SubscriptionError};
use crate::models::Snapshot;

/// Receiving end of a store subscription. Dropping it ends the subscription.
pub type SnapshotReceiver = mpsc::Receiver<Snapshot>;

/// Snapshots buffered per subscription before the store waits for the consumer.
pub const SUBSCRIPTION_BUFFER: usize = 16;

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Subscribe to the subtree at `path`. The current snapshot is delivered
    /// first, then one full snapshot per committed change.
    async fn subscribe(&self, path: &StorePath) -> Result<SnapshotReceiver, SubscriptionError>;

    /// Apply every pair of the batch atomically and return the new revision.
    async fn update(&self, batch: WriteBatch) -> Result<i64, RemoteWriteError>;

    /// Single-pair form of [`NotificationStore::update`].
    async fn set(&self, path: StorePath, value: Value) -> Result<i64, RemoteWriteError> {
        self.update(WriteBatch::single(path, value)).await
    }
}
