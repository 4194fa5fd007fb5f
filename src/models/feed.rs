//! Snapshot and feed state models.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Notification;

/// One full push of a subscribed store path.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Store revision at the time the snapshot was read
    pub revision_id: i64,
    /// Subtree at the subscribed path, `None` when empty
    pub payload: Option<Value>,
}

/// Locally observable state of the feed.
///
/// Always a projection of the last applied snapshot; replaced as a whole, never patched.
#[derive(Debug, Clone)]
pub struct FeedState {
    pub notifications: Arc<[Notification]>,
    pub unread_count: usize,
    pub loading: bool,
    pub revision_id: Option<i64>,
    pub updated_at: Option<String>,
}

impl FeedState {
    /// State before any snapshot has arrived.
    pub fn loading() -> Self {
        Self {
            notifications: Arc::from(Vec::new()),
            unread_count: 0,
            loading: true,
            revision_id: None,
            updated_at: None,
        }
    }

    /// Ids of every record whose read flag is falsy, in feed order.
    pub fn unread_ids(&self) -> Vec<String> {
        self.notifications
            .iter()
            .filter(|n| !n.is_read())
            .map(|n| n.id.clone())
            .collect()
    }

    pub fn view(&self) -> FeedView {
        FeedView {
            notifications: self.notifications.to_vec(),
            unread_count: self.unread_count,
            loading: self.loading,
            revision_id: self.revision_id.unwrap_or(0),
            updated_at: self.updated_at.clone(),
        }
    }
}

/// Read-only projection of the feed served to presentation clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedView {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
    pub loading: bool,
    pub revision_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Unread badge information.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadInfo {
    pub unread_count: usize,
    pub loading: bool,
}
