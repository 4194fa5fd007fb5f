//! Snapshot normalization: decode, order, count.

use serde_json::Value;

use crate::models::Notification;

/// Turn a snapshot payload into the ordered local collection.
///
/// Newest first by `timestamp`; equal timestamps keep the store's enumeration
/// order. Entries that fail to decode cleanly are kept best-effort.
pub fn materialize(payload: Option<&Value>) -> Vec<Notification> {
    let Some(entries) = payload.and_then(Value::as_object) else {
        if let Some(other) = payload.filter(|v| !v.is_null()) {
            tracing::warn!("Ignoring non-object notification payload: {}", other);
        }
        return Vec::new();
    };

    let mut notifications: Vec<Notification> = entries
        .iter()
        .map(|(id, value)| {
            let (notification, malformed) = Notification::from_entry(id, value);
            if malformed {
                tracing::warn!(id = %id, "Malformed notification record, keeping best-effort copy");
            }
            notification
        })
        .collect();

    // sort_by is stable
    notifications.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    notifications
}

/// Records whose read flag is falsy.
pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| !n.is_read()).count()
}
