//! Notification model as pushed by the notification store.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification of a notification. Unknown values decode as unclassified.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    NewMovie,
    NewSeries,
    Update,
    Announcement,
    Promo,
    News,
}

impl NotificationType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new_movie" => Some(NotificationType::NewMovie),
            "new_series" => Some(NotificationType::NewSeries),
            "update" => Some(NotificationType::Update),
            "announcement" => Some(NotificationType::Announcement),
            "promo" => Some(NotificationType::Promo),
            "news" => Some(NotificationType::News),
            _ => None,
        }
    }
}

/// A single notification record, keyed by its store id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub title: String,
    pub message: String,
    /// Producer-assigned creation time, only meaningful for ordering
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<bool>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<NotificationType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movie_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_link: Option<String>,
}

impl Notification {
    /// Absent `read` counts as unread.
    pub fn is_read(&self) -> bool {
        self.read.unwrap_or(false)
    }

    /// Decode one store entry into a notification.
    ///
    /// The key is authoritative for `id`. Missing or mistyped fields never fail
    /// the decode: required fields fall back to empty/zero and the record is
    /// reported as malformed through the returned flag, optional fields are
    /// simply left absent.
    pub fn from_entry(id: &str, value: &Value) -> (Self, bool) {
        let mut notification = Notification {
            id: id.to_string(),
            title: String::new(),
            message: String::new(),
            timestamp: 0,
            read: None,
            kind: None,
            poster: None,
            image_url: None,
            movie_id: None,
            redirect_link: None,
        };

        let Some(fields) = value.as_object() else {
            return (notification, true);
        };

        let mut malformed = false;

        match fields.get("title").and_then(Value::as_str) {
            Some(title) => notification.title = title.to_string(),
            None => malformed = true,
        }
        match fields.get("message").and_then(Value::as_str) {
            Some(message) => notification.message = message.to_string(),
            None => malformed = true,
        }
        match fields.get("timestamp").and_then(parse_timestamp) {
            Some(timestamp) => notification.timestamp = timestamp,
            None => malformed = true,
        }

        notification.read = fields.get("read").and_then(Value::as_bool);
        notification.kind = fields
            .get("type")
            .and_then(Value::as_str)
            .and_then(NotificationType::from_str);
        notification.poster = string_field(fields.get("poster"));
        notification.image_url = string_field(fields.get("imageUrl"));
        notification.movie_id = match fields.get("movieId") {
            Some(Value::Number(n)) => Some(n.to_string()),
            other => string_field(other),
        };
        notification.redirect_link = string_field(fields.get("redirectLink"));

        (notification, malformed)
    }
}

fn string_field(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
