//! Raw store write endpoint for the other writers of the notification store.

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::Value;

use super::{error, revision_of, success, ApiResult};
use crate::errors::AppError;
use crate::store::WriteBatch;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteAck {
    /// Store revision created by the write
    pub revision_id: i64,
}

/// PATCH /api/store - Multi-path partial write, atomic across all pairs.
pub async fn patch_store(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> ApiResult<WriteAck> {
    let revision_id = revision_of(&state.feed.state());

    match &body {
        Value::Object(pairs) if pairs.is_empty() => {
            return error(
                AppError::Validation("No updates provided".to_string()),
                revision_id,
            );
        }
        Value::Object(_) => {}
        _ => {
            return error(
                AppError::BadRequest("Body must be an object of path/value pairs".to_string()),
                revision_id,
            );
        }
    }

    let batch = match WriteBatch::from_json(&body) {
        Ok(batch) => batch,
        Err(e) => return error(e.into(), revision_id),
    };

    match state.store.update(batch).await {
        Ok(store_revision) => success(
            WriteAck {
                revision_id: store_revision,
            },
            revision_id,
        ),
        Err(e) => error(e.into(), revision_id),
    }
}
