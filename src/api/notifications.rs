//! Notification feed API endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream};
use serde::Serialize;
use tokio::sync::watch;

use super::{error, revision_of, success, ApiResult};
use crate::errors::AppError;
use crate::models::{FeedState, FeedView, UnreadInfo};
use crate::AppState;

/// Acknowledgment of a single mark-read write.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkedRead {
    pub id: String,
}

/// Acknowledgment of a mark-all-read batch.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkedAllRead {
    pub updated: usize,
}

/// GET /api/notifications - The ordered feed with unread count and loading flag.
pub async fn get_feed(State(state): State<AppState>) -> ApiResult<FeedView> {
    let feed = state.feed.state();
    success(feed.view(), revision_of(&feed))
}

/// GET /api/notifications/unread-count - Badge data only.
pub async fn get_unread_count(State(state): State<AppState>) -> ApiResult<UnreadInfo> {
    let feed = state.feed.state();
    success(
        UnreadInfo {
            unread_count: feed.unread_count,
            loading: feed.loading,
        },
        revision_of(&feed),
    )
}

/// POST /api/notifications/:id/read - Mark one notification read.
///
/// Success only confirms the write; the feed changes once the store pushes it back.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<MarkedRead> {
    let revision_id = revision_of(&state.feed.state());

    if id.trim().is_empty() {
        return error(
            AppError::Validation("Notification id is required".to_string()),
            revision_id,
        );
    }

    match state.feed.updater().mark_as_read(&id).await {
        Ok(()) => success(MarkedRead { id }, revision_id),
        Err(e) => error(e.into(), revision_id),
    }
}

/// POST /api/notifications/read-all - Mark every unread notification read in one batch.
pub async fn mark_all_read(State(state): State<AppState>) -> ApiResult<MarkedAllRead> {
    let revision_id = revision_of(&state.feed.state());

    match state.feed.updater().mark_all_as_read().await {
        Ok(updated) => success(MarkedAllRead { updated }, revision_id),
        Err(e) => error(e.into(), revision_id),
    }
}

/// GET /api/notifications/stream - Server-sent `feed` events, one per applied snapshot.
pub async fn stream_feed(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    Sse::new(feed_events(state.feed.watch())).keep_alive(KeepAlive::default())
}

/// The current view first, then one event per change until the feed is released.
fn feed_events(
    rx: watch::Receiver<Arc<FeedState>>,
) -> impl Stream<Item = Result<Event, axum::Error>> {
    stream::unfold((rx, true), |(mut rx, first)| async move {
        if !first && rx.changed().await.is_err() {
            return None;
        }
        let view = rx.borrow_and_update().view();
        let event = Event::default().event("feed").json_data(view);
        Some((event, (rx, false)))
    })
}
