use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse,
    },
    routing::get,
    Router,
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{error, warn};

use super::common::{map_service_error, success_response};
use crate::{
    errors::{ApiError, ServiceError},
    notifications::{Notification, NotificationService},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// List the most recent notifications from the file store
async fn recent_notifications(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let notifications = state
        .notifications
        .recent(query.limit)
        .await
        .map_err(|e| map_service_error(ServiceError::NotificationError(e.to_string())))?;

    Ok(success_response(notifications))
}

fn sse_event(notification: &Notification) -> SseEvent {
    match SseEvent::default().event("notification").json_data(notification) {
        Ok(event) => event,
        Err(e) => {
            error!(error = %e, "Failed to serialize notification for SSE");
            SseEvent::default().event("notification").data("{}")
        }
    }
}

/// Stream live notifications over SSE. Lagging subscribers skip the missed
/// entries rather than terminating the stream; the `dedupe_key` in each
/// payload lets clients debounce duplicates.
async fn stream_notifications(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.notifications.subscribe();

    let stream = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(notification) => {
                    return Some((Ok(sse_event(&notification)), rx));
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "SSE subscriber lagged; dropping missed notifications");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Creates the router for notification endpoints
pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(recent_notifications))
        .route("/stream", get(stream_notifications))
}
