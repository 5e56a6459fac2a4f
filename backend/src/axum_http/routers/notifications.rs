use std::{convert::Infallible, sync::Arc};

use axum::{
    Router,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use futures::{Stream, stream};
use tracing::{info, warn};

use crate::{auth::AuthUser, realtime::registry::NotificationRegistry};

pub const NOTIFICATION_EVENT: &str = "notification:new";

pub fn routes(registry: Arc<NotificationRegistry>) -> Router {
    Router::new()
        .route("/stream", get(stream_notifications))
        .with_state(registry)
}

/// Server-sent events for the caller. The registry entry lives as long as the
/// response stream; a disconnect drops it.
pub async fn stream_notifications(
    State(registry): State<Arc<NotificationRegistry>>,
    AuthUser { user_id }: AuthUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = registry.subscribe(user_id);
    info!(
        %user_id,
        connections = registry.connection_count(user_id),
        "notifications: stream opened"
    );

    let events = stream::unfold(subscription, |mut subscription| async move {
        let notification = subscription.recv().await?;
        let event = Event::default()
            .event(NOTIFICATION_EVENT)
            .json_data(&notification)
            .unwrap_or_else(|err| {
                warn!(notification_id = %notification.id, error = %err, "notifications: failed to encode event");
                Event::default().event(NOTIFICATION_EVENT).data("{}")
            });
        Some((Ok(event), subscription))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
