use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    middleware,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Extension, Router,
};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{info, warn};

use concert_shared::{Notification, Topic};

use crate::{
    middleware::{user_auth_middleware, AuthenticatedUser},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct SubscriptionQuery {
    /// Only meaningful for the images topic.
    pub performer_id: Option<i64>,
}

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/notifications/{topic}", get(subscribe))
        .route_layer(middleware::from_fn_with_state(state.clone(), user_auth_middleware))
}

fn wanted(notification: &Notification, topic: Topic, performer_id: Option<i64>) -> bool {
    if notification.topic() != topic {
        return false;
    }
    match (topic, performer_id) {
        (Topic::Images, Some(id)) => notification.performer_id() == Some(id),
        _ => true,
    }
}

async fn subscribe(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(topic): Path<Topic>,
    Query(query): Query<SubscriptionQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("{} subscribed to {} notifications", user.username, topic);

    let performer_id = query.performer_id;
    let rx = state.notifications.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(notification) if wanted(&notification, topic, performer_id) => {
                match Event::default().event(notification.event_name()).json_data(&notification) {
                    Ok(event) => Some(Ok(event)),
                    Err(e) => {
                        warn!("Failed to encode {} notification: {}", notification.event_name(), e);
                        None
                    }
                }
            }
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!("Notification subscriber lagged, skipped {} events", skipped);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
