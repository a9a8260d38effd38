//! WebSocket fan-out of the two logical channels in §6: `events` (every
//! stored `DomainEvent`, with `lastEventId` gap-fill and an optional
//! `streamId` filter) and `ui` (ephemeral per-task deltas, no replay
//! story — a client that reconnects mid-turn just misses what it missed).
//!
//! Each socket is split, with an `mpsc` outbound channel bridged to the sink
//! via a writer task while inbound frames are read in a loop that only cares
//! about `Close` and heartbeat pings.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio::sync::mpsc;

use seed_domain::StoredEvent;

use crate::state::AppState;

const HEARTBEAT_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub last_event_id: Option<u64>,
    #[serde(default)]
    pub stream_id: Option<String>,
}

pub async fn events_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_events_socket(socket, state, query))
}

async fn handle_events_socket(socket: WebSocket, state: AppState, query: EventsQuery) {
    let (mut sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::channel::<StoredEvent>(256);

    // Subscribe before the gap-fill read so nothing appended concurrently
    // is missed between the backlog read and the live feed taking over.
    let live_rx = state.kernel.subscribe_events();

    for stored in state.kernel.events_after(query.last_event_id.unwrap_or(0)) {
        if matches_stream(&query, &stored) && tx.send(stored).await.is_err() {
            return;
        }
    }

    let writer = tokio::spawn(forward_events(live_rx, tx, query));
    run_socket(&mut sink, &mut stream, rx, |event| serde_json::to_string(&event).ok()).await;
    writer.abort();
}

fn matches_stream(query: &EventsQuery, stored: &StoredEvent) -> bool {
    query.stream_id.as_deref().map(|id| id == stored.stream_id).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use seed_domain::DomainEvent;

    fn stored_for(stream_id: &str) -> StoredEvent {
        StoredEvent {
            id: 1,
            seq: 1,
            stream_id: stream_id.to_string(),
            event: DomainEvent::TaskCreated {
                task_id: stream_id.to_string(),
                title: "t".into(),
                intent: "i".into(),
                priority: Default::default(),
                agent_id: None,
                parent_task_id: None,
                author_actor_id: "user".into(),
            },
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn no_filter_matches_every_stream() {
        let query = EventsQuery { last_event_id: None, stream_id: None };
        assert!(matches_stream(&query, &stored_for("a")));
        assert!(matches_stream(&query, &stored_for("b")));
    }

    #[test]
    fn filter_only_matches_the_named_stream() {
        let query = EventsQuery { last_event_id: None, stream_id: Some("a".into()) };
        assert!(matches_stream(&query, &stored_for("a")));
        assert!(!matches_stream(&query, &stored_for("b")));
    }
}

async fn forward_events(mut live_rx: broadcast::Receiver<StoredEvent>, tx: mpsc::Sender<StoredEvent>, query: EventsQuery) {
    loop {
        match live_rx.recv().await {
            Ok(stored) => {
                if matches_stream(&query, &stored) && tx.send(stored).await.is_err() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "events ws lagged; client should resync via lastEventId");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

pub async fn ui_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ui_socket(socket, state))
}

async fn handle_ui_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::channel(256);
    let live_rx = state.kernel.subscribe_ui();

    let writer = tokio::spawn(forward_ui(live_rx, tx));
    run_socket(&mut sink, &mut stream, rx, |envelope| serde_json::to_string(&envelope).ok()).await;
    writer.abort();
}

async fn forward_ui(mut live_rx: broadcast::Receiver<seed_kernel::UiEnvelope>, tx: mpsc::Sender<seed_kernel::UiEnvelope>) {
    loop {
        match live_rx.recv().await {
            Ok(envelope) => {
                if tx.send(envelope).await.is_err() {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "ui ws lagged; deltas are not replayed");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

/// Drives one socket: writes everything the channel produces out to the
/// client while reading inbound frames just to notice `Close` and answer
/// `Ping`s (axum answers WS-protocol pings automatically; this loop exists
/// so the connection doesn't look dead to a proxy in between).
async fn run_socket<T: Send + 'static>(
    sink: &mut (impl SinkExt<Message> + Unpin),
    stream: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
    mut rx: mpsc::Receiver<T>,
    encode: impl Fn(T) -> Option<String>,
) {
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    loop {
        tokio::select! {
            item = rx.recv() => {
                let Some(item) = item else { break };
                let Some(text) = encode(item) else { continue };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            _ = heartbeat.tick() => {
                if sink.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }
}
