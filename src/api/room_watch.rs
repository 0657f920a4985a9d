use std::sync::Arc;

use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::broadcast;
use warp::ws::{Message, WebSocket};
use warp::{Filter, Reply};

use crate::room::Room;

use super::{with_state, AppState};

/// Change feed endpoint: one WebSocket per (viewer, room), emitting the
/// full current Room document on every committed mutation.
pub fn watch_route(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl Reply, Error = warp::Rejection> + Clone {
    warp::path!("api" / "rooms" / String / "watch")
        .and(warp::ws())
        .and(with_state(state))
        .map(|code: String, ws: warp::ws::Ws, state: Arc<AppState>| {
            ws.on_upgrade(move |websocket| handle_room_watch(websocket, code, state))
        })
}

async fn handle_room_watch(websocket: WebSocket, code: String, state: Arc<AppState>) {
    let code = super::normalize_code(&code);
    tracing::info!(room_code = %code, "Room watch connection established");

    let (mut ws_sender, mut ws_receiver) = websocket.split();

    // Snapshot and subscription are taken under one lock acquisition, so
    // the feed can only yield frames newer than the snapshot
    let (snapshot, mut feed) = match state.coordinator.store().subscribe_with_snapshot(&code).await
    {
        Ok(pair) => pair,
        Err(e) => {
            let _ = ws_sender
                .send(Message::text(
                    serde_json::json!({ "ok": false, "message": e.to_string() }).to_string(),
                ))
                .await;
            let _ = ws_sender.send(Message::close()).await;
            return;
        }
    };

    // Current snapshot first, so a late viewer does not wait for the next
    // mutation to see the room
    if send_room(&mut ws_sender, &snapshot).await.is_err() {
        return;
    }

    // Drain client frames so pings keep the connection alive
    let reader_task = tokio::spawn(async move {
        while let Some(result) = ws_receiver.next().await {
            if result.is_err() {
                break;
            }
        }
    });

    loop {
        match feed.recv().await {
            Ok(room) => {
                if let Err(e) = send_room(&mut ws_sender, &room).await {
                    tracing::debug!(room_code = %code, error = %e, "Viewer disconnected");
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                // Snapshots are full documents, skipping stale ones is safe
                tracing::warn!(room_code = %code, skipped, "Room watch lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                // Room archived or deleted; end of stream tells the viewer
                let _ = ws_sender.send(Message::close()).await;
                break;
            }
        }
    }

    reader_task.abort();
    tracing::info!(room_code = %code, "Room watch connection closed");
}

async fn send_room(
    ws_sender: &mut (impl Sink<Message, Error = warp::Error> + Unpin),
    room: &Room,
) -> Result<(), warp::Error> {
    let payload = serde_json::to_string(room).unwrap_or_default();
    ws_sender.send(Message::text(payload)).await
}
