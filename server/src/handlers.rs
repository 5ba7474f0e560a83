use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use futures_util::{SinkExt, StreamExt};
use inkroom_shared::{AuthorId, ClientMessage, ServerMessage};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::FrameError;
use crate::logic::{apply_client_message, deliver, join_room, leave_room};
use crate::rooms::normalize_room_id;
use crate::state::{AppState, Outbound, Room};

pub async fn ping_handler() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "rooms": state.rooms.len(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct RoomQuery {
    room: Option<String>,
}

pub async fn ws_handler(
    Query(query): Query<RoomQuery>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(ws, state, query.room.as_deref())
}

pub async fn ws_room_handler(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    upgrade(ws, state, Some(&room_id))
}

fn upgrade(ws: WebSocketUpgrade, state: AppState, requested: Option<&str>) -> Response {
    let room_id = match normalize_room_id(requested, &state.config.lobby) {
        Ok(room_id) => room_id,
        Err(error) => {
            tracing::debug!(requested = ?requested, %error, "Rejected room id");
            return (StatusCode::BAD_REQUEST, error.to_string()).into_response();
        }
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, room_id))
}

/// One decoded inbound frame.
#[derive(Debug)]
pub enum Inbound {
    Event(ClientMessage),
    Close(Option<CloseFrame<'static>>),
    Control,
}

pub fn decode_frame(message: Message) -> Result<Inbound, FrameError> {
    match message {
        Message::Text(text) => Ok(Inbound::Event(serde_json::from_str(&text)?)),
        Message::Binary(_) => Err(FrameError::Binary),
        Message::Close(frame) => Ok(Inbound::Close(frame)),
        Message::Ping(_) | Message::Pong(_) => Ok(Inbound::Control),
    }
}

async fn handle_socket(socket: WebSocket, state: AppState, room_id: String) {
    let (mut socket_sender, mut socket_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Arc<ServerMessage>>();
    let author_id = Uuid::new_v4();

    let room = enter_room(&state, &room_id, author_id, tx).await;

    let heartbeat = state.config.heartbeat();
    let send_task = tokio::spawn(async move {
        let mut ping = tokio::time::interval(heartbeat);
        ping.tick().await;
        loop {
            tokio::select! {
                message = rx.recv() => {
                    let Some(message) = message else {
                        break;
                    };
                    match serde_json::to_string(&*message) {
                        Ok(payload) => {
                            if socket_sender.send(Message::Text(payload)).await.is_err() {
                                break;
                            }
                        }
                        Err(error) => {
                            tracing::warn!(kind = message.kind(), %error, "Failed to encode event");
                        }
                    }
                }
                _ = ping.tick() => {
                    if socket_sender.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // a live client answers pings, so two silent intervals mean it is gone
    let idle_limit = heartbeat * 2;
    loop {
        let message = match tokio::time::timeout(idle_limit, socket_receiver.next()).await {
            Ok(Some(Ok(message))) => message,
            Ok(Some(Err(error))) => {
                tracing::debug!(room_id = %room_id, author_id = %author_id, %error, "WS receive failed");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                tracing::info!(room_id = %room_id, author_id = %author_id, "WS timed out");
                break;
            }
        };
        match decode_frame(message) {
            Ok(Inbound::Event(client_message)) => {
                let mut guard = room.state.write().await;
                guard.touch();
                if let Some(fanout) = apply_client_message(&mut guard, author_id, client_message) {
                    deliver(&mut guard, author_id, fanout);
                }
            }
            Ok(Inbound::Close(frame)) => {
                if let Some(frame) = &frame {
                    tracing::debug!(
                        room_id = %room_id,
                        author_id = %author_id,
                        code = frame.code,
                        reason = %frame.reason,
                        "WS close frame"
                    );
                }
                break;
            }
            Ok(Inbound::Control) => {}
            Err(error) => {
                tracing::debug!(room_id = %room_id, author_id = %author_id, %error, "Dropped frame");
            }
        }
    }

    {
        let mut guard = room.state.write().await;
        let discarded = leave_room(&mut guard, author_id);
        tracing::info!(
            room_id = %room_id,
            author_id = %author_id,
            peers = guard.peers.len(),
            discarded,
            "WS disconnected"
        );
    }
    send_task.abort();
}

/// Joins the room registered under `room_id`, retrying if it was evicted between
/// lookup and lock.
async fn enter_room(
    state: &AppState,
    room_id: &str,
    author_id: AuthorId,
    tx: Outbound,
) -> Arc<Room> {
    loop {
        let room = state.rooms.get_or_create(room_id);
        let mut guard = room.state.write().await;
        if !state.rooms.is_current(&room) {
            continue;
        }
        join_room(&mut guard, room_id, author_id, tx.clone());
        tracing::info!(
            room_id = %room_id,
            author_id = %author_id,
            peers = guard.peers.len(),
            strokes = guard.store.len(),
            "WS connected"
        );
        drop(guard);
        return room;
    }
}
