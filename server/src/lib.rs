//! Real-time shared drawing rooms over WebSocket.
//!
//! Each room owns an authoritative [`store::StrokeStore`]; connections join a room,
//! receive a full snapshot, and then exchange incremental stroke and cursor events.

pub mod config;
pub mod error;
pub mod handlers;
pub mod logic;
pub mod rooms;
pub mod state;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers::{health_handler, ping_handler, ws_handler, ws_room_handler};
use crate::rooms::RoomRegistry;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let public_dir = state.config.public_dir.clone();
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/ping", get(ping_handler))
        .route("/ws", get(ws_handler))
        .route("/ws/:room_id", get(ws_room_handler));
    let app = match public_dir {
        Some(public_dir) => {
            app.fallback_service(ServeDir::new(public_dir).append_index_html_on_directories(true))
        }
        None => app,
    };
    app.layer(TraceLayer::new_for_http()).with_state(state)
}

pub fn spawn_room_sweeper(rooms: Arc<RoomRegistry>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let evicted = rooms.sweep();
            if evicted > 0 {
                tracing::info!(evicted, remaining = rooms.len(), "Room sweep completed");
            }
        }
    })
}
