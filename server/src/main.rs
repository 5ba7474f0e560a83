use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use inkroom_server::config::Config;
use inkroom_server::state::AppState;
use inkroom_server::{router, spawn_room_sweeper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let state = AppState::new(config);
    spawn_room_sweeper(state.rooms.clone(), state.config.sweep_interval());

    let addr = state.config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        addr = %addr,
        lobby = %state.config.lobby,
        idle_ttl_secs = state.config.room_idle_ttl_secs,
        "Whiteboard server running"
    );

    axum::serve(listener, router(state))
        .await
        .context("server crashed")?;
    Ok(())
}
