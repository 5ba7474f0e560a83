use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use inkroom_shared::{AuthorId, ServerMessage};
use tokio::sync::{mpsc, RwLock};

use crate::config::Config;
use crate::rooms::RoomRegistry;
use crate::store::{StoreLimits, StrokeStore};

/// Outbound queue of one connection, drained by its socket writer task.
pub type Outbound = mpsc::UnboundedSender<Arc<ServerMessage>>;

#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RoomRegistry>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let rooms = RoomRegistry::new(config.eviction_policy(), config.store_limits());
        Self {
            rooms: Arc::new(rooms),
            config: Arc::new(config),
        }
    }
}

pub struct Room {
    pub id: String,
    pub state: RwLock<RoomState>,
}

impl Room {
    pub fn new(id: String, limits: StoreLimits) -> Self {
        Self {
            id,
            state: RwLock::new(RoomState::new(limits)),
        }
    }
}

/// Everything a room mutates. Held behind the room's lock so events apply one at a time.
pub struct RoomState {
    pub store: StrokeStore,
    pub peers: HashMap<AuthorId, Outbound>,
    pub last_active: Instant,
}

impl RoomState {
    pub fn new(limits: StoreLimits) -> Self {
        Self {
            store: StrokeStore::new(limits),
            peers: HashMap::new(),
            last_active: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }
}
