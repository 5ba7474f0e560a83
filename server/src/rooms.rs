//! Room id to room lookup, with lazy creation and policy-driven eviction.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::error::RoomIdError;
use crate::state::Room;
use crate::store::StoreLimits;

pub const MAX_ROOM_ID_LEN: usize = 64;

/// What the registry knows about a room when deciding whether to drop it.
#[derive(Clone, Copy, Debug)]
pub struct RoomActivity {
    pub members: usize,
    pub strokes: usize,
    pub idle: Duration,
}

pub trait EvictionPolicy: Send + Sync {
    fn should_evict(&self, activity: &RoomActivity) -> bool;
}

/// Rooms live for the whole process.
pub struct NeverEvict;

impl EvictionPolicy for NeverEvict {
    fn should_evict(&self, _activity: &RoomActivity) -> bool {
        false
    }
}

/// Drops rooms nobody has been connected to for at least the given duration.
pub struct IdleTtl(pub Duration);

impl EvictionPolicy for IdleTtl {
    fn should_evict(&self, activity: &RoomActivity) -> bool {
        activity.members == 0 && activity.idle >= self.0
    }
}

pub struct RoomRegistry {
    rooms: DashMap<String, Arc<Room>>,
    policy: Arc<dyn EvictionPolicy>,
    limits: StoreLimits,
}

impl RoomRegistry {
    pub fn new(policy: Arc<dyn EvictionPolicy>, limits: StoreLimits) -> Self {
        Self {
            rooms: DashMap::new(),
            policy,
            limits,
        }
    }

    pub fn get_or_create(&self, room_id: &str) -> Arc<Room> {
        if let Some(room) = self.rooms.get(room_id) {
            return room.value().clone();
        }
        self.rooms
            .entry(room_id.to_string())
            .or_insert_with(|| {
                tracing::info!(room_id = %room_id, "Room created");
                Arc::new(Room::new(room_id.to_string(), self.limits))
            })
            .value()
            .clone()
    }

    pub fn get(&self, room_id: &str) -> Option<Arc<Room>> {
        self.rooms.get(room_id).map(|room| room.value().clone())
    }

    /// Whether `room` is still the instance registered under its id.
    pub fn is_current(&self, room: &Arc<Room>) -> bool {
        self.rooms
            .get(&room.id)
            .map(|current| Arc::ptr_eq(current.value(), room))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Applies the eviction policy once and returns how many rooms were dropped.
    /// Rooms whose state is locked at the moment are kept.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut evicted = 0;
        self.rooms.retain(|room_id, room| {
            let Ok(state) = room.state.try_read() else {
                return true;
            };
            let activity = RoomActivity {
                members: state.peers.len(),
                strokes: state.store.len(),
                idle: now.saturating_duration_since(state.last_active),
            };
            if self.policy.should_evict(&activity) {
                tracing::info!(
                    room_id = %room_id,
                    strokes = activity.strokes,
                    idle_secs = activity.idle.as_secs(),
                    "Room evicted"
                );
                evicted += 1;
                false
            } else {
                true
            }
        });
        evicted
    }
}

/// Resolves the room a client asked for. Absent or blank ids select the lobby.
pub fn normalize_room_id(value: Option<&str>, lobby: &str) -> Result<String, RoomIdError> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Ok(lobby.to_string());
    }
    if value.len() > MAX_ROOM_ID_LEN {
        return Err(RoomIdError::TooLong {
            max: MAX_ROOM_ID_LEN,
        });
    }
    if let Some(invalid) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(RoomIdError::InvalidChar(invalid));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn registry(policy: impl EvictionPolicy + 'static) -> RoomRegistry {
        RoomRegistry::new(Arc::new(policy), StoreLimits::default())
    }

    #[test]
    fn same_id_resolves_to_one_room() {
        let rooms = registry(NeverEvict);
        let first = rooms.get_or_create("art");
        let second = rooms.get_or_create("art");
        let other = rooms.get_or_create("math");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(rooms.len(), 2);
    }

    #[test]
    fn never_evict_keeps_idle_rooms() {
        let rooms = registry(NeverEvict);
        rooms.get_or_create("art");
        assert_eq!(rooms.sweep(), 0);
        assert_eq!(rooms.len(), 1);
    }

    #[tokio::test]
    async fn idle_rooms_without_members_are_evicted() {
        let rooms = registry(IdleTtl(Duration::ZERO));
        let room = rooms.get_or_create("art");
        assert_eq!(rooms.sweep(), 1);
        assert!(rooms.get("art").is_none());
        assert!(!rooms.is_current(&room));

        let fresh = rooms.get_or_create("art");
        assert!(!Arc::ptr_eq(&room, &fresh));
        assert!(rooms.is_current(&fresh));
    }

    #[tokio::test]
    async fn rooms_with_members_survive_sweeps() {
        let rooms = registry(IdleTtl(Duration::ZERO));
        let room = rooms.get_or_create("art");
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        room.state.write().await.peers.insert(Uuid::new_v4(), tx);
        assert_eq!(rooms.sweep(), 0);
        assert!(rooms.is_current(&room));
    }

    #[tokio::test]
    async fn locked_rooms_survive_sweeps() {
        let rooms = registry(IdleTtl(Duration::ZERO));
        let room = rooms.get_or_create("art");
        let _guard = room.state.write().await;
        assert_eq!(rooms.sweep(), 0);
    }

    #[test]
    fn idle_ttl_waits_for_the_deadline() {
        let policy = IdleTtl(Duration::from_secs(60));
        let quiet = RoomActivity {
            members: 0,
            strokes: 3,
            idle: Duration::from_secs(10),
        };
        assert!(!policy.should_evict(&quiet));
        let abandoned = RoomActivity {
            idle: Duration::from_secs(61),
            ..quiet
        };
        assert!(policy.should_evict(&abandoned));
    }

    #[test]
    fn room_ids_default_to_lobby_and_are_validated() {
        assert_eq!(normalize_room_id(None, "lobby").unwrap(), "lobby");
        assert_eq!(normalize_room_id(Some("  "), "lobby").unwrap(), "lobby");
        assert_eq!(normalize_room_id(Some(" team-1 "), "lobby").unwrap(), "team-1");
        assert_eq!(
            normalize_room_id(Some("a/b"), "lobby"),
            Err(RoomIdError::InvalidChar('/'))
        );
        assert_eq!(
            normalize_room_id(Some(&"r".repeat(MAX_ROOM_ID_LEN + 1)), "lobby"),
            Err(RoomIdError::TooLong {
                max: MAX_ROOM_ID_LEN
            })
        );
    }
}
