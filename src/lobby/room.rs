//! Room state machine and shared room handle

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::arena::ROOM_CAPACITY;
use crate::game::session::Session;
use crate::ws::protocol::{RoomStatus, RoomSummary};

/// Short join code handed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Eight hex chars of a fresh v4 UUID. Collisions are negligible, but
    /// the directory still regenerates on one.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string()[..8].to_string())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle of a room. The session lives inside the variant, so a session
/// without a playing room is unrepresentable.
pub enum RoomPhase {
    Waiting,
    Playing(Session),
}

/// A lobby room: up to [`ROOM_CAPACITY`] members in join order.
pub struct Room {
    pub id: RoomId,
    pub members: Vec<Uuid>,
    pub phase: RoomPhase,
}

impl Room {
    pub fn new(id: RoomId, owner: Uuid) -> Self {
        Self {
            id,
            members: vec![owner],
            phase: RoomPhase::Waiting,
        }
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= ROOM_CAPACITY
    }

    pub fn remove_member(&mut self, player: Uuid) -> bool {
        let before = self.members.len();
        self.members.retain(|m| *m != player);
        self.members.len() != before
    }

    pub fn status(&self) -> RoomStatus {
        match self.phase {
            RoomPhase::Waiting => RoomStatus::Waiting,
            RoomPhase::Playing(_) => RoomStatus::Playing,
        }
    }
}

/// Shared handle to one room's serialized state.
///
/// The mutex is the room's authority: every mutation of membership or
/// session state happens under it. The atomics mirror the fields listings
/// need, so `rooms-list` never contends with a room's own mutations.
pub struct RoomHandle {
    pub id: RoomId,
    state: Mutex<Room>,
    member_count: AtomicUsize,
    playing: AtomicBool,
}

impl RoomHandle {
    pub fn new(room: Room) -> Self {
        Self {
            id: room.id.clone(),
            member_count: AtomicUsize::new(room.members.len()),
            playing: AtomicBool::new(room.status() == RoomStatus::Playing),
            state: Mutex::new(room),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, Room> {
        self.state.lock()
    }

    /// Refresh the lock-free metadata after mutating the locked state.
    pub fn sync_meta(&self, room: &Room) {
        self.member_count.store(room.members.len(), Ordering::Relaxed);
        self.playing
            .store(room.status() == RoomStatus::Playing, Ordering::Relaxed);
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            player_count: self.member_count.load(Ordering::Relaxed),
            status: if self.playing.load(Ordering::Relaxed) {
                RoomStatus::Playing
            } else {
                RoomStatus::Waiting
            },
        }
    }
}
