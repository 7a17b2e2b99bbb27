//! Room directory - creates, indexes, and drives rooms
//!
//! All room-set mutations (create/join/leave) run under the directory lock,
//! so the room table and the player->room reverse index can never disagree.
//! Game state is serialized by each room's own lock. Lock order is always
//! directory, then room; detonation callbacks release the scheduler's table
//! lock before touching either.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::game::arena::{ARM_DELAY_MS, BLAST_LIFETIME_MS};
use crate::game::scheduler::{DetonationScheduler, SessionId};
use crate::game::session::Session;
use crate::lobby::room::{Room, RoomHandle, RoomId, RoomPhase};
use crate::lobby::RoomError;
use crate::player::{Player, PlayerRegistry};
use crate::util::time::unix_millis;
use crate::ws::protocol::{RoomSummary, ServerMsg};

struct DirectoryInner {
    rooms: HashMap<RoomId, Arc<RoomHandle>>,
    /// A player appears here iff they are a member of exactly one room.
    player_rooms: HashMap<Uuid, RoomId>,
}

/// Creates and destroys rooms, routes player intents to sessions, and owns
/// the detonation and blast-cleanup callbacks.
pub struct RoomDirectory {
    registry: Arc<PlayerRegistry>,
    scheduler: Arc<DetonationScheduler>,
    inner: Mutex<DirectoryInner>,
}

impl RoomDirectory {
    pub fn new(registry: Arc<PlayerRegistry>, scheduler: Arc<DetonationScheduler>) -> Self {
        Self {
            registry,
            scheduler,
            inner: Mutex::new(DirectoryInner {
                rooms: HashMap::new(),
                player_rooms: HashMap::new(),
            }),
        }
    }

    /// Create a room with `owner` as its sole member. Returns `None` if the
    /// owner is already in a room.
    pub fn create_room(&self, owner: Uuid) -> Option<RoomId> {
        let mut inner = self.inner.lock();
        if inner.player_rooms.contains_key(&owner) {
            return None;
        }

        let mut id = RoomId::generate();
        while inner.rooms.contains_key(&id) {
            id = RoomId::generate();
        }

        let handle = Arc::new(RoomHandle::new(Room::new(id.clone(), owner)));
        inner.rooms.insert(id.clone(), handle);
        inner.player_rooms.insert(owner, id.clone());

        info!(room_id = %id, player_id = %owner, "Room created");
        self.registry
            .send_to(owner, ServerMsg::RoomCreated { room_id: id.clone() });
        self.broadcast_rooms_list_locked(&inner);
        Some(id)
    }

    /// Add a player to a waiting room. The fourth member flips the room to
    /// playing and starts the session in the same critical section, so no
    /// broadcast can observe a full room still waiting.
    pub fn join_room(&self, room_id: &RoomId, player: Uuid) -> Result<(), RoomError> {
        let mut inner = self.inner.lock();

        if let Some(current) = inner.player_rooms.get(&player) {
            // The client auto-joins the room it just created.
            if current == room_id {
                return Ok(());
            }
            return Err(RoomError::RoomUnavailable);
        }

        let handle = inner
            .rooms
            .get(room_id)
            .cloned()
            .ok_or(RoomError::RoomNotFound)?;
        let mut room = handle.lock();

        if !matches!(room.phase, RoomPhase::Waiting) || room.is_full() {
            return Err(RoomError::RoomUnavailable);
        }

        room.members.push(player);
        inner.player_rooms.insert(player, room_id.clone());
        handle.sync_meta(&room);
        info!(
            room_id = %room_id,
            player_id = %player,
            member_count = room.members.len(),
            "Player joined room"
        );

        if room.is_full() {
            self.start_session(&mut room);
            handle.sync_meta(&room);
        }

        self.broadcast_rooms_list_locked(&inner);
        Ok(())
    }

    /// Remove a player from their room, if any. An emptied room is destroyed
    /// together with its session and pending timers; a playing room marks
    /// the departed player dead and re-checks the win condition.
    pub fn leave_room(&self, player: Uuid) {
        let mut inner = self.inner.lock();
        let Some(room_id) = inner.player_rooms.remove(&player) else {
            return;
        };
        let Some(handle) = inner.rooms.get(&room_id).cloned() else {
            return;
        };

        let mut room = handle.lock();
        room.remove_member(player);
        handle.sync_meta(&room);
        info!(room_id = %room_id, player_id = %player, "Player left room");

        if room.members.is_empty() {
            if let RoomPhase::Playing(session) = &room.phase {
                self.scheduler.cancel_session(session.id);
            }
            drop(room);
            inner.rooms.remove(&room_id);
            debug!(room_id = %room_id, "Room destroyed");
        } else {
            if let RoomPhase::Playing(session) = &mut room.phase {
                // Disconnection is elimination, not absence.
                session.mark_dead(player);
                debug!(
                    room_id = %room_id,
                    alive = session.alive_count(),
                    "Departed player eliminated"
                );
                let update = session.snapshot();
                self.registry.send_to_members(&room.members, &update);
            }
            self.maybe_conclude(&handle, &mut room);
        }

        self.broadcast_rooms_list_locked(&inner);
    }

    /// Snapshot of all rooms at call time.
    pub fn list_rooms(&self) -> Vec<RoomSummary> {
        let inner = self.inner.lock();
        inner.rooms.values().map(|h| h.summary()).collect()
    }

    /// Reverse lookup: the room a player is currently a member of.
    pub fn room_of(&self, player: Uuid) -> Option<RoomId> {
        self.inner.lock().player_rooms.get(&player).cloned()
    }

    /// Apply a movement intent: always to the registry record, and to the
    /// player's session when they are in a playing room.
    pub fn player_move(&self, player: Uuid, dx: f32, dy: f32) {
        self.registry.apply_move(player, dx, dy);

        let Some(handle) = self.handle_of(player) else {
            return;
        };
        let mut room = handle.lock();
        let members = room.members.clone();
        if let RoomPhase::Playing(session) = &mut room.phase {
            if session.apply_move(player, dx, dy) {
                self.registry.send_to_members(&members, &session.snapshot());
            }
        }
    }

    /// Place a bomb and arm its detonation timer.
    pub fn drop_bomb(self: &Arc<Self>, player: Uuid, x: f32, y: f32) {
        let Some(handle) = self.handle_of(player) else {
            return;
        };
        let room_id = handle.id.clone();
        let mut room = handle.lock();
        let members = room.members.clone();
        let RoomPhase::Playing(session) = &mut room.phase else {
            return;
        };

        let session_id = session.id;
        let Some(bomb_id) = session.drop_bomb(player, x, y, unix_millis()) else {
            return;
        };
        debug!(room_id = %room_id, player_id = %player, bomb_id = %bomb_id, "Bomb armed");

        let directory = Arc::clone(self);
        self.scheduler.schedule(
            Duration::from_millis(ARM_DELAY_MS),
            session_id,
            move || directory.fire_detonation(room_id, session_id, bomb_id),
        );

        self.registry.send_to_members(&members, &session.snapshot());
    }

    /// Detonation callback. Re-validates the session under the room lock; a
    /// session destroyed in the meantime makes this a no-op.
    fn fire_detonation(self: Arc<Self>, room_id: RoomId, session_id: SessionId, bomb_id: Uuid) {
        let Some(handle) = self.handle(&room_id) else {
            return;
        };
        let mut room = handle.lock();
        let members = room.members.clone();
        let RoomPhase::Playing(session) = &mut room.phase else {
            return;
        };
        if session.id != session_id {
            return;
        }

        let Some(detonation) = session.detonate(bomb_id, unix_millis()) else {
            return;
        };
        for victim in &detonation.eliminated {
            info!(room_id = %room_id, player_id = %victim, "Player eliminated");
            self.registry
                .send_to_members(&members, &ServerMsg::PlayerKilled { player_id: *victim });
        }
        self.registry.send_to_members(&members, &session.snapshot());

        let directory = Arc::clone(&self);
        let blast_id = detonation.blast_id;
        self.scheduler.schedule(
            Duration::from_millis(BLAST_LIFETIME_MS),
            session_id,
            move || directory.clear_blast(room_id, session_id, blast_id),
        );
    }

    /// Blast-cleanup callback: drop the blast, then re-check the win
    /// condition.
    fn clear_blast(self: Arc<Self>, room_id: RoomId, session_id: SessionId, blast_id: Uuid) {
        let Some(handle) = self.handle(&room_id) else {
            return;
        };
        let mut room = handle.lock();
        let members = room.members.clone();
        {
            let RoomPhase::Playing(session) = &mut room.phase else {
                return;
            };
            if session.id != session_id {
                return;
            }
            if !session.clear_blast(blast_id) {
                return;
            }
            self.registry.send_to_members(&members, &session.snapshot());
        }

        let concluded = self.maybe_conclude(&handle, &mut room);
        drop(room);
        if concluded {
            self.broadcast_rooms_list();
        }
    }

    /// Conclude the game if exactly one member is still alive: back to
    /// waiting, session and pending timers destroyed, membership untouched.
    /// A room that is not playing (or already concluded) is a no-op.
    fn maybe_conclude(&self, handle: &RoomHandle, room: &mut Room) -> bool {
        let (session_id, winner) = match &room.phase {
            RoomPhase::Playing(session) => match session.sole_survivor() {
                Some(winner) => (session.id, winner.clone()),
                None => return false,
            },
            RoomPhase::Waiting => return false,
        };

        self.scheduler.cancel_session(session_id);
        room.phase = RoomPhase::Waiting;
        handle.sync_meta(room);
        info!(room_id = %room.id, winner = %winner.id, "Game over");
        self.registry
            .send_to_members(&room.members, &ServerMsg::GameOver { winner });
        true
    }

    fn start_session(&self, room: &mut Room) {
        let roster: Vec<Player> = room
            .members
            .iter()
            .filter_map(|id| self.registry.player(*id))
            .collect();
        let session = Session::start(roster, rand::random::<u64>());
        let players = session.players().clone();
        info!(room_id = %room.id, session_id = %session.id, "Game started");
        room.phase = RoomPhase::Playing(session);
        self.registry
            .send_to_members(&room.members, &ServerMsg::GameStart { players });
    }

    fn handle(&self, room_id: &RoomId) -> Option<Arc<RoomHandle>> {
        self.inner.lock().rooms.get(room_id).cloned()
    }

    fn handle_of(&self, player: Uuid) -> Option<Arc<RoomHandle>> {
        let inner = self.inner.lock();
        let room_id = inner.player_rooms.get(&player)?;
        inner.rooms.get(room_id).cloned()
    }

    /// Push the current room listing to every connection.
    pub fn broadcast_rooms_list(&self) {
        let inner = self.inner.lock();
        self.broadcast_rooms_list_locked(&inner);
    }

    fn broadcast_rooms_list_locked(&self, inner: &DirectoryInner) {
        let rooms: Vec<RoomSummary> = inner.rooms.values().map(|h| h.summary()).collect();
        self.registry.broadcast_all(&ServerMsg::RoomsList { rooms });
    }
}
