//! Connected player registry and event fan-out
//!
//! One entry per live connection. The registry owns the only delivery path
//! for server events: to a single connection, to a room's members, or to
//! everyone. Entries outside a session are only touched by their own
//! connection's events.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::game::arena;
use crate::lobby::RoomError;
use crate::ws::protocol::ServerMsg;

/// A connected player's last-known state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: Uuid,
    pub username: String,
    pub x: f32,
    pub y: f32,
    pub color: String,
    pub alive: bool,
}

/// Outbound event channel for one connection.
pub type EventSender = mpsc::UnboundedSender<ServerMsg>;

struct Connection {
    player: Player,
    events: EventSender,
}

/// Tracks every connected identity.
pub struct PlayerRegistry {
    connections: DashMap<Uuid, Connection>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a fresh connection with a random spawn position and color.
    /// A reconnecting client gets a new connection id, so an occupied slot
    /// means a duplicate login on the same connection.
    pub fn register(
        &self,
        id: Uuid,
        username: &str,
        events: EventSender,
    ) -> Result<Player, RoomError> {
        match self.connections.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(RoomError::DuplicateConnection),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let mut rng = rand::thread_rng();
                let (x, y) = arena::random_spawn(&mut rng);
                let player = Player {
                    id,
                    username: username.to_string(),
                    x,
                    y,
                    color: arena::random_color(&mut rng).to_string(),
                    alive: true,
                };
                slot.insert(Connection {
                    player: player.clone(),
                    events,
                });
                debug!(player_id = %id, username, "Player registered");
                Ok(player)
            }
        }
    }

    /// Remove a connection. No-op if it was never registered.
    pub fn unregister(&self, id: Uuid) {
        self.connections.remove(&id);
    }

    /// Apply a movement delta to the stored position, clamped to the arena.
    /// Silently ignores unknown connections; movement from a stale client
    /// must never fail.
    pub fn apply_move(&self, id: Uuid, dx: f32, dy: f32) {
        if let Some(mut conn) = self.connections.get_mut(&id) {
            let p = &mut conn.player;
            let (x, y) = arena::clamp_to_arena(p.x + dx, p.y + dy);
            p.x = x;
            p.y = y;
        }
    }

    pub fn player(&self, id: Uuid) -> Option<Player> {
        self.connections.get(&id).map(|c| c.player.clone())
    }

    pub fn connected(&self) -> usize {
        self.connections.len()
    }

    /// Deliver an event to one connection. A closed or missing connection is
    /// ignored; the reader side tears the registration down on disconnect.
    pub fn send_to(&self, id: Uuid, msg: ServerMsg) {
        if let Some(conn) = self.connections.get(&id) {
            let _ = conn.events.send(msg);
        }
    }

    /// Deliver an event to every member of a room.
    pub fn send_to_members(&self, members: &[Uuid], msg: &ServerMsg) {
        for id in members {
            if let Some(conn) = self.connections.get(id) {
                let _ = conn.events.send(msg.clone());
            }
        }
    }

    /// Deliver an event to every connection.
    pub fn broadcast_all(&self, msg: &ServerMsg) {
        for conn in self.connections.iter() {
            let _ = conn.events.send(msg.clone());
        }
    }
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::arena::{ARENA_WIDTH, PLAYER_COLORS};

    fn channel() -> (EventSender, mpsc::UnboundedReceiver<ServerMsg>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn register_assigns_spawn_and_color() {
        let registry = PlayerRegistry::new();
        let (tx, _rx) = channel();
        let player = registry.register(Uuid::new_v4(), "alice", tx).unwrap();

        assert!(player.alive);
        assert!((0.0..=ARENA_WIDTH).contains(&player.x));
        assert!(PLAYER_COLORS.contains(&player.color.as_str()));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = PlayerRegistry::new();
        let id = Uuid::new_v4();
        let (tx, _rx) = channel();
        registry.register(id, "alice", tx).unwrap();

        let (tx2, _rx2) = channel();
        assert_eq!(
            registry.register(id, "alice", tx2),
            Err(RoomError::DuplicateConnection)
        );
        assert_eq!(registry.connected(), 1);
    }

    #[test]
    fn moves_clamp_and_unknown_ids_are_ignored() {
        let registry = PlayerRegistry::new();
        let id = Uuid::new_v4();
        let (tx, _rx) = channel();
        registry.register(id, "alice", tx).unwrap();

        registry.apply_move(id, -10_000.0, -10_000.0);
        let player = registry.player(id).unwrap();
        assert_eq!((player.x, player.y), (0.0, 0.0));

        // Must not panic or create an entry.
        registry.apply_move(Uuid::new_v4(), 1.0, 1.0);
        assert_eq!(registry.connected(), 1);
    }

    #[test]
    fn unregister_is_a_no_op_when_absent() {
        let registry = PlayerRegistry::new();
        registry.unregister(Uuid::new_v4());
        assert_eq!(registry.connected(), 0);
    }
}
