//! Authoritative in-progress game state for one room

use std::collections::HashMap;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::arena::{self, BLAST_RADIUS};
use crate::game::blast;
use crate::player::Player;
use crate::ws::protocol::ServerMsg;

/// A dropped bomb waiting on its detonation timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bomb {
    pub id: Uuid,
    pub x: f32,
    pub y: f32,
    pub owner: Uuid,
    /// Unix millis at drop time.
    pub armed_at: u64,
}

/// Transient area effect left behind by a detonation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blast {
    pub id: Uuid,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// Unix millis at detonation time.
    pub created_at: u64,
}

/// What a detonation did to the session.
#[derive(Debug)]
pub struct Detonation {
    pub blast_id: Uuid,
    /// Newly eliminated players, in stable order.
    pub eliminated: Vec<Uuid>,
}

/// The authoritative state of one running game.
///
/// A session exists exactly while its room is playing and is only ever
/// mutated under that room's lock. The id doubles as the capability that
/// detonation and cleanup callbacks validate before touching the state.
pub struct Session {
    pub id: Uuid,
    players: HashMap<Uuid, Player>,
    bombs: HashMap<Uuid, Bomb>,
    blasts: Vec<Blast>,
}

impl Session {
    /// Start a game from the room's roster: everyone alive, positions
    /// re-randomized inside the arena from the given seed.
    pub fn start(roster: Vec<Player>, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let players = roster
            .into_iter()
            .map(|mut p| {
                let (x, y) = arena::random_spawn(&mut rng);
                p.x = x;
                p.y = y;
                p.alive = true;
                (p.id, p)
            })
            .collect();

        Self {
            id: Uuid::new_v4(),
            players,
            bombs: HashMap::new(),
            blasts: Vec::new(),
        }
    }

    pub fn players(&self) -> &HashMap<Uuid, Player> {
        &self.players
    }

    /// Apply a movement delta. Returns `false` (and mutates nothing) for an
    /// unknown or dead player; stale client input is expected, not an error.
    pub fn apply_move(&mut self, player: Uuid, dx: f32, dy: f32) -> bool {
        let Some(p) = self.players.get_mut(&player) else {
            return false;
        };
        if !p.alive {
            return false;
        }
        let (x, y) = arena::clamp_to_arena(p.x + dx, p.y + dy);
        p.x = x;
        p.y = y;
        true
    }

    /// Place a bomb owned by `owner`. Returns its id, or `None` if the
    /// owner is not an alive member of this session.
    pub fn drop_bomb(&mut self, owner: Uuid, x: f32, y: f32, now: u64) -> Option<Uuid> {
        if !self.players.get(&owner).map(|p| p.alive).unwrap_or(false) {
            return None;
        }
        let bomb = Bomb {
            id: Uuid::new_v4(),
            x,
            y,
            owner,
            armed_at: now,
        };
        let id = bomb.id;
        self.bombs.insert(id, bomb);
        Some(id)
    }

    /// Detonate a bomb: remove it, leave a blast at its position, and mark
    /// every caught player dead. Returns `None` if the bomb is already gone.
    pub fn detonate(&mut self, bomb_id: Uuid, now: u64) -> Option<Detonation> {
        let bomb = self.bombs.remove(&bomb_id)?;
        let blast = Blast {
            id: Uuid::new_v4(),
            x: bomb.x,
            y: bomb.y,
            radius: BLAST_RADIUS,
            created_at: now,
        };

        let eliminated = blast::eliminate(&self.players, blast.x, blast.y, blast.radius);
        for id in &eliminated {
            if let Some(p) = self.players.get_mut(id) {
                p.alive = false;
            }
        }

        let blast_id = blast.id;
        self.blasts.push(blast);
        Some(Detonation {
            blast_id,
            eliminated,
        })
    }

    /// Remove a blast by identity. Returns `false` if it was already gone.
    pub fn clear_blast(&mut self, blast_id: Uuid) -> bool {
        let before = self.blasts.len();
        self.blasts.retain(|b| b.id != blast_id);
        self.blasts.len() != before
    }

    /// Mark a player dead (used when a member disconnects mid-game).
    pub fn mark_dead(&mut self, player: Uuid) -> bool {
        match self.players.get_mut(&player) {
            Some(p) if p.alive => {
                p.alive = false;
                true
            }
            _ => false,
        }
    }

    pub fn alive_count(&self) -> usize {
        self.players.values().filter(|p| p.alive).count()
    }

    /// The winner, if exactly one session member is still alive. Departed
    /// members were marked dead on leave, so they never count as remaining.
    pub fn sole_survivor(&self) -> Option<&Player> {
        let mut alive = self.players.values().filter(|p| p.alive);
        match (alive.next(), alive.next()) {
            (Some(p), None) => Some(p),
            _ => None,
        }
    }

    /// Full-state update pushed to the room after every mutation.
    pub fn snapshot(&self) -> ServerMsg {
        ServerMsg::GameUpdate {
            players: self.players.clone(),
            bombs: self.bombs.clone(),
            blasts: self.blasts.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::arena::{ARENA_HEIGHT, ARENA_WIDTH};

    fn roster(count: usize) -> Vec<Player> {
        (0..count)
            .map(|i| Player {
                id: Uuid::new_v4(),
                username: format!("player_{i}"),
                x: 0.0,
                y: 0.0,
                color: "#3498db".to_string(),
                alive: true,
            })
            .collect()
    }

    fn member_ids(session: &Session) -> Vec<Uuid> {
        session.players().keys().copied().collect()
    }

    fn state(session: &Session) -> (HashMap<Uuid, Player>, HashMap<Uuid, Bomb>, Vec<Blast>) {
        match session.snapshot() {
            ServerMsg::GameUpdate {
                players,
                bombs,
                blasts,
            } => (players, bombs, blasts),
            _ => unreachable!(),
        }
    }

    #[test]
    fn start_respawns_everyone_alive_in_bounds() {
        let mut roster = roster(4);
        roster[0].alive = false;
        let session = Session::start(roster, 7);

        assert_eq!(session.players().len(), 4);
        for p in session.players().values() {
            assert!(p.alive);
            assert!((0.0..=ARENA_WIDTH).contains(&p.x));
            assert!((0.0..=ARENA_HEIGHT).contains(&p.y));
        }
    }

    #[test]
    fn moves_are_clamped() {
        let mut session = Session::start(roster(2), 7);
        let id = member_ids(&session)[0];

        assert!(session.apply_move(id, -5000.0, 5000.0));
        let p = &session.players()[&id];
        assert_eq!((p.x, p.y), (0.0, ARENA_HEIGHT));
    }

    #[test]
    fn dead_and_unknown_players_cannot_move_or_drop() {
        let mut session = Session::start(roster(2), 7);
        let id = member_ids(&session)[0];
        session.mark_dead(id);

        assert!(!session.apply_move(id, 1.0, 1.0));
        assert!(session.drop_bomb(id, 10.0, 10.0, 0).is_none());
        assert!(!session.apply_move(Uuid::new_v4(), 1.0, 1.0));
        assert!(session.drop_bomb(Uuid::new_v4(), 10.0, 10.0, 0).is_none());
    }

    #[test]
    fn detonation_replaces_bomb_with_blast_and_eliminates() {
        let mut session = Session::start(roster(3), 7);
        let ids = member_ids(&session);

        // Two players at the blast center, one far outside.
        session.apply_move(ids[0], -5000.0, -5000.0);
        session.apply_move(ids[1], -5000.0, -5000.0);
        session.apply_move(ids[2], 5000.0, 5000.0);

        let bomb_id = session.drop_bomb(ids[0], 0.0, 0.0, 1000).unwrap();
        assert_eq!(state(&session).1.len(), 1);

        let detonation = session.detonate(bomb_id, 4000).unwrap();
        let (_, bombs, blasts) = state(&session);
        assert!(bombs.is_empty());
        assert_eq!(blasts.len(), 1);
        assert_eq!(blasts[0].radius, BLAST_RADIUS);

        let mut expected = vec![ids[0], ids[1]];
        expected.sort_unstable();
        assert_eq!(detonation.eliminated, expected);
        assert_eq!(session.alive_count(), 1);

        // The bomb is gone; a second detonation is a no-op.
        assert!(session.detonate(bomb_id, 4000).is_none());
    }

    #[test]
    fn clear_blast_removes_by_identity() {
        let mut session = Session::start(roster(1), 7);
        let id = member_ids(&session)[0];
        session.apply_move(id, 5000.0, 5000.0);

        let bomb_id = session.drop_bomb(id, 0.0, 0.0, 0).unwrap();
        let detonation = session.detonate(bomb_id, 3000).unwrap();

        assert!(session.clear_blast(detonation.blast_id));
        assert!(state(&session).2.is_empty());
        assert!(!session.clear_blast(detonation.blast_id));
    }

    #[test]
    fn sole_survivor_needs_exactly_one_alive() {
        let mut session = Session::start(roster(3), 7);
        let ids = member_ids(&session);

        assert!(session.sole_survivor().is_none());
        session.mark_dead(ids[0]);
        assert!(session.sole_survivor().is_none());
        session.mark_dead(ids[1]);
        assert_eq!(session.sole_survivor().unwrap().id, ids[2]);
        session.mark_dead(ids[2]);
        assert!(session.sole_survivor().is_none());
    }
}
