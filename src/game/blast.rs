//! Blast resolution - which players a detonation eliminates

use std::collections::HashMap;

use uuid::Uuid;

use crate::player::Player;

/// Resolve the players newly eliminated by a blast centered at `(cx, cy)`.
///
/// Euclidean distance with an inclusive boundary: a player exactly at
/// `radius` is caught. Already-dead players are never returned, so a blast
/// can't double-eliminate. The result is sorted so elimination events fire
/// in a stable order. No side effects; the caller applies the set.
pub fn eliminate(players: &HashMap<Uuid, Player>, cx: f32, cy: f32, radius: f32) -> Vec<Uuid> {
    let mut caught: Vec<Uuid> = players
        .values()
        .filter(|p| p.alive)
        .filter(|p| {
            let dx = p.x - cx;
            let dy = p.y - cy;
            dx * dx + dy * dy <= radius * radius
        })
        .map(|p| p.id)
        .collect();
    caught.sort_unstable();
    caught
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(x: f32, y: f32, alive: bool) -> Player {
        Player {
            id: Uuid::new_v4(),
            username: "tester".to_string(),
            x,
            y,
            color: "#e74c3c".to_string(),
            alive,
        }
    }

    fn roster(players: Vec<Player>) -> HashMap<Uuid, Player> {
        players.into_iter().map(|p| (p.id, p)).collect()
    }

    #[test]
    fn boundary_is_inclusive() {
        let on_edge = player(100.0, 0.0, true);
        let outside = player(100.001, 0.0, true);
        let on_edge_id = on_edge.id;
        let players = roster(vec![on_edge, outside]);

        let caught = eliminate(&players, 0.0, 0.0, 100.0);
        assert_eq!(caught, vec![on_edge_id]);
    }

    #[test]
    fn dead_players_are_excluded() {
        let dead = player(0.0, 0.0, false);
        let players = roster(vec![dead]);
        assert!(eliminate(&players, 0.0, 0.0, 100.0).is_empty());
    }

    #[test]
    fn adding_a_player_inside_never_shrinks_the_set() {
        let a = player(10.0, 10.0, true);
        let a_id = a.id;
        let mut players = roster(vec![a]);
        let before = eliminate(&players, 0.0, 0.0, 100.0);
        assert_eq!(before, vec![a_id]);

        let b = player(50.0, 50.0, true);
        let b_id = b.id;
        players.insert(b_id, b);
        let after = eliminate(&players, 0.0, 0.0, 100.0);
        assert!(after.contains(&a_id));
        assert!(after.contains(&b_id));
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn distance_is_euclidean() {
        // (60, 80) is exactly 100 from the origin; (61, 80) is not.
        let caught_p = player(60.0, 80.0, true);
        let missed_p = player(61.0, 80.0, true);
        let caught_id = caught_p.id;
        let players = roster(vec![caught_p, missed_p]);

        let caught = eliminate(&players, 0.0, 0.0, 100.0);
        assert_eq!(caught, vec![caught_id]);
    }
}
