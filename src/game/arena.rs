//! Arena geometry and gameplay constants
//!
//! These values are part of the wire contract with the client and must only
//! change if both sides agree.

use rand::Rng;

/// Arena width in world units.
pub const ARENA_WIDTH: f32 = 800.0;
/// Arena height in world units.
pub const ARENA_HEIGHT: f32 = 600.0;
/// Blast radius of a detonating bomb.
pub const BLAST_RADIUS: f32 = 100.0;
/// Delay between dropping a bomb and its detonation.
pub const ARM_DELAY_MS: u64 = 3000;
/// How long a blast stays in the session before it is cleared.
pub const BLAST_LIFETIME_MS: u64 = 1000;
/// Player slots per room.
pub const ROOM_CAPACITY: usize = 4;

/// Color tags assigned to players at login.
pub const PLAYER_COLORS: [&str; 8] = [
    "#e74c3c", // Red
    "#2ecc71", // Green
    "#3498db", // Blue
    "#f39c12", // Orange
    "#9b59b6", // Purple
    "#1abc9c", // Teal
    "#d35400", // Dark Orange
    "#c0392b", // Dark Red
];

/// Clamp a position to the arena bounds.
pub fn clamp_to_arena(x: f32, y: f32) -> (f32, f32) {
    (x.clamp(0.0, ARENA_WIDTH), y.clamp(0.0, ARENA_HEIGHT))
}

/// Generate a spawn position inside the arena.
pub fn random_spawn<R: Rng>(rng: &mut R) -> (f32, f32) {
    (
        rng.gen_range(0.0..ARENA_WIDTH),
        rng.gen_range(0.0..ARENA_HEIGHT),
    )
}

/// Pick a color tag for a new player.
pub fn random_color<R: Rng>(rng: &mut R) -> &'static str {
    PLAYER_COLORS[rng.gen_range(0..PLAYER_COLORS.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_keeps_in_bounds_position() {
        assert_eq!(clamp_to_arena(400.0, 300.0), (400.0, 300.0));
    }

    #[test]
    fn clamp_pins_to_edges() {
        assert_eq!(clamp_to_arena(-15.0, 700.0), (0.0, ARENA_HEIGHT));
        assert_eq!(clamp_to_arena(900.0, -1.0), (ARENA_WIDTH, 0.0));
    }

    #[test]
    fn move_round_trip_matches_clamp() {
        // Position after applying (dx, dy) equals clamp(old + delta).
        let (x, y) = (790.0, 10.0);
        let (dx, dy) = (25.0, -25.0);
        assert_eq!(clamp_to_arena(x + dx, y + dy), (ARENA_WIDTH, 0.0));
    }

    #[test]
    fn repeated_clamped_moves_are_associative() {
        // Applying two deltas one at a time lands on the same point as long
        // as no intermediate step leaves the arena.
        let (x0, y0) = (100.0, 100.0);
        let (x1, y1) = clamp_to_arena(x0 + 30.0, y0 + 40.0);
        let (x2, y2) = clamp_to_arena(x1 + 10.0, y1 + 5.0);
        assert_eq!((x2, y2), clamp_to_arena(x0 + 40.0, y0 + 45.0));
    }

    #[test]
    fn spawn_is_inside_arena() {
        let mut rng = rand::thread_rng();
        for _ in 0..100 {
            let (x, y) = random_spawn(&mut rng);
            assert!((0.0..=ARENA_WIDTH).contains(&x));
            assert!((0.0..=ARENA_HEIGHT).contains(&y));
        }
    }

    #[test]
    fn color_comes_from_palette() {
        let mut rng = rand::thread_rng();
        let color = random_color(&mut rng);
        assert!(PLAYER_COLORS.contains(&color));
    }
}
