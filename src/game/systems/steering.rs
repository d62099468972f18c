use crate::game::state::Heading;
use crate::util::vec2::{normalize_angle, Vec2};

/// Result of one steering step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SteerResult {
    pub position: Vec2,
    pub direction: f32,
}

/// Move `speed` units toward `target`, turning at most `max_turn` radians.
///
/// Within `speed` of the target the head snaps onto it instead of overshooting.
/// A head already on the target stays put with its heading unchanged.
pub fn advance_heading(
    position: Vec2,
    target: Vec2,
    direction: f32,
    speed: f32,
    max_turn: f32,
) -> SteerResult {
    let distance = position.distance_to(target);
    if distance == 0.0 {
        return SteerResult {
            position,
            direction,
        };
    }

    let delta = normalize_angle(position.bearing_to(target) - direction).clamp(-max_turn, max_turn);
    let direction = normalize_angle(direction + delta);

    let position = if distance < speed {
        target
    } else {
        position + Vec2::from_angle(direction) * speed
    };

    SteerResult {
        position,
        direction,
    }
}

/// Steer the player head, updating `heading` in place
pub fn steer(position: Vec2, target: Vec2, heading: &mut Heading, speed: f32) -> Vec2 {
    let result = advance_heading(position, target, heading.direction, speed, heading.max_turn);
    heading.direction = result.direction;
    result.position
}

/// Whether `position` is inside the closed arena square
#[inline]
pub fn in_arena(position: Vec2, arena_size: f32) -> bool {
    (0.0..=arena_size).contains(&position.x) && (0.0..=arena_size).contains(&position.y)
}

/// Caps how far the pointer target may jump between samples
#[derive(Debug, Clone, Copy)]
pub struct PointerLimiter {
    last: Vec2,
    max_step: f32,
}

impl PointerLimiter {
    pub fn new(start: Vec2, max_step: f32) -> Self {
        Self {
            last: start,
            max_step,
        }
    }

    /// Accept a raw pointer sample and return the rate-limited target
    pub fn sample(&mut self, raw: Vec2) -> Vec2 {
        let step = (raw - self.last).clamp_length(self.max_step);
        self.last += step;
        self.last
    }

    /// Jump to `position` without limiting (round restart)
    pub fn reset(&mut self, position: Vec2) {
        self.last = position;
    }

    pub fn current(&self) -> Vec2 {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f32::consts::PI;

    const EPSILON: f32 = 1e-4;

    #[test]
    fn test_turn_is_clamped() {
        // Target directly behind: wants a half turn, gets max_turn
        let result = advance_heading(Vec2::new(100.0, 100.0), Vec2::new(0.0, 100.0), 0.0, 1.5, 0.2);
        assert!((result.direction.abs() - 0.2).abs() < EPSILON);
        assert!((result.position.distance_to(Vec2::new(100.0, 100.0)) - 1.5).abs() < EPSILON);
    }

    #[test]
    fn test_straight_ahead_moves_speed_units() {
        let result = advance_heading(Vec2::new(0.0, 0.0), Vec2::new(100.0, 0.0), 0.0, 1.5, 0.2);
        assert!(result.position.approx_eq(Vec2::new(1.5, 0.0), EPSILON));
        assert!(result.direction.abs() < EPSILON);
    }

    #[test]
    fn test_turn_takes_short_way_across_pi() {
        // Heading just below PI, target just past it: turn through PI, not around
        let heading = PI - 0.05;
        let from = Vec2::new(300.0, 300.0);
        let target = from + Vec2::from_angle(-PI + 0.05) * 50.0;
        let result = advance_heading(from, target, heading, 1.0, 0.2);
        let turned = normalize_angle(result.direction - heading);
        assert!((turned - 0.1).abs() < EPSILON, "turned {}", turned);
    }

    #[test]
    fn test_snap_when_close() {
        let from = Vec2::new(10.0, 10.0);
        let target = Vec2::new(10.5, 10.0);
        let result = advance_heading(from, target, 0.0, 1.5, 0.2);
        assert_eq!(result.position, target);
        assert!(result.direction.abs() < EPSILON);
    }

    #[test]
    fn test_on_target_holds() {
        let from = Vec2::new(10.0, 10.0);
        let result = advance_heading(from, from, PI / 2.0, 1.5, 0.2);
        assert_eq!(result.position, from);
        assert_eq!(result.direction, PI / 2.0);
    }

    #[test]
    fn test_heading_change_never_exceeds_max_turn() {
        let mut rng = StdRng::seed_from_u64(99);
        let max_turn = PI / 16.0;
        let mut heading = Heading::new(0.0, max_turn);
        let mut position = Vec2::new(300.0, 300.0);

        for _ in 0..2000 {
            let target = Vec2::new(rng.gen_range(0.0..600.0), rng.gen_range(0.0..600.0));
            let before = heading.direction;
            position = steer(position, target, &mut heading, 1.5);
            let change = normalize_angle(heading.direction - before).abs();
            assert!(change <= max_turn + EPSILON, "turned {}", change);
            assert!(position.is_finite());
        }
    }

    #[test]
    fn test_in_arena_bounds() {
        assert!(in_arena(Vec2::new(0.0, 600.0), 600.0));
        assert!(in_arena(Vec2::new(300.0, 300.0), 600.0));
        assert!(!in_arena(Vec2::new(-0.1, 300.0), 600.0));
        assert!(!in_arena(Vec2::new(300.0, 600.1), 600.0));
    }

    #[test]
    fn test_pointer_limiter_caps_jump() {
        let mut limiter = PointerLimiter::new(Vec2::new(0.0, 0.0), 8.0);
        let limited = limiter.sample(Vec2::new(100.0, 0.0));
        assert!(limited.approx_eq(Vec2::new(8.0, 0.0), EPSILON));

        let small = limiter.sample(Vec2::new(10.0, 0.0));
        assert!(small.approx_eq(Vec2::new(10.0, 0.0), EPSILON));

        limiter.reset(Vec2::new(500.0, 500.0));
        assert_eq!(limiter.current(), Vec2::new(500.0, 500.0));
    }
}
