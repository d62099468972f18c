use crate::game::state::{Boid, Trail};
use crate::util::vec2::Vec2;

/// Index of the first boid the head touches, if any.
///
/// At most one boid is eaten per tick.
pub fn first_eaten(head: Vec2, boids: &[Boid], eat_radius: f32) -> Option<usize> {
    let radius_sq = eat_radius * eat_radius;
    boids
        .iter()
        .position(|b| b.position.distance_sq_to(head) < radius_sq)
}

/// Number of segments right behind the head that never count as a collision
#[inline]
pub fn safe_prefix(max_len: usize, safe_fraction: f32) -> usize {
    (max_len as f32 * safe_fraction).floor() as usize + 1
}

/// Whether the head touches its own trail beyond the safe prefix
pub fn hits_own_trail(trail: &Trail, safe_fraction: f32, threshold: f32) -> bool {
    let head = trail.head();
    let skip = safe_prefix(trail.max_len(), safe_fraction);
    trail
        .iter()
        .skip(skip)
        .any(|segment| segment.distance_to(head) < threshold)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_eaten() {
        let boids = vec![
            Boid::new(Vec2::new(100.0, 100.0), Vec2::ZERO),
            Boid::new(Vec2::new(310.0, 300.0), Vec2::ZERO),
            Boid::new(Vec2::new(305.0, 300.0), Vec2::ZERO),
        ];
        assert_eq!(first_eaten(Vec2::new(300.0, 300.0), &boids, 12.0), Some(1));
        assert_eq!(first_eaten(Vec2::new(500.0, 500.0), &boids, 12.0), None);
        // Boundary is exclusive
        assert_eq!(first_eaten(Vec2::new(112.0, 100.0), &boids, 12.0), None);
    }

    #[test]
    fn test_safe_prefix() {
        assert_eq!(safe_prefix(100, 0.1), 11);
        assert_eq!(safe_prefix(5, 0.1), 1);
    }

    #[test]
    fn test_straight_trail_is_safe() {
        let mut trail = Trail::new(Vec2::new(0.0, 0.0), 100);
        for i in 1..100 {
            trail.push_head(Vec2::new(i as f32 * 1.5, 0.0));
        }
        assert!(!hits_own_trail(&trail, 0.1, 1.5));
    }

    #[test]
    fn test_loop_back_collides() {
        let mut trail = Trail::new(Vec2::new(0.0, 0.0), 100);
        for i in 1..50 {
            trail.push_head(Vec2::new(i as f32 * 1.5, 0.0));
        }
        // Jump back onto an old segment
        trail.push_head(Vec2::new(3.0, 0.5));
        assert!(hits_own_trail(&trail, 0.1, 1.5));
    }

    #[test]
    fn test_recent_segments_ignored() {
        let mut trail = Trail::new(Vec2::new(0.0, 0.0), 100);
        for _ in 0..5 {
            trail.push_head(Vec2::new(0.5, 0.0));
        }
        // Every segment is close, but all sit inside the safe prefix
        assert!(!hits_own_trail(&trail, 0.1, 1.5));
    }
}
