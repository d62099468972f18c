/// Arena constants (square canvas, origin at the top-left corner)
pub mod arena {
    /// Side length of the square arena
    pub const SIZE: f32 = 600.0;
}

/// Tick scheduling constants
pub mod tick {
    /// Ticks per second for the headless runner (one tick per animation frame)
    pub const TICK_RATE: u32 = 60;
    /// Tick duration in milliseconds
    pub const TICK_DURATION_MS: u64 = 1000 / TICK_RATE as u64;
}

/// Player (snake) constants
pub mod snake {
    use std::f32::consts::PI;

    /// Drawn width of a trail segment
    pub const WIDTH: f32 = 10.0;
    /// Trail cap at the start of a round
    pub const INITIAL_LENGTH: usize = 100;
    /// Distance travelled by the head each tick
    pub const SPEED: f32 = 1.5;
    /// Maximum heading change per tick (~11 degrees)
    pub const MAX_TURN: f32 = PI / 16.0;
    /// Initial heading (pointing down the canvas)
    pub const INITIAL_DIRECTION: f32 = PI / 2.0;
    /// Fraction of the trail behind the head ignored by self-collision
    pub const SAFE_FRACTION: f32 = 0.1;
    /// Maximum pointer displacement accepted per input sample
    pub const MAX_POINTER_SPEED: f32 = 8.0;
    /// Trail growth per boid eaten
    pub const GROWTH_PER_BOID: usize = 10;
    /// Trail only grows while the level is at or below this value
    pub const GROWTH_LEVEL_CAP: u32 = 3;
    /// Minimum distance kept from the arena border when placing the head
    pub const SPAWN_MARGIN: f32 = 100.0;
}

/// Flocking constants
pub mod flock {
    /// Number of boids in the arena
    pub const COUNT: usize = 10;
    /// Collision radius of a boid
    pub const RADIUS: f32 = 7.0;
    /// Neighbour query radius
    pub const VIEW_DISTANCE: f32 = 100.0;
    /// Neighbours closer than this push each other away
    pub const SEPARATION_DISTANCE: f32 = 20.0;
    pub const COHESION_WEIGHT: f32 = 0.005;
    pub const SEPARATION_WEIGHT: f32 = 0.05;
    pub const ALIGNMENT_WEIGHT: f32 = 0.05;
    /// Repulsors within this radius trigger evasion
    pub const ESCAPE_RADIUS: f32 = 80.0;
    pub const PLAYER_EVASION_WEIGHT: f32 = 0.5;
    pub const ADVERSARY_EVASION_WEIGHT: f32 = 1.0;
    pub const MAX_SPEED: f32 = 2.0;
    pub const MIN_SPEED: f32 = 0.5;
    /// Distance kept from the border by the bounce policy
    pub const BORDER_MARGIN: f32 = 10.0;
}

/// Adversary pursuit constants
pub mod pursuit {
    /// Quantization step of the pursuit grid (also the learned move length)
    pub const GRID_STEP: f32 = 10.0;
    /// Orthogonal step cost
    pub const STEP_COST: u32 = 10;
    /// Diagonal step cost (sqrt(2) * 10)
    pub const DIAGONAL_COST: u32 = 14;
    /// Expansion budget for one search
    pub const MAX_EXPANSIONS: usize = 8192;
    /// Adversary travel per tick
    pub const SPEED: f32 = 1.5;
    /// Adversary is activated once this level is reached
    pub const SPAWN_LEVEL: u32 = 2;
    /// Level at which the adversary starts aiming at predicted positions
    pub const PREDICTED_TIER_LEVEL: u32 = 3;
    /// Level at which the adversary switches to the learned policy
    pub const LEARNED_TIER_LEVEL: u32 = 4;
    /// Ticks between adversary decisions
    pub const DECISION_INTERVAL_TICKS: u64 = 2;
    /// Per-axis reach at which the adversary catches the head
    pub const CAPTURE_RADIUS: f32 = 10.0;
    /// Number of past head positions fed to the predictor
    pub const HISTORY_SIZE: usize = 10;
    /// Extra ticks extrapolated beyond the newest sample
    pub const PREDICTION_HORIZON: f32 = 5.0;
}

/// Tabular Q-learning constants
pub mod learning {
    /// Exploration probability
    pub const EPSILON: f32 = 0.05;
    /// Learning rate
    pub const ALPHA: f32 = 0.1;
    /// Discount factor
    pub const GAMMA: f32 = 0.9;
    /// Upper bound of the random value given to a fresh entry
    pub const INITIAL_VALUE_SCALE: f32 = 0.01;
    /// Weight of each blocked escape route around the head
    pub const ESCAPE_WEIGHT: f32 = 0.5;
    /// Bonus for a move that captures the head
    pub const CAPTURE_REWARD: f32 = 100.0;
    /// Updates between table flushes
    pub const FLUSH_EVERY: u32 = 50;
    /// Default table file
    pub const TABLE_PATH: &str = "q_table.json";
}

/// Game progression constants
pub mod game {
    /// Score granted per boid eaten
    pub const SCORE_PER_BOID: u32 = 100;
}

/// Score required to leave `level`
#[inline]
pub fn objective_for_level(level: u32) -> u32 {
    100 * level * (level + 5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_objective_progression() {
        assert_eq!(objective_for_level(1), 600);
        assert_eq!(objective_for_level(2), 1400);
        assert_eq!(objective_for_level(3), 2400);
    }

    #[test]
    fn test_diagonal_cost_approximates_sqrt2() {
        let exact = pursuit::STEP_COST as f32 * std::f32::consts::SQRT_2;
        assert!((exact - pursuit::DIAGONAL_COST as f32).abs() < 1.0);
    }

    #[test]
    fn test_tier_levels_ordered() {
        assert!(pursuit::PREDICTED_TIER_LEVEL < pursuit::LEARNED_TIER_LEVEL);
    }
}
