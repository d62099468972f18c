use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::game::constants::{arena, flock, game, learning, pursuit, snake};
use crate::game::systems::pursuit::PursuitStrategy;

/// What happens to a boid that crosses the arena edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorderPolicy {
    /// Reappear on the opposite edge
    #[default]
    Wrap,
    /// Reflect the crossing velocity component and clamp to the margin
    Bounce,
}

impl FromStr for BorderPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wrap" => Ok(BorderPolicy::Wrap),
            "bounce" => Ok(BorderPolicy::Bounce),
            other => Err(format!("unknown border policy '{}'", other)),
        }
    }
}

/// Capability set of the flocking model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlockRules {
    pub cohesion: bool,
    pub separation: bool,
    pub alignment: bool,
    /// Steer away from the player head
    pub evade_player: bool,
    /// Steer away from the adversary
    pub evade_adversary: bool,
}

impl Default for FlockRules {
    fn default() -> Self {
        Self {
            cohesion: true,
            separation: true,
            alignment: true,
            evade_player: true,
            evade_adversary: true,
        }
    }
}

/// Flocking parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlockConfig {
    pub rules: FlockRules,
    pub border: BorderPolicy,
    pub view_distance: f32,
    pub separation_distance: f32,
    pub cohesion_weight: f32,
    pub separation_weight: f32,
    pub alignment_weight: f32,
    pub escape_radius: f32,
    pub player_evasion_weight: f32,
    pub adversary_evasion_weight: f32,
    pub max_speed: f32,
    /// Speed floor; `None` lets boids come to rest
    pub min_speed: Option<f32>,
    pub border_margin: f32,
}

impl Default for FlockConfig {
    fn default() -> Self {
        Self {
            rules: FlockRules::default(),
            border: BorderPolicy::Wrap,
            view_distance: flock::VIEW_DISTANCE,
            separation_distance: flock::SEPARATION_DISTANCE,
            cohesion_weight: flock::COHESION_WEIGHT,
            separation_weight: flock::SEPARATION_WEIGHT,
            alignment_weight: flock::ALIGNMENT_WEIGHT,
            escape_radius: flock::ESCAPE_RADIUS,
            player_evasion_weight: flock::PLAYER_EVASION_WEIGHT,
            adversary_evasion_weight: flock::ADVERSARY_EVASION_WEIGHT,
            max_speed: flock::MAX_SPEED,
            min_speed: Some(flock::MIN_SPEED),
            border_margin: flock::BORDER_MARGIN,
        }
    }
}

/// Q-learning hyperparameters and table persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    pub epsilon: f32,
    pub alpha: f32,
    pub gamma: f32,
    pub initial_value_scale: f32,
    /// State keys quantize positions to multiples of this step
    pub state_step: f32,
    pub escape_weight: f32,
    pub capture_reward: f32,
    /// Table file (`.json` or `.bin`); `None` keeps the table in memory only
    pub table_path: Option<PathBuf>,
    /// Updates between flushes to the table file
    pub flush_every: u32,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            epsilon: learning::EPSILON,
            alpha: learning::ALPHA,
            gamma: learning::GAMMA,
            initial_value_scale: learning::INITIAL_VALUE_SCALE,
            state_step: pursuit::GRID_STEP,
            escape_weight: learning::ESCAPE_WEIGHT,
            capture_reward: learning::CAPTURE_REWARD,
            table_path: Some(PathBuf::from(learning::TABLE_PATH)),
            flush_every: learning::FLUSH_EVERY,
        }
    }
}

/// Game configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Side length of the square arena
    pub arena_size: f32,
    /// Flock cardinality
    pub boid_count: usize,
    pub boid_radius: f32,
    pub snake_width: f32,
    /// Trail cap at the start of a round
    pub initial_snake_length: usize,
    pub growth_per_boid: usize,
    pub growth_level_cap: u32,
    pub player_speed: f32,
    /// Maximum heading change per tick (radians)
    pub max_turn: f32,
    pub initial_direction: f32,
    pub max_pointer_speed: f32,
    /// Fraction of the trail behind the head ignored by self-collision
    pub self_collision_safe_fraction: f32,
    pub score_per_boid: u32,
    pub adversary_speed: f32,
    pub adversary_spawn_level: u32,
    pub capture_radius: f32,
    pub grid_step: f32,
    pub max_expansions: usize,
    pub decision_interval_ticks: u64,
    pub history_size: usize,
    pub prediction_horizon: f32,
    /// Pin the adversary to one strategy instead of tiering by level
    pub fixed_strategy: Option<PursuitStrategy>,
    pub predicted_tier_level: u32,
    pub learned_tier_level: u32,
    pub flock: FlockConfig,
    pub learning: LearningConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            arena_size: arena::SIZE,
            boid_count: flock::COUNT,
            boid_radius: flock::RADIUS,
            snake_width: snake::WIDTH,
            initial_snake_length: snake::INITIAL_LENGTH,
            growth_per_boid: snake::GROWTH_PER_BOID,
            growth_level_cap: snake::GROWTH_LEVEL_CAP,
            player_speed: snake::SPEED,
            max_turn: snake::MAX_TURN,
            initial_direction: snake::INITIAL_DIRECTION,
            max_pointer_speed: snake::MAX_POINTER_SPEED,
            self_collision_safe_fraction: snake::SAFE_FRACTION,
            score_per_boid: game::SCORE_PER_BOID,
            adversary_speed: pursuit::SPEED,
            adversary_spawn_level: pursuit::SPAWN_LEVEL,
            capture_radius: pursuit::CAPTURE_RADIUS,
            grid_step: pursuit::GRID_STEP,
            max_expansions: pursuit::MAX_EXPANSIONS,
            decision_interval_ticks: pursuit::DECISION_INTERVAL_TICKS,
            history_size: pursuit::HISTORY_SIZE,
            prediction_horizon: pursuit::PREDICTION_HORIZON,
            fixed_strategy: None,
            predicted_tier_level: pursuit::PREDICTED_TIER_LEVEL,
            learned_tier_level: pursuit::LEARNED_TIER_LEVEL,
            flock: FlockConfig::default(),
            learning: LearningConfig::default(),
        }
    }
}

/// Parse `name` from the environment into `slot`, keeping the current value on failure
fn override_from_env<T: FromStr>(name: &str, slot: &mut T) {
    if let Ok(raw) = std::env::var(name) {
        match raw.parse::<T>() {
            Ok(parsed) => *slot = parsed,
            Err(_) => tracing::warn!("Invalid {} '{}', using default", name, raw),
        }
    }
}

impl GameConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        override_from_env("ARENA_SIZE", &mut config.arena_size);
        override_from_env("BOID_COUNT", &mut config.boid_count);
        override_from_env("SNAKE_LENGTH", &mut config.initial_snake_length);
        override_from_env("PLAYER_SPEED", &mut config.player_speed);
        override_from_env("MAX_TURN", &mut config.max_turn);
        override_from_env("ADVERSARY_SPEED", &mut config.adversary_speed);
        override_from_env("ADVERSARY_SPAWN_LEVEL", &mut config.adversary_spawn_level);
        override_from_env("BORDER_POLICY", &mut config.flock.border);
        override_from_env("RL_EPSILON", &mut config.learning.epsilon);
        override_from_env("RL_ALPHA", &mut config.learning.alpha);
        override_from_env("RL_GAMMA", &mut config.learning.gamma);
        override_from_env("QTABLE_FLUSH_EVERY", &mut config.learning.flush_every);

        if let Ok(raw) = std::env::var("PURSUIT_STRATEGY") {
            match raw.parse::<PursuitStrategy>() {
                Ok(strategy) => config.fixed_strategy = Some(strategy),
                Err(_) if raw.trim().eq_ignore_ascii_case("tiered") => config.fixed_strategy = None,
                Err(e) => tracing::warn!("{}, tiering by level", e),
            }
        }

        if let Ok(path) = std::env::var("QTABLE_PATH") {
            config.learning.table_path = if path.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        if !(self.arena_size > 0.0) {
            return Err("arena_size must be positive".to_string());
        }
        if self.boid_count == 0 {
            return Err("boid_count must be at least 1".to_string());
        }
        if self.initial_snake_length == 0 {
            return Err("initial_snake_length must be at least 1".to_string());
        }
        if !(self.player_speed > 0.0) || !(self.adversary_speed > 0.0) {
            return Err("player_speed and adversary_speed must be positive".to_string());
        }
        if !(self.max_turn > 0.0) {
            return Err("max_turn must be positive".to_string());
        }
        if !(0.0..1.0).contains(&self.self_collision_safe_fraction) {
            return Err(format!(
                "self_collision_safe_fraction must be in [0, 1), got {}",
                self.self_collision_safe_fraction
            ));
        }
        if !(self.grid_step > 0.0) {
            return Err("grid_step must be positive".to_string());
        }
        if self.decision_interval_ticks == 0 {
            return Err("decision_interval_ticks must be at least 1".to_string());
        }
        if self.predicted_tier_level > self.learned_tier_level {
            return Err("predicted_tier_level cannot exceed learned_tier_level".to_string());
        }
        if let Some(min) = self.flock.min_speed {
            if min < 0.0 || min > self.flock.max_speed {
                return Err(format!(
                    "flock min_speed must be in [0, max_speed], got {}",
                    min
                ));
            }
        }
        if !(self.flock.max_speed > 0.0) {
            return Err("flock max_speed must be positive".to_string());
        }
        if !(self.flock.escape_radius > 0.0) {
            return Err("flock escape_radius must be positive".to_string());
        }
        let l = &self.learning;
        for (name, value) in [("epsilon", l.epsilon), ("alpha", l.alpha), ("gamma", l.gamma)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} must be in [0, 1], got {}", name, value));
            }
        }
        if !(l.state_step > 0.0) {
            return Err("state_step must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GameConfig::default();
        assert_eq!(config.arena_size, 600.0);
        assert_eq!(config.boid_count, 10);
        assert_eq!(config.flock.border, BorderPolicy::Wrap);
        assert!(config.fixed_strategy.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_default() {
        let config = GameConfig::load_or_default();
        assert!(config.arena_size > 0.0);
    }

    #[test]
    fn test_border_policy_parse() {
        assert_eq!("wrap".parse::<BorderPolicy>(), Ok(BorderPolicy::Wrap));
        assert_eq!(" Bounce ".parse::<BorderPolicy>(), Ok(BorderPolicy::Bounce));
        assert!("teleport".parse::<BorderPolicy>().is_err());
    }

    #[test]
    fn test_validation_min_speed_above_max() {
        let mut config = GameConfig::default();
        config.flock.min_speed = Some(5.0);
        assert!(config.validate().is_err());

        config.flock.min_speed = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_learning_rates() {
        let mut config = GameConfig::default();
        config.learning.alpha = 1.5;
        assert!(config.validate().is_err());

        let mut config = GameConfig::default();
        config.learning.epsilon = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_safe_fraction() {
        let mut config = GameConfig::default();
        config.self_collision_safe_fraction = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_interval() {
        let mut config = GameConfig::default();
        config.decision_interval_ticks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serializes() {
        let config = GameConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: GameConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.boid_count, config.boid_count);
        assert_eq!(back.flock.rules, config.flock.rules);
    }
}
