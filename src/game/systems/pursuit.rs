//! Adversary pursuit
//!
//! Three interchangeable strategies pick the adversary's next movement target:
//! A* toward the head, A* toward the forecast head, or the learned policy.
//! Without a pinned strategy the tier follows the current level.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::GameConfig;
use crate::game::systems::pathfinding::{
    cell_in_bounds, find_path, max_cell, GridPos, GridSpec, OccupancyGrid, NEIGHBOR_OFFSETS,
};
use crate::game::systems::prediction::TrajectoryPredictor;
use crate::game::systems::qlearning::{MoveAction, QLearner, QTable, StateKey};
use crate::util::vec2::Vec2;

/// How the adversary chooses where to go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PursuitStrategy {
    /// A* toward the current head
    Direct,
    /// A* toward the forecast head
    Predicted,
    /// Q-learning policy over one-cell moves
    Learned,
}

impl fmt::Display for PursuitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PursuitStrategy::Direct => "direct",
            PursuitStrategy::Predicted => "predicted",
            PursuitStrategy::Learned => "learned",
        };
        f.write_str(name)
    }
}

impl FromStr for PursuitStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(PursuitStrategy::Direct),
            "predicted" => Ok(PursuitStrategy::Predicted),
            "learned" => Ok(PursuitStrategy::Learned),
            other => Err(format!("unknown pursuit strategy '{}'", other)),
        }
    }
}

/// Strategy for `level` given the configured tiers
pub fn strategy_for_level(config: &GameConfig, level: u32) -> PursuitStrategy {
    if let Some(fixed) = config.fixed_strategy {
        return fixed;
    }
    if level >= config.learned_tier_level {
        PursuitStrategy::Learned
    } else if level >= config.predicted_tier_level {
        PursuitStrategy::Predicted
    } else {
        PursuitStrategy::Direct
    }
}

/// Spawn point opposite the player head
pub fn mirror_spawn(head: Vec2, arena_size: f32) -> Vec2 {
    Vec2::new(arena_size - head.x, arena_size - head.y)
}

/// Free, in-bounds grid neighbours around the head cell (0..=8)
pub fn count_escape_paths(head: Vec2, occupancy: &OccupancyGrid, arena_size: f32) -> usize {
    let step = occupancy.step();
    let cell = GridPos::from_world(head, step);
    let limit = max_cell(arena_size, step);
    NEIGHBOR_OFFSETS
        .iter()
        .map(|&(dx, dy)| GridPos::new(cell.x + dx, cell.y + dy))
        .filter(|&n| cell_in_bounds(n, limit) && !occupancy.is_occupied(n))
        .count()
}

/// Reward weights for the learned strategy
#[derive(Debug, Clone, Copy)]
pub struct RewardWeights {
    pub escape_weight: f32,
    pub capture_reward: f32,
}

/// Progress toward the forecast head, plus pressure on escape routes, plus a capture bonus
pub fn reward(
    before: Vec2,
    after: Vec2,
    predicted_head: Vec2,
    escape_paths: usize,
    captured: bool,
    weights: RewardWeights,
) -> f32 {
    let progress = before.distance_to(predicted_head) - after.distance_to(predicted_head);
    let blocked = NEIGHBOR_OFFSETS.len().saturating_sub(escape_paths) as f32;
    let bonus = if captured { weights.capture_reward } else { 0.0 };
    progress + weights.escape_weight * blocked + bonus
}

/// Whether the adversary reaches the head (square reach on both axes)
#[inline]
pub fn within_reach(adversary: Vec2, head: Vec2, radius: f32) -> bool {
    adversary.chebyshev_to(head) <= radius
}

/// Step `speed` units toward `target`, landing on it when closer than that
pub fn move_toward(position: Vec2, target: Vec2, speed: f32) -> Vec2 {
    let offset = target - position;
    if offset.length() <= speed {
        target
    } else {
        position + offset.normalize() * speed
    }
}

/// Outcome of one adversary decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub strategy: PursuitStrategy,
    /// New movement target; `None` means hold position
    pub target: Option<Vec2>,
    /// Reward fed to the value table (learned strategy only)
    pub reward: Option<f32>,
}

/// Inputs of one decision
#[derive(Debug, Clone, Copy)]
pub struct PursuitView<'a> {
    pub adversary: Vec2,
    pub head: Vec2,
    pub level: u32,
    /// Occupied trail cells
    pub occupancy: &'a OccupancyGrid,
}

/// The adversary's decision maker: pathfinding, forecasting and the learned policy
#[derive(Debug, Clone)]
pub struct Pursuer {
    config: GameConfig,
    grid: GridSpec,
    predictor: TrajectoryPredictor,
    learner: QLearner,
}

impl Pursuer {
    pub fn new(config: &GameConfig, table: QTable) -> Self {
        Self {
            grid: GridSpec {
                step: config.grid_step,
                arena_size: config.arena_size,
                max_expansions: config.max_expansions,
            },
            predictor: TrajectoryPredictor::new(
                config.history_size,
                config.prediction_horizon,
                config.grid_step,
            ),
            learner: QLearner::new(table, &config.learning),
            config: config.clone(),
        }
    }

    pub fn table(&self) -> &QTable {
        self.learner.table()
    }

    /// Choose the next target. `history` is the head trail, most recent first.
    pub fn decide<I, R>(&mut self, view: &PursuitView<'_>, history: I, rng: &mut R) -> Decision
    where
        I: IntoIterator<Item = Vec2>,
        R: Rng,
    {
        let strategy = strategy_for_level(&self.config, view.level);
        match strategy {
            PursuitStrategy::Direct => Decision {
                strategy,
                target: self.path_target(view.adversary, view.head, view.occupancy),
                reward: None,
            },
            PursuitStrategy::Predicted => {
                let goal = self.predictor.predict(history).unwrap_or(view.head);
                Decision {
                    strategy,
                    target: self.path_target(view.adversary, goal, view.occupancy),
                    reward: None,
                }
            }
            PursuitStrategy::Learned => {
                let predicted = self.predictor.predict(history).unwrap_or(view.head);
                let (target, reward) = self.learned_step(view, predicted, rng);
                Decision {
                    strategy,
                    target: Some(target),
                    reward: Some(reward),
                }
            }
        }
    }

    /// Next waypoint on the A* path toward `goal`, or `None` when no path exists
    fn path_target(&self, from: Vec2, goal: Vec2, occupancy: &OccupancyGrid) -> Option<Vec2> {
        let goal_cell = GridPos::from_world(goal, self.grid.step);
        let path = find_path(from, goal, &self.grid, |cell| {
            cell != goal_cell && occupancy.is_occupied(cell)
        });
        match path.as_slice() {
            [] => {
                tracing::debug!(from = ?from, goal = ?goal, "No path, holding position");
                None
            }
            [_] => Some(goal),
            [_, next, ..] => Some(next.to_world(self.grid.step)),
        }
    }

    /// Pick a move, score it and learn from it; returns the intended position and reward
    fn learned_step<R: Rng>(&mut self, view: &PursuitView<'_>, predicted: Vec2, rng: &mut R) -> (Vec2, f32) {
        let learning = &self.config.learning;
        let step = learning.state_step;
        let state = StateKey::new(view.adversary, view.head, step);
        let action: MoveAction = self.learner.select_action(state, rng);

        let intended = (view.adversary + action.delta(self.grid.step))
            .clamp_components(0.0, self.config.arena_size);
        let escape_paths = count_escape_paths(view.head, view.occupancy, self.config.arena_size);
        let captured = within_reach(intended, view.head, self.config.capture_radius);
        let value = reward(
            view.adversary,
            intended,
            predicted,
            escape_paths,
            captured,
            RewardWeights {
                escape_weight: learning.escape_weight,
                capture_reward: learning.capture_reward,
            },
        );

        let next = StateKey::new(intended, view.head, step);
        self.learner.update(state, action, value, next, rng);
        tracing::debug!(
            ?action,
            escape_paths,
            reward = value,
            "Learned pursuit move"
        );
        (intended, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> GameConfig {
        let mut config = GameConfig::default();
        config.learning.table_path = None;
        config
    }

    fn empty_grid() -> OccupancyGrid {
        OccupancyGrid::new(600.0, 10.0)
    }

    #[test]
    fn test_strategy_parse_and_display() {
        for strategy in [
            PursuitStrategy::Direct,
            PursuitStrategy::Predicted,
            PursuitStrategy::Learned,
        ] {
            assert_eq!(strategy.to_string().parse::<PursuitStrategy>(), Ok(strategy));
        }
        assert_eq!("LEARNED".parse::<PursuitStrategy>(), Ok(PursuitStrategy::Learned));
        assert!("tiered".parse::<PursuitStrategy>().is_err());
    }

    #[test]
    fn test_tiers_follow_level() {
        let mut config = config();
        assert_eq!(strategy_for_level(&config, 1), PursuitStrategy::Direct);
        assert_eq!(strategy_for_level(&config, 2), PursuitStrategy::Direct);
        assert_eq!(strategy_for_level(&config, 3), PursuitStrategy::Predicted);
        assert_eq!(strategy_for_level(&config, 9), PursuitStrategy::Learned);

        config.fixed_strategy = Some(PursuitStrategy::Predicted);
        assert_eq!(strategy_for_level(&config, 9), PursuitStrategy::Predicted);
    }

    #[test]
    fn test_mirror_spawn() {
        assert_eq!(mirror_spawn(Vec2::new(150.0, 420.0), 600.0), Vec2::new(450.0, 180.0));
        assert_eq!(mirror_spawn(Vec2::new(300.0, 300.0), 600.0), Vec2::new(300.0, 300.0));
    }

    #[test]
    fn test_escape_paths() {
        let mut occupancy = empty_grid();
        let head = Vec2::new(300.0, 300.0);
        assert_eq!(count_escape_paths(head, &occupancy, 600.0), 8);

        occupancy.mark(GridPos::new(29, 30));
        occupancy.mark(GridPos::new(29, 29));
        assert_eq!(count_escape_paths(head, &occupancy, 600.0), 6);

        // Corner: only 3 neighbours exist
        assert_eq!(count_escape_paths(Vec2::ZERO, &empty_grid(), 600.0), 3);
    }

    #[test]
    fn test_reward_components() {
        let weights = RewardWeights {
            escape_weight: 0.5,
            capture_reward: 100.0,
        };
        let predicted = Vec2::new(100.0, 0.0);
        // 10 units closer, 2 routes blocked
        let r = reward(Vec2::ZERO, Vec2::new(10.0, 0.0), predicted, 6, false, weights);
        assert!((r - 11.0).abs() < 1e-5);

        let away = reward(Vec2::ZERO, Vec2::new(-10.0, 0.0), predicted, 8, false, weights);
        assert!((away + 10.0).abs() < 1e-5);

        let caught = reward(Vec2::ZERO, Vec2::new(10.0, 0.0), predicted, 8, true, weights);
        assert!((caught - 110.0).abs() < 1e-5);
    }

    #[test]
    fn test_within_reach_is_square() {
        let head = Vec2::new(100.0, 100.0);
        assert!(within_reach(Vec2::new(110.0, 110.0), head, 10.0));
        assert!(!within_reach(Vec2::new(110.5, 100.0), head, 10.0));
    }

    #[test]
    fn test_move_toward() {
        let moved = move_toward(Vec2::ZERO, Vec2::new(30.0, 40.0), 5.0);
        assert!(moved.approx_eq(Vec2::new(3.0, 4.0), 1e-5));
        assert_eq!(move_toward(Vec2::ZERO, Vec2::new(1.0, 1.0), 5.0), Vec2::new(1.0, 1.0));
    }

    #[test]
    fn test_direct_targets_next_waypoint() {
        let mut pursuer = Pursuer::new(&config(), QTable::new());
        let occupancy = empty_grid();
        let view = PursuitView {
            adversary: Vec2::new(0.0, 0.0),
            head: Vec2::new(30.0, 30.0),
            level: 1,
            occupancy: &occupancy,
        };
        let mut rng = StdRng::seed_from_u64(2);
        let decision = pursuer.decide(&view, [view.head], &mut rng);
        assert_eq!(decision.strategy, PursuitStrategy::Direct);
        assert_eq!(decision.target, Some(Vec2::new(10.0, 10.0)));
        assert!(decision.reward.is_none());
    }

    #[test]
    fn test_goal_cell_on_trail_is_reachable() {
        let mut pursuer = Pursuer::new(&config(), QTable::new());
        // The head always sits on its own trail
        let occupancy = OccupancyGrid::from_positions([Vec2::new(50.0, 0.0)], 600.0, 10.0);
        let view = PursuitView {
            adversary: Vec2::new(0.0, 0.0),
            head: Vec2::new(50.0, 0.0),
            level: 1,
            occupancy: &occupancy,
        };
        let mut rng = StdRng::seed_from_u64(2);
        let decision = pursuer.decide(&view, [view.head], &mut rng);
        assert_eq!(decision.target, Some(Vec2::new(10.0, 0.0)));
    }

    #[test]
    fn test_unreachable_holds_position() {
        let mut pursuer = Pursuer::new(&config(), QTable::new());
        let mut occupancy = empty_grid();
        // Box the adversary in at (10, 10)
        for (dx, dy) in NEIGHBOR_OFFSETS {
            occupancy.mark(GridPos::new(10 + dx, 10 + dy));
        }
        let view = PursuitView {
            adversary: Vec2::new(100.0, 100.0),
            head: Vec2::new(400.0, 400.0),
            level: 1,
            occupancy: &occupancy,
        };
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(pursuer.decide(&view, [view.head], &mut rng).target, None);
    }

    #[test]
    fn test_predicted_aims_ahead() {
        let mut pursuer = Pursuer::new(&config(), QTable::new());
        let occupancy = empty_grid();
        // Head moving +x at 4 units/tick, newest first
        let history: Vec<Vec2> = (1..=10).rev().map(|t| Vec2::new(200.0 + 4.0 * t as f32, 300.0)).collect();
        let view = PursuitView {
            adversary: Vec2::new(300.0, 300.0),
            head: history[0],
            level: 3,
            occupancy: &occupancy,
        };
        let mut rng = StdRng::seed_from_u64(2);
        let decision = pursuer.decide(&view, history, &mut rng);
        assert_eq!(decision.strategy, PursuitStrategy::Predicted);
        // Forecast (260, 300) lies behind the adversary on the same row
        assert_eq!(decision.target, Some(Vec2::new(290.0, 300.0)));
    }

    #[test]
    fn test_learned_step_updates_table() {
        let mut pursuer = Pursuer::new(&config(), QTable::new());
        let occupancy = empty_grid();
        let view = PursuitView {
            adversary: Vec2::new(100.0, 100.0),
            head: Vec2::new(300.0, 300.0),
            level: 4,
            occupancy: &occupancy,
        };
        let mut rng = StdRng::seed_from_u64(8);
        let decision = pursuer.decide(&view, [view.head], &mut rng);
        assert_eq!(decision.strategy, PursuitStrategy::Learned);
        assert!(decision.reward.is_some());
        let target = decision.target.unwrap();
        assert!((target.chebyshev_to(view.adversary) - 10.0).abs() < 1e-5);
        assert_eq!(pursuer.table().len(), 1);
    }

    #[test]
    fn test_learned_move_stays_in_arena() {
        let mut pursuer = Pursuer::new(&config(), QTable::new());
        let occupancy = empty_grid();
        let view = PursuitView {
            adversary: Vec2::new(0.0, 0.0),
            head: Vec2::new(300.0, 300.0),
            level: 5,
            occupancy: &occupancy,
        };
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..50 {
            let target = pursuer.decide(&view, [view.head], &mut rng).target.unwrap();
            assert!(target.x >= 0.0 && target.y >= 0.0);
        }
    }
}
