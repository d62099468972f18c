//! Round lifecycle and the per-tick update
//!
//! Tick order:
//! 1. Steer the head toward the pointer; leaving the arena ends the round
//! 2. Push the new head onto the trail; touching the trail ends the round.
//!    A head resting on the pointer holds: no new segment, no trail check
//! 3. Eat at most one boid, then update score, growth and level
//! 4. Advance the flock from one snapshot
//! 5. Spawn, decide (on the cadence), move and check capture for the adversary
//!
//! Nothing mutates once the phase is `GameOver`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::game::constants::{objective_for_level, snake};
use crate::game::persistence::{load_or_empty, FileStore, QTableStore, TableSync};
use crate::game::state::{GameOverReason, GamePhase, Heading, Trail, WorldSnapshot, WorldState};
use crate::game::systems::collision::{first_eaten, hits_own_trail};
use crate::game::systems::flock;
use crate::game::systems::pathfinding::OccupancyGrid;
use crate::game::systems::pursuit::{mirror_spawn, move_toward, within_reach, Decision, Pursuer, PursuitView};
use crate::game::systems::qlearning::QTable;
use crate::game::systems::steering::{in_arena, steer, PointerLimiter};
use crate::util::vec2::Vec2;

/// What happened during one tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StepOutcome {
    pub tick: u64,
    pub ate: bool,
    pub leveled_up: bool,
    pub adversary_spawned: bool,
    /// Adversary decision taken this tick, if any
    pub decision: Option<Decision>,
    /// Set on the tick the round ends
    pub game_over: Option<GameOverReason>,
}

pub struct Simulation {
    config: GameConfig,
    state: WorldState,
    pursuer: Pursuer,
    sync: TableSync,
    limiter: PointerLimiter,
    rng: StdRng,
}

impl Simulation {
    /// Build a simulation backed by `store` (loaded once, empty on failure)
    pub fn new(config: GameConfig, store: Option<Box<dyn QTableStore>>, seed: u64) -> Self {
        let table = store
            .as_deref()
            .map(|store| load_or_empty(store))
            .unwrap_or_else(QTable::new);
        let pursuer = Pursuer::new(&config, table);
        let sync = TableSync::new(store, config.learning.flush_every);
        let mut rng = StdRng::seed_from_u64(seed);

        let center = Vec2::new(config.arena_size / 2.0, config.arena_size / 2.0);
        let state = Self::fresh_world(&config, center, &mut rng);

        Self {
            limiter: PointerLimiter::new(center, config.max_pointer_speed),
            config,
            state,
            pursuer,
            sync,
            rng,
        }
    }

    /// Build a simulation backed by the configured table file, if any
    pub fn from_config(config: GameConfig, seed: u64) -> Self {
        let store = config
            .learning
            .table_path
            .clone()
            .map(|path| Box::new(FileStore::new(path)) as Box<dyn QTableStore>);
        Self::new(config, store, seed)
    }

    fn fresh_world(config: &GameConfig, head: Vec2, rng: &mut StdRng) -> WorldState {
        WorldState::new(
            flock::populate(rng, config.boid_count, config.arena_size),
            Trail::new(head, config.initial_snake_length),
            Heading::new(config.initial_direction, config.max_turn),
            head,
        )
    }

    /// Start a round with the head at a random point away from the border
    pub fn init(&mut self) {
        let margin = snake::SPAWN_MARGIN.min(self.config.arena_size / 4.0);
        let span = self.config.arena_size - margin;
        let head = Vec2::new(
            self.rng.gen_range(margin..=span),
            self.rng.gen_range(margin..=span),
        );
        self.start_at(head);
    }

    /// Start a round with the head at `head`
    pub fn start_at(&mut self, head: Vec2) {
        self.state = Self::fresh_world(&self.config, head, &mut self.rng);
        self.limiter.reset(head);
        info!(
            x = head.x,
            y = head.y,
            boids = self.state.boids.len(),
            "Round started"
        );
    }

    /// Discard the current round and start a new one
    pub fn reset(&mut self) {
        self.init();
    }

    /// Feed a raw pointer sample; returns the rate-limited target
    pub fn set_pointer(&mut self, raw: Vec2) -> Vec2 {
        let target = self.limiter.sample(raw);
        self.state.pointer = target;
        target
    }

    pub fn state(&self) -> &WorldState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut WorldState {
        &mut self.state
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        self.state.snapshot()
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn table(&self) -> &QTable {
        self.pursuer.table()
    }

    pub fn is_running(&self) -> bool {
        self.state.phase.is_live()
    }

    /// Advance the world by one tick
    pub fn step(&mut self) -> StepOutcome {
        if !self.state.phase.is_live() {
            return StepOutcome {
                tick: self.state.tick,
                ..Default::default()
            };
        }
        self.state.phase = GamePhase::Running;
        self.state.tick += 1;
        let mut outcome = StepOutcome {
            tick: self.state.tick,
            ..Default::default()
        };

        let head = match self.advance_player() {
            Ok(head) => head,
            Err(reason) => return self.end_round(reason, outcome),
        };

        outcome.ate = self.eat(head, &mut outcome.leveled_up);

        let adversary = self
            .state
            .adversary
            .active
            .then_some(self.state.adversary.position);
        let repulsors = flock::repulsors(head, adversary, &self.config.flock);
        flock::step(
            &mut self.state.boids,
            &repulsors,
            &self.config.flock,
            self.config.arena_size,
        );

        outcome.adversary_spawned = self.maybe_spawn_adversary(head);
        if self.state.adversary.active {
            outcome.decision = self.advance_adversary(head);
            if within_reach(self.state.adversary.position, head, self.config.capture_radius) {
                return self.end_round(GameOverReason::Caught, outcome);
            }
        }

        outcome
    }

    fn advance_player(&mut self) -> Result<Vec2, GameOverReason> {
        let cfg = &self.config;
        let state = &mut self.state;
        let head = state.head();
        let next = steer(head, state.pointer, &mut state.heading, cfg.player_speed);
        if next == head {
            return Ok(head);
        }
        if !in_arena(next, cfg.arena_size) {
            return Err(GameOverReason::Wall);
        }
        state.trail.push_head(next);
        if hits_own_trail(&state.trail, cfg.self_collision_safe_fraction, cfg.player_speed) {
            return Err(GameOverReason::SelfCollision);
        }
        Ok(next)
    }

    fn eat(&mut self, head: Vec2, leveled_up: &mut bool) -> bool {
        let cfg = &self.config;
        let state = &mut self.state;
        let eat_radius = cfg.snake_width / 2.0 + cfg.boid_radius;
        let Some(index) = first_eaten(head, &state.boids, eat_radius) else {
            return false;
        };

        flock::replace(&mut state.boids, index, &mut self.rng, cfg.arena_size);
        state.score += cfg.score_per_boid;
        if state.level <= cfg.growth_level_cap {
            state.trail.grow(cfg.growth_per_boid);
        }
        debug!(score = state.score, trail_cap = state.trail.max_len(), "Boid eaten");

        while state.score >= state.objective {
            state.level += 1;
            state.objective = objective_for_level(state.level);
            *leveled_up = true;
            info!(level = state.level, objective = state.objective, "Level up");
        }
        true
    }

    fn maybe_spawn_adversary(&mut self, head: Vec2) -> bool {
        let adversary = &mut self.state.adversary;
        if adversary.active || self.state.level < self.config.adversary_spawn_level {
            return false;
        }
        let at = mirror_spawn(head, self.config.arena_size);
        adversary.spawn_at(at);
        info!(x = at.x, y = at.y, level = self.state.level, "Adversary spawned");
        true
    }

    fn advance_adversary(&mut self, head: Vec2) -> Option<Decision> {
        let interval = self.config.decision_interval_ticks.max(1);
        let decision = if self.state.tick % interval == 0 {
            let occupancy = OccupancyGrid::from_positions(
                self.state.trail.iter(),
                self.config.arena_size,
                self.config.grid_step,
            );
            let view = PursuitView {
                adversary: self.state.adversary.position,
                head,
                level: self.state.level,
                occupancy: &occupancy,
            };
            let decision = self
                .pursuer
                .decide(&view, self.state.trail.iter(), &mut self.rng);

            let adversary = &mut self.state.adversary;
            adversary.strategy = Some(decision.strategy);
            adversary.target = decision.target.unwrap_or(adversary.position);
            if decision.reward.is_some() {
                self.sync.record_update(self.pursuer.table());
            }
            Some(decision)
        } else {
            None
        };

        let adversary = &mut self.state.adversary;
        adversary.position = move_toward(
            adversary.position,
            adversary.target,
            self.config.adversary_speed,
        );
        decision
    }

    fn end_round(&mut self, reason: GameOverReason, mut outcome: StepOutcome) -> StepOutcome {
        self.state.phase = GamePhase::GameOver(reason);
        outcome.game_over = Some(reason);
        info!(
            ?reason,
            tick = self.state.tick,
            score = self.state.score,
            level = self.state.level,
            "Game over"
        );
        outcome
    }

    /// Write pending table updates now; returns whether anything was written
    pub fn flush(&mut self) -> bool {
        self.sync.flush(self.pursuer.table())
    }

    /// Final flush before the process exits
    pub fn shutdown(&mut self) {
        self.flush();
        info!(entries = self.table().len(), "Simulation shut down");
    }
}

impl Drop for Simulation {
    fn drop(&mut self) {
        self.sync.flush(self.pursuer.table());
    }
}
