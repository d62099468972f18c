//! World state definitions
//!
//! Contains the flock, the player trail and heading, the adversary and the
//! round bookkeeping (score, level, phase). Systems mutate this state; the
//! render collaborator only ever sees a [`WorldSnapshot`].

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::game::constants::objective_for_level;
use crate::game::systems::pursuit::PursuitStrategy;
use crate::util::vec2::Vec2;

/// A flocking agent
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boid {
    pub position: Vec2,
    pub velocity: Vec2,
}

impl Boid {
    pub fn new(position: Vec2, velocity: Vec2) -> Self {
        Self { position, velocity }
    }

    /// Spawn at a uniformly random point with a small random velocity
    pub fn random<R: Rng>(rng: &mut R, arena_size: f32) -> Self {
        Self {
            position: Vec2::new(
                rng.gen_range(0.0..arena_size),
                rng.gen_range(0.0..arena_size),
            ),
            velocity: Vec2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)),
        }
    }
}

/// Past head positions, most recent first, bounded by `max_len`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trail {
    segments: VecDeque<Vec2>,
    max_len: usize,
}

impl Trail {
    pub fn new(head: Vec2, max_len: usize) -> Self {
        let max_len = max_len.max(1);
        let mut segments = VecDeque::with_capacity(max_len + 1);
        segments.push_back(head);
        Self { segments, max_len }
    }

    /// Current head position
    pub fn head(&self) -> Vec2 {
        self.segments.front().copied().unwrap_or_default()
    }

    /// Prepend a new head and drop segments beyond the cap
    pub fn push_head(&mut self, position: Vec2) {
        self.segments.push_front(position);
        self.segments.truncate(self.max_len);
    }

    /// Raise the cap; the trail fills up over the following ticks
    pub fn grow(&mut self, extra: usize) {
        self.max_len += extra;
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Segments from the head backwards
    pub fn iter(&self) -> impl Iterator<Item = Vec2> + '_ {
        self.segments.iter().copied()
    }
}

/// Player heading with its turn-rate limit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Heading {
    /// Current direction (radians)
    pub direction: f32,
    /// Maximum change per tick (radians)
    pub max_turn: f32,
}

impl Heading {
    pub fn new(direction: f32, max_turn: f32) -> Self {
        Self {
            direction,
            max_turn,
        }
    }
}

/// The pursuing adversary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adversary {
    pub position: Vec2,
    pub color: String,
    /// Where the adversary is currently heading
    pub target: Vec2,
    /// Strategy used for the last decision
    pub strategy: Option<PursuitStrategy>,
    pub active: bool,
}

impl Adversary {
    /// Parking spot used until the adversary is spawned
    pub const DORMANT_POSITION: Vec2 = Vec2 {
        x: -1000.0,
        y: -1000.0,
    };

    pub fn dormant() -> Self {
        Self {
            position: Self::DORMANT_POSITION,
            color: "red".to_string(),
            target: Self::DORMANT_POSITION,
            strategy: None,
            active: false,
        }
    }

    /// Activate at `position`, initially holding still
    pub fn spawn_at(&mut self, position: Vec2) {
        self.position = position;
        self.target = position;
        self.strategy = None;
        self.active = true;
    }
}

/// Why a round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOverReason {
    /// Head left the arena
    Wall,
    /// Head ran into its own trail
    SelfCollision,
    /// The adversary reached the head
    Caught,
}

/// Round lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Initialized, waiting for the first tick
    Ready,
    Running,
    GameOver(GameOverReason),
}

impl GamePhase {
    /// Whether ticks may still mutate the world
    pub fn is_live(&self) -> bool {
        matches!(self, GamePhase::Ready | GamePhase::Running)
    }
}

/// Complete world state for one round
#[derive(Debug, Clone)]
pub struct WorldState {
    pub boids: Vec<Boid>,
    pub trail: Trail,
    pub heading: Heading,
    pub adversary: Adversary,
    /// Latest rate-limited pointer position
    pub pointer: Vec2,
    pub score: u32,
    pub level: u32,
    /// Score needed to leave the current level
    pub objective: u32,
    pub tick: u64,
    pub phase: GamePhase,
}

impl WorldState {
    pub fn new(boids: Vec<Boid>, trail: Trail, heading: Heading, pointer: Vec2) -> Self {
        Self {
            boids,
            trail,
            heading,
            adversary: Adversary::dormant(),
            pointer,
            score: 0,
            level: 1,
            objective: objective_for_level(1),
            tick: 0,
            phase: GamePhase::Ready,
        }
    }

    pub fn head(&self) -> Vec2 {
        self.trail.head()
    }

    /// Read-only copy for rendering
    pub fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            tick: self.tick,
            boids: self.boids.iter().map(|b| b.position).collect(),
            trail: self.trail.iter().collect(),
            adversary: self
                .adversary
                .active
                .then(|| (self.adversary.position, self.adversary.color.clone())),
            score: self.score,
            level: self.level,
            phase: self.phase,
        }
    }
}

/// Per-tick view handed to the render collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub boids: Vec<Vec2>,
    pub trail: Vec<Vec2>,
    /// Position and color, present once the adversary is active
    pub adversary: Option<(Vec2, String)>,
    pub score: u32,
    pub level: u32,
    pub phase: GamePhase,
}
