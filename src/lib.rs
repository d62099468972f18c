//! Snake Hunt simulation core
//!
//! A snake chases a flock of boids while an adversary hunts the snake. The
//! adversary escalates from A* pursuit to forecast-aware pursuit to a tabular
//! Q-learning policy as the player levels up.
//!
//! Rendering, input capture and frame scheduling live outside this crate; they
//! drive [`game::simulation::Simulation`] and read [`game::state::WorldSnapshot`]s.

pub mod config;
pub mod util;
pub mod game;
