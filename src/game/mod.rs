pub mod constants;
pub mod state;
pub mod systems;
pub mod persistence;
pub mod simulation;
