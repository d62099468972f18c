pub mod flock;
pub mod steering;
pub mod pathfinding;
pub mod prediction;
pub mod qlearning;
pub mod pursuit;
pub mod collision;
