//! Flock simulator
//!
//! Each boid's next state is a pure function of the current flock snapshot,
//! so the whole flock is advanced from one immutable view and written back in
//! a single pass. Boids are addressed by index, never by identity.

use rand::Rng;
use rayon::prelude::*;
use smallvec::SmallVec;

use crate::config::{BorderPolicy, FlockConfig};
use crate::game::state::Boid;
use crate::util::vec2::Vec2;

/// Inline capacity for neighbour index lists (flocks are small)
const NEIGHBOR_INLINE: usize = 16;

/// An external point boids steer away from (player head, adversary)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Repulsor {
    pub position: Vec2,
    pub weight: f32,
}

/// Build the repulsor set allowed by the configured capabilities
pub fn repulsors(
    player_head: Vec2,
    adversary: Option<Vec2>,
    config: &FlockConfig,
) -> SmallVec<[Repulsor; 2]> {
    let mut out = SmallVec::new();
    if config.rules.evade_player {
        out.push(Repulsor {
            position: player_head,
            weight: config.player_evasion_weight,
        });
    }
    if config.rules.evade_adversary {
        if let Some(position) = adversary {
            out.push(Repulsor {
                position,
                weight: config.adversary_evasion_weight,
            });
        }
    }
    out
}

/// Indices of the boids within `view_distance` of boid `index`, excluding itself
pub fn neighbors(index: usize, boids: &[Boid], view_distance: f32) -> SmallVec<[usize; NEIGHBOR_INLINE]> {
    let me = boids[index].position;
    let view_sq = view_distance * view_distance;
    boids
        .iter()
        .enumerate()
        .filter(|&(i, other)| i != index && other.position.distance_sq_to(me) <= view_sq)
        .map(|(i, _)| i)
        .collect()
}

fn cohesion(boid: &Boid, boids: &[Boid], near: &[usize], weight: f32) -> Vec2 {
    if near.is_empty() {
        return Vec2::ZERO;
    }
    let sum = near
        .iter()
        .fold(Vec2::ZERO, |acc, &i| acc + boids[i].position);
    let centroid = sum / near.len() as f32;
    (centroid - boid.position) * weight
}

fn separation(boid: &Boid, boids: &[Boid], near: &[usize], distance: f32, weight: f32) -> Vec2 {
    let mut push = Vec2::ZERO;
    for &i in near {
        let away = boid.position - boids[i].position;
        let dist = away.length();
        // Coincident boids have no defined "away"
        if dist > 0.0 && dist < distance {
            push += away.normalize() / dist;
        }
    }
    push * weight
}

fn alignment(boid: &Boid, boids: &[Boid], near: &[usize], weight: f32) -> Vec2 {
    if near.is_empty() {
        return Vec2::ZERO;
    }
    let sum = near
        .iter()
        .fold(Vec2::ZERO, |acc, &i| acc + boids[i].velocity);
    let mean = sum / near.len() as f32;
    (mean - boid.velocity) * weight
}

fn evasion(boid: &Boid, repulsors: &[Repulsor], radius: f32) -> Vec2 {
    let mut force = Vec2::ZERO;
    for r in repulsors {
        let away = boid.position - r.position;
        let dist = away.length();
        if dist > 0.0 && dist < radius {
            force += away.normalize() * ((radius - dist) / radius) * r.weight;
        }
    }
    force
}

fn apply_border(boid: &mut Boid, policy: BorderPolicy, size: f32, margin: f32) {
    match policy {
        BorderPolicy::Wrap => {
            if boid.position.x < 0.0 {
                boid.position.x = size;
            } else if boid.position.x > size {
                boid.position.x = 0.0;
            }
            if boid.position.y < 0.0 {
                boid.position.y = size;
            } else if boid.position.y > size {
                boid.position.y = 0.0;
            }
        }
        BorderPolicy::Bounce => {
            let (low, high) = (margin, size - margin);
            if boid.position.x < low {
                boid.position.x = low;
                boid.velocity.x = boid.velocity.x.abs();
            } else if boid.position.x > high {
                boid.position.x = high;
                boid.velocity.x = -boid.velocity.x.abs();
            }
            if boid.position.y < low {
                boid.position.y = low;
                boid.velocity.y = boid.velocity.y.abs();
            } else if boid.position.y > high {
                boid.position.y = high;
                boid.velocity.y = -boid.velocity.y.abs();
            }
        }
    }
}

/// Compute the next state of boid `index` from the current flock snapshot
pub fn advance(
    index: usize,
    boids: &[Boid],
    repulsors: &[Repulsor],
    config: &FlockConfig,
    arena_size: f32,
) -> Boid {
    let mut boid = boids[index];
    let near = neighbors(index, boids, config.view_distance);
    let rules = config.rules;

    let mut force = Vec2::ZERO;
    if rules.cohesion {
        force += cohesion(&boid, boids, &near, config.cohesion_weight);
    }
    if rules.separation {
        force += separation(
            &boid,
            boids,
            &near,
            config.separation_distance,
            config.separation_weight,
        );
    }
    if rules.alignment {
        force += alignment(&boid, boids, &near, config.alignment_weight);
    }
    force += evasion(&boid, repulsors, config.escape_radius);

    let previous = boid.velocity;
    let min_speed = config.min_speed.unwrap_or(0.0);
    boid.velocity = (boid.velocity + force).clamp_speed(min_speed, config.max_speed, previous);
    boid.position += boid.velocity;

    apply_border(&mut boid, config.border, arena_size, config.border_margin);
    boid
}

/// Advance every boid by one tick
pub fn step(boids: &mut [Boid], repulsors: &[Repulsor], config: &FlockConfig, arena_size: f32) {
    let snapshot: &[Boid] = boids;
    let next: Vec<Boid> = (0..snapshot.len())
        .into_par_iter()
        .map(|i| advance(i, snapshot, repulsors, config, arena_size))
        .collect();
    boids.copy_from_slice(&next);
}

/// Fill a fresh flock of `count` boids
pub fn populate<R: Rng>(rng: &mut R, count: usize, arena_size: f32) -> Vec<Boid> {
    (0..count).map(|_| Boid::random(rng, arena_size)).collect()
}

/// Remove boid `index` and append a freshly spawned one; cardinality is unchanged
pub fn replace<R: Rng>(boids: &mut Vec<Boid>, index: usize, rng: &mut R, arena_size: f32) {
    if index < boids.len() {
        boids.remove(index);
        boids.push(Boid::random(rng, arena_size));
    }
}
