//! Grid pathfinder
//!
//! A* over the arena quantized into `step`-sized cells with 8-way movement.
//! Orthogonal moves cost 10, diagonal moves 14; the heuristic is the Manhattan
//! distance to the goal cell in the same units. Search nodes live in a flat
//! arena owned by a single call, linked to their parent by index.

use bitvec::prelude::*;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::game::constants::pursuit::{DIAGONAL_COST, STEP_COST};
use crate::util::vec2::Vec2;

/// Integer grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Nearest cell to a world position
    pub fn from_world(position: Vec2, step: f32) -> Self {
        Self {
            x: (position.x / step).round() as i32,
            y: (position.y / step).round() as i32,
        }
    }

    /// World position of the cell corner
    pub fn to_world(self, step: f32) -> Vec2 {
        Vec2::new(self.x as f32 * step, self.y as f32 * step)
    }

    #[inline]
    fn manhattan(self, other: GridPos) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }
}

/// The 8 neighbour offsets, orthogonal first
pub const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (-1, 1),
    (1, -1),
    (-1, -1),
];

#[inline]
fn move_cost(dx: i32, dy: i32) -> u32 {
    if dx != 0 && dy != 0 {
        DIAGONAL_COST
    } else {
        STEP_COST
    }
}

/// Largest valid cell index on each axis for an arena
#[inline]
pub fn max_cell(arena_size: f32, step: f32) -> i32 {
    (arena_size / step).floor() as i32
}

#[inline]
pub fn cell_in_bounds(cell: GridPos, max_cell: i32) -> bool {
    (0..=max_cell).contains(&cell.x) && (0..=max_cell).contains(&cell.y)
}

/// Search parameters shared by every query against one arena
#[derive(Debug, Clone, Copy)]
pub struct GridSpec {
    pub step: f32,
    pub arena_size: f32,
    /// Node expansions allowed before giving up
    pub max_expansions: usize,
}

struct Node {
    cell: GridPos,
    parent: Option<usize>,
    g: u32,
}

/// Find a path of cells from `start` to within one step of `goal`.
///
/// Cells for which `blocked` returns true, and cells outside the arena, are
/// never entered. Returns an empty path when the goal is unreachable or the
/// expansion budget runs out; callers hold position in that case.
pub fn find_path<F>(start: Vec2, goal: Vec2, grid: &GridSpec, blocked: F) -> Vec<GridPos>
where
    F: Fn(GridPos) -> bool,
{
    let step = grid.step;
    let limit = max_cell(grid.arena_size, step);
    let goal_cell = GridPos::from_world(goal, step);
    let start_cell = GridPos::from_world(start, step);

    let mut nodes = vec![Node {
        cell: start_cell,
        parent: None,
        g: 0,
    }];
    // (f, insertion index): lowest f first, ties in insertion order
    let mut open = BinaryHeap::new();
    open.push(Reverse((start_cell.manhattan(goal_cell) * STEP_COST, 0usize)));
    let mut closed: FxHashSet<GridPos> = FxHashSet::default();
    let mut expansions = 0usize;

    while let Some(Reverse((_, index))) = open.pop() {
        let current = nodes[index].cell;
        if closed.contains(&current) {
            continue;
        }

        if current.to_world(step).distance_to(goal) <= step {
            return reconstruct(&nodes, index);
        }

        expansions += 1;
        if expansions > grid.max_expansions {
            tracing::debug!(
                start = ?start_cell,
                goal = ?goal_cell,
                expansions,
                "Pathfinding budget exhausted"
            );
            return Vec::new();
        }
        closed.insert(current);

        let g = nodes[index].g;
        for (dx, dy) in NEIGHBOR_OFFSETS {
            let next = GridPos::new(current.x + dx, current.y + dy);
            if !cell_in_bounds(next, limit) || closed.contains(&next) || blocked(next) {
                continue;
            }
            let next_g = g + move_cost(dx, dy);
            let f = next_g + next.manhattan(goal_cell) * STEP_COST;
            nodes.push(Node {
                cell: next,
                parent: Some(index),
                g: next_g,
            });
            open.push(Reverse((f, nodes.len() - 1)));
        }
    }

    Vec::new()
}

fn reconstruct(nodes: &[Node], mut index: usize) -> Vec<GridPos> {
    let mut path = vec![nodes[index].cell];
    while let Some(parent) = nodes[index].parent {
        path.push(nodes[parent].cell);
        index = parent;
    }
    path.reverse();
    path
}

/// Total move cost along a path of adjacent cells
pub fn path_cost(path: &[GridPos]) -> u32 {
    path.windows(2)
        .map(|w| move_cost(w[1].x - w[0].x, w[1].y - w[0].y))
        .sum()
}

/// Bitmap of grid cells covered by the player's trail
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    cells: BitVec,
    side: usize,
    step: f32,
}

impl OccupancyGrid {
    pub fn new(arena_size: f32, step: f32) -> Self {
        let side = max_cell(arena_size, step).max(0) as usize + 1;
        Self {
            cells: bitvec![0; side * side],
            side,
            step,
        }
    }

    /// Build from world positions (trail segments)
    pub fn from_positions<I>(positions: I, arena_size: f32, step: f32) -> Self
    where
        I: IntoIterator<Item = Vec2>,
    {
        let mut grid = Self::new(arena_size, step);
        for position in positions {
            grid.mark(GridPos::from_world(position, step));
        }
        grid
    }

    #[inline]
    fn index(&self, cell: GridPos) -> Option<usize> {
        if cell.x < 0 || cell.y < 0 {
            return None;
        }
        let (x, y) = (cell.x as usize, cell.y as usize);
        (x < self.side && y < self.side).then(|| y * self.side + x)
    }

    /// Mark a cell as occupied; out-of-arena cells are ignored
    pub fn mark(&mut self, cell: GridPos) {
        if let Some(i) = self.index(cell) {
            self.cells.set(i, true);
        }
    }

    pub fn clear(&mut self) {
        self.cells.fill(false);
    }

    pub fn is_occupied(&self, cell: GridPos) -> bool {
        self.index(cell).map(|i| self.cells[i]).unwrap_or(false)
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.count_ones()
    }

    pub fn side(&self) -> usize {
        self.side
    }

    pub fn step(&self) -> f32 {
        self.step
    }
}
