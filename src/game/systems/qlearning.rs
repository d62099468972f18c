//! Tabular Q-learning for the adversary's hardest tier
//!
//! States are (adversary, target) positions quantized to the learning grid;
//! actions are the 8 one-cell moves. Values are created lazily with a small
//! random seed and updated with the one-step temporal-difference rule.

use hashbrown::HashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::config::LearningConfig;
use crate::game::constants::pursuit::GRID_STEP;
use crate::util::vec2::Vec2;

/// One-cell adversary move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MoveAction {
    East,
    West,
    South,
    North,
    SouthEast,
    SouthWest,
    NorthEast,
    NorthWest,
}

impl MoveAction {
    /// All actions in selection order; ties resolve to the earliest
    pub const ALL: [MoveAction; 8] = [
        MoveAction::East,
        MoveAction::West,
        MoveAction::South,
        MoveAction::North,
        MoveAction::SouthEast,
        MoveAction::SouthWest,
        MoveAction::NorthEast,
        MoveAction::NorthWest,
    ];

    /// Direction in grid cells (+y is down)
    pub fn unit(self) -> (i32, i32) {
        match self {
            MoveAction::East => (1, 0),
            MoveAction::West => (-1, 0),
            MoveAction::South => (0, 1),
            MoveAction::North => (0, -1),
            MoveAction::SouthEast => (1, 1),
            MoveAction::SouthWest => (-1, 1),
            MoveAction::NorthEast => (1, -1),
            MoveAction::NorthWest => (-1, -1),
        }
    }

    pub fn from_unit(dx: i32, dy: i32) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|a| a.unit() == (dx.signum(), dy.signum()))
    }

    /// World-space displacement for a move of one `step`
    pub fn delta(self, step: f32) -> Vec2 {
        let (dx, dy) = self.unit();
        Vec2::new(dx as f32 * step, dy as f32 * step)
    }
}

/// Quantized (adversary, target) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateKey {
    pub ax: i32,
    pub ay: i32,
    pub tx: i32,
    pub ty: i32,
}

impl StateKey {
    /// Snap both positions to multiples of `step`
    pub fn new(adversary: Vec2, target: Vec2, step: f32) -> Self {
        let a = adversary.round_to_step(step);
        let t = target.round_to_step(step);
        Self {
            ax: a.x as i32,
            ay: a.y as i32,
            tx: t.x as i32,
            ty: t.y as i32,
        }
    }
}

/// A flat table key that does not follow `ax,ay,tx,ty-dx-dy`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed table key '{0}'")]
pub struct KeyParseError(pub String);

/// Flat key of one table entry, written as `ax,ay,tx,ty-dx-dy`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryKey {
    pub state: StateKey,
    pub action: MoveAction,
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (dx, dy) = self.action.unit();
        let step = GRID_STEP as i32;
        write!(
            f,
            "{},{},{},{}-{}-{}",
            self.state.ax,
            self.state.ay,
            self.state.tx,
            self.state.ty,
            dx * step,
            dy * step
        )
    }
}

/// Split a leading (optionally negative) integer off `s`
fn take_int(s: &str) -> Option<(i32, &str)> {
    let digits_from = usize::from(s.starts_with('-'));
    let end = s[digits_from..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(s.len(), |i| i + digits_from);
    if end == digits_from {
        return None;
    }
    Some((s[..end].parse().ok()?, &s[end..]))
}

impl FromStr for EntryKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || KeyParseError(s.to_string());
        let mut rest = s;
        let mut fields = [0i32; 6];
        for (i, slot) in fields.iter_mut().enumerate() {
            let (value, tail) = take_int(rest).ok_or_else(malformed)?;
            *slot = value;
            rest = match i {
                0..=2 => tail.strip_prefix(',').ok_or_else(malformed)?,
                3 | 4 => tail.strip_prefix('-').ok_or_else(malformed)?,
                _ => tail,
            };
        }
        if !rest.is_empty() {
            return Err(malformed());
        }
        let [ax, ay, tx, ty, dx, dy] = fields;
        let action = MoveAction::from_unit(dx, dy).ok_or_else(malformed)?;
        Ok(Self {
            state: StateKey { ax, ay, tx, ty },
            action,
        })
    }
}

/// State-action value table; entries are never removed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QTable {
    values: HashMap<(StateKey, MoveAction), f32>,
}

impl QTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, state: StateKey, action: MoveAction) -> Option<f32> {
        self.values.get(&(state, action)).copied()
    }

    pub fn set(&mut self, state: StateKey, action: MoveAction, value: f32) {
        self.values.insert((state, action), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether any action has been valued in `state`
    pub fn knows(&self, state: StateKey) -> bool {
        MoveAction::ALL
            .iter()
            .any(|&a| self.values.contains_key(&(state, a)))
    }

    /// Highest stored value in `state`, treating missing entries as 0
    pub fn max_value(&self, state: StateKey) -> f32 {
        MoveAction::ALL
            .iter()
            .map(|&a| self.get(state, a).unwrap_or(0.0))
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Flat `"ax,ay,tx,ty-dx-dy" -> value` form used on disk
    pub fn to_flat(&self) -> BTreeMap<String, f32> {
        self.values
            .iter()
            .map(|(&(state, action), &value)| (EntryKey { state, action }.to_string(), value))
            .collect()
    }

    pub fn from_flat(flat: BTreeMap<String, f32>) -> Result<Self, KeyParseError> {
        let mut values = HashMap::with_capacity(flat.len());
        for (key, value) in flat {
            let entry: EntryKey = key.parse()?;
            values.insert((entry.state, entry.action), value);
        }
        Ok(Self { values })
    }
}

/// Epsilon-greedy Q-learning controller
#[derive(Debug, Clone)]
pub struct QLearner {
    table: QTable,
    epsilon: f32,
    alpha: f32,
    gamma: f32,
    initial_value_scale: f32,
}

impl QLearner {
    pub fn new(table: QTable, config: &LearningConfig) -> Self {
        Self {
            table,
            epsilon: config.epsilon,
            alpha: config.alpha,
            gamma: config.gamma,
            initial_value_scale: config.initial_value_scale,
        }
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn set_epsilon(&mut self, epsilon: f32) {
        self.epsilon = epsilon;
    }

    /// Random action with probability epsilon or in an unseen state, else the greedy one
    pub fn select_action<R: Rng>(&self, state: StateKey, rng: &mut R) -> MoveAction {
        if !self.table.knows(state) || rng.gen::<f32>() < self.epsilon {
            return MoveAction::ALL[rng.gen_range(0..MoveAction::ALL.len())];
        }
        self.greedy_action(state)
    }

    /// Best stored action; unvalued actions never win and ties keep the earliest
    pub fn greedy_action(&self, state: StateKey) -> MoveAction {
        let mut best = MoveAction::ALL[0];
        let mut best_value = f32::NEG_INFINITY;
        for action in MoveAction::ALL {
            if let Some(value) = self.table.get(state, action) {
                if value > best_value {
                    best_value = value;
                    best = action;
                }
            }
        }
        best
    }

    /// One-step TD update; returns the new value
    pub fn update<R: Rng>(
        &mut self,
        state: StateKey,
        action: MoveAction,
        reward: f32,
        next: StateKey,
        rng: &mut R,
    ) -> f32 {
        let current = match self.table.get(state, action) {
            Some(v) => v,
            None => rng.gen::<f32>() * self.initial_value_scale,
        };
        let future = self.table.max_value(next);
        let value = (1.0 - self.alpha) * current + self.alpha * (reward + self.gamma * future);
        self.table.set(state, action, value);
        tracing::trace!(?state, ?action, reward, value, "Q update");
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> LearningConfig {
        LearningConfig {
            table_path: None,
            ..Default::default()
        }
    }

    fn key(ax: i32, ay: i32, tx: i32, ty: i32) -> StateKey {
        StateKey { ax, ay, tx, ty }
    }

    #[test]
    fn test_state_key_quantizes() {
        let state = StateKey::new(Vec2::new(54.0, 46.0), Vec2::new(301.0, 299.0), 10.0);
        assert_eq!(state, key(50, 50, 300, 300));
    }

    #[test]
    fn test_action_deltas() {
        assert_eq!(MoveAction::East.delta(10.0), Vec2::new(10.0, 0.0));
        assert_eq!(MoveAction::NorthWest.delta(10.0), Vec2::new(-10.0, -10.0));
        assert_eq!(MoveAction::from_unit(-10, 10), Some(MoveAction::SouthWest));
        assert_eq!(MoveAction::from_unit(0, 0), None);
    }

    #[test]
    fn test_entry_key_format() {
        let entry = EntryKey {
            state: key(50, 50, 300, 300),
            action: MoveAction::NorthWest,
        };
        let text = entry.to_string();
        assert_eq!(text, "50,50,300,300--10--10");
        assert_eq!(text.parse::<EntryKey>(), Ok(entry));
    }

    #[test]
    fn test_entry_key_negative_coordinates() {
        let parsed: EntryKey = "-10,0,5,-20-10-0".parse().unwrap();
        assert_eq!(parsed.state, key(-10, 0, 5, -20));
        assert_eq!(parsed.action, MoveAction::East);
    }

    #[test]
    fn test_malformed_keys_rejected() {
        for bad in ["", "1,2,3", "1,2,3,4", "1,2,3,4-0-0", "a,b,c,d-10-0", "1,2,3,4-10-0x", "1.5,2,3,4-10-0"] {
            assert!(bad.parse::<EntryKey>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn test_flat_form_preserves_table() {
        let mut table = QTable::new();
        table.set(key(0, 0, 10, 10), MoveAction::South, 1.25);
        table.set(key(0, 0, 10, 10), MoveAction::West, -3.0);
        let flat = table.to_flat();
        assert_eq!(flat.get("0,0,10,10-0-10"), Some(&1.25));
        assert_eq!(QTable::from_flat(flat), Ok(table));
    }

    #[test]
    fn test_unseen_state_explores() {
        let learner = QLearner::new(QTable::new(), &config());
        let mut rng = StdRng::seed_from_u64(1);
        let state = key(0, 0, 100, 100);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(learner.select_action(state, &mut rng));
        }
        assert!(seen.len() > 1);
    }

    #[test]
    fn test_greedy_picks_highest_and_skips_unvalued() {
        let mut table = QTable::new();
        let state = key(0, 0, 100, 100);
        table.set(state, MoveAction::South, -5.0);
        table.set(state, MoveAction::NorthEast, -1.0);
        let learner = QLearner::new(table, &config());
        assert_eq!(learner.greedy_action(state), MoveAction::NorthEast);
    }

    #[test]
    fn test_update_arithmetic() {
        let mut table = QTable::new();
        let s = key(0, 0, 10, 0);
        let next = key(10, 0, 10, 0);
        table.set(s, MoveAction::East, 2.0);
        table.set(next, MoveAction::West, 4.0);
        let mut learner = QLearner::new(table, &config());
        let mut rng = StdRng::seed_from_u64(0);
        let value = learner.update(s, MoveAction::East, 1.0, next, &mut rng);
        // 0.9 * 2 + 0.1 * (1 + 0.9 * 4)
        assert!((value - 2.26).abs() < 1e-5);
    }

    #[test]
    fn test_lazy_init_is_small() {
        let mut learner = QLearner::new(QTable::new(), &config());
        let mut rng = StdRng::seed_from_u64(5);
        let s = key(0, 0, 0, 0);
        // Zero reward, unseen successor: value is 0.9 * initial seed
        let value = learner.update(s, MoveAction::North, 0.0, s, &mut rng);
        assert!((0.0..0.01).contains(&value));
        assert_eq!(learner.table().len(), 1);
    }

    #[test]
    fn test_two_state_convergence() {
        // Deterministic toy: in either state, East pays 1 and West pays 0.
        // East leads to B, West leads to A.
        let a = key(0, 0, 50, 50);
        let b = key(10, 0, 50, 50);
        let reward = |action: MoveAction| if action == MoveAction::East { 1.0 } else { 0.0 };
        let successor = |action: MoveAction| if action == MoveAction::East { b } else { a };

        let mut learner = QLearner::new(QTable::new(), &config());
        let mut rng = StdRng::seed_from_u64(17);
        for i in 0..200 {
            let state = if i % 2 == 0 { a } else { b };
            for action in [MoveAction::East, MoveAction::West] {
                learner.update(state, action, reward(action), successor(action), &mut rng);
            }
        }

        for state in [a, b] {
            let east = learner.table().get(state, MoveAction::East).unwrap();
            let west = learner.table().get(state, MoveAction::West).unwrap();
            assert!(east > west, "east {} <= west {}", east, west);
            assert_eq!(learner.greedy_action(state), MoveAction::East);
        }

        learner.set_epsilon(0.0);
        assert_eq!(learner.select_action(a, &mut rng), MoveAction::East);
    }
}
