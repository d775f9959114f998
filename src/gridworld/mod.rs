pub mod render;

use std::fmt;

use nalgebra::DMatrix;
use rand::prelude::*;

use crate::error::{Error, Result};

pub const DEFAULT_ROWS: usize = 5;
pub const DEFAULT_COLS: usize = 5;
pub const STEP_REWARD: f64 = -1.0;
pub const GOAL_REWARD: f64 = 1.0;
pub const DISCOUNT: f64 = 0.9;

/// A cell of the grid as `(row, col)`.
pub type State = (usize, usize);

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
    // Only ever assigned to the goal cell.
    None,
}

impl Action {
    /// Directional actions in tie-break priority order.
    pub const MOVES: [Action; 4] = [Action::Right, Action::Left, Action::Up, Action::Down];

    pub fn label(&self) -> &'static str {
        match self {
            Action::Up => "UP",
            Action::Down => "DOWN",
            Action::Left => "LEFT",
            Action::Right => "RIGHT",
            Action::None => "NONE",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Construction parameters for a `GridWorld`.
#[derive(Clone, Debug, PartialEq)]
pub struct GridWorldConfig {
    pub rows: usize,
    pub cols: usize,
    pub goal: State,
    pub step_reward: f64,
    pub goal_reward: f64,
    pub discount: f64,
}

impl GridWorldConfig {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            ..Self::default()
        }
    }

    pub fn with_goal(mut self, row: usize, col: usize) -> Self {
        self.goal = (row, col);
        self
    }

    pub fn with_rewards(mut self, step_reward: f64, goal_reward: f64) -> Self {
        self.step_reward = step_reward;
        self.goal_reward = goal_reward;
        self
    }

    pub fn with_discount(mut self, discount: f64) -> Self {
        self.discount = discount;
        self
    }
}

impl Default for GridWorldConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            goal: (0, 0),
            step_reward: STEP_REWARD,
            goal_reward: GOAL_REWARD,
            discount: DISCOUNT,
        }
    }
}

/// Deterministic grid MDP with a single absorbing goal cell.
///
/// Moving off the edge of the grid leaves the agent where it is; the move still
/// costs `step_reward`.
#[derive(Clone, Debug)]
pub struct GridWorld {
    rows: usize,
    cols: usize,
    goal: State,
    step_reward: f64,
    goal_reward: f64,
    discount: f64,
}

/// Result of a Bellman backup at one state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ActionValues {
    // Absorbing goal: the only entry is for `Action::None`.
    Terminal(f64),
    // Indexed in `Action::MOVES` order.
    Moves([f64; 4]),
}

impl ActionValues {
    pub fn get(&self, action: Action) -> Option<f64> {
        match (self, action) {
            (ActionValues::Terminal(v), Action::None) => Some(*v),
            (ActionValues::Moves(values), action) => Action::MOVES
                .iter()
                .position(|a| *a == action)
                .map(|i| values[i]),
            _ => None,
        }
    }

    /// Returns the highest-valued action. Ties go to the action that comes
    /// first in `Action::MOVES`.
    pub fn greedy(&self) -> (Action, f64) {
        match self {
            ActionValues::Terminal(v) => (Action::None, *v),
            ActionValues::Moves(values) => {
                let mut best = (Action::MOVES[0], values[0]);
                for (action, value) in Action::MOVES.iter().zip(values.iter()).skip(1) {
                    if *value > best.1 {
                        best = (*action, *value);
                    }
                }
                best
            }
        }
    }
}

impl GridWorld {
    pub fn new(config: GridWorldConfig) -> Result<GridWorld> {
        if config.rows == 0 || config.cols == 0 {
            return Err(Error::InvalidDimension {
                rows: config.rows,
                cols: config.cols,
            });
        }

        let (row, col) = config.goal;
        if row >= config.rows || col >= config.cols {
            return Err(Error::GoalOutOfBounds {
                row,
                col,
                rows: config.rows,
                cols: config.cols,
            });
        }

        // Also rejects NaN.
        if !(config.discount > 0.0 && config.discount < 1.0) {
            return Err(Error::InvalidDiscount(config.discount));
        }

        Ok(GridWorld {
            rows: config.rows,
            cols: config.cols,
            goal: config.goal,
            step_reward: config.step_reward,
            goal_reward: config.goal_reward,
            discount: config.discount,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn goal(&self) -> State {
        self.goal
    }

    pub fn is_terminal(&self, state: State) -> bool {
        state == self.goal
    }

    /// All states in row-major order.
    pub fn states(&self) -> impl Iterator<Item = State> {
        let cols = self.cols;
        (0..self.rows).flat_map(move |row| (0..cols).map(move |col| (row, col)))
    }

    /// Applies the clamped transition rule.
    pub fn next_state(&self, state: State, action: Action) -> State {
        let (row, col) = state;
        match action {
            Action::Up => (row.saturating_sub(1), col),
            Action::Down => ((row + 1).min(self.rows - 1), col),
            Action::Left => (row, col.saturating_sub(1)),
            Action::Right => (row, (col + 1).min(self.cols - 1)),
            Action::None => state,
        }
    }

    /// Value of taking `action` in `state` under `values`. The goal cell ignores
    /// the action and backs up its own value.
    pub fn action_value(&self, state: State, action: Action, values: &ValueGrid) -> f64 {
        if self.is_terminal(state) {
            return self.goal_reward + self.discount * values.get(state);
        }
        self.step_reward + self.discount * values.get(self.next_state(state, action))
    }

    /// Bellman backup of every available action at `state`.
    pub fn backup(&self, state: State, values: &ValueGrid) -> ActionValues {
        if self.is_terminal(state) {
            return ActionValues::Terminal(self.action_value(state, Action::None, values));
        }

        let mut action_values = [0.0; 4];
        for (value, action) in action_values.iter_mut().zip(Action::MOVES.iter()) {
            *value = self.action_value(state, *action, values);
        }
        ActionValues::Moves(action_values)
    }
}

/// State-value function over the whole grid.
#[derive(Clone, Debug, PartialEq)]
pub struct ValueGrid(DMatrix<f64>);

impl ValueGrid {
    pub fn zeros(rows: usize, cols: usize) -> ValueGrid {
        ValueGrid(DMatrix::zeros(rows, cols))
    }

    pub fn from_fn<F: FnMut(State) -> f64>(rows: usize, cols: usize, mut f: F) -> ValueGrid {
        ValueGrid(DMatrix::from_fn(rows, cols, |row, col| f((row, col))))
    }

    pub fn rows(&self) -> usize {
        self.0.nrows()
    }

    pub fn cols(&self) -> usize {
        self.0.ncols()
    }

    /// Panics if `state` is outside the grid.
    pub fn get(&self, state: State) -> f64 {
        self.0[state]
    }

    pub fn sum(&self) -> f64 {
        self.0.sum()
    }

    pub fn max_abs_diff(&self, other: &ValueGrid) -> f64 {
        assert_eq!(self.0.shape(), other.0.shape());
        (&self.0 - &other.0).amax()
    }
}

/// Deterministic policy: one action per cell.
#[derive(Clone, Debug, PartialEq)]
pub struct PolicyGrid(DMatrix<Action>);

impl PolicyGrid {
    pub fn from_fn<F: FnMut(State) -> Action>(rows: usize, cols: usize, mut f: F) -> PolicyGrid {
        PolicyGrid(DMatrix::from_fn(rows, cols, |row, col| f((row, col))))
    }

    /// Uniformly random directional action everywhere except the goal.
    pub fn random<R: Rng>(env: &GridWorld, rng: &mut R) -> PolicyGrid {
        PolicyGrid::from_fn(env.rows(), env.cols(), |state| {
            if env.is_terminal(state) {
                Action::None
            } else {
                Action::MOVES[rng.gen_range(0..Action::MOVES.len())]
            }
        })
    }

    pub fn rows(&self) -> usize {
        self.0.nrows()
    }

    pub fn cols(&self) -> usize {
        self.0.ncols()
    }

    /// Panics if `state` is outside the grid.
    pub fn get(&self, state: State) -> Action {
        self.0[state]
    }

    pub fn set(&mut self, state: State, action: Action) {
        self.0[state] = action;
    }
}
