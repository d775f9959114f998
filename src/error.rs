use thiserror::Error;

use crate::gridworld::Action;
use crate::solver::Solution;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid grid dimensions: {rows}x{cols}")]
    InvalidDimension { rows: usize, cols: usize },

    #[error("goal ({row}, {col}) is outside the {rows}x{cols} grid")]
    GoalOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("discount must be in (0, 1), got {0}")]
    InvalidDiscount(f64),

    #[error("policy is {rows}x{cols}, grid is {expected_rows}x{expected_cols}")]
    PolicyShapeMismatch {
        rows: usize,
        cols: usize,
        expected_rows: usize,
        expected_cols: usize,
    },

    #[error("policy assigns {action} to ({row}, {col})")]
    InvalidPolicyAction {
        row: usize,
        col: usize,
        action: Action,
    },

    // Carries the last value and policy grids reached before giving up.
    #[error("no convergence after {sweeps} sweeps")]
    NonConvergence {
        sweeps: usize,
        best_effort: Box<Solution>,
    },

    #[error("failed to render output: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, Error>;
