pub mod policy_iteration;
pub mod value_iteration;

use crate::error::Result;
use crate::gridworld::*;

pub const TOLERANCE: f64 = 1e-7;
pub const MAX_SWEEPS: usize = 10_000;
pub const MAX_ITERATIONS: usize = 10_000;

/// How consecutive value grids are compared to decide convergence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConvergenceTest {
    // Change in the sum of all values. Positive and negative changes can
    // cancel, so this may stop before every state has settled.
    ValueSum,
    // Largest change of any single state.
    MaxChange,
}

impl ConvergenceTest {
    pub fn delta(&self, prev_values: &ValueGrid, new_values: &ValueGrid) -> f64 {
        match self {
            ConvergenceTest::ValueSum => (prev_values.sum() - new_values.sum()).abs(),
            ConvergenceTest::MaxChange => prev_values.max_abs_diff(new_values),
        }
    }
}

/// Stopping parameters shared by both solvers.
#[derive(Clone, Debug, PartialEq)]
pub struct SolverConfig {
    // Delta below which a sequence of sweeps counts as converged.
    pub tolerance: f64,
    // Criterion for value iteration. Evaluating a stable policy always uses
    // `MaxChange`.
    pub convergence: ConvergenceTest,
    pub max_sweeps: usize,
    // Cap on policy-iteration outer iterations.
    pub max_iterations: usize,
    // Seed for the initial random policy; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl SolverConfig {
    pub fn with_convergence(mut self, convergence: ConvergenceTest) -> Self {
        self.convergence = convergence;
        self
    }

    pub fn with_max_sweeps(mut self, max_sweeps: usize) -> Self {
        self.max_sweeps = max_sweeps;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            tolerance: TOLERANCE,
            convergence: ConvergenceTest::ValueSum,
            max_sweeps: MAX_SWEEPS,
            max_iterations: MAX_ITERATIONS,
            seed: None,
        }
    }
}

/// Final (or best-effort) output of a solver run.
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    pub values: ValueGrid,
    pub policy: PolicyGrid,
    // Total number of value sweeps performed.
    pub sweeps: usize,
    // Changed-action count of every policy-improvement pass, in order.
    // Empty for value iteration.
    pub policy_changes: Vec<usize>,
}

/// Consumer of solver output, e.g. a table printer or a plot.
pub trait ResultSink {
    fn accept_values(&mut self, values: &ValueGrid) -> Result<()>;

    fn accept_policy(&mut self, _policy: &PolicyGrid) -> Result<()> {
        Ok(())
    }
}

// Builds a whole new value grid from `prev_values`, which stays untouched until
// the sweep is done.
fn sweep<F>(env: &GridWorld, prev_values: &ValueGrid, mut state_value: F) -> ValueGrid
where
    F: FnMut(State, ActionValues) -> f64,
{
    ValueGrid::from_fn(env.rows(), env.cols(), |state| {
        state_value(state, env.backup(state, prev_values))
    })
}

// Performs a single evaluation sweep under a fixed policy.
pub fn evaluate_policy(env: &GridWorld, policy: &PolicyGrid, prev_values: &ValueGrid) -> ValueGrid {
    sweep(env, prev_values, |state, action_values| {
        action_values
            .get(policy.get(state))
            .unwrap_or_else(|| env.action_value(state, policy.get(state), prev_values))
    })
}

// Performs a single sweep of the Bellman optimality backup.
pub fn iterate_state_value(env: &GridWorld, prev_values: &ValueGrid) -> ValueGrid {
    sweep(env, prev_values, |_, action_values| action_values.greedy().1)
}

/// Greedy policy with respect to `state_values`.
pub fn make_greedy_policy(env: &GridWorld, state_values: &ValueGrid) -> PolicyGrid {
    PolicyGrid::from_fn(env.rows(), env.cols(), |state| {
        env.backup(state, state_values).greedy().0
    })
}

/// Replaces every non-terminal action of `policy` with the greedy action under
/// `state_values`. Returns how many states changed their action.
pub fn improve_policy(env: &GridWorld, policy: &mut PolicyGrid, state_values: &ValueGrid) -> usize {
    let mut changed = 0;
    for state in env.states() {
        if env.is_terminal(state) {
            continue;
        }

        let (greedy_action, _) = env.backup(state, state_values).greedy();
        if policy.get(state) != greedy_action {
            policy.set(state, greedy_action);
            changed += 1;
        }
    }
    changed
}
