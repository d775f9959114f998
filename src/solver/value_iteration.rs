use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::gridworld::*;
use crate::solver::*;

/// Value iteration over the Bellman optimality backup.
///
/// By default convergence is judged on the change in the *sum* of all state
/// values between consecutive sweeps. On grids where rising and falling values
/// cancel, that can stop long before the fixed point; use
/// `ConvergenceTest::MaxChange` for a per-state test.
pub struct ValueIteration<'a> {
    env: &'a GridWorld,
    config: SolverConfig,
    state_values: ValueGrid,
    sweeps: usize,
}

impl<'a> ValueIteration<'a> {
    pub fn new(env: &'a GridWorld, config: SolverConfig) -> Self {
        ValueIteration {
            env,
            config,
            state_values: ValueGrid::zeros(env.rows(), env.cols()),
            sweeps: 0,
        }
    }

    pub fn state_values(&self) -> &ValueGrid {
        &self.state_values
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    /// Performs one sweep and returns its delta under `config.convergence`.
    pub fn step(&mut self) -> f64 {
        let new_values = iterate_state_value(self.env, &self.state_values);
        let delta = self.config.convergence.delta(&self.state_values, &new_values);
        self.state_values = new_values;
        self.sweeps += 1;
        delta
    }

    pub fn run(self) -> Result<Solution> {
        self.run_with_sink(None)
    }

    /// Sweeps until converged, extracts the greedy policy and hands the final
    /// values to `sink` if one is given.
    pub fn run_with_sink(mut self, sink: Option<&mut dyn ResultSink>) -> Result<Solution> {
        loop {
            if self.sweeps >= self.config.max_sweeps {
                warn!("Value iteration did not converge after {} sweeps", self.sweeps);
                let sweeps = self.sweeps;
                return Err(Error::NonConvergence {
                    sweeps,
                    best_effort: Box::new(self.into_solution()),
                });
            }

            let delta = self.step();
            debug!("Sweep {}: delta {:e}", self.sweeps, delta);
            if delta < self.config.tolerance {
                break;
            }
        }
        info!("Converged after {} sweeps", self.sweeps);

        let solution = self.into_solution();
        if let Some(sink) = sink {
            sink.accept_values(&solution.values)?;
        }
        Ok(solution)
    }

    fn into_solution(self) -> Solution {
        let policy = make_greedy_policy(self.env, &self.state_values);
        Solution {
            values: self.state_values,
            policy,
            sweeps: self.sweeps,
            policy_changes: Vec::new(),
        }
    }
}
