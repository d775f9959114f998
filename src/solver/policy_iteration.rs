use log::{debug, info, warn};
use rand::prelude::*;

use crate::error::{Error, Result};
use crate::gridworld::*;
use crate::solver::*;

/// Generalized policy iteration with a single evaluation sweep per
/// improvement pass.
pub struct PolicyIteration<'a> {
    env: &'a GridWorld,
    config: SolverConfig,
    state_values: ValueGrid,
    policy: PolicyGrid,
    sweeps: usize,
    policy_changes: Vec<usize>,
}

impl<'a> PolicyIteration<'a> {
    /// Starts from zero values and a random policy drawn from `rng`.
    pub fn new<R: Rng>(env: &'a GridWorld, config: SolverConfig, rng: &mut R) -> Result<Self> {
        let policy = PolicyGrid::random(env, rng);
        Self::with_policy(env, config, policy)
    }

    /// Starts from zero values and the given policy, which must cover the grid
    /// and assign `Action::None` to the goal only.
    pub fn with_policy(env: &'a GridWorld, config: SolverConfig, policy: PolicyGrid) -> Result<Self> {
        if (policy.rows(), policy.cols()) != (env.rows(), env.cols()) {
            return Err(Error::PolicyShapeMismatch {
                rows: policy.rows(),
                cols: policy.cols(),
                expected_rows: env.rows(),
                expected_cols: env.cols(),
            });
        }

        for state in env.states() {
            let action = policy.get(state);
            if env.is_terminal(state) != (action == Action::None) {
                return Err(Error::InvalidPolicyAction {
                    row: state.0,
                    col: state.1,
                    action,
                });
            }
        }

        Ok(PolicyIteration {
            env,
            config,
            state_values: ValueGrid::zeros(env.rows(), env.cols()),
            policy,
            sweeps: 0,
            policy_changes: Vec::new(),
        })
    }

    /// Seeds the initial policy from `config.seed`, or from entropy.
    pub fn from_config(env: &'a GridWorld, config: SolverConfig) -> Result<Self> {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(env, config, &mut rng)
    }

    pub fn state_values(&self) -> &ValueGrid {
        &self.state_values
    }

    pub fn policy(&self) -> &PolicyGrid {
        &self.policy
    }

    /// One evaluation sweep followed by one improvement pass. Returns the
    /// number of states whose action changed.
    pub fn step(&mut self) -> usize {
        let new_values = evaluate_policy(self.env, &self.policy, &self.state_values);
        let changed = improve_policy(self.env, &mut self.policy, &new_values);
        self.state_values = new_values;
        self.sweeps += 1;
        self.policy_changes.push(changed);
        changed
    }

    pub fn is_policy_stable(&self) -> bool {
        self.policy_changes.last() == Some(&0)
    }

    /// Iterates until the policy stops changing, then keeps evaluating the
    /// stable policy until no state value moves by `config.tolerance` or more.
    pub fn run(mut self) -> Result<Solution> {
        while !self.is_policy_stable() {
            if self.policy_changes.len() >= self.config.max_iterations {
                warn!(
                    "Policy still changing after {} iterations",
                    self.policy_changes.len()
                );
                let sweeps = self.sweeps;
                return Err(Error::NonConvergence {
                    sweeps,
                    best_effort: Box::new(self.into_solution()),
                });
            }

            let changed = self.step();
            debug!(
                "Iteration {}: {} actions changed",
                self.policy_changes.len(),
                changed
            );
        }
        info!(
            "Policy stable after {} iterations",
            self.policy_changes.len()
        );

        // A single sweep per iteration leaves the values short of the fixed point.
        let mut evaluation_sweeps = 0;
        loop {
            if evaluation_sweeps >= self.config.max_sweeps {
                warn!(
                    "Evaluation of the stable policy did not settle after {} sweeps",
                    evaluation_sweeps
                );
                let sweeps = self.sweeps;
                return Err(Error::NonConvergence {
                    sweeps,
                    best_effort: Box::new(self.into_solution()),
                });
            }

            let new_values = evaluate_policy(self.env, &self.policy, &self.state_values);
            // The value sum can stand still while single states still move.
            let delta = ConvergenceTest::MaxChange.delta(&self.state_values, &new_values);
            self.state_values = new_values;
            self.sweeps += 1;
            evaluation_sweeps += 1;
            debug!("Evaluation sweep {}: delta {:e}", evaluation_sweeps, delta);

            if delta < self.config.tolerance {
                break;
            }
        }
        info!("Converged after {} sweeps", self.sweeps);

        Ok(self.into_solution())
    }

    fn into_solution(self) -> Solution {
        Solution {
            values: self.state_values,
            policy: self.policy,
            sweeps: self.sweeps,
            policy_changes: self.policy_changes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::testing::assert_optimal;
    use float_eq::assert_float_eq;
    use rstest::rstest;

    fn default_env() -> GridWorld {
        GridWorld::new(GridWorldConfig::default()).unwrap()
    }

    fn solve(env: &GridWorld, seed: u64) -> Solution {
        PolicyIteration::from_config(env, SolverConfig::default().with_seed(seed))
            .unwrap()
            .run()
            .unwrap()
    }

    #[test]
    fn default_grid_scenario() {
        let solution = solve(&default_env(), 1);

        assert_float_eq!(solution.values.get((0, 0)), 10.0, abs <= 1e-4);
        assert_eq!(solution.policy.get((0, 0)), Action::None);
        assert_eq!(solution.policy.get((0, 1)), Action::Left);
        assert_eq!(solution.policy.get((1, 0)), Action::Up);
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(17)]
    #[case(12345)]
    fn changes_follow_distance_from_goal(#[case] seed: u64) {
        let env = default_env();
        let changes = solve(&env, seed).policy_changes;

        // Only the first pass depends on the random start. After that each pass
        // fixes the cells one step further from the goal.
        assert_eq!(changes[1..], [3, 4, 5, 4, 3, 2, 1, 0]);
        assert!(changes.len() <= env.rows() * env.cols() * 4);
    }

    #[test]
    fn stable_policy_on_cancelling_grid_is_fully_evaluated() {
        // Goal and non-goal values cancel in the sum after a couple of sweeps.
        let env = GridWorld::new(GridWorldConfig::new(2, 5).with_goal(0, 4)).unwrap();
        let solution = solve(&env, 0);

        assert_eq!(solution.policy_changes.last(), Some(&0));
        assert_float_eq!(solution.values.get((0, 4)), 10.0, abs <= 1e-4);
        // Five steps from the goal.
        let expected = -1.0 - 0.9 - 0.81 - 0.729 - 0.6561 + 0.59049 * 10.0;
        assert_float_eq!(solution.values.get((1, 0)), expected, abs <= 1e-4);
    }

    #[rstest]
    #[case(GridWorldConfig::new(2, 5).with_goal(0, 4), 0)]
    #[case(GridWorldConfig::new(2, 5).with_goal(0, 4), 7)]
    #[case(GridWorldConfig::new(3, 4).with_goal(2, 1), 3)]
    #[case(GridWorldConfig::new(2, 6).with_goal(1, 3), 11)]
    #[case(GridWorldConfig::new(6, 3).with_goal(0, 2), 5)]
    #[case(GridWorldConfig::new(4, 5).with_goal(3, 0), 2)]
    #[case(GridWorldConfig::new(7, 7).with_goal(6, 6), 9)]
    fn matches_long_run_reference(#[case] config: GridWorldConfig, #[case] seed: u64) {
        let env = GridWorld::new(config).unwrap();
        let solution = solve(&env, seed);

        assert_optimal(&env, &solution);
        assert_float_eq!(solution.values.get(env.goal()), 10.0, abs <= 1e-4);
    }

    #[test]
    fn converged_values_satisfy_bellman_optimality() {
        let env = GridWorld::new(GridWorldConfig::new(4, 6).with_goal(2, 3)).unwrap();
        let solution = solve(&env, 5);

        for state in env.states() {
            let (_, best) = env.backup(state, &solution.values).greedy();
            assert_float_eq!(solution.values.get(state), best, abs <= 1e-5);
        }
    }

    #[test]
    fn initial_policy_does_not_change_result() {
        let env = default_env();
        let a = solve(&env, 2);
        let b = solve(&env, 99);

        assert!(a.values.max_abs_diff(&b.values) < 1e-4);
        assert_eq!(a.policy, b.policy);
    }

    #[test]
    fn same_seed_same_trajectory() {
        let env = default_env();
        assert_eq!(solve(&env, 8), solve(&env, 8));
    }

    #[test]
    fn step_never_overwrites_goal() {
        let env = default_env();
        let rng = &mut StdRng::seed_from_u64(3);
        let mut solver = PolicyIteration::new(&env, SolverConfig::default(), rng).unwrap();

        assert!(!solver.is_policy_stable());
        for _ in 0..3 {
            solver.step();
            assert_eq!(solver.policy().get((0, 0)), Action::None);
        }
        assert_float_eq!(solver.state_values().get((0, 0)), 1.0 + 0.9 + 0.81, abs <= 1e-12);
    }

    #[test]
    fn rejects_policy_of_wrong_shape() {
        let env = default_env();
        let policy = PolicyGrid::from_fn(4, 5, |state| {
            if state == (0, 0) {
                Action::None
            } else {
                Action::Up
            }
        });

        let result = PolicyIteration::with_policy(&env, SolverConfig::default(), policy);
        assert!(matches!(
            result,
            Err(Error::PolicyShapeMismatch {
                rows: 4,
                expected_rows: 5,
                ..
            })
        ));
    }

    #[rstest]
    #[case((0, 0), Action::Left)]
    #[case((3, 2), Action::None)]
    fn rejects_policy_misusing_none(#[case] state: State, #[case] action: Action) {
        let env = default_env();
        let mut policy = PolicyGrid::from_fn(5, 5, |s| {
            if env.is_terminal(s) {
                Action::None
            } else {
                Action::Down
            }
        });
        policy.set(state, action);

        let result = PolicyIteration::with_policy(&env, SolverConfig::default(), policy);
        match result {
            Err(Error::InvalidPolicyAction { row, col, action: got }) => {
                assert_eq!((row, col), state);
                assert_eq!(got, action);
            }
            _ => panic!("expected InvalidPolicyAction"),
        }
    }

    #[test]
    fn iteration_cap_returns_best_effort() {
        let env = default_env();
        let config = SolverConfig::default().with_seed(4).with_max_iterations(1);

        match PolicyIteration::from_config(&env, config).unwrap().run() {
            Err(Error::NonConvergence { sweeps, best_effort }) => {
                assert_eq!(sweeps, 1);
                assert_eq!(best_effort.policy_changes.len(), 1);
                assert_eq!(best_effort.values.get((0, 0)), 1.0);
            }
            other => panic!("expected NonConvergence, got {:?}", other),
        }
    }
}
