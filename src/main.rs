mod error;
mod gridworld;
mod solver;

use log::info;

use error::Result;
use gridworld::render::{PlotSink, TableSink};
use gridworld::*;
use solver::policy_iteration::PolicyIteration;
use solver::value_iteration::ValueIteration;
use solver::*;

fn print_solution(title: &str, solution: &Solution) -> Result<()> {
    println!("{} ({} sweeps)", title, solution.sweeps);
    let mut tables = TableSink;
    tables.accept_policy(&solution.policy)?;
    tables.accept_values(&solution.values)
}

fn main() -> Result<()> {
    env_logger::init();

    let env = GridWorld::new(GridWorldConfig::default())?;
    let config = SolverConfig::default();

    let policy_iteration = PolicyIteration::from_config(&env, config.clone())?.run()?;
    print_solution("Policy iteration", &policy_iteration)?;

    let mut plot = PlotSink::default();
    let value_iteration = ValueIteration::new(&env, config).run_with_sink(Some(&mut plot))?;
    print_solution("Value iteration", &value_iteration)?;

    info!(
        "Goal value: {:.4}, max value difference between solvers: {:e}",
        value_iteration.values.get(env.goal()),
        policy_iteration
            .values
            .max_abs_diff(&value_iteration.values)
    );
    Ok(())
}
