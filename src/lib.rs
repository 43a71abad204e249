//! TTP ACO Solver Library
//!
//! A multi-objective solver for the Traveling Thief Problem (TTP) built on Ant
//! Colony Optimization.
//!
//! # Features
//!
//! - Ant Colony System for the routing sub-problem with 2-opt refinement
//! - Ant Colony System for the packing sub-problem along a fixed tour, under a
//!   time budget, with bit-flip refinement
//! - Independent colonies run in parallel on a rayon worker pool
//! - Scalarization sweep feeding a bounded non-dominated archive
//!
//! # Example
//!
//! ```no_run
//! use ttp_aco_solver::config::SolverConfig;
//! use ttp_aco_solver::instance::{City, Item, ObjectiveBounds, TTPInstance};
//!
//! let cities = vec![City::new(0, 0.0, 0.0), City::new(1, 10.0, 0.0), City::new(2, 10.0, 10.0)];
//! let items = vec![Item::new(0, 1, 3.0, 25.0), Item::new(1, 2, 5.0, 40.0)];
//! let instance = TTPInstance::new("demo", cities, items, 0.1, 1.0, 6.0)
//!     .unwrap()
//!     .with_bounds(ObjectiveBounds {
//!         ideal_duration: 35.0,
//!         ideal_profit: 65.0,
//!         nadir_duration: 120.0,
//!     })
//!     .unwrap();
//!
//! let config = SolverConfig::default().with_seed(42);
//! let front = ttp_aco_solver::solve_multi_objective(&instance, 5, &config).unwrap();
//! for solution in &front {
//!     println!("time {:.2}, profit {:.2}", solution.time, solution.profit);
//! }
//! ```

pub mod config;
pub mod error;
pub mod heuristics;
pub mod instance;
pub mod pareto;
pub mod runner;
pub mod solution;
pub mod sweep;

pub use config::SolverConfig;
pub use error::{Result, TTPError};
pub use heuristics::knapsack_aco::PackingOutcome;
pub use instance::TTPInstance;
pub use pareto::NonDominatedSet;
pub use runner::ColonyRunner;
pub use solution::{RankedTour, Solution};

/// Ranked distinct tours of one batch of TSP colonies, shortest first.
pub fn solve_tsp(instance: &TTPInstance, config: &SolverConfig) -> Result<Vec<RankedTour>> {
    config.validate()?;
    ColonyRunner::new(&config.runner)?.solve_tsp(instance, &config.tsp)
}

/// Best packing along `tour` for the trade-off coefficient `c` in [0, 1].
pub fn solve_knapsack(
    instance: &TTPInstance,
    tour: &[usize],
    c: f64,
    config: &SolverConfig,
) -> Result<PackingOutcome> {
    config.validate()?;
    ColonyRunner::new(&config.runner)?.solve_knapsack(instance, tour, c, &config.knapsack)
}

/// Approximate Pareto front of at most `trial_budget` solutions, sorted by
/// ascending time.
pub fn solve_multi_objective(
    instance: &TTPInstance,
    trial_budget: usize,
    config: &SolverConfig,
) -> Result<Vec<Solution>> {
    config.validate()?;
    let runner = ColonyRunner::new(&config.runner)?;
    sweep::ScalarizationSweep::new(&runner, &config.tsp, &config.knapsack, &config.sweep)
        .run(instance, trial_budget)
}
