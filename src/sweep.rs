//! Scalarization sweep approximating the Pareto front.
//!
//! The trade-off coefficient `c` is swept over [0, 1]. Each value turns the
//! bi-objective problem into a single packing problem with a time budget,
//! solved by a batch of knapsack colonies over the candidate tours. Every
//! resulting solution is offered to a shared [`NonDominatedSet`], which is
//! finally pruned to the trial budget.

use crate::error::{Result, TTPError};
use crate::heuristics::knapsack_aco::KnapsackAcoConfig;
use crate::heuristics::tsp_aco::TspAcoConfig;
use crate::instance::{with_reversals, TTPInstance};
use crate::pareto::NonDominatedSet;
use crate::runner::{guarded, ColonyRunner};
use crate::solution::Solution;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Distribution of the sampled trade-off coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WeightSpacing {
    /// Evenly spaced
    Linear,
    /// Denser near 0; a larger `hyper_factor` concentrates more samples there
    Logarithmic { hyper_factor: f64 },
}

impl Default for WeightSpacing {
    fn default() -> Self {
        WeightSpacing::Linear
    }
}

impl WeightSpacing {
    /// `count` coefficients over [0, 1], both ends included.
    pub fn weights(&self, count: usize) -> Vec<f64> {
        match *self {
            WeightSpacing::Linear => linspace(0.0, 1.0, count),
            WeightSpacing::Logarithmic { hyper_factor } => logspace(0.0, 1.0, count, hyper_factor),
        }
    }
}

/// `steps` evenly spaced values from `start` to `end`.
pub fn linspace(start: f64, end: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (steps - 1) as f64;
            (0..steps)
                .map(|k| if k == steps - 1 { end } else { start + k as f64 * step })
                .collect()
        }
    }
}

/// `steps` values from `start` to `end` whose gaps grow geometrically.
///
/// `v_k = start + (r^k - 1) / h` with `r = (h * (end - start) + 1)^(1 / (steps - 1))`.
pub fn logspace(start: f64, end: f64, steps: usize, hyper_factor: f64) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let ratio = (hyper_factor * (end - start) + 1.0).powf(1.0 / (steps - 1) as f64);
            (0..steps)
                .map(|k| {
                    if k == steps - 1 {
                        end
                    } else {
                        start + (ratio.powi(k as i32) - 1.0) / hyper_factor
                    }
                })
                .collect()
        }
    }
}

/// Sweep configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Sampled coefficients per requested solution
    pub oversampling: usize,
    pub spacing: WeightSpacing,
    /// Number of candidate tours used for packing
    pub max_candidate_tours: usize,
    /// Also pack along each candidate tour walked backwards
    pub include_reversed_tours: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        SweepConfig {
            oversampling: 3,
            spacing: WeightSpacing::Linear,
            max_candidate_tours: 2,
            include_reversed_tours: true,
        }
    }
}

impl SweepConfig {
    pub fn validate(&self) -> Result<()> {
        if self.oversampling == 0 {
            return Err(TTPError::invalid_config("oversampling must be at least 1"));
        }
        if self.max_candidate_tours == 0 {
            return Err(TTPError::invalid_config("max_candidate_tours must be at least 1"));
        }
        if let WeightSpacing::Logarithmic { hyper_factor } = self.spacing {
            if !(hyper_factor > 0.0) || !hyper_factor.is_finite() {
                return Err(TTPError::invalid_config(format!(
                    "hyper_factor must be positive (got {})",
                    hyper_factor
                )));
            }
        }
        Ok(())
    }
}

/// Bi-objective driver: one knapsack batch per trade-off coefficient
pub struct ScalarizationSweep<'a> {
    runner: &'a ColonyRunner,
    tsp: &'a TspAcoConfig,
    knapsack: &'a KnapsackAcoConfig,
    config: &'a SweepConfig,
}

impl<'a> ScalarizationSweep<'a> {
    pub fn new(
        runner: &'a ColonyRunner,
        tsp: &'a TspAcoConfig,
        knapsack: &'a KnapsackAcoConfig,
        config: &'a SweepConfig,
    ) -> Self {
        ScalarizationSweep {
            runner,
            tsp,
            knapsack,
            config,
        }
    }

    /// Tours to pack along: the instance's candidate tours, or the best tours
    /// of a TSP batch when it has none.
    pub fn candidate_tours(&self, instance: &TTPInstance) -> Result<Vec<Vec<usize>>> {
        let limit = self.config.max_candidate_tours;
        let reversed = self.config.include_reversed_tours;

        if !instance.candidate_tours.is_empty() {
            return Ok(if reversed {
                instance.candidate_tours_with_reversals(limit)
            } else {
                instance.candidate_tours.iter().take(limit).cloned().collect()
            });
        }

        let tours: Vec<Vec<usize>> = self
            .runner
            .solve_tsp(instance, self.tsp)?
            .into_iter()
            .take(limit)
            .map(|ranked| ranked.tour)
            .collect();
        Ok(if reversed { with_reversals(tours) } else { tours })
    }

    /// Approximate the Pareto front with at most `trial_budget` solutions,
    /// sorted by ascending time.
    pub fn run(&self, instance: &TTPInstance, trial_budget: usize) -> Result<Vec<Solution>> {
        if trial_budget == 0 {
            return Err(TTPError::invalid_config("trial budget must be at least 1"));
        }
        self.config.validate()?;
        self.knapsack.validate()?;

        let start = std::time::Instant::now();
        let tours = self.candidate_tours(instance)?;
        let weights = self.config.spacing.weights(trial_budget * self.config.oversampling);
        log::info!(
            "Sweeping {} trade-off weights over {} candidate tours on {}",
            weights.len(),
            tours.len(),
            instance.name
        );

        let archive = Mutex::new(NonDominatedSet::new());
        self.runner.install(|| {
            weights.par_iter().enumerate().try_for_each(|(k, &c)| {
                guarded(k, || {
                    // Distinct random streams for every colony of every weight
                    let offset = (k * tours.len()) as u64;
                    let config = KnapsackAcoConfig {
                        seed: self.knapsack.seed.map(|s| s.wrapping_add(offset)),
                        ..self.knapsack.clone()
                    };
                    let outcome = self
                        .runner
                        .solve_knapsack_over_tours(instance, &tours, c, &config)?;
                    let solution = outcome.to_solution(instance)?;
                    log::debug!(
                        "Weight {:.4}: time {:.2}, profit {:.2}, {} items",
                        c,
                        solution.time,
                        solution.profit,
                        solution.num_packed()
                    );

                    let mut archive = archive.lock().map_err(|_| TTPError::WorkerFailure {
                        colony: k,
                        message: "archive lock poisoned".to_string(),
                    })?;
                    archive.add(solution);
                    Ok(())
                })
            })
        })?;

        let mut archive = archive.into_inner().map_err(|_| TTPError::WorkerFailure {
            colony: 0,
            message: "archive lock poisoned".to_string(),
        })?;
        let found = archive.len();
        let front = archive.get_best_solutions(trial_budget);

        log::info!(
            "Sweep done in {:.2}s: {} non-dominated solutions found, {} kept",
            start.elapsed().as_secs_f64(),
            found,
            front.len()
        );
        Ok(front)
    }
}
