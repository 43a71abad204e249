//! Parallel orchestration of independent colonies.
//!
//! A [`ColonyRunner`] owns a fixed-size rayon pool. Each colony is one unit of
//! work with its own pheromone table and random stream; colonies never share
//! state and are only joined when the batch is reduced. A panic inside a colony
//! is caught at the worker boundary and fails the whole batch.

use crate::error::{Result, TTPError};
use crate::heuristics::knapsack_aco::{
    validate_coefficient, KnapsackAcoConfig, KnapsackColony, PackingOutcome,
};
use crate::heuristics::tsp_aco::{TourHeap, TspAcoConfig, TspColony};
use crate::instance::TTPInstance;
use crate::solution::RankedTour;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Worker pool configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Worker threads (defaults to the available hardware parallelism)
    pub threads: Option<usize>,
    /// Colonies per batch (defaults to the number of threads)
    pub num_colonies: Option<usize>,
}

impl RunnerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.threads == Some(0) {
            return Err(TTPError::invalid_config("threads must be at least 1"));
        }
        if self.num_colonies == Some(0) {
            return Err(TTPError::invalid_config("num_colonies must be at least 1"));
        }
        Ok(())
    }
}

pub struct ColonyRunner {
    pool: rayon::ThreadPool,
    threads: usize,
    num_colonies: usize,
}

impl ColonyRunner {
    pub fn new(config: &RunnerConfig) -> Result<Self> {
        config.validate()?;
        let threads = config.threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
                .max(1)
        });
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("colony-worker-{}", i))
            .build()
            .map_err(|e| TTPError::ThreadPool(e.to_string()))?;

        Ok(ColonyRunner {
            pool,
            threads,
            num_colonies: config.num_colonies.unwrap_or(threads),
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn num_colonies(&self) -> usize {
        self.num_colonies
    }

    /// Run `op` inside the worker pool. Calls made from a worker of this pool
    /// run directly on that worker.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    /// Run `count` colonies in parallel and collect their results.
    ///
    /// The first error (or panic) of any colony fails the batch.
    pub fn run_colonies<T, F>(&self, count: usize, job: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> Result<T> + Sync + Send,
    {
        self.install(|| {
            (0..count)
                .into_par_iter()
                .map(|colony| guarded(colony, || job(colony)))
                .collect()
        })
    }

    /// Ranked distinct tours merged from one batch of TSP colonies, shortest first.
    pub fn solve_tsp(
        &self,
        instance: &TTPInstance,
        config: &TspAcoConfig,
    ) -> Result<Vec<RankedTour>> {
        config.validate()?;
        let start = std::time::Instant::now();
        log::info!(
            "Running {} TSP colonies on {} ({} cities)",
            self.num_colonies,
            instance.name,
            instance.num_cities()
        );

        let results = self.run_colonies(self.num_colonies, |colony| {
            TspColony::new(colony, instance, config.clone())?.run()
        })?;

        let mut merged = TourHeap::new(config.top_k);
        for result in results {
            for ranked in result.top {
                merged.offer(ranked.tour, ranked.length);
            }
        }
        let tours = merged.into_ranked();

        if let Some(best) = tours.first() {
            log::info!(
                "TSP batch done in {:.2}s: best length {:.2}, {} distinct tours",
                start.elapsed().as_secs_f64(),
                best.length,
                tours.len()
            );
        }
        Ok(tours)
    }

    /// Best packing of a batch of knapsack colonies working on the same tour.
    pub fn solve_knapsack(
        &self,
        instance: &TTPInstance,
        tour: &[usize],
        c: f64,
        config: &KnapsackAcoConfig,
    ) -> Result<PackingOutcome> {
        config.validate()?;
        validate_coefficient(c)?;
        instance.validate_tour(tour)?;

        let outcomes = self.run_colonies(self.num_colonies, |colony| {
            KnapsackColony::new(colony, instance, tour, c, config.clone())?.run()
        })?;
        let best = best_outcome(outcomes, config)?;
        log::debug!(
            "Knapsack batch for c = {:.3}: profit {:.2}, time {:.2} (colony {})",
            c,
            best.profit,
            best.time,
            best.colony
        );
        Ok(best)
    }

    /// Best packing when one colony runs on each of `tours`.
    pub fn solve_knapsack_over_tours(
        &self,
        instance: &TTPInstance,
        tours: &[Vec<usize>],
        c: f64,
        config: &KnapsackAcoConfig,
    ) -> Result<PackingOutcome> {
        config.validate()?;
        validate_coefficient(c)?;
        if tours.is_empty() {
            return Err(TTPError::invalid_input("no candidate tours to pack along"));
        }

        let outcomes = self.run_colonies(tours.len(), |colony| {
            KnapsackColony::new(colony, instance, &tours[colony], c, config.clone())?.run()
        })?;
        let best = best_outcome(outcomes, config)?;
        log::debug!(
            "Knapsack batch over {} tours for c = {:.3}: profit {:.2}, time {:.2} (tour {})",
            tours.len(),
            c,
            best.profit,
            best.time,
            best.colony
        );
        Ok(best)
    }
}

fn best_outcome(
    outcomes: Vec<PackingOutcome>,
    config: &KnapsackAcoConfig,
) -> Result<PackingOutcome> {
    outcomes
        .into_iter()
        .min_by_key(|outcome| outcome.key(config.selection))
        .ok_or_else(|| TTPError::invalid_config("batch ran no colonies"))
}

/// Run one colony body, turning a panic into [`TTPError::WorkerFailure`].
pub(crate) fn guarded<T>(colony: usize, body: impl FnOnce() -> Result<T>) -> Result<T> {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            log::error!("Colony {} panicked: {}", colony, message);
            Err(TTPError::WorkerFailure { colony, message })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::tests::create_test_instance;

    fn runner(threads: usize, colonies: usize) -> ColonyRunner {
        ColonyRunner::new(&RunnerConfig {
            threads: Some(threads),
            num_colonies: Some(colonies),
        })
        .unwrap()
    }

    #[test]
    fn test_panicking_colony_fails_the_batch() {
        let runner = runner(2, 4);
        let result = runner.run_colonies(4, |colony| {
            if colony == 2 {
                panic!("pheromone table corrupted");
            }
            Ok(colony)
        });

        match result {
            Err(TTPError::WorkerFailure { colony, message }) => {
                assert_eq!(colony, 2);
                assert!(message.contains("corrupted"));
            }
            other => panic!("expected a worker failure, got {:?}", other),
        }
    }

    #[test]
    fn test_colony_error_fails_the_batch() {
        let runner = runner(2, 3);
        let result: Result<Vec<usize>> = runner.run_colonies(3, |colony| {
            if colony == 1 {
                Err(TTPError::invalid_input("bad tour"))
            } else {
                Ok(colony)
            }
        });
        assert_eq!(result, Err(TTPError::invalid_input("bad tour")));
    }

    #[test]
    fn test_results_cover_every_colony() {
        let runner = runner(3, 5);
        let mut ids = runner.run_colonies(5, |colony| Ok(colony)).unwrap();
        ids.sort();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_solve_tsp_merges_colonies() {
        let instance = create_test_instance();
        let config = TspAcoConfig {
            num_ants: 4,
            iterations: 10,
            top_k: 3,
            seed: Some(21),
            ..Default::default()
        };
        let tours = runner(2, 3).solve_tsp(&instance, &config).unwrap();

        assert!(!tours.is_empty() && tours.len() <= 3);
        assert!((tours[0].length - 40.0).abs() < 1e-9);
        assert!(tours.iter().all(|t| instance.validate_tour(&t.tour).is_ok()));
    }

    #[test]
    fn test_solve_knapsack_over_tours() {
        let instance = create_test_instance();
        let config = KnapsackAcoConfig {
            num_ants: 5,
            iterations: 10,
            seed: Some(2),
            ..Default::default()
        };
        let tours = vec![vec![0, 1, 2, 3], vec![0, 3, 2, 1]];
        let runner = runner(2, 2);

        let best = runner.solve_knapsack_over_tours(&instance, &tours, 0.3, &config).unwrap();
        assert!(tours.contains(&best.tour));
        assert!(best.time <= instance.time_budget(0.3) + 1e-9);

        let single = runner.solve_knapsack(&instance, &tours[0], 0.3, &config).unwrap();
        assert_eq!(single.tour, tours[0]);
        assert!(single.weight <= instance.capacity);

        assert!(runner.solve_knapsack_over_tours(&instance, &[], 0.3, &config).is_err());
    }

    #[test]
    fn test_zero_threads_is_rejected() {
        let config = RunnerConfig { threads: Some(0), num_colonies: None };
        assert!(matches!(ColonyRunner::new(&config), Err(TTPError::InvalidConfig(_))));
    }
}
