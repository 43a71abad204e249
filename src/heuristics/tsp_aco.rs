//! Ant Colony System for the routing sub-problem.
//!
//! One [`TspColony`] is a single independent run: it owns its pheromone table
//! and its ants, constructs closed tours with the ACS decision rule, refines the
//! iteration-best tour with 2-opt and keeps a bounded set of the best distinct
//! tours it has seen.

use crate::error::{Result, TTPError};
use crate::heuristics::ant::{canonical_tour, pseudo_proportional, Candidate, TourAnt};
use crate::heuristics::local_search::TwoOptSearch;
use crate::heuristics::pheromone::EdgePheromones;
use crate::instance::TTPInstance;
use crate::solution::RankedTour;
use ordered_float::OrderedFloat;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BinaryHeap, HashSet};

/// TSP colony configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TspAcoConfig {
    /// Number of ants
    pub num_ants: usize,
    /// Number of iterations
    pub iterations: usize,
    /// Pheromone importance (alpha)
    pub alpha: f64,
    /// Heuristic importance (beta)
    pub beta: f64,
    /// Exploitation probability (q0 in ACS)
    pub q0: f64,
    /// Global update rate (rho)
    pub rho: f64,
    /// Local pheromone decay (phi)
    pub phi: f64,
    /// Reinforce the iteration-best tour instead of the best-so-far tour
    pub iteration_best_update: bool,
    /// `k` in `tau0 = 1 / (k * greedy_length)`; defaults to the number of cities
    pub tau0_factor: Option<f64>,
    /// Multiply pheromone along the nearest-neighbor tour at start-up
    pub greedy_boost: Option<f64>,
    /// Start each iteration's ants at a random city
    pub random_start: bool,
    /// Size of the best-tours heap
    pub top_k: usize,
    /// Refine the iteration-best tour with 2-opt
    pub use_local_search: bool,
    /// 2-opt applies every improving move instead of the best one per pass
    pub first_improvement: bool,
    /// Random seed (entropy when absent)
    pub seed: Option<u64>,
}

impl Default for TspAcoConfig {
    fn default() -> Self {
        TspAcoConfig {
            num_ants: 20,
            iterations: 100,
            alpha: 1.0,
            beta: 2.5,
            q0: 0.9,
            rho: 0.1,
            phi: 0.1,
            iteration_best_update: false,
            tau0_factor: None,
            greedy_boost: None,
            random_start: true,
            top_k: 10,
            use_local_search: true,
            first_improvement: true,
            seed: None,
        }
    }
}

impl TspAcoConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_ants == 0 || self.iterations == 0 {
            return Err(TTPError::invalid_config(
                "TSP colony needs at least one ant and one iteration",
            ));
        }
        if self.top_k == 0 {
            return Err(TTPError::invalid_config("top_k must be at least 1"));
        }
        check_rate("q0", self.q0, true)?;
        check_rate("rho", self.rho, false)?;
        check_rate("phi", self.phi, false)?;
        check_exponent("alpha", self.alpha)?;
        check_exponent("beta", self.beta)?;
        if let Some(k) = self.tau0_factor {
            if !(k > 0.0) || !k.is_finite() {
                return Err(TTPError::invalid_config(format!(
                    "tau0_factor must be positive (got {})",
                    k
                )));
            }
        }
        if let Some(boost) = self.greedy_boost {
            if !(boost > 0.0) || !boost.is_finite() {
                return Err(TTPError::invalid_config(format!(
                    "greedy_boost must be positive (got {})",
                    boost
                )));
            }
        }
        Ok(())
    }
}

/// `value` must lie in [0, 1], or in [0, 1) when `closed` is false.
pub(crate) fn check_rate(name: &str, value: f64, closed: bool) -> Result<()> {
    let ok = value >= 0.0 && if closed { value <= 1.0 } else { value < 1.0 };
    if ok {
        Ok(())
    } else {
        Err(TTPError::invalid_config(format!(
            "{} must lie in [0, 1{} (got {})",
            name,
            if closed { "]" } else { ")" },
            value
        )))
    }
}

pub(crate) fn check_exponent(name: &str, value: f64) -> Result<()> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(TTPError::invalid_config(format!(
            "{} must be a non-negative number (got {})",
            name, value
        )))
    }
}

pub(crate) fn colony_rng(seed: Option<u64>, colony: usize) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed.wrapping_add(colony as u64)),
        None => ChaCha8Rng::from_entropy(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct HeapEntry {
    length: OrderedFloat<f64>,
    tour: Vec<usize>,
}

/// Bounded set of the best distinct tours.
///
/// A max-heap on length: the worst of the kept tours sits on top, so it is
/// evicted in O(log K) when a better tour arrives. A tour and its mirror image
/// count as the same tour.
#[derive(Debug, Clone)]
pub struct TourHeap {
    capacity: usize,
    heap: BinaryHeap<HeapEntry>,
    keys: HashSet<Vec<usize>>,
}

impl TourHeap {
    pub fn new(capacity: usize) -> Self {
        TourHeap {
            capacity,
            heap: BinaryHeap::with_capacity(capacity + 1),
            keys: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Offer a tour; returns whether it was kept.
    pub fn offer(&mut self, tour: Vec<usize>, length: f64) -> bool {
        if self.capacity == 0 {
            return false;
        }
        let key = canonical_tour(&tour);
        if self.keys.contains(&key) {
            return false;
        }

        if self.heap.len() >= self.capacity {
            match self.heap.peek() {
                Some(worst) if OrderedFloat(length) < worst.length => {
                    if let Some(evicted) = self.heap.pop() {
                        self.keys.remove(&canonical_tour(&evicted.tour));
                    }
                }
                _ => return false,
            }
        }

        self.keys.insert(key);
        self.heap.push(HeapEntry {
            length: OrderedFloat(length),
            tour,
        });
        true
    }

    /// Kept tours, shortest first.
    pub fn into_ranked(self) -> Vec<RankedTour> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|entry| RankedTour::new(entry.tour, entry.length.into_inner()))
            .collect()
    }
}

/// Result of one TSP colony run
#[derive(Debug, Clone)]
pub struct TspColonyResult {
    pub colony: usize,
    pub best: RankedTour,
    /// Best distinct tours, shortest first
    pub top: Vec<RankedTour>,
}

/// One independent Ant Colony System run on the routing sub-problem
pub struct TspColony<'a> {
    id: usize,
    instance: &'a TTPInstance,
    config: TspAcoConfig,
    pheromone: EdgePheromones,
    tau0: f64,
    two_opt: TwoOptSearch,
    rng: ChaCha8Rng,
}

impl<'a> TspColony<'a> {
    pub fn new(id: usize, instance: &'a TTPInstance, config: TspAcoConfig) -> Result<Self> {
        config.validate()?;
        let n = instance.num_cities();

        let (greedy_tour, greedy_length) = instance.greedy_tour();
        let k = config.tau0_factor.unwrap_or(n as f64);
        let tau0 = 1.0 / (k * greedy_length.max(f64::MIN_POSITIVE));

        let mut pheromone = EdgePheromones::new(n, tau0);
        if let Some(boost) = config.greedy_boost {
            for i in 0..greedy_tour.len() {
                pheromone.scale(greedy_tour[i], greedy_tour[(i + 1) % greedy_tour.len()], boost);
            }
        }

        let two_opt = if config.first_improvement {
            TwoOptSearch::first_improvement()
        } else {
            TwoOptSearch::new()
        };
        let rng = colony_rng(config.seed, id);

        Ok(TspColony {
            id,
            instance,
            config,
            pheromone,
            tau0,
            two_opt,
            rng,
        })
    }

    pub fn tau0(&self) -> f64 {
        self.tau0
    }

    pub fn pheromones(&self) -> &EdgePheromones {
        &self.pheromone
    }

    /// Select next city using the ACS rule
    fn select_next_city(&mut self, ant: &TourAnt) -> Option<usize> {
        let current = ant.current;
        let candidates: Vec<Candidate> = (0..self.instance.num_cities())
            .filter(|&city| !ant.visited[city])
            .map(|city| {
                let tau = self.pheromone.get(current, city);
                let eta = (1.0 / self.instance.distance(current, city)).powf(self.config.beta);
                Candidate {
                    index: city,
                    greedy: tau * eta,
                    weight: tau.powf(self.config.alpha) * eta,
                }
            })
            .collect();

        pseudo_proportional(&mut self.rng, &candidates, self.config.q0)
    }

    /// Let every ant build a closed tour; returns the ants.
    fn construct_tours(&mut self) -> Vec<TourAnt> {
        let n = self.instance.num_cities();
        let start = if self.config.random_start { self.rng.gen_range(0..n) } else { 0 };
        let (phi, tau0) = (self.config.phi, self.tau0);

        let mut ants: Vec<TourAnt> = (0..self.config.num_ants)
            .map(|_| TourAnt::new(n, start))
            .collect();

        // All ants advance one city at a time so local updates interleave
        for _ in 1..n {
            let mut stepped = Vec::with_capacity(ants.len());
            for ant in ants {
                let from = ant.current;
                let ant = match self.select_next_city(&ant) {
                    Some(next) => {
                        let distance = self.instance.distance(from, next);
                        self.pheromone.local_update(from, next, phi, tau0);
                        ant.visit(next, distance)
                    }
                    None => ant,
                };
                stepped.push(ant);
            }
            ants = stepped;
        }

        ants.into_iter()
            .map(|ant| {
                let (from, to) = (ant.current, ant.start());
                self.pheromone.local_update(from, to, phi, tau0);
                let distance = self.instance.distance(from, to);
                ant.close(distance)
            })
            .collect()
    }

    /// One iteration: build tours, refine the iteration best, update `best`
    /// and reinforce the pheromone. Returns the iteration-best tour.
    fn iterate(&mut self, best: &mut Option<RankedTour>) -> Result<RankedTour> {
        let ants = self.construct_tours();
        let iteration_best_ant = ants
            .into_iter()
            .filter(|ant| ant.is_complete())
            .min_by_key(|ant| OrderedFloat(ant.length))
            .ok_or_else(|| TTPError::invalid_input("no ant completed a tour"))?;

        let mut tour = iteration_best_ant.rooted_tour();
        if self.config.use_local_search {
            self.two_opt.improve(self.instance, &mut tour);
        }
        let length = self.instance.tour_length(&tour);
        let iteration_best = RankedTour::new(tour, length);

        if best.as_ref().map_or(true, |b| iteration_best.length < b.length) {
            *best = Some(iteration_best.clone());
        }

        let reinforced = if self.config.iteration_best_update {
            &iteration_best
        } else {
            best.as_ref().unwrap_or(&iteration_best)
        };
        self.pheromone
            .reinforce_tour(&reinforced.tour, self.config.rho, 1.0 / reinforced.length);

        Ok(iteration_best)
    }

    /// Run all iterations
    pub fn run(mut self) -> Result<TspColonyResult> {
        let start = std::time::Instant::now();
        let mut best: Option<RankedTour> = None;
        let mut top = TourHeap::new(self.config.top_k);

        for iteration in 0..self.config.iterations {
            let iteration_best = self.iterate(&mut best)?;

            if iteration % 10 == 0 {
                log::debug!(
                    "TSP colony {}, iteration {}: best = {:.2}, iteration best = {:.2}",
                    self.id,
                    iteration,
                    best.as_ref().map_or(f64::INFINITY, |b| b.length),
                    iteration_best.length
                );
            }

            top.offer(iteration_best.tour, iteration_best.length);
        }

        let best = best.ok_or_else(|| TTPError::invalid_input("TSP colony produced no tour"))?;
        log::debug!(
            "TSP colony {} finished in {:.2}s: best length {:.2}",
            self.id,
            start.elapsed().as_secs_f64(),
            best.length
        );

        Ok(TspColonyResult {
            colony: self.id,
            best,
            top: top.into_ranked(),
        })
    }
}
