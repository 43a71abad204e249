//! Ant Colony System for the packing sub-problem.
//!
//! A [`KnapsackColony`] packs items along one fixed tour under a time budget
//! derived from the scalarization coefficient `c`. Ants add items one at a time
//! with the same pseudo-proportional rule as the routing colony; an item is a
//! candidate only while it fits both the knapsack and the time budget.

use crate::error::{Result, TTPError};
use crate::heuristics::ant::{pseudo_proportional, Candidate, PackingAnt};
use crate::heuristics::construction::{greedy_packing, item_desirability, max_delta, TourProfile};
use crate::heuristics::local_search::BitFlipSearch;
use crate::heuristics::pheromone::ItemPheromones;
use crate::heuristics::tsp_aco::{check_exponent, check_rate, colony_rng};
use crate::instance::TTPInstance;
use crate::solution::Solution;
use ordered_float::OrderedFloat;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Floor for the initial item pheromone when the greedy seed is worthless.
const MIN_TAU0: f64 = 1e-6;

/// Ranking key of a packing; smaller is better.
pub type SelectionKey = (OrderedFloat<f64>, OrderedFloat<f64>);

/// How the best packing is chosen among ants and among colonies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackingSelection {
    /// Smallest distance of the normalized objectives to the utopia point
    NearestToUtopia,
    /// Largest profit, shorter time on ties
    HighestProfit,
}

impl Default for PackingSelection {
    fn default() -> Self {
        PackingSelection::NearestToUtopia
    }
}

impl PackingSelection {
    /// Ranking key; smaller is better.
    pub fn key(&self, profit: f64, time: f64, distance_to_ideal: f64) -> SelectionKey {
        match self {
            PackingSelection::NearestToUtopia => {
                (OrderedFloat(distance_to_ideal), OrderedFloat(time))
            }
            PackingSelection::HighestProfit => (OrderedFloat(-profit), OrderedFloat(time)),
        }
    }
}

/// Knapsack colony configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnapsackAcoConfig {
    pub num_ants: usize,
    pub iterations: usize,
    pub alpha: f64,
    pub beta: f64,
    pub q0: f64,
    pub rho: f64,
    pub phi: f64,
    /// Reinforce the iteration-best plan instead of the best-so-far plan
    pub iteration_best_update: bool,
    /// Share of normalized weight (vs. normalized marginal time) in item desirability
    pub weight_balance: f64,
    /// Pheromone multiplier on the items of the greedy seed
    pub greedy_boost: f64,
    pub use_local_search: bool,
    pub selection: PackingSelection,
    pub seed: Option<u64>,
}

impl Default for KnapsackAcoConfig {
    fn default() -> Self {
        KnapsackAcoConfig {
            num_ants: 20,
            iterations: 100,
            alpha: 1.0,
            beta: 2.0,
            q0: 0.1,
            rho: 0.15,
            phi: 0.01,
            iteration_best_update: false,
            weight_balance: 0.5,
            greedy_boost: 3.0,
            use_local_search: true,
            selection: PackingSelection::NearestToUtopia,
            seed: None,
        }
    }
}

impl KnapsackAcoConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_ants == 0 || self.iterations == 0 {
            return Err(TTPError::invalid_config(
                "knapsack colony needs at least one ant and one iteration",
            ));
        }
        check_rate("q0", self.q0, true)?;
        check_rate("rho", self.rho, false)?;
        check_rate("phi", self.phi, false)?;
        check_rate("weight_balance", self.weight_balance, true)?;
        check_exponent("alpha", self.alpha)?;
        check_exponent("beta", self.beta)?;
        if !(self.greedy_boost > 0.0) || !self.greedy_boost.is_finite() {
            return Err(TTPError::invalid_config(format!(
                "greedy_boost must be positive (got {})",
                self.greedy_boost
            )));
        }
        Ok(())
    }
}

/// Check a scalarization coefficient.
pub fn validate_coefficient(c: f64) -> Result<()> {
    if (0.0..=1.0).contains(&c) {
        Ok(())
    } else {
        Err(TTPError::invalid_config(format!(
            "scalarization coefficient must lie in [0, 1] (got {})",
            c
        )))
    }
}

/// Best packing found by a knapsack colony
#[derive(Debug, Clone, PartialEq)]
pub struct PackingOutcome {
    pub colony: usize,
    pub tour: Vec<usize>,
    pub plan: Vec<bool>,
    pub profit: f64,
    pub weight: f64,
    pub time: f64,
    pub distance_to_ideal: f64,
}

impl PackingOutcome {
    fn from_ant(colony: usize, profile: &TourProfile<'_>, ant: PackingAnt) -> Self {
        let distance_to_ideal = profile.instance().distance_to_ideal(ant.time, ant.profit);
        PackingOutcome {
            colony,
            tour: profile.tour().to_vec(),
            plan: ant.plan,
            profit: ant.profit,
            weight: ant.weight,
            time: ant.time,
            distance_to_ideal,
        }
    }

    pub fn key(&self, selection: PackingSelection) -> SelectionKey {
        selection.key(self.profit, self.time, self.distance_to_ideal)
    }

    /// Evaluate the tour and plan into a [`Solution`].
    pub fn to_solution(&self, instance: &TTPInstance) -> Result<Solution> {
        instance.evaluate(&self.tour, &self.plan)
    }
}

/// One independent Ant Colony System run packing items along a fixed tour
pub struct KnapsackColony<'a> {
    id: usize,
    profile: TourProfile<'a>,
    config: KnapsackAcoConfig,
    time_budget: f64,
    empty_time: f64,
    tau0: f64,
    pheromone: ItemPheromones,
    seed_plan: PackingAnt,
    bit_flip: BitFlipSearch,
    rng: ChaCha8Rng,
}

impl<'a> KnapsackColony<'a> {
    pub fn new(
        id: usize,
        instance: &'a TTPInstance,
        tour: &[usize],
        c: f64,
        config: KnapsackAcoConfig,
    ) -> Result<Self> {
        config.validate()?;
        validate_coefficient(c)?;
        let profile = TourProfile::new(instance, tour)?;

        let m = instance.num_items();
        let empty_time = profile.time(&vec![false; m]);
        // The empty plan is always admissible
        let time_budget = instance.time_budget(c).max(empty_time);

        let bit_flip = BitFlipSearch::new();
        let mut seed_plan = greedy_packing(&profile, c, config.weight_balance);
        if config.use_local_search {
            seed_plan = bit_flip.improve(&profile, seed_plan, time_budget);
        }

        let tau0 = (seed_plan.profit / 4.0).max(MIN_TAU0);
        let mut pheromone = ItemPheromones::new(m, tau0);
        for (item, &picked) in seed_plan.plan.iter().enumerate() {
            if picked {
                pheromone.scale(item, config.greedy_boost);
            }
        }

        let rng = colony_rng(config.seed, id);
        log::trace!(
            "Knapsack colony {}: budget {:.2}, greedy profit {:.2}, tau0 {:.4}",
            id,
            time_budget,
            seed_plan.profit,
            tau0
        );

        Ok(KnapsackColony {
            id,
            profile,
            config,
            time_budget,
            empty_time,
            tau0,
            pheromone,
            seed_plan,
            bit_flip,
            rng,
        })
    }

    pub fn time_budget(&self) -> f64 {
        self.time_budget
    }

    pub fn tau0(&self) -> f64 {
        self.tau0
    }

    pub fn pheromones(&self) -> &ItemPheromones {
        &self.pheromone
    }

    /// Select the next item for `ant`, or `None` when nothing feasible is left.
    fn select_next_item(&mut self, ant: &PackingAnt) -> Option<usize> {
        let instance = self.profile.instance();
        let deltas = self.profile.delta_times(&ant.plan);
        let max_dt = max_delta(&deltas);

        let candidates: Vec<Candidate> = (0..instance.num_items())
            .filter(|&item| !ant.plan[item])
            .filter(|&item| ant.weight + instance.items[item].weight <= instance.capacity)
            .filter(|&item| ant.time + deltas[item] <= self.time_budget)
            .filter_map(|item| {
                let balance = self.config.weight_balance;
                let eta = item_desirability(instance, item, deltas[item], max_dt, balance);
                if !(eta > 0.0) {
                    return None;
                }
                let tau = self.pheromone.get(item);
                let eta = eta.powf(self.config.beta);
                Some(Candidate {
                    index: item,
                    greedy: tau * eta,
                    weight: tau.powf(self.config.alpha) * eta,
                })
            })
            .collect();

        pseudo_proportional(&mut self.rng, &candidates, self.config.q0)
    }

    /// Let every ant pack until it is full; returns the ants.
    fn construct_plans(&mut self) -> Vec<PackingAnt> {
        let m = self.profile.instance().num_items();
        let (phi, tau0) = (self.config.phi, self.tau0);
        let mut ants: Vec<PackingAnt> = (0..self.config.num_ants)
            .map(|_| PackingAnt::new(m, self.empty_time))
            .collect();

        while ants.iter().any(|ant| !ant.full) {
            let mut stepped = Vec::with_capacity(ants.len());
            for ant in std::mem::take(&mut ants) {
                if ant.full {
                    stepped.push(ant);
                    continue;
                }
                let ant = match self.select_next_item(&ant) {
                    Some(item) => {
                        let it = self.profile.instance().items[item];
                        let mut plan = ant.plan.clone();
                        plan[item] = true;
                        let time = self.profile.time(&plan);
                        self.pheromone.local_update(item, phi, tau0);
                        ant.pick(item, it.profit, it.weight, time)
                    }
                    None => ant.exhausted(),
                };
                stepped.push(ant);
            }
            ants = stepped;
        }

        ants
    }

    fn is_better(&self, candidate: &PackingOutcome, incumbent: &PackingOutcome) -> bool {
        candidate.key(self.config.selection) < incumbent.key(self.config.selection)
    }

    /// Best ant of a round, ranked by the selection criterion.
    fn select_iteration_best(&self, ants: Vec<PackingAnt>) -> Result<PackingAnt> {
        let instance = self.profile.instance();
        let selection = self.config.selection;
        ants.into_iter()
            .min_by_key(|ant| {
                let distance = instance.distance_to_ideal(ant.time, ant.profit);
                selection.key(ant.profit, ant.time, distance)
            })
            .ok_or_else(|| TTPError::invalid_config("knapsack colony has no ants"))
    }

    /// One iteration: build plans, refine the iteration best, update `best`
    /// and reinforce the pheromone. Returns the iteration-best plan.
    fn iterate(&mut self, best: &mut Option<PackingOutcome>) -> Result<PackingOutcome> {
        let ants = self.construct_plans();
        let ant = self.select_iteration_best(ants)?;
        let ant = if self.config.use_local_search {
            self.bit_flip.improve(&self.profile, ant, self.time_budget)
        } else {
            ant
        };
        let iteration_best = PackingOutcome::from_ant(self.id, &self.profile, ant);

        if best.as_ref().map_or(true, |b| self.is_better(&iteration_best, b)) {
            *best = Some(iteration_best.clone());
        }

        let reinforced = if self.config.iteration_best_update {
            &iteration_best
        } else {
            best.as_ref().unwrap_or(&iteration_best)
        };
        self.pheromone
            .reinforce_plan(&reinforced.plan, self.config.rho, reinforced.profit);

        Ok(iteration_best)
    }

    /// Run all iterations
    pub fn run(mut self) -> Result<PackingOutcome> {
        let mut best = if self.seed_plan.time <= self.time_budget {
            Some(PackingOutcome::from_ant(self.id, &self.profile, self.seed_plan.clone()))
        } else {
            None
        };

        for iteration in 0..self.config.iterations {
            let iteration_best = self.iterate(&mut best)?;

            if iteration % 10 == 0 {
                log::debug!(
                    "Knapsack colony {}, iteration {}: best profit = {:.2}, \
                     iteration best profit = {:.2}, time = {:.2}",
                    self.id,
                    iteration,
                    best.as_ref().map_or(0.0, |b| b.profit),
                    iteration_best.profit,
                    iteration_best.time
                );
            }
        }

        best.ok_or_else(|| TTPError::invalid_config("knapsack colony produced no plan"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::tests::create_test_instance;
    use crate::instance::{City, Item, ObjectiveBounds};

    fn small_config(seed: u64) -> KnapsackAcoConfig {
        KnapsackAcoConfig {
            num_ants: 8,
            iterations: 25,
            seed: Some(seed),
            ..Default::default()
        }
    }

    #[test]
    fn test_free_item_is_always_packed() {
        let cities = vec![
            City::new(0, 0.0, 0.0),
            City::new(1, 10.0, 0.0),
            City::new(2, 10.0, 10.0),
        ];
        let items = vec![Item::new(0, 1, 0.0, 10.0)];
        let instance = TTPInstance::new("free", cities, items, 0.1, 1.0, 5.0)
            .unwrap()
            .with_bounds(ObjectiveBounds {
                ideal_duration: 34.0,
                ideal_profit: 10.0,
                nadir_duration: 100.0,
            })
            .unwrap();

        for c in [0.0, 0.1, 0.25, 0.5, 0.75, 1.0] {
            for selection in [PackingSelection::NearestToUtopia, PackingSelection::HighestProfit] {
                let config = KnapsackAcoConfig { selection, ..small_config(1) };
                let outcome = KnapsackColony::new(0, &instance, &[0, 1, 2], c, config)
                    .unwrap()
                    .run()
                    .unwrap();
                assert!(outcome.plan[0], "c = {}", c);
                assert_eq!(outcome.profit, 10.0);
            }
        }
    }

    #[test]
    fn test_plans_respect_capacity_and_budget() {
        let instance = create_test_instance();
        let tour = [0, 1, 2, 3];

        for (seed, c) in [0.0, 0.05, 0.1, 0.2, 0.5, 1.0].into_iter().enumerate() {
            let config = small_config(seed as u64);
            let colony = KnapsackColony::new(0, &instance, &tour, c, config).unwrap();
            let budget = colony.time_budget();
            let outcome = colony.run().unwrap();

            assert!(outcome.weight <= instance.capacity);
            assert!(outcome.time <= budget + 1e-9);

            let solution = outcome.to_solution(&instance).unwrap();
            assert!(solution.is_feasible());
            assert!((solution.time - outcome.time).abs() < 1e-9);
            assert_eq!(solution.profit, outcome.profit);
        }
    }

    #[test]
    fn test_zero_budget_packs_nothing_costly() {
        let instance = create_test_instance();
        let outcome = KnapsackColony::new(0, &instance, &[0, 1, 2, 3], 0.0, small_config(4))
            .unwrap()
            .run()
            .unwrap();
        // Every item slows the thief down, so only the empty plan meets the ideal time
        assert_eq!(outcome.profit, 0.0);
        assert_eq!(outcome.time, 40.0);
    }

    #[test]
    fn test_highest_profit_with_loose_budget() {
        let instance = create_test_instance();
        let config = KnapsackAcoConfig {
            selection: PackingSelection::HighestProfit,
            ..small_config(3)
        };
        let outcome = KnapsackColony::new(0, &instance, &[0, 1, 2, 3], 1.0, config)
            .unwrap()
            .run()
            .unwrap();
        // Items 0 and 2 are the most valuable pair that fits
        assert_eq!(outcome.profit, 90.0);
        assert_eq!(outcome.plan, vec![true, false, true]);
    }

    #[test]
    fn test_pheromones_stay_positive() {
        let instance = create_test_instance();
        let config = KnapsackAcoConfig {
            phi: 0.99,
            rho: 0.99,
            ..small_config(8)
        };
        let mut colony = KnapsackColony::new(0, &instance, &[0, 1, 2, 3], 0.0, config).unwrap();
        for _ in 0..20 {
            colony.construct_plans();
            colony.pheromone.reinforce_plan(&[true, true, true], 0.99, 0.0);
        }
        assert!(colony.pheromones().min_value() > 0.0);
    }

    #[test]
    fn test_iteration_best_update_switches_reinforced_plan() {
        let instance = create_test_instance();
        let tour = vec![0, 1, 2, 3];
        // Sits on the utopia point, so no ant can displace it
        let stored = PackingOutcome {
            colony: 0,
            tour: tour.clone(),
            plan: vec![true, false, false],
            profit: 1e6,
            weight: 4.0,
            time: 40.0,
            distance_to_ideal: 0.0,
        };

        for iteration_best_update in [false, true] {
            let config = KnapsackAcoConfig {
                iteration_best_update,
                ..small_config(12)
            };
            let rho = config.rho;
            let mut colony = KnapsackColony::new(0, &instance, &tour, 1.0, config).unwrap();
            let mut best = Some(stored.clone());

            colony.iterate(&mut best).unwrap();
            assert_eq!(best.as_ref(), Some(&stored));

            if iteration_best_update {
                let pheromones = colony.pheromones();
                assert!((0..pheromones.len()).all(|item| pheromones.get(item) < 1e5));
            } else {
                assert!(colony.pheromones().get(0) >= rho * stored.profit);
            }
        }
    }

    #[test]
    fn test_rejects_bad_coefficient_and_config() {
        let instance = create_test_instance();
        assert!(matches!(
            KnapsackColony::new(0, &instance, &[0, 1, 2, 3], 1.5, KnapsackAcoConfig::default()),
            Err(TTPError::InvalidConfig(_))
        ));
        let config = KnapsackAcoConfig { weight_balance: -0.1, ..Default::default() };
        assert!(config.validate().is_err());
        assert!(matches!(
            KnapsackColony::new(0, &instance, &[0, 2, 2, 3], 0.5, KnapsackAcoConfig::default()),
            Err(TTPError::InvalidInput(_))
        ));
    }
}
