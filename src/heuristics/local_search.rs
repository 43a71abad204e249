//! Local search refinements used by the colonies.
//!
//! - 2-opt on closed tours (segment reversal)
//! - Bit-flip swaps on packing plans

use crate::heuristics::ant::PackingAnt;
use crate::heuristics::construction::TourProfile;
use crate::instance::TTPInstance;
use ordered_float::OrderedFloat;

/// Moves must gain at least this much to be accepted.
const IMPROVEMENT_EPSILON: f64 = 1e-9;

/// 2-Opt Local Search
///
/// Reverses tour segments while that shortens the closed tour. Position 0 is
/// never moved, so a tour rooted at city 0 stays rooted.
#[derive(Debug, Clone)]
pub struct TwoOptSearch {
    /// Apply every improving move found during a pass instead of only the best one
    pub first_improvement: bool,
    /// Upper bound on the number of passes
    pub max_passes: usize,
}

impl TwoOptSearch {
    pub fn new() -> Self {
        TwoOptSearch {
            first_improvement: false,
            max_passes: 10_000,
        }
    }

    pub fn first_improvement() -> Self {
        TwoOptSearch {
            first_improvement: true,
            max_passes: 10_000,
        }
    }

    /// Length change of reversing `tour[i + 1..=j]`.
    #[inline]
    fn delta(instance: &TTPInstance, tour: &[usize], i: usize, j: usize) -> f64 {
        let n = tour.len();
        let a = tour[i];
        let b = tour[i + 1];
        let c = tour[j];
        let d = tour[(j + 1) % n];
        instance.distance(a, c) + instance.distance(b, d)
            - instance.distance(a, b)
            - instance.distance(c, d)
    }

    /// Improve `tour` in place until no improving reversal remains.
    /// Returns the number of applied moves.
    pub fn improve(&self, instance: &TTPInstance, tour: &mut [usize]) -> usize {
        let n = tour.len();
        if n < 4 {
            return 0;
        }

        let mut moves = 0;
        for _ in 0..self.max_passes {
            let mut improved = false;
            let mut best_delta = -IMPROVEMENT_EPSILON;
            let mut best_move = None;

            for i in 0..n - 2 {
                for j in i + 2..n {
                    if i == 0 && j == n - 1 {
                        continue; // Both edges touch the start city
                    }

                    let delta = Self::delta(instance, tour, i, j);
                    if self.first_improvement {
                        if delta < -IMPROVEMENT_EPSILON {
                            tour[i + 1..=j].reverse();
                            moves += 1;
                            improved = true;
                        }
                    } else if delta < best_delta {
                        best_delta = delta;
                        best_move = Some((i, j));
                    }
                }
            }

            if let Some((i, j)) = best_move {
                tour[i + 1..=j].reverse();
                moves += 1;
                improved = true;
            }

            if !improved {
                break;
            }
        }

        log::trace!("2-opt applied {} moves", moves);
        moves
    }
}

impl Default for TwoOptSearch {
    fn default() -> Self {
        Self::first_improvement()
    }
}

/// Bit-flip search on a packing plan.
///
/// For each packed item, look for an unpacked item with higher profit whose
/// swap keeps the plan within capacity and within the time budget; take the
/// most profitable such swap. Passes repeat until profit stops increasing.
#[derive(Debug, Clone, Default)]
pub struct BitFlipSearch;

impl BitFlipSearch {
    pub fn new() -> Self {
        BitFlipSearch
    }

    pub fn improve(
        &self,
        profile: &TourProfile<'_>,
        ant: PackingAnt,
        time_budget: f64,
    ) -> PackingAnt {
        let instance = profile.instance();
        let items = &instance.items;

        let mut by_profit: Vec<usize> = (0..items.len()).collect();
        by_profit.sort_by_key(|&i| std::cmp::Reverse(OrderedFloat(items[i].profit)));

        let mut ant = ant;
        let mut swaps = 0;
        loop {
            let start_profit = ant.profit;

            for out in 0..items.len() {
                if !ant.plan[out] {
                    continue;
                }

                let mut chosen = None;
                for &into in &by_profit {
                    if items[into].profit <= items[out].profit {
                        break;
                    }
                    if ant.plan[into] {
                        continue;
                    }
                    let weight = ant.weight - items[out].weight + items[into].weight;
                    if weight > instance.capacity {
                        continue;
                    }
                    let time = profile.time_with_swap(&ant.plan, out, into);
                    if time <= time_budget {
                        chosen = Some((into, time));
                        break;
                    }
                }

                if let Some((into, time)) = chosen {
                    let profit_change = items[into].profit - items[out].profit;
                    let weight_change = items[into].weight - items[out].weight;
                    ant = ant.swap(out, into, profit_change, weight_change, time);
                    swaps += 1;
                }
            }

            if ant.profit <= start_profit {
                break;
            }
        }

        log::trace!("bit-flip applied {} swaps", swaps);
        ant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::tests::create_test_instance;
    use crate::instance::{City, TTPInstance};
    use rand::prelude::*;
    use rand_chacha::ChaCha8Rng;

    fn random_instance(n: usize, seed: u64) -> TTPInstance {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let cities = (0..n)
            .map(|i| City::new(i, rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0)))
            .collect();
        TTPInstance::new("random", cities, Vec::new(), 0.1, 1.0, 1.0).unwrap()
    }

    #[test]
    fn test_two_opt_untangles_crossing() {
        let instance = create_test_instance();
        let mut tour = vec![0, 2, 1, 3];
        let moves = TwoOptSearch::new().improve(&instance, &mut tour);
        assert!(moves > 0);
        assert!((instance.tour_length(&tour) - 40.0).abs() < 1e-9);
        assert_eq!(tour[0], 0);
    }

    #[test]
    fn test_two_opt_never_lengthens_and_keeps_permutation() {
        for seed in 0..5 {
            let instance = random_instance(25, seed);
            let mut rng = ChaCha8Rng::seed_from_u64(seed + 100);
            let mut tour: Vec<usize> = (1..25).collect();
            tour.shuffle(&mut rng);
            tour.insert(0, 0);

            for search in [TwoOptSearch::new(), TwoOptSearch::first_improvement()] {
                let mut improved = tour.clone();
                let before = instance.tour_length(&improved);
                search.improve(&instance, &mut improved);
                assert!(instance.tour_length(&improved) <= before + 1e-9);
                assert!(instance.validate_tour(&improved).is_ok());
            }
        }
    }

    #[test]
    fn test_bit_flip_swaps_for_more_profit() {
        let instance = create_test_instance();
        let tour = [0, 1, 2, 3];
        let profile = TourProfile::new(&instance, &tour).unwrap();

        // Item 1 (profit 30) can be replaced by item 2 (profit 50).
        let plan = [false, true, false];
        let start =
            PackingAnt::new(3, profile.time(&[false; 3])).pick(1, 30.0, 6.0, profile.time(&plan));
        let improved = BitFlipSearch::new().improve(&profile, start, f64::INFINITY);

        assert!(improved.plan[2]);
        assert!(!improved.plan[1]);
        assert_eq!(improved.profit, 50.0);
        assert!((improved.time - profile.time(&improved.plan)).abs() < 1e-9);
    }

    #[test]
    fn test_bit_flip_respects_time_budget() {
        let instance = create_test_instance();
        let profile = TourProfile::new(&instance, &[0, 1, 2, 3]).unwrap();
        let plan = [false, true, false];
        let time = profile.time(&plan);
        let start = PackingAnt::new(3, profile.time(&[false; 3])).pick(1, 30.0, 6.0, time);

        // Item 2 is lighter and picked at the last city, so the swap fits a
        // budget equal to the current time.
        let improved = BitFlipSearch::new().improve(&profile, start.clone(), time);
        assert!(improved.time <= time + 1e-9);
        assert_eq!(improved.profit, 50.0);

        // No swap fits a budget below the empty-knapsack tour plus a little.
        let stuck = BitFlipSearch::new().improve(&profile, start, 45.0);
        assert!(stuck.plan[1]);
        assert_eq!(stuck.profit, 30.0);
    }
}
