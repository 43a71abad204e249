//! Construction helpers for the packing phase.
//!
//! [`TourProfile`] simulates the thief along one fixed tour so that tour times
//! and the marginal time cost of each item can be computed for any packing
//! plan. [`greedy_packing`] builds the seed plan used to calibrate the knapsack
//! colony.

use crate::error::Result;
use crate::heuristics::ant::PackingAnt;
use crate::instance::TTPInstance;
use ordered_float::OrderedFloat;

/// Denominator floor for item desirability.
pub const DESIRABILITY_EPSILON: f64 = 1e-9;

/// A fixed tour prepared for repeated tour-time simulation.
#[derive(Debug, Clone)]
pub struct TourProfile<'a> {
    instance: &'a TTPInstance,
    tour: Vec<usize>,
    /// `legs[k]`: travel distance from position `k` to the next city
    legs: Vec<f64>,
    /// Tour position of each item's city
    item_position: Vec<usize>,
}

impl<'a> TourProfile<'a> {
    pub fn new(instance: &'a TTPInstance, tour: &[usize]) -> Result<Self> {
        instance.validate_tour(tour)?;

        let n = tour.len();
        let legs = (0..n)
            .map(|k| instance.travel_distance(tour[k], tour[(k + 1) % n]))
            .collect();

        let mut city_position = vec![0; n];
        for (pos, &city) in tour.iter().enumerate() {
            city_position[city] = pos;
        }
        let item_position = instance.items.iter().map(|item| city_position[item.city]).collect();

        Ok(TourProfile {
            instance,
            tour: tour.to_vec(),
            legs,
            item_position,
        })
    }

    pub fn tour(&self) -> &[usize] {
        &self.tour
    }

    pub fn instance(&self) -> &'a TTPInstance {
        self.instance
    }

    /// Weight carried when leaving each tour position.
    pub fn weights_along(&self, plan: &[bool]) -> Vec<f64> {
        let mut picked_at = vec![0.0; self.tour.len()];
        for (item, &picked) in plan.iter().enumerate() {
            if picked {
                picked_at[self.item_position[item]] += self.instance.items[item].weight;
            }
        }

        let mut carried = 0.0;
        picked_at
            .into_iter()
            .map(|w| {
                carried += w;
                carried
            })
            .collect()
    }

    fn time_from_weights(&self, weights: &[f64]) -> f64 {
        self.legs
            .iter()
            .zip(weights)
            .map(|(leg, &w)| leg / self.instance.speed(w))
            .sum()
    }

    /// Tour time under `plan`. Capacity is not checked; speed bottoms out at
    /// the minimum speed.
    pub fn time(&self, plan: &[bool]) -> f64 {
        self.time_from_weights(&self.weights_along(plan))
    }

    /// Tour time after replacing packed item `out` by `into`.
    pub fn time_with_swap(&self, plan: &[bool], out: usize, into: usize) -> f64 {
        let mut weights = self.weights_along(plan);
        let w_out = self.instance.items[out].weight;
        let w_in = self.instance.items[into].weight;
        for (pos, w) in weights.iter_mut().enumerate() {
            if pos >= self.item_position[out] {
                *w -= w_out;
            }
            if pos >= self.item_position[into] {
                *w += w_in;
            }
        }
        self.time_from_weights(&weights)
    }

    /// Marginal tour time of carrying each item under `plan`.
    ///
    /// For an unpacked item this is the time added by packing it; for a packed
    /// item it is the time saved by dropping it. Both are non-negative.
    pub fn delta_times(&self, plan: &[bool]) -> Vec<f64> {
        let weights = self.weights_along(plan);
        let inv_speed: Vec<f64> = weights.iter().map(|&w| 1.0 / self.instance.speed(w)).collect();

        self.instance
            .items
            .iter()
            .enumerate()
            .map(|(item, it)| {
                let start = self.item_position[item];
                let packed = plan[item];
                let mut delta = 0.0;
                for pos in start..self.tour.len() {
                    let other = if packed {
                        weights[pos] - it.weight
                    } else {
                        weights[pos] + it.weight
                    };
                    let other_inv = 1.0 / self.instance.speed(other);
                    let gap = if packed {
                        inv_speed[pos] - other_inv
                    } else {
                        other_inv - inv_speed[pos]
                    };
                    delta += self.legs[pos] * gap;
                }
                delta.max(0.0)
            })
            .collect()
    }
}

/// Largest value of `deltas`, zero when empty.
pub fn max_delta(deltas: &[f64]) -> f64 {
    deltas.iter().cloned().fold(0.0, f64::max)
}

/// Desirability of an item: normalized profit over a blend of normalized
/// weight and normalized marginal time, `w` weighting the former.
pub fn item_desirability(
    instance: &TTPInstance,
    item: usize,
    delta_time: f64,
    max_delta_time: f64,
    w: f64,
) -> f64 {
    let it = &instance.items[item];
    let profit = if instance.max_item_profit > 0.0 {
        it.profit / instance.max_item_profit
    } else {
        0.0
    };
    let weight = if instance.max_item_weight > 0.0 {
        it.weight / instance.max_item_weight
    } else {
        0.0
    };
    let time = if max_delta_time > 0.0 { delta_time / max_delta_time } else { 0.0 };

    profit / (w * weight + (1.0 - w) * time).max(DESIRABILITY_EPSILON)
}

/// Greedy seed plan: take items by decreasing desirability (computed for the
/// empty knapsack) while the packed weight stays within `capacity * c`.
pub fn greedy_packing(profile: &TourProfile<'_>, c: f64, w: f64) -> PackingAnt {
    let instance = profile.instance();
    let empty = vec![false; instance.num_items()];
    let deltas = profile.delta_times(&empty);
    let max_dt = max_delta(&deltas);

    let mut order: Vec<(usize, f64)> = (0..instance.num_items())
        .map(|i| (i, item_desirability(instance, i, deltas[i], max_dt, w)))
        .filter(|&(_, eta)| eta > 0.0)
        .collect();
    order.sort_by_key(|&(_, eta)| std::cmp::Reverse(OrderedFloat(eta)));

    let limit = instance.capacity * c;
    let mut ant = PackingAnt::new(instance.num_items(), profile.time(&empty));
    for (item, _) in order {
        let it = &instance.items[item];
        if ant.weight + it.weight <= limit {
            ant = ant.pick(item, it.profit, it.weight, 0.0);
        }
    }

    let time = profile.time(&ant.plan);
    PackingAnt { time, ..ant }
}
