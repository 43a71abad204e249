//! Ant walk states and the ACS decision rule.
//!
//! Ants are plain values: each move consumes the current state and returns the
//! next one, so a walk is a fold over the chosen indices.

use ordered_float::OrderedFloat;
use rand::prelude::*;

/// A selectable choice with its two ACS scores.
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub index: usize,
    /// Score used by the exploitation branch (`tau * eta^beta`)
    pub greedy: f64,
    /// Weight used by the exploration branch (`tau^alpha * eta^beta`)
    pub weight: f64,
}

/// Pseudo-proportional selection (Ant Colony System).
///
/// With probability `q0` the candidate with the largest greedy score is taken,
/// otherwise one is sampled with [`roulette`]. Returns `None` only when there
/// are no candidates.
pub fn pseudo_proportional<R: Rng + ?Sized>(
    rng: &mut R,
    candidates: &[Candidate],
    q0: f64,
) -> Option<usize> {
    if candidates.is_empty() {
        return None;
    }

    if rng.gen::<f64>() < q0 {
        return exploit(candidates);
    }

    let weights: Vec<f64> = candidates.iter().map(|c| c.weight).collect();
    match roulette(rng, &weights) {
        Some(pos) => Some(candidates[pos].index),
        // Every weight underflowed or overflowed
        None => exploit(candidates),
    }
}

fn exploit(candidates: &[Candidate]) -> Option<usize> {
    candidates
        .iter()
        .max_by_key(|c| OrderedFloat(if c.greedy.is_nan() { f64::NEG_INFINITY } else { c.greedy }))
        .map(|c| c.index)
}

/// Roulette-wheel sampling over non-negative weights.
///
/// Builds the cumulative weight array, draws `r` uniformly in `[0, total)` and
/// returns the first position whose cumulative weight is strictly greater than
/// `r`. Zero-weight entries can never be drawn. Returns `None` when the total
/// is zero or not finite.
pub fn roulette<R: Rng + ?Sized>(rng: &mut R, weights: &[f64]) -> Option<usize> {
    let mut cumulative = Vec::with_capacity(weights.len());
    let mut total = 0.0;
    for &w in weights {
        if w > 0.0 {
            total += w;
        }
        cumulative.push(total);
    }

    if !(total > 0.0) || !total.is_finite() {
        return None;
    }

    let r = rng.gen::<f64>() * total;
    let pos = cumulative.partition_point(|&c| c <= r);
    if pos < weights.len() {
        Some(pos)
    } else {
        // r rounded up to total: take the last drawable entry
        weights.iter().rposition(|&w| w > 0.0)
    }
}

/// Partial tour of a TSP ant.
#[derive(Debug, Clone)]
pub struct TourAnt {
    pub tour: Vec<usize>,
    pub visited: Vec<bool>,
    pub current: usize,
    pub length: f64,
}

impl TourAnt {
    pub fn new(num_cities: usize, start: usize) -> Self {
        let mut visited = vec![false; num_cities];
        visited[start] = true;
        let mut tour = Vec::with_capacity(num_cities);
        tour.push(start);
        TourAnt {
            tour,
            visited,
            current: start,
            length: 0.0,
        }
    }

    /// Move to `next`, adding the traversed edge length.
    pub fn visit(mut self, next: usize, distance: f64) -> Self {
        self.tour.push(next);
        self.visited[next] = true;
        self.current = next;
        self.length += distance;
        self
    }

    /// Add the closing edge back to the first city.
    pub fn close(mut self, distance: f64) -> Self {
        self.length += distance;
        self
    }

    pub fn start(&self) -> usize {
        self.tour[0]
    }

    pub fn is_complete(&self) -> bool {
        self.tour.len() == self.visited.len()
    }

    /// Tour rotated so that it starts at city 0.
    pub fn rooted_tour(&self) -> Vec<usize> {
        rotate_to_start(&self.tour)
    }
}

/// Rotate a closed tour so that city 0 comes first.
pub fn rotate_to_start(tour: &[usize]) -> Vec<usize> {
    match tour.iter().position(|&c| c == 0) {
        Some(pos) => tour[pos..].iter().chain(tour[..pos].iter()).cloned().collect(),
        None => tour.to_vec(),
    }
}

/// Orientation-independent key of a closed tour: rooted at 0 and walked in the
/// direction whose second city is smaller.
pub fn canonical_tour(tour: &[usize]) -> Vec<usize> {
    let mut rooted = rotate_to_start(tour);
    let n = rooted.len();
    if n > 2 && rooted[n - 1] < rooted[1] {
        rooted[1..].reverse();
    }
    rooted
}

/// Packing plan of a knapsack ant walking a fixed tour.
#[derive(Debug, Clone)]
pub struct PackingAnt {
    pub plan: Vec<bool>,
    pub profit: f64,
    pub weight: f64,
    /// Tour time under the current plan
    pub time: f64,
    /// No feasible item is left
    pub full: bool,
}

impl PackingAnt {
    pub fn new(num_items: usize, empty_time: f64) -> Self {
        PackingAnt {
            plan: vec![false; num_items],
            profit: 0.0,
            weight: 0.0,
            time: empty_time,
            full: false,
        }
    }

    /// Pack `item`, with the tour time that results from carrying it.
    pub fn pick(mut self, item: usize, profit: f64, weight: f64, time: f64) -> Self {
        self.plan[item] = true;
        self.profit += profit;
        self.weight += weight;
        self.time = time;
        self
    }

    /// Replace packed item `out` by `into`.
    pub fn swap(
        mut self,
        out: usize,
        into: usize,
        profit_change: f64,
        weight_change: f64,
        time: f64,
    ) -> Self {
        self.plan[out] = false;
        self.plan[into] = true;
        self.profit += profit_change;
        self.weight += weight_change;
        self.time = time;
        self
    }

    pub fn exhausted(mut self) -> Self {
        self.full = true;
        self
    }

    pub fn num_packed(&self) -> usize {
        self.plan.iter().filter(|&&p| p).count()
    }
}
