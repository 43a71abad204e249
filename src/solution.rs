//! Solution representation for the TTP.
//!
//! A [`Solution`] is the immutable result of evaluating a tour and a packing
//! plan. Its objectives are travel time (minimized) and profit (maximized).

use serde::{Deserialize, Serialize};

/// Represents an evaluated TTP solution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// The tour as a permutation of city indices starting at city 0
    pub pi: Vec<usize>,
    /// Packing plan, one flag per item
    pub z: Vec<bool>,
    /// Total travel time (`+inf` when infeasible)
    pub time: f64,
    /// Total profit (`-inf` when infeasible)
    pub profit: f64,
}

/// Pareto relation of one solution with respect to another
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dominance {
    Dominates,
    DominatedBy,
    NonDominated,
}

impl Solution {
    pub fn new(pi: Vec<usize>, z: Vec<bool>, time: f64, profit: f64) -> Self {
        Solution { pi, z, time, profit }
    }

    /// Objective vector, both components minimized.
    pub fn objectives(&self) -> [f64; 2] {
        [self.time, -self.profit]
    }

    /// Whether the packing plan respected the capacity along the tour.
    pub fn is_feasible(&self) -> bool {
        self.time.is_finite() && self.profit.is_finite()
    }

    /// Relation of `self` to `other` on (minimize time, maximize profit).
    pub fn relation(&self, other: &Solution) -> Dominance {
        let mine = self.objectives();
        let theirs = other.objectives();

        let mut better = false;
        let mut worse = false;
        for (a, b) in mine.iter().zip(theirs.iter()) {
            if a < b {
                better = true;
            } else if a > b {
                worse = true;
            }
        }

        match (better, worse) {
            (true, false) => Dominance::Dominates,
            (false, true) => Dominance::DominatedBy,
            _ => Dominance::NonDominated,
        }
    }

    pub fn dominates(&self, other: &Solution) -> bool {
        self.relation(other) == Dominance::Dominates
    }

    /// Same tour and same packing plan.
    pub fn equals_in_design_space(&self, other: &Solution) -> bool {
        self.pi == other.pi && self.z == other.z
    }

    /// Number of packed items
    pub fn num_packed(&self) -> usize {
        self.z.iter().filter(|&&picked| picked).count()
    }
}

impl std::fmt::Display for Solution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Solution")?;
        writeln!(f, "  Time: {:.4}", self.time)?;
        writeln!(f, "  Profit: {:.2}", self.profit)?;
        writeln!(f, "  Items packed: {}", self.num_packed())?;
        writeln!(f, "  Tour: {:?}", self.pi)
    }
}

/// A tour produced by the TSP phase, ranked by its closed length
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedTour {
    pub tour: Vec<usize>,
    pub length: f64,
}

impl RankedTour {
    pub fn new(tour: Vec<usize>, length: f64) -> Self {
        RankedTour { tour, length }
    }
}
