//! Bounded archive of mutually non-dominated solutions.

use crate::solution::{Dominance, Solution};
use ordered_float::OrderedFloat;

/// Archive of mutually non-dominated solutions over (minimize time, maximize profit).
///
/// `add` scans and mutates the whole archive; concurrent producers must
/// serialize their calls (the sweep keeps it behind a `Mutex`).
#[derive(Debug, Clone, Default)]
pub struct NonDominatedSet {
    entries: Vec<Solution>,
}

impl NonDominatedSet {
    pub fn new() -> Self {
        NonDominatedSet { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Solution] {
        &self.entries
    }

    /// Insert `solution` unless an entry dominates it or has the same tour and
    /// plan. Entries the new solution dominates are removed. Returns whether it
    /// was inserted.
    pub fn add(&mut self, solution: Solution) -> bool {
        for entry in &self.entries {
            if entry.equals_in_design_space(&solution) || entry.dominates(&solution) {
                return false;
            }
        }

        self.entries
            .retain(|entry| solution.relation(entry) != Dominance::Dominates);
        self.entries.push(solution);
        true
    }

    /// Shrink the archive to `k` entries sorted by ascending time.
    ///
    /// While too many entries remain, the interior entry with the smallest area
    /// `|profit gap to the left neighbor| * |time gap to the right neighbor|`
    /// is dropped (first one on ties). The two extreme entries are only dropped
    /// when `k < 2`, keeping the fastest ones.
    pub fn get_best_solutions(&mut self, k: usize) -> Vec<Solution> {
        self.entries.sort_by_key(|s| (OrderedFloat(s.time), OrderedFloat(-s.profit)));

        while self.entries.len() > k && self.entries.len() > 2 {
            let mut smallest = f64::INFINITY;
            let mut victim = 1;
            for j in 1..self.entries.len() - 1 {
                let left = &self.entries[j - 1];
                let here = &self.entries[j];
                let right = &self.entries[j + 1];
                let mut area = (left.profit - here.profit).abs() * (here.time - right.time).abs();
                if area.is_nan() {
                    area = f64::INFINITY;
                }
                if area < smallest {
                    smallest = area;
                    victim = j;
                }
            }
            self.entries.remove(victim);
        }
        self.entries.truncate(k);

        log::info!("Archive pruned to {} solutions", self.entries.len());
        self.entries.clone()
    }
}
