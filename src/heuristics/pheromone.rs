//! Pheromone tables for the two colonies.
//!
//! Both tables only change through convex combinations of the current value
//! and a target (`(1 - rate) * tau + rate * target`), floored at
//! [`MIN_PHEROMONE`], so every entry stays strictly positive.

/// Smallest value a pheromone entry can take.
pub const MIN_PHEROMONE: f64 = 1e-300;

#[inline]
fn blend(current: f64, target: f64, rate: f64) -> f64 {
    ((1.0 - rate) * current + rate * target).max(MIN_PHEROMONE)
}

/// Symmetric pheromone matrix over city pairs, stored as a packed lower triangle.
#[derive(Debug, Clone)]
pub struct EdgePheromones {
    dimension: usize,
    values: Vec<f64>,
}

impl EdgePheromones {
    pub fn new(dimension: usize, initial: f64) -> Self {
        let size = triangle(dimension.saturating_sub(1));
        EdgePheromones {
            dimension,
            values: vec![initial.max(MIN_PHEROMONE); size],
        }
    }

    #[inline]
    fn index(&self, i: usize, j: usize) -> usize {
        let (hi, lo) = if i > j { (i, j) } else { (j, i) };
        triangle(hi - 1) + lo
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Pheromone on edge `{i, j}`. The diagonal carries none.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i == j {
            return 0.0;
        }
        self.values[self.index(i, j)]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        if i != j {
            let idx = self.index(i, j);
            self.values[idx] = value.max(MIN_PHEROMONE);
        }
    }

    /// Multiply the pheromone on edge `{i, j}`.
    pub fn scale(&mut self, i: usize, j: usize, factor: f64) {
        let value = self.get(i, j) * factor;
        self.set(i, j, value);
    }

    /// Local update: decay toward the baseline `tau0`.
    #[inline]
    pub fn local_update(&mut self, i: usize, j: usize, phi: f64, tau0: f64) {
        if i != j {
            let idx = self.index(i, j);
            self.values[idx] = blend(self.values[idx], tau0, phi);
        }
    }

    /// Global update: reinforce toward `deposit`.
    #[inline]
    pub fn global_update(&mut self, i: usize, j: usize, rho: f64, deposit: f64) {
        if i != j {
            let idx = self.index(i, j);
            self.values[idx] = blend(self.values[idx], deposit, rho);
        }
    }

    /// Apply the global update on every edge of a closed tour.
    pub fn reinforce_tour(&mut self, tour: &[usize], rho: f64, deposit: f64) {
        let n = tour.len();
        for k in 0..n {
            self.global_update(tour[k], tour[(k + 1) % n], rho, deposit);
        }
    }

    /// Smallest stored value.
    pub fn min_value(&self) -> f64 {
        self.values.iter().cloned().fold(f64::INFINITY, f64::min)
    }
}

#[inline]
fn triangle(n: usize) -> usize {
    n * (n + 1) / 2
}

/// Pheromone vector over items.
#[derive(Debug, Clone)]
pub struct ItemPheromones {
    values: Vec<f64>,
}

impl ItemPheromones {
    pub fn new(num_items: usize, initial: f64) -> Self {
        ItemPheromones {
            values: vec![initial.max(MIN_PHEROMONE); num_items],
        }
    }

    #[inline]
    pub fn get(&self, item: usize) -> f64 {
        self.values[item]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn scale(&mut self, item: usize, factor: f64) {
        self.values[item] = (self.values[item] * factor).max(MIN_PHEROMONE);
    }

    #[inline]
    pub fn local_update(&mut self, item: usize, phi: f64, tau0: f64) {
        self.values[item] = blend(self.values[item], tau0, phi);
    }

    #[inline]
    pub fn global_update(&mut self, item: usize, rho: f64, deposit: f64) {
        self.values[item] = blend(self.values[item], deposit, rho);
    }

    /// Apply the global update on every packed item of `plan`.
    pub fn reinforce_plan(&mut self, plan: &[bool], rho: f64, deposit: f64) {
        for (item, &picked) in plan.iter().enumerate() {
            if picked {
                self.global_update(item, rho, deposit);
            }
        }
    }

    pub fn min_value(&self) -> f64 {
        self.values.iter().cloned().fold(f64::INFINITY, f64::min)
    }
}
