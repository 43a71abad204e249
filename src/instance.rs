//! Module for representing Traveling Thief Problem instances.
//!
//! An instance combines a routing sub-problem (cities on the Euclidean plane,
//! visited once starting from city 0) with a packing sub-problem (items located
//! at cities, picked into a capacity-limited knapsack). The thief slows down as
//! the knapsack gets heavier.

use crate::error::{Result, TTPError};
use crate::solution::Solution;
use serde::{Deserialize, Serialize};

/// Lower bound for any distance between two cities.
pub const DISTANCE_EPSILON: f64 = 1e-6;

/// Represents a city of the TTP instance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct City {
    /// City index (0 is the start city)
    pub id: usize,
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl City {
    pub fn new(id: usize, x: f64, y: f64) -> Self {
        City { id, x, y }
    }
}

/// Represents an item that can be stolen
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Item index
    pub id: usize,
    /// City where the item is located
    pub city: usize,
    /// Weight of the item
    pub weight: f64,
    /// Profit of the item
    pub profit: f64,
}

impl Item {
    pub fn new(id: usize, city: usize, weight: f64, profit: f64) -> Self {
        Item { id, city, weight, profit }
    }
}

/// Externally estimated objective bounds used to normalize scalarization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveBounds {
    /// Best achievable travel time (empty knapsack, short tour)
    pub ideal_duration: f64,
    /// Best achievable profit
    pub ideal_profit: f64,
    /// Worst relevant travel time
    pub nadir_duration: f64,
}

impl Default for ObjectiveBounds {
    fn default() -> Self {
        ObjectiveBounds {
            ideal_duration: 0.0,
            ideal_profit: 1.0,
            nadir_duration: 1.0,
        }
    }
}

/// Represents a complete TTP instance
///
/// Deserialization goes through [`TTPInstance::new`], so a loaded instance is
/// validated and indexed like a constructed one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawInstance")]
pub struct TTPInstance {
    /// Name of the instance
    pub name: String,
    /// List of all cities
    pub cities: Vec<City>,
    /// List of all items
    pub items: Vec<Item>,
    /// Speed with a full knapsack
    pub min_speed: f64,
    /// Speed with an empty knapsack
    pub max_speed: f64,
    /// Knapsack capacity
    pub capacity: f64,
    /// Heaviest single item
    pub max_item_weight: f64,
    /// Most valuable single item
    pub max_item_profit: f64,
    /// Ideal / nadir estimates
    pub bounds: ObjectiveBounds,
    /// Precomputed tours feeding the packing phase
    pub candidate_tours: Vec<Vec<usize>>,
    #[serde(skip)]
    items_at_city: Vec<Vec<usize>>,
}

/// Serialized form of an instance; derived fields are recomputed on load.
#[derive(Deserialize)]
struct RawInstance {
    name: String,
    cities: Vec<City>,
    items: Vec<Item>,
    min_speed: f64,
    max_speed: f64,
    capacity: f64,
    #[serde(default)]
    bounds: ObjectiveBounds,
    #[serde(default)]
    candidate_tours: Vec<Vec<usize>>,
}

impl TryFrom<RawInstance> for TTPInstance {
    type Error = TTPError;

    fn try_from(raw: RawInstance) -> Result<Self> {
        let RawInstance {
            name,
            cities,
            items,
            min_speed,
            max_speed,
            capacity,
            bounds,
            candidate_tours,
        } = raw;
        TTPInstance::new(&name, cities, items, min_speed, max_speed, capacity)?
            .with_bounds(bounds)?
            .with_candidate_tours(candidate_tours)
    }
}

impl TTPInstance {
    /// Build and validate an instance.
    pub fn new(
        name: &str,
        cities: Vec<City>,
        items: Vec<Item>,
        min_speed: f64,
        max_speed: f64,
        capacity: f64,
    ) -> Result<Self> {
        if cities.is_empty() {
            return Err(TTPError::invalid_input("instance has no cities"));
        }
        if !(min_speed > 0.0) || max_speed < min_speed {
            return Err(TTPError::invalid_input(format!(
                "speeds must satisfy 0 < min_speed <= max_speed (got {} and {})",
                min_speed, max_speed
            )));
        }
        if !(capacity > 0.0) {
            return Err(TTPError::invalid_input(format!(
                "capacity must be positive (got {})",
                capacity
            )));
        }
        for (index, item) in items.iter().enumerate() {
            if item.id != index {
                return Err(TTPError::invalid_input(format!(
                    "item at position {} has id {}",
                    index, item.id
                )));
            }
            if item.city >= cities.len() {
                return Err(TTPError::invalid_input(format!(
                    "item {} is located at unknown city {}",
                    item.id, item.city
                )));
            }
            if item.weight < 0.0 || item.profit < 0.0 {
                return Err(TTPError::invalid_input(format!(
                    "item {} has negative weight or profit",
                    item.id
                )));
            }
        }

        let max_item_weight = items.iter().map(|i| i.weight).fold(0.0, f64::max);
        let max_item_profit = items.iter().map(|i| i.profit).fold(0.0, f64::max);

        let mut instance = TTPInstance {
            name: name.to_string(),
            cities,
            items,
            min_speed,
            max_speed,
            capacity,
            max_item_weight,
            max_item_profit,
            bounds: ObjectiveBounds::default(),
            candidate_tours: Vec::new(),
            items_at_city: Vec::new(),
        };
        instance.rebuild_index();
        Ok(instance)
    }

    /// Attach externally estimated ideal/nadir bounds.
    pub fn with_bounds(mut self, bounds: ObjectiveBounds) -> Result<Self> {
        if !(bounds.nadir_duration > bounds.ideal_duration) {
            return Err(TTPError::invalid_input(format!(
                "nadir duration {} must exceed ideal duration {}",
                bounds.nadir_duration, bounds.ideal_duration
            )));
        }
        if !(bounds.ideal_profit > 0.0) {
            return Err(TTPError::invalid_input("ideal profit must be positive"));
        }
        self.bounds = bounds;
        Ok(self)
    }

    /// Attach precomputed candidate tours (each validated).
    pub fn with_candidate_tours(mut self, tours: Vec<Vec<usize>>) -> Result<Self> {
        for tour in &tours {
            self.validate_tour(tour)?;
        }
        self.candidate_tours = tours;
        Ok(self)
    }

    fn rebuild_index(&mut self) {
        let mut index = vec![Vec::new(); self.cities.len()];
        for item in &self.items {
            index[item.city].push(item.id);
        }
        self.items_at_city = index;
    }

    #[inline]
    pub fn num_cities(&self) -> usize {
        self.cities.len()
    }

    #[inline]
    pub fn num_items(&self) -> usize {
        self.items.len()
    }

    /// Euclidean distance, clamped above zero so coincident cities stay usable.
    #[inline]
    pub fn distance(&self, a: usize, b: usize) -> f64 {
        let dx = self.cities[a].x - self.cities[b].x;
        let dy = self.cities[a].y - self.cities[b].y;
        (dx * dx + dy * dy).sqrt().max(DISTANCE_EPSILON)
    }

    /// Leg length used for travel time: the distance rounded up.
    #[inline]
    pub fn travel_distance(&self, a: usize, b: usize) -> f64 {
        self.distance(a, b).ceil()
    }

    /// Current speed of the thief carrying `weight`.
    #[inline]
    pub fn speed(&self, weight: f64) -> f64 {
        (self.max_speed - weight / self.capacity * (self.max_speed - self.min_speed))
            .max(self.min_speed)
    }

    /// Items located at `city`.
    #[inline]
    pub fn items_at(&self, city: usize) -> &[usize] {
        &self.items_at_city[city]
    }

    /// Closed tour length (plain Euclidean distances)
    pub fn tour_length(&self, tour: &[usize]) -> f64 {
        if tour.len() < 2 {
            return 0.0;
        }

        let mut length = 0.0;
        for i in 0..tour.len() - 1 {
            length += self.distance(tour[i], tour[i + 1]);
        }

        length += self.distance(tour[tour.len() - 1], tour[0]);

        length
    }

    /// Nearest-neighbor tour from city 0 and its closed length.
    pub fn greedy_tour(&self) -> (Vec<usize>, f64) {
        let n = self.num_cities();
        let mut visited = vec![false; n];
        let mut tour = Vec::with_capacity(n);
        let mut current = 0;
        visited[0] = true;
        tour.push(0);

        while tour.len() < n {
            let mut best = None;
            let mut best_dist = f64::INFINITY;
            for city in 0..n {
                if visited[city] {
                    continue;
                }
                let dist = self.distance(current, city);
                if dist < best_dist {
                    best_dist = dist;
                    best = Some(city);
                }
            }
            match best {
                Some(next) => {
                    visited[next] = true;
                    tour.push(next);
                    current = next;
                }
                None => break,
            }
        }

        let length = self.tour_length(&tour);
        (tour, length)
    }

    /// Check that `tour` is a full permutation of the cities starting at city 0.
    pub fn validate_tour(&self, tour: &[usize]) -> Result<()> {
        let n = self.num_cities();
        if tour.len() != n {
            return Err(TTPError::invalid_input(format!(
                "tour visits {} cities, expected {}",
                tour.len(),
                n
            )));
        }
        if tour[0] != 0 {
            return Err(TTPError::invalid_input("thief must start at city 0"));
        }
        let mut seen = vec![false; n];
        for &city in tour {
            if city >= n || seen[city] {
                return Err(TTPError::invalid_input(format!(
                    "tour is not a permutation (city {})",
                    city
                )));
            }
            seen[city] = true;
        }
        Ok(())
    }

    /// Simulate the thief walking `pi` with packing plan `z`.
    ///
    /// Items are picked when their city is visited; the speed for the next leg
    /// follows the accumulated weight. Once the weight exceeds the capacity the
    /// plan is infeasible and the sentinel objectives `(+inf, -inf)` are
    /// returned.
    pub fn evaluate(&self, pi: &[usize], z: &[bool]) -> Result<Solution> {
        self.validate_tour(pi)?;
        if z.len() != self.num_items() {
            return Err(TTPError::invalid_input(format!(
                "packing plan has {} entries, expected {}",
                z.len(),
                self.num_items()
            )));
        }

        let n = pi.len();
        let mut time = 0.0;
        let mut profit = 0.0;
        let mut weight = 0.0;

        for i in 0..n {
            let city = pi[i];
            for &item in self.items_at(city) {
                if z[item] {
                    weight += self.items[item].weight;
                    profit += self.items[item].profit;
                }
            }

            if weight > self.capacity {
                time = f64::INFINITY;
                profit = f64::NEG_INFINITY;
                break;
            }

            let next = pi[(i + 1) % n];
            time += self.travel_distance(city, next) / self.speed(weight);
        }

        Ok(Solution::new(pi.to_vec(), z.to_vec(), time, profit))
    }

    /// Re-evaluate `solution` and check its stored objectives.
    pub fn verify(&self, solution: &Solution) -> Result<()> {
        let correct = self.evaluate(&solution.pi, &solution.z)?;
        if correct.time != solution.time || correct.profit != solution.profit {
            return Err(TTPError::invalid_input(format!(
                "objectives ({}, {}) do not match pi and z ({}, {})",
                solution.time, solution.profit, correct.time, correct.profit
            )));
        }
        Ok(())
    }

    /// Maximum tour time allowed for scalarization coefficient `c`.
    pub fn time_budget(&self, c: f64) -> f64 {
        c * (self.bounds.nadir_duration - self.bounds.ideal_duration) + self.bounds.ideal_duration
    }

    /// Euclidean distance of the normalized objectives from the utopia point (0, 1).
    pub fn distance_to_ideal(&self, time: f64, profit: f64) -> f64 {
        let b = &self.bounds;
        let normalized_time = (time - b.ideal_duration) / (b.nadir_duration - b.ideal_duration);
        let normalized_profit = profit / b.ideal_profit;
        (normalized_time.powi(2) + (normalized_profit - 1.0).powi(2)).sqrt()
    }

    /// The first `limit` candidate tours followed by their reversals.
    ///
    /// City 0 stays first; the rest of the tour is walked backwards.
    pub fn candidate_tours_with_reversals(&self, limit: usize) -> Vec<Vec<usize>> {
        with_reversals(self.candidate_tours.iter().take(limit).cloned().collect())
    }
}

/// `tours` followed by each one's reversal, unless already present.
pub fn with_reversals(tours: Vec<Vec<usize>>) -> Vec<Vec<usize>> {
    let base = tours.len();
    let mut tours = tours;
    for k in 0..base {
        let reversed = reverse_tour(&tours[k]);
        if !tours.contains(&reversed) {
            tours.push(reversed);
        }
    }
    tours
}

/// Walk a tour in the opposite direction, keeping the start city in place.
pub fn reverse_tour(tour: &[usize]) -> Vec<usize> {
    let mut reversed = tour.to_vec();
    if reversed.len() > 2 {
        reversed[1..].reverse();
    }
    reversed
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Unit square, one item per non-start city.
    pub(crate) fn create_test_instance() -> TTPInstance {
        let cities = vec![
            City::new(0, 0.0, 0.0),
            City::new(1, 10.0, 0.0),
            City::new(2, 10.0, 10.0),
            City::new(3, 0.0, 10.0),
        ];
        let items = vec![
            Item::new(0, 1, 4.0, 40.0),
            Item::new(1, 2, 6.0, 30.0),
            Item::new(2, 3, 5.0, 50.0),
        ];
        TTPInstance::new("square", cities, items, 0.1, 1.0, 10.0)
            .unwrap()
            .with_bounds(ObjectiveBounds {
                ideal_duration: 40.0,
                ideal_profit: 120.0,
                nadir_duration: 400.0,
            })
            .unwrap()
    }

    #[test]
    fn test_distance_calculation() {
        let instance = TTPInstance::new(
            "pair",
            vec![City::new(0, 0.0, 0.0), City::new(1, 3.0, 4.0)],
            Vec::new(),
            0.1,
            1.0,
            1.0,
        )
        .unwrap();

        assert!((instance.distance(0, 1) - 5.0).abs() < 1e-10);
        assert!((instance.distance(1, 0) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_coincident_cities_are_clamped() {
        let instance = TTPInstance::new(
            "twins",
            vec![City::new(0, 1.0, 1.0), City::new(1, 1.0, 1.0)],
            Vec::new(),
            0.1,
            1.0,
            1.0,
        )
        .unwrap();

        assert_eq!(instance.distance(0, 1), DISTANCE_EPSILON);
        assert_eq!(instance.travel_distance(0, 1), 1.0);
    }

    #[test]
    fn test_speed_degrades_with_weight() {
        let instance = create_test_instance();
        assert_eq!(instance.speed(0.0), 1.0);
        assert!((instance.speed(5.0) - 0.55).abs() < 1e-12);
        assert_eq!(instance.speed(10.0), 0.1);
        assert_eq!(instance.speed(50.0), 0.1);
    }

    #[test]
    fn test_evaluate_empty_plan() {
        let instance = create_test_instance();
        let solution = instance.evaluate(&[0, 1, 2, 3], &[false, false, false]).unwrap();
        assert_eq!(solution.time, 40.0);
        assert_eq!(solution.profit, 0.0);
    }

    #[test]
    fn test_evaluate_with_items() {
        let instance = create_test_instance();
        // Pick item 0 at city 1: legs after city 1 run at speed 0.64.
        let solution = instance.evaluate(&[0, 1, 2, 3], &[true, false, false]).unwrap();
        let expected = 10.0 + 30.0 / 0.64;
        assert!((solution.time - expected).abs() < 1e-9);
        assert_eq!(solution.profit, 40.0);
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let instance = create_test_instance();
        let z = [true, false, true];
        let a = instance.evaluate(&[0, 3, 2, 1], &z).unwrap();
        let b = instance.evaluate(&[0, 3, 2, 1], &z).unwrap();
        assert_eq!(a.time, b.time);
        assert_eq!(a.profit, b.profit);
    }

    #[test]
    fn test_overweight_plan_is_sentinel() {
        let instance = create_test_instance();
        let solution = instance.evaluate(&[0, 1, 2, 3], &[true, true, true]).unwrap();
        assert_eq!(solution.time, f64::INFINITY);
        assert_eq!(solution.profit, f64::NEG_INFINITY);
        assert!(!solution.is_feasible());
    }

    #[test]
    fn test_evaluate_rejects_malformed_input() {
        let instance = create_test_instance();
        assert!(matches!(
            instance.evaluate(&[1, 0, 2, 3], &[false; 3]),
            Err(TTPError::InvalidInput(_))
        ));
        assert!(matches!(
            instance.evaluate(&[0, 1, 1, 3], &[false; 3]),
            Err(TTPError::InvalidInput(_))
        ));
        assert!(matches!(
            instance.evaluate(&[0, 1, 2], &[false; 3]),
            Err(TTPError::InvalidInput(_))
        ));
        assert!(matches!(
            instance.evaluate(&[0, 1, 2, 3], &[false; 2]),
            Err(TTPError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_verify_detects_tampering() {
        let instance = create_test_instance();
        let mut solution = instance.evaluate(&[0, 1, 2, 3], &[true, false, false]).unwrap();
        assert!(instance.verify(&solution).is_ok());
        solution.profit += 1.0;
        assert!(instance.verify(&solution).is_err());
    }

    #[test]
    fn test_greedy_tour_on_square() {
        let instance = create_test_instance();
        let (tour, length) = instance.greedy_tour();
        assert_eq!(tour, vec![0, 1, 2, 3]);
        assert!((length - 40.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_to_ideal() {
        let instance = create_test_instance();
        assert!(instance.distance_to_ideal(40.0, 120.0).abs() < 1e-12);
        assert!((instance.distance_to_ideal(400.0, 120.0) - 1.0).abs() < 1e-12);
        assert!((instance.distance_to_ideal(40.0, 0.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_candidate_tours_with_reversals() {
        let instance = create_test_instance()
            .with_candidate_tours(vec![vec![0, 1, 2, 3], vec![0, 2, 1, 3]])
            .unwrap();
        let tours = instance.candidate_tours_with_reversals(1);
        assert_eq!(tours, vec![vec![0, 1, 2, 3], vec![0, 3, 2, 1]]);
    }

    #[test]
    fn test_invalid_candidate_tour_is_rejected() {
        let result = create_test_instance().with_candidate_tours(vec![vec![0, 1, 2]]);
        assert!(result.is_err());
    }

    #[test]
    fn test_item_at_unknown_city_is_rejected() {
        let result = TTPInstance::new(
            "bad",
            vec![City::new(0, 0.0, 0.0)],
            vec![Item::new(0, 4, 1.0, 1.0)],
            0.1,
            1.0,
            1.0,
        );
        assert!(matches!(result, Err(TTPError::InvalidInput(_))));
    }

    #[test]
    fn test_json_round_trip_keeps_instance_usable() {
        let instance = create_test_instance()
            .with_candidate_tours(vec![vec![0, 1, 2, 3]])
            .unwrap();
        let json = serde_json::to_string(&instance).unwrap();
        let loaded: TTPInstance = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded.items_at(2), instance.items_at(2));
        assert_eq!(loaded.bounds, instance.bounds);
        assert_eq!(loaded.candidate_tours, instance.candidate_tours);

        let plan = [true, false, true];
        let expected = instance.evaluate(&[0, 1, 2, 3], &plan).unwrap();
        let solution = loaded.evaluate(&[0, 1, 2, 3], &plan).unwrap();
        assert_eq!(solution.time, expected.time);
        assert_eq!(solution.profit, expected.profit);
    }

    #[test]
    fn test_json_with_invalid_instance_is_rejected() {
        let json = serde_json::to_value(create_test_instance()).unwrap();

        let mut no_cities = json.clone();
        no_cities["cities"] = serde_json::json!([]);
        assert!(serde_json::from_value::<TTPInstance>(no_cities).is_err());

        let mut no_capacity = json.clone();
        no_capacity["capacity"] = serde_json::json!(0.0);
        assert!(serde_json::from_value::<TTPInstance>(no_capacity).is_err());

        let mut bad_tour = json;
        bad_tour["candidate_tours"] = serde_json::json!([[0, 1, 1, 3]]);
        assert!(serde_json::from_value::<TTPInstance>(bad_tour).is_err());
    }
}
