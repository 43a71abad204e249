//! Solver configuration.
//!
//! Every section has defaults, so a JSON document only needs the fields it
//! changes:
//!
//! ```json
//! { "tsp": { "iterations": 200 }, "runner": { "threads": 4 }, "sweep": { "oversampling": 5 } }
//! ```

use crate::error::{Result, TTPError};
use crate::heuristics::knapsack_aco::KnapsackAcoConfig;
use crate::heuristics::tsp_aco::TspAcoConfig;
use crate::runner::RunnerConfig;
use crate::sweep::SweepConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete solver configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub tsp: TspAcoConfig,
    pub knapsack: KnapsackAcoConfig,
    pub runner: RunnerConfig,
    pub sweep: SweepConfig,
}

impl SolverConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SolverConfig =
            serde_json::from_str(json).map_err(|e| TTPError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| TTPError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| TTPError::Config(e.to_string()))
    }

    /// Use the same base seed for both colonies.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.tsp.seed = Some(seed);
        self.knapsack.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.tsp.validate()?;
        self.knapsack.validate()?;
        self.runner.validate()?;
        self.sweep.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heuristics::knapsack_aco::PackingSelection;
    use crate::sweep::WeightSpacing;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SolverConfig::from_json_str(
            r#"{
                "tsp": { "iterations": 250, "seed": 7 },
                "knapsack": { "selection": "HighestProfit" },
                "sweep": { "spacing": { "Logarithmic": { "hyper_factor": 10.0 } } }
            }"#,
        )
        .unwrap();

        assert_eq!(config.tsp.iterations, 250);
        assert_eq!(config.tsp.seed, Some(7));
        assert_eq!(config.tsp.num_ants, TspAcoConfig::default().num_ants);
        assert_eq!(config.knapsack.selection, PackingSelection::HighestProfit);
        assert_eq!(config.sweep.spacing, WeightSpacing::Logarithmic { hyper_factor: 10.0 });
        assert_eq!(config.sweep.oversampling, 3);
        assert_eq!(config.runner, RunnerConfig::default());
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = SolverConfig::default().with_seed(42);
        let json = config.to_json_string().unwrap();
        assert_eq!(SolverConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            SolverConfig::from_json_str(r#"{ "knapsack": { "q0": 1.5 } }"#),
            Err(TTPError::InvalidConfig(_))
        ));
        assert!(matches!(
            SolverConfig::from_json_str(r#"{ "tsp": { "num_ants": "many" } }"#),
            Err(TTPError::Config(_))
        ));
        assert!(matches!(
            SolverConfig::from_json_file("/nonexistent/solver.json"),
            Err(TTPError::Config(_))
        ));
    }
}
