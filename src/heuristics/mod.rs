//! Heuristics module for the TTP.
//!
//! This module exports the ant colonies and the construction and improvement
//! procedures they are built from.

pub mod ant;
pub mod construction;
pub mod knapsack_aco;
pub mod local_search;
pub mod pheromone;
pub mod tsp_aco;

pub use construction::*;
pub use knapsack_aco::*;
pub use local_search::*;
pub use pheromone::*;
pub use tsp_aco::*;
