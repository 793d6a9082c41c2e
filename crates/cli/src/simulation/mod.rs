//! Simulated traffic against the dispatch core.

mod driver;
mod node;
mod stats;

pub use driver::{Simulation, SimulationConfig, SimulationMode};
pub use node::{simulated_endpoints, NodeProfile, SimulatedNodes};
pub use stats::SimulationStats;
