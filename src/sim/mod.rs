//! Closed-loop market simulation
//!
//! A seeded [`OpportunityGenerator`] feeds a [`SimulationRunner`] that
//! plays each decision against a synthetic clearing price and settles wins
//! in the ledger. [`loadgen`] drives a running bidder over HTTP instead.

pub mod generator;
pub mod loadgen;
pub mod runner;

pub use generator::OpportunityGenerator;
pub use loadgen::{LoadGenerator, LoadReport};
pub use runner::{SimulationResult, SimulationRunner};
