//! Auction decision engine
//!
//! Single entry point for live traffic and simulation: ledger lookup,
//! eligibility gates, strategy call, safety gate.

pub mod decision_engine;
pub mod gates;

pub use decision_engine::DecisionEngine;
pub use gates::{eligibility_gate, safety_gate};
