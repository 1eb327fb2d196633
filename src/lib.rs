pub mod adapters;
pub mod audit;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod services;
pub mod sim;
pub mod strategy;
pub mod validation;

pub use audit::{AuditLogger, AuditRecord, AuditSink, AuditStats};
pub use config::AppConfig;
pub use domain::{CampaignState, Decision, InventoryFormat, Opportunity, PrivacyFlags, ReasonCode};
pub use engine::DecisionEngine;
pub use error::{DspError, Result};
pub use ledger::{CampaignLedger, InMemoryLedger, PostgresLedger, SpendReceipt};
pub use services::{Metrics, MetricsSnapshot};
pub use sim::{OpportunityGenerator, SimulationResult, SimulationRunner};
pub use strategy::{BidStrategy, PacedValueStrategy, SimpleValueStrategy, StrategyRouter};
