use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::bootstrap::build_engine;
use crate::config::{AppConfig, LedgerBackend};
use crate::error::Result;
use crate::ledger::CampaignLedger;
use crate::services::{Metrics, MetricsSnapshot};
use crate::sim::loadgen::DEFAULT_TARGET;
use crate::sim::{LoadGenerator, LoadReport, OpportunityGenerator, SimulationResult, SimulationRunner};

#[derive(Parser)]
#[command(name = "qc-dsp")]
#[command(version)]
#[command(about = "Real-time bidding decision service", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding default.toml and <BIDDER_ENV>.toml
    #[arg(short, long, default_value = "config", env = "BIDDER_CONFIG_DIR")]
    pub config_dir: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the OpenRTB bidder (default)
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run a closed-loop simulation against an in-memory ledger
    Simulate {
        /// Number of synthetic auctions (default from config)
        #[arg(short = 'n', long)]
        auctions: Option<usize>,
        /// RNG seed for generator and market (default from config)
        #[arg(long)]
        seed: Option<u64>,
        /// Concurrent tasks sharing the engine (default from config)
        #[arg(long)]
        concurrency: Option<usize>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Post synthetic OpenRTB requests to a running bidder
    Loadgen {
        /// Bidder endpoint
        #[arg(long, env = "BIDDER_URL", default_value = DEFAULT_TARGET)]
        url: String,
        /// Number of requests
        #[arg(short = 'n', long, env = "LOADGEN_NUM_REQUESTS", default_value_t = 50)]
        count: u64,
        /// Pause between requests in milliseconds
        #[arg(long, default_value_t = 50)]
        delay_ms: u64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

/// Totals printed by `simulate`
#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub campaign_id: String,
    pub seed: u64,
    pub concurrency: usize,
    pub result: SimulationResult,
    pub metrics: MetricsSnapshot,
    pub ledger_spent_today: String,
    pub daily_budget: String,
}

/// Run the configured simulation. The ledger is always in-memory so a
/// simulation can never touch production budgets.
pub async fn run_simulation(
    config: &AppConfig,
    auctions: Option<usize>,
    seed: Option<u64>,
    concurrency: Option<usize>,
) -> Result<SimulationReport> {
    let mut config = config.clone();
    config.ledger.backend = LedgerBackend::Memory;

    let seed = seed.unwrap_or(config.simulation.seed);
    let auctions = auctions.unwrap_or(config.simulation.auctions);
    let concurrency = concurrency.unwrap_or(config.simulation.concurrency).max(1);
    let campaign_id = config.default_campaign_id.clone();

    let engine = build_engine(&config).await?;
    let metrics = Arc::new(Metrics::new());
    let mut runner = SimulationRunner::new(Arc::clone(&engine), campaign_id.as_str(), seed)
        .with_baselines(config.simulation.ctr_baseline, config.simulation.cvr_baseline)
        .with_metrics(Arc::clone(&metrics));

    let opportunities = OpportunityGenerator::new(seed).batch(auctions);
    let result = if concurrency > 1 {
        runner.run_concurrent(opportunities, concurrency).await?
    } else {
        runner.run(opportunities).await?
    };

    let campaign = engine.ledger().get(&campaign_id).await?;
    Ok(SimulationReport {
        campaign_id,
        seed,
        concurrency,
        result,
        metrics: metrics.snapshot(),
        ledger_spent_today: campaign.spent_today.to_string(),
        daily_budget: campaign.daily_budget.to_string(),
    })
}

pub fn print_simulation(report: &SimulationReport) {
    let r = &report.result;
    let m = &report.metrics;
    println!("\n=== SIMULATION ({} auctions, seed {}) ===", r.auctions, report.seed);
    println!("Campaign:     {}", report.campaign_id);
    println!("Concurrency:  {}", report.concurrency);
    println!(
        "Funnel:       {} bids | {} impressions | {} clicks | {} conversions",
        r.bids, r.impressions, r.clicks, r.conversions
    );
    println!("Win rate:     {:.1}%", r.win_rate() * 100.0);
    println!("Spend:        {} (clamped {})", r.spend, r.overflow);
    println!(
        "Ledger:       {} of {} daily budget",
        report.ledger_spent_today, report.daily_budget
    );
    println!(
        "Metrics:      {} auctions, {} bids, {} errors, {:.4} ms avg latency",
        m.total_auctions, m.total_bids, m.total_errors, m.average_latency_ms
    );
}

pub async fn run_loadgen(url: &str, count: u64, delay_ms: u64, seed: u64) -> Result<LoadReport> {
    let mut gen = LoadGenerator::new(url, seed)?.with_delay(Duration::from_millis(delay_ms));
    Ok(gen.run(count).await)
}
