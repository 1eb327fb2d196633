use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::domain::Opportunity;
use crate::engine::DecisionEngine;
use crate::error::{DspError, Result};
use crate::ledger::CampaignLedger;
use crate::services::Metrics;

/// Baseline click-through rate per impression
pub const DEFAULT_CTR: f64 = 0.02;
/// Baseline conversion rate per click
pub const DEFAULT_CVR: f64 = 0.05;

/// Clearing-price jitter above the floor, at 4 decimal places: 0 ..< 1 CPM
const JITTER_MAX_BPS: i64 = 10_000;

/// Totals of one simulation run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulationResult {
    pub auctions: u64,
    pub bids: u64,
    pub impressions: u64,
    pub clicks: u64,
    pub conversions: u64,
    /// Sum of clearing prices of won auctions, in currency units
    pub spend: Decimal,
    /// Part of `spend` the ledger clamped away to stay within budget
    pub overflow: Decimal,
}

impl SimulationResult {
    pub fn merge(&mut self, other: &SimulationResult) {
        self.auctions += other.auctions;
        self.bids += other.bids;
        self.impressions += other.impressions;
        self.clicks += other.clicks;
        self.conversions += other.conversions;
        self.spend += other.spend;
        self.overflow += other.overflow;
    }

    pub fn win_rate(&self) -> f64 {
        if self.bids == 0 {
            0.0
        } else {
            self.impressions as f64 / self.bids as f64
        }
    }
}

/// Drives opportunities through the engine against a synthetic market.
///
/// A bid wins when it is at or above the clearing price, simulated as the
/// floor plus up to one CPM of jitter. Wins are settled at the clearing
/// price through the engine's ledger.
pub struct SimulationRunner {
    engine: Arc<DecisionEngine>,
    campaign_id: String,
    seed: u64,
    rng: StdRng,
    ctr_baseline: f64,
    cvr_baseline: f64,
    metrics: Option<Arc<Metrics>>,
}

impl SimulationRunner {
    pub fn new(engine: Arc<DecisionEngine>, campaign_id: impl Into<String>, seed: u64) -> Self {
        Self {
            engine,
            campaign_id: campaign_id.into(),
            seed,
            rng: StdRng::seed_from_u64(seed),
            ctr_baseline: DEFAULT_CTR,
            cvr_baseline: DEFAULT_CVR,
            metrics: None,
        }
    }

    pub fn with_baselines(mut self, ctr: f64, cvr: f64) -> Self {
        self.ctr_baseline = ctr;
        self.cvr_baseline = cvr;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Runner for worker `index`, sharing engine and metrics with its own seed
    fn fork(&self, index: u64) -> Self {
        let seed = self
            .seed
            .wrapping_add(index.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        Self {
            engine: Arc::clone(&self.engine),
            campaign_id: self.campaign_id.clone(),
            seed,
            rng: StdRng::seed_from_u64(seed),
            ctr_baseline: self.ctr_baseline,
            cvr_baseline: self.cvr_baseline,
            metrics: self.metrics.clone(),
        }
    }

    /// Run the opportunities in order. Engine and ledger errors abort the run.
    pub async fn run<I>(&mut self, opportunities: I) -> Result<SimulationResult>
    where
        I: IntoIterator<Item = Opportunity>,
    {
        let mut res = SimulationResult::default();

        for opp in opportunities {
            res.auctions += 1;
            let start = Instant::now();
            if let Some(m) = &self.metrics {
                m.inc_auctions();
            }

            let evaluated = self.engine.evaluate(&self.campaign_id, &opp).await;
            if let Some(m) = &self.metrics {
                m.observe_latency(start.elapsed());
                if evaluated.is_err() {
                    m.inc_errors();
                }
            }
            let decision = evaluated?;

            if !decision.should_bid {
                continue;
            }
            res.bids += 1;
            if let Some(m) = &self.metrics {
                m.inc_bids();
            }

            let clearing_cpm = opp.floor_cpm + Decimal::new(self.rng.gen_range(0..JITTER_MAX_BPS), 4);
            if decision.bid_cpm < clearing_cpm {
                continue;
            }

            res.impressions += 1;
            let cost = clearing_cpm / dec!(1000);
            res.spend += cost;

            let receipt = self
                .engine
                .ledger()
                .apply_spend(&self.campaign_id, cost)
                .await?;
            res.overflow += receipt.overflow;
            debug!(
                auction_id = %opp.auction_id,
                %clearing_cpm,
                applied = %receipt.applied,
                "simulated win"
            );

            if self.rng.gen::<f64>() < self.ctr_baseline {
                res.clicks += 1;
                if self.rng.gen::<f64>() < self.cvr_baseline {
                    res.conversions += 1;
                }
            }
        }

        info!(
            campaign_id = %self.campaign_id,
            auctions = res.auctions,
            bids = res.bids,
            impressions = res.impressions,
            clicks = res.clicks,
            conversions = res.conversions,
            spend = %res.spend,
            "simulation funnel"
        );
        Ok(res)
    }

    /// Fan the opportunities over `tasks` tokio tasks that share the engine
    /// and ledger, each with a seed derived from this runner's, and merge
    /// their totals.
    pub async fn run_concurrent(
        &self,
        opportunities: Vec<Opportunity>,
        tasks: usize,
    ) -> Result<SimulationResult> {
        let tasks = tasks.max(1);
        let mut shards: Vec<Vec<Opportunity>> = (0..tasks).map(|_| Vec::new()).collect();
        for (i, opp) in opportunities.into_iter().enumerate() {
            shards[i % tasks].push(opp);
        }

        let handles: Vec<_> = shards
            .into_iter()
            .enumerate()
            .map(|(i, shard)| {
                let mut runner = self.fork(i as u64);
                tokio::spawn(async move { runner.run(shard).await })
            })
            .collect();

        let mut total = SimulationResult::default();
        for joined in futures::future::join_all(handles).await {
            let res = joined.map_err(|e| DspError::Internal(format!("simulation task failed: {e}")))??;
            total.merge(&res);
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CampaignState;
    use crate::ledger::InMemoryLedger;
    use crate::sim::OpportunityGenerator;
    use crate::strategy::SimpleValueStrategy;

    fn setup(daily: Decimal) -> (Arc<DecisionEngine>, Arc<InMemoryLedger>) {
        let ledger = Arc::new(InMemoryLedger::with_campaigns([CampaignState::new(
            "sim",
            daily,
            daily * dec!(30),
        )
        .with_target_cpa(dec!(20))]));
        let engine = Arc::new(DecisionEngine::new(
            Arc::new(SimpleValueStrategy::new()),
            ledger.clone(),
        ));
        (engine, ledger)
    }

    #[tokio::test]
    async fn funnel_is_monotone_and_spend_is_settled() {
        let (engine, ledger) = setup(dec!(100));
        let mut runner = SimulationRunner::new(engine, "sim", 42);
        let res = runner
            .run(OpportunityGenerator::new(42).take(2_000))
            .await
            .unwrap();

        assert_eq!(res.auctions, 2_000);
        assert!(res.impressions <= res.bids && res.bids <= res.auctions);
        assert!(res.conversions <= res.clicks && res.clicks <= res.impressions);
        assert!(res.spend >= Decimal::ZERO);

        let campaign = ledger.get("sim").await.unwrap();
        assert_eq!(campaign.spent_today, res.spend - res.overflow);
    }

    #[tokio::test]
    async fn value_bid_always_clears_synthetic_market() {
        // A 280 CPM bid beats every clearing price below 3.5 CPM
        let (engine, _) = setup(dec!(100));
        let res = SimulationRunner::new(engine, "sim", 1)
            .run(OpportunityGenerator::new(1).take(500))
            .await
            .unwrap();
        assert_eq!(res.bids, 500);
        assert_eq!(res.impressions, 500);
        assert_eq!(res.overflow, Decimal::ZERO);
    }

    #[tokio::test]
    async fn tiny_budget_stops_bidding() {
        let (engine, ledger) = setup(dec!(0.01));
        let res = SimulationRunner::new(engine, "sim", 9)
            .run(OpportunityGenerator::new(9).take(1_000))
            .await
            .unwrap();

        assert!(res.bids < 20, "bids {}", res.bids);
        let campaign = ledger.get("sim").await.unwrap();
        assert!(campaign.spent_today <= campaign.daily_budget);
    }

    #[tokio::test]
    async fn same_seed_same_result() {
        let run = |seed| async move {
            let (engine, _) = setup(dec!(100));
            SimulationRunner::new(engine, "sim", seed)
                .run(OpportunityGenerator::new(seed).take(1_000))
                .await
                .unwrap()
        };
        assert_eq!(run(5).await, run(5).await);
    }

    #[tokio::test]
    async fn missing_campaign_aborts_run() {
        let (engine, _) = setup(dec!(100));
        let err = SimulationRunner::new(engine, "absent", 1)
            .run(OpportunityGenerator::new(1).take(10))
            .await
            .unwrap_err();
        assert!(matches!(err, DspError::NotFound(_)));
    }

    #[tokio::test]
    async fn failed_evaluation_still_records_latency() {
        let mut ledger = crate::ledger::MockCampaignLedger::new();
        ledger.expect_get().times(1).returning(|_| {
            std::thread::sleep(std::time::Duration::from_millis(2));
            Err(DspError::StoreUnavailable("connection reset".into()))
        });
        let engine = Arc::new(DecisionEngine::new(
            Arc::new(SimpleValueStrategy::new()),
            Arc::new(ledger),
        ));
        let metrics = Arc::new(Metrics::new());

        let err = SimulationRunner::new(engine, "sim", 1)
            .with_metrics(metrics.clone())
            .run(OpportunityGenerator::new(1).take(5))
            .await
            .unwrap_err();
        assert!(err.is_store_failure());

        let snap = metrics.snapshot();
        assert_eq!(snap.total_auctions, 1);
        assert_eq!(snap.total_errors, 1);
        assert!(snap.total_latency_micros >= 2_000);
    }

    #[tokio::test]
    async fn metrics_track_the_run() {
        let (engine, _) = setup(dec!(100));
        let metrics = Arc::new(Metrics::new());
        let res = SimulationRunner::new(engine, "sim", 3)
            .with_metrics(metrics.clone())
            .run(OpportunityGenerator::new(3).take(300))
            .await
            .unwrap();

        let snap = metrics.snapshot();
        assert_eq!(snap.total_auctions, res.auctions);
        assert_eq!(snap.total_bids, res.bids);
        assert_eq!(snap.total_errors, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_run_keeps_committed_spend_within_budget() {
        let (engine, ledger) = setup(dec!(0.5));
        let runner = SimulationRunner::new(engine, "sim", 11);
        let res = runner
            .run_concurrent(OpportunityGenerator::new(11).batch(4_000), 8)
            .await
            .unwrap();

        assert_eq!(res.auctions, 4_000);
        let campaign = ledger.get("sim").await.unwrap();
        assert!(campaign.spent_today <= campaign.daily_budget);
        assert_eq!(campaign.spent_today, res.spend - res.overflow);
    }
}
