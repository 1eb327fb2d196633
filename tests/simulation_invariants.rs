use std::sync::Arc;

use qc_dsp::domain::CampaignState;
use qc_dsp::engine::DecisionEngine;
use qc_dsp::ledger::{CampaignLedger, InMemoryLedger};
use qc_dsp::sim::{OpportunityGenerator, SimulationResult, SimulationRunner};
use qc_dsp::strategy::{PacedValueStrategy, SimpleValueStrategy, StrategyRouter};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

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

fn assert_funnel(res: &SimulationResult) {
    assert!(res.impressions <= res.bids, "{res:?}");
    assert!(res.bids <= res.auctions, "{res:?}");
    assert!(res.spend >= Decimal::ZERO);
    assert!(res.overflow >= Decimal::ZERO && res.overflow <= res.spend);
}

#[tokio::test]
async fn sequential_runs_hold_invariants_across_seeds() {
    for seed in [1, 7, 42, 1234] {
        let (engine, ledger) = setup(dec!(2));
        let res = SimulationRunner::new(engine, "sim", seed)
            .run(OpportunityGenerator::new(seed).take(3_000))
            .await
            .unwrap();

        assert_eq!(res.auctions, 3_000);
        assert_funnel(&res);

        let c = ledger.get("sim").await.unwrap();
        assert!(c.spent_today <= c.daily_budget, "seed {seed}");
        assert_eq!(c.spent_today, res.spend - res.overflow, "seed {seed}");
    }
}

#[tokio::test]
async fn spend_is_sum_of_clearing_prices() {
    // Budget far above what 1000 wins can cost, so nothing is clamped
    let (engine, ledger) = setup(dec!(1000));
    let res = SimulationRunner::new(engine, "sim", 5)
        .run(OpportunityGenerator::new(5).take(1_000))
        .await
        .unwrap();

    assert!(res.impressions > 0);
    assert_eq!(res.overflow, Decimal::ZERO);
    let c = ledger.get("sim").await.unwrap();
    assert_eq!(c.spent_today, res.spend);
    assert_eq!(c.lifetime_spent, res.spend);

    // Every clearing price lies in [floor, floor + 1) with floor in [0.5, 2.5)
    let n = Decimal::from(res.impressions);
    assert!(res.spend >= n * dec!(0.5) / dec!(1000));
    assert!(res.spend < n * dec!(3.5) / dec!(1000));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_runs_never_commit_past_budget() {
    for seed in [3, 99] {
        let (engine, ledger) = setup(dec!(1));
        let res = SimulationRunner::new(engine, "sim", seed)
            .run_concurrent(OpportunityGenerator::new(seed).batch(5_000), 16)
            .await
            .unwrap();

        assert_eq!(res.auctions, 5_000);
        assert_funnel(&res);

        let c = ledger.get("sim").await.unwrap();
        assert!(c.spent_today <= c.daily_budget);
        assert!(c.lifetime_spent <= c.lifetime_budget);
        assert_eq!(c.spent_today, res.spend - res.overflow);
    }
}

#[tokio::test]
async fn paced_strategy_spends_no_more_than_simple() {
    let paced_ledger = Arc::new(InMemoryLedger::with_campaigns([CampaignState::new(
        "sim",
        dec!(1),
        dec!(30),
    )
    .with_target_cpa(dec!(20))]));
    let router = StrategyRouter::new(Arc::new(PacedValueStrategy::new()));
    let engine = Arc::new(DecisionEngine::new(Arc::new(router), paced_ledger.clone()));

    let res = SimulationRunner::new(engine, "sim", 8)
        .run(OpportunityGenerator::new(8).take(2_000))
        .await
        .unwrap();

    assert_funnel(&res);
    let c = paced_ledger.get("sim").await.unwrap();
    assert!(c.spent_today <= c.daily_budget);
}
