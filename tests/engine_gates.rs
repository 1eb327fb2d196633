use std::sync::Arc;
use std::time::Duration;

use qc_dsp::domain::{CampaignState, Decision, Opportunity, ReasonCode};
use qc_dsp::engine::DecisionEngine;
use qc_dsp::ledger::InMemoryLedger;
use qc_dsp::services::Metrics;
use qc_dsp::strategy::{BidStrategy, SimpleValueStrategy};
use qc_dsp::Result;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Strategy that bids whatever price it is given
struct Echo(Decimal);

impl BidStrategy for Echo {
    fn id(&self) -> &str {
        "echo"
    }

    fn decide(&self, _: &Opportunity, _: &CampaignState) -> Result<Decision> {
        Ok(Decision::bid(self.0, "cr-1", "example.com", ReasonCode::SimpleValueStrategy))
    }
}

fn engine(strategy: Arc<dyn BidStrategy>, campaigns: Vec<CampaignState>) -> DecisionEngine {
    DecisionEngine::new(strategy, Arc::new(InMemoryLedger::with_campaigns(campaigns)))
}

fn campaign(id: &str, target_cpa: Decimal) -> CampaignState {
    CampaignState::new(id, dec!(100), dec!(3000)).with_target_cpa(target_cpa)
}

fn base() -> CampaignState {
    campaign("c1", dec!(20))
}

#[tokio::test]
async fn reference_strategy_examples() {
    let e = engine(Arc::new(SimpleValueStrategy::new()), vec![base()]);

    let d = e.evaluate("c1", &Opportunity::new("a")).await.unwrap();
    assert!(d.should_bid);
    assert_eq!(d.bid_cpm, dec!(280));
    assert_eq!(d.reason, ReasonCode::SimpleValueStrategy);

    let floored = Opportunity::new("b").with_floor(dec!(300));
    let d = e.evaluate("c1", &floored).await.unwrap();
    assert_eq!(d.bid_cpm, dec!(300));

    let e = engine(
        Arc::new(SimpleValueStrategy::new()),
        vec![base().with_target_cpa(Decimal::ZERO)],
    );
    for floor in [Decimal::ZERO, dec!(1), dec!(500)] {
        let d = e
            .evaluate("c1", &Opportunity::new("c").with_floor(floor))
            .await
            .unwrap();
        assert!(!d.should_bid);
        assert_eq!(d.reason, ReasonCode::NoTargetCpa);
    }
}

#[tokio::test]
async fn inactive_always_wins_over_exhausted_budget() {
    let exhausted = base().with_active(false).with_spent(dec!(100), dec!(3000));
    let e = engine(Arc::new(SimpleValueStrategy::new()), vec![exhausted]);
    let d = e.evaluate("c1", &Opportunity::new("a")).await.unwrap();
    assert_eq!(d.reason, ReasonCode::CampaignInactive);
}

#[tokio::test]
async fn exhausted_daily_budget_blocks_strategy() {
    let e = engine(
        Arc::new(Echo(dec!(5))),
        vec![base().with_spent(dec!(100), dec!(100))],
    );
    let d = e.evaluate("c1", &Opportunity::new("a")).await.unwrap();
    assert_eq!(d, Decision::no_bid(ReasonCode::DailyBudgetExhausted));
}

#[tokio::test]
async fn safety_gate_holds_for_any_price() {
    let prices = [
        dec!(-1000),
        dec!(-0.0001),
        Decimal::ZERO,
        dec!(0.0001),
        dec!(1),
        dec!(280),
    ];
    for price in prices {
        let e = engine(Arc::new(Echo(price)), vec![base()]);
        let d = e.evaluate("c1", &Opportunity::new("a")).await.unwrap();
        if d.should_bid {
            assert!(d.bid_cpm > Decimal::ZERO, "bid at {}", d.bid_cpm);
        } else {
            assert_eq!(d.reason, ReasonCode::NonPositiveBid);
        }
    }
}

#[tokio::test]
async fn targeting_gates() {
    let targeted = base()
        .with_allowed_geos(["US"])
        .with_allowed_sites(["news.example.com"]);
    let e = engine(Arc::new(SimpleValueStrategy::new()), vec![targeted]);

    let eu = Opportunity::new("a").with_geo("EU").with_site("news.example.com");
    assert_eq!(
        e.evaluate("c1", &eu).await.unwrap().reason,
        ReasonCode::GeoNotTargeted
    );

    let other_site = Opportunity::new("b").with_geo("US").with_site("tech.example.com");
    assert_eq!(
        e.evaluate("c1", &other_site).await.unwrap().reason,
        ReasonCode::SiteNotTargeted
    );

    let match_all = Opportunity::new("c").with_geo("us").with_site("news.example.com");
    assert!(e.evaluate("c1", &match_all).await.unwrap().should_bid);
}

#[tokio::test]
async fn metrics_count_auctions_and_bids() {
    let e = engine(
        Arc::new(SimpleValueStrategy::new()),
        vec![base(), campaign("c2", Decimal::ZERO)],
    );
    let metrics = Metrics::new();
    let budget = Duration::from_millis(80);

    for i in 0..30 {
        let campaign = if i % 3 == 0 { "c2" } else { "c1" };
        e.decide_fail_safe(campaign, &Opportunity::new(format!("a-{i}")), budget, &metrics)
            .await;
    }
    // Unknown campaign: counted as an error, never a bid
    let d = e
        .decide_fail_safe("nope", &Opportunity::new("x"), budget, &metrics)
        .await;
    assert_eq!(d.reason, ReasonCode::EngineError);

    let snap = metrics.snapshot();
    assert_eq!(snap.total_auctions, 31);
    assert_eq!(snap.total_bids, 20);
    assert_eq!(snap.total_errors, 1);
    assert!(snap.average_latency_ms >= 0.0);
}

#[tokio::test]
async fn overflowing_campaign_value_fails_safe() {
    // The ledger is seeded directly, bypassing upsert validation
    let e = engine(
        Arc::new(SimpleValueStrategy::new()),
        vec![campaign("c1", Decimal::MAX)],
    );
    let metrics = Metrics::new();

    let d = e
        .decide_fail_safe(
            "c1",
            &Opportunity::new("a"),
            Duration::from_millis(80),
            &metrics,
        )
        .await;
    assert!(!d.should_bid);
    assert_eq!(d.reason, ReasonCode::EngineError);

    let snap = metrics.snapshot();
    assert_eq!(snap.total_auctions, 1);
    assert_eq!(snap.total_bids, 0);
    assert_eq!(snap.total_errors, 1);
}

#[test]
fn evaluate_is_usable_from_sync_code() {
    let e = engine(Arc::new(SimpleValueStrategy::new()), vec![base()]);
    let d = tokio_test::block_on(e.evaluate("c1", &Opportunity::new("a")));
    let d = tokio_test::assert_ok!(d);
    assert!(d.should_bid);
}
