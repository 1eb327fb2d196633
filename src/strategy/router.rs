//! Strategy selection
//!
//! Picks the strategy for a decision by campaign override first, then by
//! traffic slice (stable hash of the auction id into 100 buckets) for the
//! experiment variant, falling back to the default strategy.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;

use super::paced_value::PacedValueStrategy;
use super::simple_value::{SimpleValueStrategy, ValueParams};
use super::traits::BidStrategy;
use crate::config::StrategyConfig;
use crate::domain::{CampaignState, Decision, Opportunity};
use crate::error::{DspError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    SimpleValue,
    PacedValue,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SimpleValue => "simple_value",
            Self::PacedValue => "paced_value",
        }
    }

    pub fn build(&self, params: ValueParams) -> Arc<dyn BidStrategy> {
        match self {
            Self::SimpleValue => Arc::new(SimpleValueStrategy::with_params(params)),
            Self::PacedValue => Arc::new(PacedValueStrategy::with_params(params)),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = DspError;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "simple_value" | "simple" => Ok(Self::SimpleValue),
            "paced_value" | "paced" => Ok(Self::PacedValue),
            other => Err(DspError::InvalidConfig(format!(
                "unknown strategy '{}'; expected simple_value|paced_value",
                other
            ))),
        }
    }
}

/// Stable bucket in [0, 100) for a traffic key (FNV-1a)
pub fn traffic_bucket(key: &str) -> u8 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in key.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % 100) as u8
}

struct Experiment {
    strategy: Arc<dyn BidStrategy>,
    share_pct: u8,
}

pub struct StrategyRouter {
    default: Arc<dyn BidStrategy>,
    experiment: Option<Experiment>,
    overrides: HashMap<String, Arc<dyn BidStrategy>>,
}

impl StrategyRouter {
    pub fn new(default: Arc<dyn BidStrategy>) -> Self {
        Self {
            default,
            experiment: None,
            overrides: HashMap::new(),
        }
    }

    /// Route `share_pct` percent of traffic slices to `strategy`
    pub fn with_experiment(mut self, strategy: Arc<dyn BidStrategy>, share_pct: u8) -> Self {
        self.experiment = Some(Experiment {
            strategy,
            share_pct: share_pct.min(100),
        });
        self
    }

    /// Pin one campaign to a strategy
    pub fn with_override(
        mut self,
        campaign_id: impl Into<String>,
        strategy: Arc<dyn BidStrategy>,
    ) -> Self {
        self.overrides.insert(campaign_id.into(), strategy);
        self
    }

    pub fn from_config(config: &StrategyConfig) -> Result<Self> {
        let params = config.value_params();
        let mut router = Self::new(StrategyKind::from_str(&config.kind)?.build(params.clone()));

        if let Some(kind) = config.experiment_kind.as_deref() {
            let strategy = StrategyKind::from_str(kind)?.build(params.clone());
            router = router.with_experiment(strategy, config.experiment_share_pct);
        }

        for (campaign_id, kind) in &config.campaign_overrides {
            let strategy = StrategyKind::from_str(kind)?.build(params.clone());
            router = router.with_override(campaign_id.as_str(), strategy);
        }

        Ok(router)
    }

    pub fn select(&self, opportunity: &Opportunity, campaign: &CampaignState) -> &dyn BidStrategy {
        if let Some(strategy) = self.overrides.get(&campaign.id) {
            return strategy.as_ref();
        }
        if let Some(experiment) = &self.experiment {
            if traffic_bucket(&opportunity.auction_id) < experiment.share_pct {
                return experiment.strategy.as_ref();
            }
        }
        self.default.as_ref()
    }
}

impl BidStrategy for StrategyRouter {
    fn id(&self) -> &str {
        "router"
    }

    fn decide(&self, opportunity: &Opportunity, campaign: &CampaignState) -> Result<Decision> {
        let strategy = self.select(opportunity, campaign);
        debug!(
            auction_id = %opportunity.auction_id,
            campaign_id = %campaign.id,
            strategy = strategy.id(),
            "strategy selected"
        );
        strategy.decide(opportunity, campaign)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReasonCode;
    use rust_decimal_macros::dec;

    fn campaign(id: &str) -> CampaignState {
        CampaignState::new(id, dec!(100), dec!(1000)).with_target_cpa(dec!(20))
    }

    #[test]
    fn parse_strategy_kind_accepts_aliases() {
        assert_eq!(
            StrategyKind::from_str("simple_value").expect("simple_value should parse"),
            StrategyKind::SimpleValue
        );
        assert_eq!(
            StrategyKind::from_str(" Paced ").expect("paced alias should parse"),
            StrategyKind::PacedValue
        );
        assert!(StrategyKind::from_str("ml_model").is_err());
    }

    #[test]
    fn traffic_bucket_is_stable_and_in_range() {
        for i in 0..500 {
            let key = format!("auction-{i}");
            let b = traffic_bucket(&key);
            assert!(b < 100);
            assert_eq!(b, traffic_bucket(&key));
        }
    }

    #[test]
    fn default_strategy_serves_everything_without_experiment() {
        let router = StrategyRouter::new(Arc::new(SimpleValueStrategy::new()));
        let d = router
            .decide(&Opportunity::new("a1"), &campaign("c1"))
            .unwrap();
        assert_eq!(d.reason, ReasonCode::SimpleValueStrategy);
    }

    #[test]
    fn full_share_routes_all_traffic_to_experiment() {
        let router = StrategyRouter::new(Arc::new(SimpleValueStrategy::new()))
            .with_experiment(Arc::new(PacedValueStrategy::new()), 100);
        for i in 0..50 {
            let opp = Opportunity::new(format!("a{i}"));
            assert_eq!(router.select(&opp, &campaign("c1")).id(), "paced_value");
        }
    }

    #[test]
    fn partial_share_splits_traffic() {
        let router = StrategyRouter::new(Arc::new(SimpleValueStrategy::new()))
            .with_experiment(Arc::new(PacedValueStrategy::new()), 30);
        let paced = (0..1000)
            .filter(|i| {
                let opp = Opportunity::new(format!("sim-auction-{i}"));
                router.select(&opp, &campaign("c1")).id() == "paced_value"
            })
            .count();
        assert!(paced > 150 && paced < 450, "paced share was {paced}/1000");
    }

    #[test]
    fn campaign_override_wins_over_experiment() {
        let router = StrategyRouter::new(Arc::new(SimpleValueStrategy::new()))
            .with_experiment(Arc::new(SimpleValueStrategy::new()), 100)
            .with_override("pinned", Arc::new(PacedValueStrategy::new()));

        let opp = Opportunity::new("a1");
        assert_eq!(router.select(&opp, &campaign("pinned")).id(), "paced_value");
        assert_eq!(router.select(&opp, &campaign("other")).id(), "simple_value");
    }

    #[test]
    fn from_config_rejects_unknown_kind() {
        let config = StrategyConfig {
            kind: "nope".to_string(),
            ..StrategyConfig::default()
        };
        assert!(StrategyRouter::from_config(&config).is_err());
    }

    #[test]
    fn from_config_wires_overrides() {
        let mut config = StrategyConfig::default();
        config
            .campaign_overrides
            .insert("c9".to_string(), "paced_value".to_string());
        let router = StrategyRouter::from_config(&config).unwrap();
        assert_eq!(
            router.select(&Opportunity::new("a1"), &campaign("c9")).id(),
            "paced_value"
        );
    }
}
