use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Why a decision came out the way it did.
///
/// Mandatory on every decision, bid or not. No-bid reasons are business
/// outcomes and are never counted as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    SimpleValueStrategy,
    PacedValueStrategy,
    NoTargetCpa,
    ComputedZeroBid,
    CampaignInactive,
    DailyBudgetExhausted,
    LifetimeBudgetExhausted,
    GeoNotTargeted,
    SiteNotTargeted,
    NonPositiveBid,
    DeadlineExceeded,
    NoImpression,
    EngineError,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::SimpleValueStrategy => "simple_value_strategy",
            ReasonCode::PacedValueStrategy => "paced_value_strategy",
            ReasonCode::NoTargetCpa => "no_target_cpa",
            ReasonCode::ComputedZeroBid => "computed_zero_bid",
            ReasonCode::CampaignInactive => "campaign_inactive",
            ReasonCode::DailyBudgetExhausted => "daily_budget_exhausted",
            ReasonCode::LifetimeBudgetExhausted => "lifetime_budget_exhausted",
            ReasonCode::GeoNotTargeted => "geo_not_targeted",
            ReasonCode::SiteNotTargeted => "site_not_targeted",
            ReasonCode::NonPositiveBid => "non_positive_bid",
            ReasonCode::DeadlineExceeded => "deadline_exceeded",
            ReasonCode::NoImpression => "no_impression",
            ReasonCode::EngineError => "engine_error",
        }
    }

    /// True for the reasons a strategy attaches to an actual bid
    pub fn is_bid(&self) -> bool {
        matches!(
            self,
            ReasonCode::SimpleValueStrategy | ReasonCode::PacedValueStrategy
        )
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one auction evaluation. Transient, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub should_bid: bool,
    /// Bid in CPM; zero on no-bid
    pub bid_cpm: Decimal,
    pub creative_id: String,
    pub advertiser_domain: String,
    pub reason: ReasonCode,
}

impl Decision {
    pub fn no_bid(reason: ReasonCode) -> Self {
        Self {
            should_bid: false,
            bid_cpm: Decimal::ZERO,
            creative_id: String::new(),
            advertiser_domain: String::new(),
            reason,
        }
    }

    pub fn bid(
        bid_cpm: Decimal,
        creative_id: impl Into<String>,
        advertiser_domain: impl Into<String>,
        reason: ReasonCode,
    ) -> Self {
        Self {
            should_bid: true,
            bid_cpm,
            creative_id: creative_id.into(),
            advertiser_domain: advertiser_domain.into(),
            reason,
        }
    }
}
