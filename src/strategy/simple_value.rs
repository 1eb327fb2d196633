//! Baseline value strategy
//!
//! bid = conversion_rate * target_cpa * 1000 * margin, raised to the floor.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::traits::BidStrategy;
use crate::domain::{CampaignState, Decision, Opportunity, ReasonCode};
use crate::error::{DspError, Result};

/// Constants shared by the value-based strategies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueParams {
    /// Assumed conversions per impression
    pub conversion_rate: Decimal,
    /// Fraction of expected value we are willing to pay
    pub margin: Decimal,
    pub creative_id: String,
    pub advertiser_domain: String,
}

impl Default for ValueParams {
    fn default() -> Self {
        Self {
            conversion_rate: dec!(0.02),
            margin: dec!(0.7),
            creative_id: "demo-creative-1".to_string(),
            advertiser_domain: "example.com".to_string(),
        }
    }
}

impl ValueParams {
    /// Expected value per impression converted to CPM, after margin.
    ///
    /// Fails with `DspError::Strategy` when the product leaves the Decimal range.
    pub fn value_cpm(&self, target_cpa: Decimal) -> Result<Decimal> {
        self.conversion_rate
            .checked_mul(target_cpa)
            .and_then(|v| v.checked_mul(dec!(1000)))
            .and_then(|v| v.checked_mul(self.margin))
            .ok_or_else(|| {
                DspError::Strategy(format!("bid value overflows for target_cpa {}", target_cpa))
            })
    }
}

/// Raise a positive bid to the floor when the floor is higher
pub(crate) fn clamp_to_floor(bid_cpm: Decimal, floor_cpm: Decimal) -> Decimal {
    if floor_cpm > Decimal::ZERO && floor_cpm > bid_cpm {
        floor_cpm
    } else {
        bid_cpm
    }
}

pub struct SimpleValueStrategy {
    params: ValueParams,
}

impl SimpleValueStrategy {
    pub fn new() -> Self {
        Self::with_params(ValueParams::default())
    }

    pub fn with_params(params: ValueParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ValueParams {
        &self.params
    }
}

impl Default for SimpleValueStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl BidStrategy for SimpleValueStrategy {
    fn id(&self) -> &str {
        "simple_value"
    }

    fn decide(&self, opportunity: &Opportunity, campaign: &CampaignState) -> Result<Decision> {
        if campaign.target_cpa <= Decimal::ZERO {
            return Ok(Decision::no_bid(ReasonCode::NoTargetCpa));
        }

        let bid_cpm = clamp_to_floor(
            self.params.value_cpm(campaign.target_cpa)?,
            opportunity.floor_cpm,
        );

        if bid_cpm <= Decimal::ZERO {
            return Ok(Decision::no_bid(ReasonCode::ComputedZeroBid));
        }

        Ok(Decision::bid(
            bid_cpm,
            self.params.creative_id.as_str(),
            self.params.advertiser_domain.as_str(),
            ReasonCode::SimpleValueStrategy,
        ))
    }
}
