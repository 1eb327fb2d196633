//! Pacing experiment variant
//!
//! Same valuation as the simple strategy, scaled by the fraction of today's
//! budget still available, so bids soften as the campaign spends down.

use rust_decimal::Decimal;

use super::simple_value::{clamp_to_floor, ValueParams};
use super::traits::BidStrategy;
use crate::domain::{CampaignState, Decision, Opportunity, ReasonCode};
use crate::error::{DspError, Result};

pub struct PacedValueStrategy {
    params: ValueParams,
}

impl PacedValueStrategy {
    pub fn new() -> Self {
        Self::with_params(ValueParams::default())
    }

    pub fn with_params(params: ValueParams) -> Self {
        Self { params }
    }

    /// Remaining share of the daily budget in [0, 1]
    fn pacing_factor(campaign: &CampaignState) -> Decimal {
        if campaign.daily_budget <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (campaign.remaining_daily() / campaign.daily_budget).min(Decimal::ONE)
    }
}

impl Default for PacedValueStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl BidStrategy for PacedValueStrategy {
    fn id(&self) -> &str {
        "paced_value"
    }

    fn decide(&self, opportunity: &Opportunity, campaign: &CampaignState) -> Result<Decision> {
        if campaign.target_cpa <= Decimal::ZERO {
            return Ok(Decision::no_bid(ReasonCode::NoTargetCpa));
        }

        let paced = self
            .params
            .value_cpm(campaign.target_cpa)?
            .checked_mul(Self::pacing_factor(campaign))
            .ok_or_else(|| DspError::Strategy("paced bid value overflows".to_string()))?;
        if paced <= Decimal::ZERO {
            return Ok(Decision::no_bid(ReasonCode::ComputedZeroBid));
        }

        Ok(Decision::bid(
            clamp_to_floor(paced, opportunity.floor_cpm),
            self.params.creative_id.as_str(),
            self.params.advertiser_domain.as_str(),
            ReasonCode::PacedValueStrategy,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn untouched_budget_bids_full_value() {
        let c = CampaignState::new("c1", dec!(100), dec!(1000)).with_target_cpa(dec!(20));
        let d = PacedValueStrategy::new()
            .decide(&Opportunity::new("a1"), &c)
            .unwrap();
        assert_eq!(d.bid_cpm, dec!(280));
        assert_eq!(d.reason, ReasonCode::PacedValueStrategy);
    }

    #[test]
    fn half_spent_budget_halves_bid() {
        let c = CampaignState::new("c1", dec!(100), dec!(1000))
            .with_target_cpa(dec!(20))
            .with_spent(dec!(50), dec!(50));
        let d = PacedValueStrategy::new()
            .decide(&Opportunity::new("a1"), &c)
            .unwrap();
        assert_eq!(d.bid_cpm, dec!(140));
    }

    #[test]
    fn spent_budget_is_computed_zero_bid_even_with_floor() {
        let c = CampaignState::new("c1", dec!(100), dec!(1000))
            .with_target_cpa(dec!(20))
            .with_spent(dec!(100), dec!(100));
        let opp = Opportunity::new("a1").with_floor(dec!(1));
        let d = PacedValueStrategy::new().decide(&opp, &c).unwrap();
        assert!(!d.should_bid);
        assert_eq!(d.reason, ReasonCode::ComputedZeroBid);
    }

    #[test]
    fn overflowing_value_is_an_error_not_a_panic() {
        let c = CampaignState::new("c1", dec!(100), dec!(1000)).with_target_cpa(Decimal::MAX);
        let err = PacedValueStrategy::new()
            .decide(&Opportunity::new("a1"), &c)
            .unwrap_err();
        assert_eq!(err.kind(), "strategy");
    }

    #[test]
    fn floor_clamp_applies_after_pacing() {
        let c = CampaignState::new("c1", dec!(100), dec!(1000))
            .with_target_cpa(dec!(20))
            .with_spent(dec!(99), dec!(99));
        let opp = Opportunity::new("a1").with_floor(dec!(5));
        let d = PacedValueStrategy::new().decide(&opp, &c).unwrap();
        // 280 * 0.01 = 2.8, raised to the floor
        assert_eq!(d.bid_cpm, dec!(5));
    }
}
