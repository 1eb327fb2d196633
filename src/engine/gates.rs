//! Eligibility and safety gates
//!
//! Gates run in a fixed order and the first one that applies wins, so an
//! inactive campaign with an exhausted budget reports `campaign_inactive`.

use rust_decimal::Decimal;

use crate::domain::{CampaignState, Decision, Opportunity, ReasonCode};

/// First applicable pre-strategy gate, or `None` when the campaign may bid
pub fn eligibility_gate(campaign: &CampaignState, opportunity: &Opportunity) -> Option<ReasonCode> {
    if !campaign.is_active {
        return Some(ReasonCode::CampaignInactive);
    }
    if campaign.daily_exhausted() {
        return Some(ReasonCode::DailyBudgetExhausted);
    }
    if campaign.lifetime_exhausted() {
        return Some(ReasonCode::LifetimeBudgetExhausted);
    }
    if !campaign.allows_geo(&opportunity.geo) {
        return Some(ReasonCode::GeoNotTargeted);
    }
    if !campaign.allows_site(opportunity.inventory_source()) {
        return Some(ReasonCode::SiteNotTargeted);
    }
    None
}

/// Post-strategy gate: no-bids pass through unchanged, a bid without a
/// positive price is overridden to `non_positive_bid`
pub fn safety_gate(decision: Decision) -> Decision {
    if decision.should_bid && decision.bid_cpm <= Decimal::ZERO {
        return Decision::no_bid(ReasonCode::NonPositiveBid);
    }
    decision
}
