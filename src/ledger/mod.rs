//! Campaign ledger
//!
//! The ledger owns every `CampaignState`. Reads hand out snapshots;
//! `apply_spend` is the only budget mutator and is atomic per campaign.
//!
//! # Overspend window
//! Decisions are made against snapshots and spend is committed later on a
//! win notice, so two in-flight decisions can both see budget that only one
//! of them will get. The committed totals never exceed the budgets (the
//! excess is clamped and reported as `overflow`), but the money the market
//! charges can exceed what the ledger records by at most
//! `in_flight_decisions * max_clearing_cpm / 1000` per campaign before the
//! next snapshot reflects the spend.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryLedger;
pub use postgres::PostgresLedger;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::CampaignState;
use crate::error::{DspError, Result};

/// Result of a committed spend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendReceipt {
    pub campaign_id: String,
    pub requested: Decimal,
    pub applied: Decimal,
    /// Part of the request clamped away to keep spend within budget
    pub overflow: Decimal,
    pub spent_today: Decimal,
    pub lifetime_spent: Decimal,
}

impl SpendReceipt {
    pub fn is_clamped(&self) -> bool {
        self.overflow > Decimal::ZERO
    }
}

/// Storage contract for campaign budget state.
///
/// Implementations must serialize `apply_spend` calls per campaign so the
/// budget invariants hold for the committed totals.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CampaignLedger: Send + Sync {
    /// Snapshot of a campaign
    async fn get(&self, campaign_id: &str) -> Result<CampaignState>;

    /// Commit spend (currency units, not CPM) against daily and lifetime budgets
    async fn apply_spend(&self, campaign_id: &str, delta: Decimal) -> Result<SpendReceipt>;

    /// Register or replace a campaign
    async fn upsert(&self, campaign: CampaignState) -> Result<()>;

    /// Day rollover: zero `spent_today` everywhere, returns campaigns touched
    async fn reset_daily(&self) -> Result<usize>;
}

/// Reject spends that could only come from a caller bug
pub fn validate_spend(campaign_id: &str, delta: Decimal) -> Result<()> {
    if delta <= Decimal::ZERO {
        return Err(DspError::InvalidSpend(format!(
            "spend for {} must be positive, got {}",
            campaign_id, delta
        )));
    }
    Ok(())
}

/// Apply `delta` to a campaign in place, clamping to both budgets.
///
/// Callers hold whatever lock makes this atomic for the campaign.
pub fn commit_spend(campaign: &mut CampaignState, delta: Decimal) -> SpendReceipt {
    let applied = delta
        .min(campaign.remaining_daily())
        .min(campaign.remaining_lifetime());
    let overflow = delta - applied;

    campaign.spent_today += applied;
    campaign.lifetime_spent += applied;

    if overflow > Decimal::ZERO {
        warn!(
            campaign_id = %campaign.id,
            requested = %delta,
            applied = %applied,
            overflow = %overflow,
            "spend clamped at budget"
        );
    }

    SpendReceipt {
        campaign_id: campaign.id.clone(),
        requested: delta,
        applied,
        overflow,
        spent_today: campaign.spent_today,
        lifetime_spent: campaign.lifetime_spent,
    }
}
