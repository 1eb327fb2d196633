//! In-memory ledger used by tests, simulation and single-process deployments

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::{commit_spend, validate_spend, CampaignLedger, SpendReceipt};
use crate::domain::CampaignState;
use crate::error::{DspError, Result};
use crate::validation::validate_campaign;

/// Campaign map guarded by DashMap's per-shard locks.
///
/// `apply_spend` mutates under the entry's write guard, so concurrent
/// spends on one campaign serialize while other campaigns proceed.
#[derive(Default)]
pub struct InMemoryLedger {
    campaigns: DashMap<String, CampaignState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger pre-populated with campaigns
    pub fn with_campaigns<I>(campaigns: I) -> Self
    where
        I: IntoIterator<Item = CampaignState>,
    {
        let ledger = Self::new();
        for campaign in campaigns {
            ledger.campaigns.insert(campaign.id.clone(), campaign);
        }
        ledger
    }

    pub fn len(&self) -> usize {
        self.campaigns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.campaigns.is_empty()
    }
}

#[async_trait]
impl CampaignLedger for InMemoryLedger {
    async fn get(&self, campaign_id: &str) -> Result<CampaignState> {
        self.campaigns
            .get(campaign_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DspError::NotFound(campaign_id.to_string()))
    }

    async fn apply_spend(&self, campaign_id: &str, delta: Decimal) -> Result<SpendReceipt> {
        validate_spend(campaign_id, delta)?;

        let mut entry = self
            .campaigns
            .get_mut(campaign_id)
            .ok_or_else(|| DspError::NotFound(campaign_id.to_string()))?;
        let receipt = commit_spend(entry.value_mut(), delta);

        debug!(
            campaign_id,
            applied = %receipt.applied,
            spent_today = %receipt.spent_today,
            "spend committed"
        );
        Ok(receipt)
    }

    async fn upsert(&self, campaign: CampaignState) -> Result<()> {
        validate_campaign(&campaign)?;
        debug!(campaign_id = %campaign.id, "campaign upserted");
        self.campaigns.insert(campaign.id.clone(), campaign);
        Ok(())
    }

    async fn reset_daily(&self) -> Result<usize> {
        let mut touched = 0;
        for mut entry in self.campaigns.iter_mut() {
            entry.value_mut().spent_today = Decimal::ZERO;
            touched += 1;
        }
        info!(campaigns = touched, "daily spend reset");
        Ok(touched)
    }
}
