use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::gates::{eligibility_gate, safety_gate};
use crate::domain::{Decision, Opportunity, ReasonCode};
use crate::error::{DspError, Result};
use crate::ledger::CampaignLedger;
use crate::services::Metrics;
use crate::strategy::BidStrategy;

/// Orchestrates ledger, gates and strategy for one auction at a time.
///
/// Holds no per-call state and is shared across concurrent callers. It
/// never writes the ledger: spend is committed by whoever learns of the win.
pub struct DecisionEngine {
    strategy: Arc<dyn BidStrategy>,
    ledger: Arc<dyn CampaignLedger>,
}

impl DecisionEngine {
    pub fn new(strategy: Arc<dyn BidStrategy>, ledger: Arc<dyn CampaignLedger>) -> Self {
        Self { strategy, ledger }
    }

    pub fn ledger(&self) -> &Arc<dyn CampaignLedger> {
        &self.ledger
    }

    pub fn strategy(&self) -> &Arc<dyn BidStrategy> {
        &self.strategy
    }

    /// Evaluate one auction for a campaign.
    ///
    /// Ledger failures propagate; business outcomes come back as no-bid
    /// decisions with a reason.
    pub async fn evaluate(&self, campaign_id: &str, opportunity: &Opportunity) -> Result<Decision> {
        let campaign = self.ledger.get(campaign_id).await?;

        if let Some(reason) = eligibility_gate(&campaign, opportunity) {
            debug!(
                auction_id = %opportunity.auction_id,
                campaign_id,
                %reason,
                "campaign not eligible"
            );
            return Ok(Decision::no_bid(reason));
        }

        let decision = self.strategy.decide(opportunity, &campaign)?;
        if !decision.should_bid {
            return Ok(decision);
        }

        let gated = safety_gate(decision);
        if !gated.should_bid {
            warn!(
                auction_id = %opportunity.auction_id,
                campaign_id,
                strategy = self.strategy.id(),
                "strategy produced a non-positive bid"
            );
        }
        Ok(gated)
    }

    /// `evaluate` bounded by a deadline; expiry yields a `deadline_exceeded`
    /// no-bid rather than an error
    pub async fn evaluate_within(
        &self,
        campaign_id: &str,
        opportunity: &Opportunity,
        budget: Duration,
    ) -> Result<Decision> {
        match tokio::time::timeout(budget, self.evaluate(campaign_id, opportunity)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    auction_id = %opportunity.auction_id,
                    campaign_id,
                    budget_ms = budget.as_millis() as u64,
                    "decision deadline exceeded"
                );
                Ok(Decision::no_bid(ReasonCode::DeadlineExceeded))
            }
        }
    }

    /// Live-traffic entry point: always returns a decision.
    ///
    /// Records the auction, bid, error and latency in `metrics`. Any error
    /// becomes an `engine_error` no-bid, so a failure can never produce a bid.
    pub async fn decide_fail_safe(
        &self,
        campaign_id: &str,
        opportunity: &Opportunity,
        budget: Duration,
        metrics: &Metrics,
    ) -> Decision {
        let start = Instant::now();
        metrics.inc_auctions();

        let decision = match self.evaluate_within(campaign_id, opportunity, budget).await {
            Ok(decision) => decision,
            Err(err) => {
                metrics.inc_errors();
                log_engine_error(campaign_id, opportunity, &err);
                Decision::no_bid(ReasonCode::EngineError)
            }
        };

        if decision.should_bid {
            metrics.inc_bids();
        }
        metrics.observe_latency(start.elapsed());
        decision
    }
}

fn log_engine_error(campaign_id: &str, opportunity: &Opportunity, err: &DspError) {
    warn!(
        auction_id = %opportunity.auction_id,
        campaign_id,
        kind = err.kind(),
        error = %err,
        "evaluation failed, answering no-bid"
    );
}
