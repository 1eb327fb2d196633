//! Wiring of configured components into a running bidder

use std::sync::Arc;
use tracing::info;

use crate::adapters::AppState;
use crate::audit::AuditLogger;
use crate::config::{AppConfig, LedgerBackend};
use crate::engine::DecisionEngine;
use crate::error::{DspError, Result};
use crate::ledger::{CampaignLedger, InMemoryLedger, PostgresLedger};
use crate::strategy::{BidStrategy, StrategyRouter};

/// Open the configured ledger, register seed campaigns, and make sure the
/// default campaign exists
pub async fn build_ledger(config: &AppConfig) -> Result<Arc<dyn CampaignLedger>> {
    let ledger: Arc<dyn CampaignLedger> = match config.ledger.backend {
        LedgerBackend::Memory => Arc::new(InMemoryLedger::new()),
        LedgerBackend::Postgres => {
            let url = config.ledger.database_url.as_deref().ok_or_else(|| {
                DspError::InvalidConfig("ledger.database_url is required for the postgres backend".into())
            })?;
            let ledger = PostgresLedger::connect(url, config.ledger.max_connections).await?;
            ledger.ensure_schema().await?;
            Arc::new(ledger)
        }
    };

    for campaign in &config.ledger.campaigns {
        ledger.upsert(campaign.clone()).await?;
    }

    match ledger.get(&config.default_campaign_id).await {
        Ok(_) => {}
        Err(DspError::NotFound(_)) => {
            let fallback = config.fallback_campaign();
            info!(
                campaign_id = %fallback.id,
                daily_budget = %fallback.daily_budget,
                "registering fallback default campaign"
            );
            ledger.upsert(fallback).await?;
        }
        Err(e) => return Err(e),
    }

    info!(
        backend = ?config.ledger.backend,
        seeded = config.ledger.campaigns.len(),
        "campaign ledger ready"
    );
    Ok(ledger)
}

pub fn build_strategy(config: &AppConfig) -> Result<Arc<dyn BidStrategy>> {
    Ok(Arc::new(StrategyRouter::from_config(&config.strategy)?))
}

pub async fn build_engine(config: &AppConfig) -> Result<Arc<DecisionEngine>> {
    let ledger = build_ledger(config).await?;
    let strategy = build_strategy(config)?;
    Ok(Arc::new(DecisionEngine::new(strategy, ledger)))
}

/// Everything the HTTP server needs, audit pipeline included
pub async fn build_app_state(config: &AppConfig) -> Result<AppState> {
    let engine = build_engine(config).await?;
    let mut state = AppState::new(
        engine,
        config.seat_id.clone(),
        config.default_campaign_id.clone(),
        config.engine.decision_timeout(),
    );
    if let Some(audit) = AuditLogger::from_config(&config.audit).await? {
        state = state.with_audit(Arc::new(audit));
    }
    Ok(state)
}
