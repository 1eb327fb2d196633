//! Liveness and readiness reporting for the bidder process

use crate::audit::AuditStats;
use crate::error::DspError;
use crate::ledger::CampaignLedger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Health status for a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// Worse of two statuses
    fn worst(self, other: HealthStatus) -> HealthStatus {
        match (self, other) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        }
    }
}

/// Component health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Overall health response served on `/healthz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub components: Vec<ComponentHealth>,
}

/// Shared state for health probes
pub struct HealthState {
    started_at: DateTime<Utc>,
    ledger: Arc<dyn CampaignLedger>,
    /// Campaign read on every probe to prove the ledger answers
    probe_campaign_id: String,
}

impl HealthState {
    pub fn new(ledger: Arc<dyn CampaignLedger>, probe_campaign_id: impl Into<String>) -> Self {
        Self {
            started_at: Utc::now(),
            ledger,
            probe_campaign_id: probe_campaign_id.into(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        (Utc::now() - self.started_at).num_seconds().max(0) as u64
    }

    /// Probe the ledger and fold in audit pipeline counters
    pub async fn get_health(&self, audit: Option<AuditStats>) -> HealthResponse {
        let mut components = Vec::with_capacity(2);

        let ledger = match self.ledger.get(&self.probe_campaign_id).await {
            Ok(_) => ComponentHealth {
                name: "ledger".to_string(),
                status: HealthStatus::Healthy,
                message: None,
            },
            // The store answers; the default campaign is simply not registered
            Err(DspError::NotFound(id)) => ComponentHealth {
                name: "ledger".to_string(),
                status: HealthStatus::Degraded,
                message: Some(format!("default campaign {id} not registered")),
            },
            Err(e) => ComponentHealth {
                name: "ledger".to_string(),
                status: HealthStatus::Unhealthy,
                message: Some(e.to_string()),
            },
        };
        components.push(ledger);

        if let Some(stats) = audit {
            let lossy = stats.dropped > 0 || stats.failed > 0;
            components.push(ComponentHealth {
                name: "audit".to_string(),
                status: if lossy {
                    HealthStatus::Degraded
                } else {
                    HealthStatus::Healthy
                },
                message: lossy.then(|| {
                    format!("{} dropped, {} failed", stats.dropped, stats.failed)
                }),
            });
        }

        let status = components
            .iter()
            .fold(HealthStatus::Healthy, |acc, c| acc.worst(c.status));

        HealthResponse {
            status,
            timestamp: Utc::now(),
            uptime_seconds: self.uptime_seconds(),
            components,
        }
    }
}
