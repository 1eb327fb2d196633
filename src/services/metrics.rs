use crate::audit::AuditStats;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::info;

/// Process-wide decision counters
///
/// Every field is an independent relaxed atomic. A snapshot reads them one
/// by one, so under concurrent load the fields may be skewed by a few
/// in-flight auctions relative to each other.
#[derive(Debug)]
pub struct Metrics {
    /// Auctions evaluated
    auctions: AtomicU64,
    /// Decisions that produced a bid
    bids: AtomicU64,
    /// Errors answered with a fail-safe no-bid
    errors: AtomicU64,
    /// Cumulative decision latency
    latency_micros: AtomicU64,
}

/// Point-in-time read of [`Metrics`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_auctions: u64,
    pub total_bids: u64,
    pub total_errors: u64,
    pub total_latency_micros: u64,
    pub average_latency_ms: f64,
}

impl MetricsSnapshot {
    pub fn bid_rate(&self) -> f64 {
        if self.total_auctions == 0 {
            0.0
        } else {
            self.total_bids as f64 / self.total_auctions as f64
        }
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            auctions: AtomicU64::new(0),
            bids: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            latency_micros: AtomicU64::new(0),
        }
    }

    pub fn inc_auctions(&self) {
        self.auctions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_bids(&self) {
        self.bids.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_errors(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_latency(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.latency_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_auctions = self.auctions.load(Ordering::Relaxed);
        let total_bids = self.bids.load(Ordering::Relaxed);
        let total_errors = self.errors.load(Ordering::Relaxed);
        let total_latency_micros = self.latency_micros.load(Ordering::Relaxed);

        let average_latency_ms = if total_auctions > 0 {
            total_latency_micros as f64 / total_auctions as f64 / 1000.0
        } else {
            0.0
        };

        MetricsSnapshot {
            total_auctions,
            total_bids,
            total_errors,
            total_latency_micros,
            average_latency_ms,
        }
    }

    /// Export metrics in Prometheus format
    pub fn prometheus(&self, audit: Option<&AuditStats>) -> String {
        let snap = self.snapshot();
        let mut out = format!(
            r#"# HELP qc_dsp_auctions_total Auctions evaluated
# TYPE qc_dsp_auctions_total counter
qc_dsp_auctions_total {}

# HELP qc_dsp_bids_total Auctions answered with a bid
# TYPE qc_dsp_bids_total counter
qc_dsp_bids_total {}

# HELP qc_dsp_errors_total Errors answered with a fail-safe no-bid
# TYPE qc_dsp_errors_total counter
qc_dsp_errors_total {}

# HELP qc_dsp_decision_latency_micros_total Cumulative decision latency
# TYPE qc_dsp_decision_latency_micros_total counter
qc_dsp_decision_latency_micros_total {}

# HELP qc_dsp_decision_latency_avg_ms Average decision latency
# TYPE qc_dsp_decision_latency_avg_ms gauge
qc_dsp_decision_latency_avg_ms {:.4}
"#,
            snap.total_auctions,
            snap.total_bids,
            snap.total_errors,
            snap.total_latency_micros,
            snap.average_latency_ms,
        );

        if let Some(audit) = audit {
            out.push_str(&format!(
                r#"
# HELP qc_dsp_audit_records_total Audit records by outcome
# TYPE qc_dsp_audit_records_total counter
qc_dsp_audit_records_total{{outcome="enqueued"}} {}
qc_dsp_audit_records_total{{outcome="delivered"}} {}
qc_dsp_audit_records_total{{outcome="dropped"}} {}
qc_dsp_audit_records_total{{outcome="failed"}} {}
"#,
                audit.enqueued, audit.delivered, audit.dropped, audit.failed,
            ));
        }

        out
    }

    /// Log periodic status
    pub fn log_status(&self) {
        let snap = self.snapshot();
        info!(
            auctions = snap.total_auctions,
            bids = snap.total_bids,
            errors = snap.total_errors,
            avg_latency_ms = snap.average_latency_ms,
            "decision metrics"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
