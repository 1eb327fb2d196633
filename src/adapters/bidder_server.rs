//! HTTP surface of the bidder
//!
//! `POST /openrtb` answers auctions, `POST /win` settles spend, and the
//! `GET` routes expose health, Prometheus metrics and a JSON snapshot.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use super::openrtb::{audit_record, build_bid_response, to_opportunity, BidRequest};
use crate::audit::{AuditLogger, AuditStats};
use crate::engine::DecisionEngine;
use crate::error::{DspError, Result};
use crate::ledger::{CampaignLedger, SpendReceipt};
use crate::services::{HealthState, HealthStatus, Metrics, MetricsSnapshot};
use crate::validation::validate_win_price;

/// Shared state for bidder handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DecisionEngine>,
    pub metrics: Arc<Metrics>,
    pub audit: Option<Arc<AuditLogger>>,
    pub health: Arc<HealthState>,
    pub seat_id: String,
    pub default_campaign_id: String,
    /// Upper bound on one decision; a shorter `tmax` from the exchange wins
    pub decision_timeout: Duration,
}

impl AppState {
    pub fn new(
        engine: Arc<DecisionEngine>,
        seat_id: impl Into<String>,
        default_campaign_id: impl Into<String>,
        decision_timeout: Duration,
    ) -> Self {
        let default_campaign_id = default_campaign_id.into();
        let health = HealthState::new(Arc::clone(engine.ledger()), default_campaign_id.clone());
        Self {
            engine,
            metrics: Arc::new(Metrics::new()),
            audit: None,
            health: Arc::new(health),
            seat_id: seat_id.into(),
            default_campaign_id,
            decision_timeout,
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    fn audit_stats(&self) -> Option<AuditStats> {
        self.audit.as_ref().map(|a| a.stats())
    }

    fn budget_for(&self, req: &BidRequest) -> Duration {
        match req.tmax {
            Some(ms) if ms > 0 => self.decision_timeout.min(Duration::from_millis(ms)),
            _ => self.decision_timeout,
        }
    }
}

/// Win notice posted by the exchange or an ad server
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WinNotice {
    #[serde(default)]
    pub auction_id: Option<String>,
    #[serde(default)]
    pub campaign_id: Option<String>,
    /// Clearing price in CPM
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub metrics: MetricsSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditStats>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/openrtb", post(openrtb_handler))
        .route("/win", post(win_handler))
        .route("/healthz", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/stats", get(stats_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve until ctrl-c, then drain the audit queue
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let audit = state.audit.clone();
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("bidder listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(audit) = audit {
        audit.shutdown().await;
    }
    info!("bidder stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// POST /openrtb
async fn openrtb_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let start = Instant::now();

    let req: BidRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => return reject_malformed(&state, start, DspError::from(e)),
    };

    let opp = match to_opportunity(&req) {
        Ok(Some(opp)) => opp,
        Ok(None) => {
            state.metrics.inc_auctions();
            state.metrics.observe_latency(start.elapsed());
            debug!(auction_id = %req.id, "no impressions");
            return StatusCode::NO_CONTENT.into_response();
        }
        Err(e) => return reject_malformed(&state, start, e),
    };

    let decision = state
        .engine
        .decide_fail_safe(
            &state.default_campaign_id,
            &opp,
            state.budget_for(&req),
            &state.metrics,
        )
        .await;

    if let Some(audit) = &state.audit {
        audit.log(audit_record(&req, &opp, &state.seat_id).with_decision(&decision));
    }

    match build_bid_response(&req, &decision, &state.seat_id) {
        Some(resp) => {
            debug!(
                auction_id = %req.id,
                bid_cpm = %decision.bid_cpm,
                latency_us = start.elapsed().as_micros() as u64,
                "bid"
            );
            (StatusCode::OK, Json(resp)).into_response()
        }
        None => {
            debug!(auction_id = %req.id, reason = %decision.reason, "no bid");
            StatusCode::NO_CONTENT.into_response()
        }
    }
}

fn reject_malformed(state: &AppState, start: Instant, err: DspError) -> Response {
    state.metrics.inc_auctions();
    state.metrics.inc_errors();
    state.metrics.observe_latency(start.elapsed());
    warn!(kind = err.kind(), error = %err, "rejected bid request");
    (StatusCode::BAD_REQUEST, err.to_string()).into_response()
}

/// POST /win
///
/// Settles the clearing price against the campaign before replying.
async fn win_handler(
    State(state): State<AppState>,
    Json(notice): Json<WinNotice>,
) -> std::result::Result<Json<SpendReceipt>, (StatusCode, String)> {
    validate_win_price(notice.price).map_err(into_status)?;

    let campaign_id = notice
        .campaign_id
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(&state.default_campaign_id);
    let cost = notice.price / dec!(1000);

    let receipt = state
        .engine
        .ledger()
        .apply_spend(campaign_id, cost)
        .await
        .map_err(into_status)?;

    info!(
        auction_id = notice.auction_id.as_deref().unwrap_or("-"),
        campaign_id,
        price_cpm = %notice.price,
        applied = %receipt.applied,
        "win settled"
    );
    Ok(Json(receipt))
}

fn into_status(err: DspError) -> (StatusCode, String) {
    let status = match &err {
        DspError::NotFound(_) => StatusCode::NOT_FOUND,
        DspError::MalformedInput(_) | DspError::InvalidSpend(_) | DspError::Json(_) => {
            StatusCode::BAD_REQUEST
        }
        e if e.is_store_failure() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(kind = err.kind(), error = %err, "win settlement failed");
    }
    (status, err.to_string())
}

/// GET /healthz
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let health = state.health.get_health(state.audit_stats()).await;
    let status_code = match health.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(health))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let body = state.metrics.prometheus(state.audit_stats().as_ref());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// GET /stats
async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        metrics: state.metrics.snapshot(),
        audit: state.audit_stats(),
    })
}
