use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::domain::CampaignState;
use crate::error::{DspError, Result};
use crate::strategy::ValueParams;
use crate::validation::validate_campaign;

/// Seat id used when none is configured
pub const PLACEHOLDER_SEAT_ID: &str = "1234";

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP port the bidder listens on
    #[serde(default = "default_port")]
    pub port: u16,
    /// Buyer seat we bid as
    #[serde(default = "default_seat_id")]
    pub seat_id: String,
    /// Campaign served by this bidder instance
    #[serde(default = "default_campaign_id")]
    pub default_campaign_id: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub log_json: bool,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub simulation: SimulationSettings,
}

fn default_port() -> u16 {
    8080
}

fn default_seat_id() -> String {
    PLACEHOLDER_SEAT_ID.to_string()
}

fn default_campaign_id() -> String {
    "default".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Per-decision deadline; RTB exchanges expect well under 100ms end to end
    pub decision_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decision_timeout_ms: 80,
        }
    }
}

impl EngineConfig {
    pub fn decision_timeout(&self) -> Duration {
        Duration::from_millis(self.decision_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Default strategy (simple_value | paced_value)
    pub kind: String,
    /// Assumed conversion rate per impression
    pub conversion_rate: Decimal,
    /// Margin applied to expected value (e.g., 0.7 = pay 70%)
    pub margin: Decimal,
    pub creative_id: String,
    pub advertiser_domain: String,
    /// Optional experiment variant served to a traffic slice
    pub experiment_kind: Option<String>,
    /// Percentage of traffic slices routed to the experiment (0-100)
    pub experiment_share_pct: u8,
    /// campaign id -> strategy kind
    pub campaign_overrides: HashMap<String, String>,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        let params = ValueParams::default();
        Self {
            kind: "simple_value".to_string(),
            conversion_rate: params.conversion_rate,
            margin: params.margin,
            creative_id: params.creative_id,
            advertiser_domain: params.advertiser_domain,
            experiment_kind: None,
            experiment_share_pct: 0,
            campaign_overrides: HashMap::new(),
        }
    }
}

impl StrategyConfig {
    pub fn value_params(&self) -> ValueParams {
        ValueParams {
            conversion_rate: self.conversion_rate,
            margin: self.margin,
            creative_id: self.creative_id.clone(),
            advertiser_domain: self.advertiser_domain.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    /// PostgreSQL connection URL (postgres backend only)
    pub database_url: Option<String>,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Campaigns loaded at startup
    pub campaigns: Vec<CampaignState>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            backend: LedgerBackend::Memory,
            database_url: None,
            max_connections: 5,
            campaigns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSinkKind {
    #[default]
    Tracing,
    File,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub sink: AuditSinkKind,
    /// Bounded queue size; records beyond it are dropped
    pub queue_capacity: usize,
    /// Background delivery workers
    pub workers: usize,
    /// JSON lines file (file sink)
    pub file_path: PathBuf,
    /// Collector endpoint (http sink)
    pub http_endpoint: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sink: AuditSinkKind::Tracing,
            queue_capacity: 10_000,
            workers: 2,
            file_path: PathBuf::from("audit/bid_requests.jsonl"),
            http_endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    pub seed: u64,
    pub auctions: usize,
    pub concurrency: usize,
    /// Click-through rate per won impression
    pub ctr_baseline: f64,
    /// Conversion rate per click
    pub cvr_baseline: f64,
    /// Campaign used when the ledger has none configured
    pub daily_budget: Decimal,
    pub lifetime_budget: Decimal,
    pub target_cpa: Decimal,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            auctions: 10_000,
            concurrency: 1,
            ctr_baseline: 0.02,
            cvr_baseline: 0.05,
            daily_budget: dec!(100),
            lifetime_budget: dec!(3000),
            target_cpa: dec!(20),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> std::result::Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("port", 8080)?
            .set_default("seat_id", PLACEHOLDER_SEAT_ID)?
            .set_default("default_campaign_id", "default")?
            .set_default("log_level", "info")?
            .set_default("log_json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("BIDDER_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (BIDDER_PORT, BIDDER_AUDIT__WORKERS, etc.)
            .add_source(
                Environment::with_prefix("BIDDER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Warn about settings left at values that only make sense in development
    pub fn warn_placeholders(&self) {
        if self.seat_id == PLACEHOLDER_SEAT_ID {
            warn!(
                "BIDDER_SEAT_ID not set, using placeholder '{}'",
                PLACEHOLDER_SEAT_ID
            );
        }
    }

    /// Reject values that would make the bidder misbehave at runtime
    pub fn validate(&self) -> Result<()> {
        if self.seat_id.trim().is_empty() {
            return Err(DspError::InvalidConfig("seat_id cannot be empty".into()));
        }
        if self.default_campaign_id.trim().is_empty() {
            return Err(DspError::InvalidConfig(
                "default_campaign_id cannot be empty".into(),
            ));
        }
        if self.engine.decision_timeout_ms == 0 {
            return Err(DspError::InvalidConfig(
                "engine.decision_timeout_ms must be positive".into(),
            ));
        }

        let s = &self.strategy;
        if s.conversion_rate <= Decimal::ZERO || s.conversion_rate > Decimal::ONE {
            return Err(DspError::InvalidConfig(format!(
                "strategy.conversion_rate must be in (0, 1], got {}",
                s.conversion_rate
            )));
        }
        if s.margin <= Decimal::ZERO || s.margin > Decimal::ONE {
            return Err(DspError::InvalidConfig(format!(
                "strategy.margin must be in (0, 1], got {}",
                s.margin
            )));
        }
        if s.experiment_share_pct > 100 {
            return Err(DspError::InvalidConfig(format!(
                "strategy.experiment_share_pct must be at most 100, got {}",
                s.experiment_share_pct
            )));
        }

        if self.ledger.backend == LedgerBackend::Postgres && self.ledger.database_url.is_none() {
            return Err(DspError::InvalidConfig(
                "ledger.database_url is required for the postgres backend".into(),
            ));
        }
        for campaign in &self.ledger.campaigns {
            validate_campaign(campaign)?;
        }

        if self.audit.enabled {
            if self.audit.queue_capacity == 0 {
                return Err(DspError::InvalidConfig(
                    "audit.queue_capacity must be positive".into(),
                ));
            }
            if self.audit.workers == 0 {
                return Err(DspError::InvalidConfig(
                    "audit.workers must be positive".into(),
                ));
            }
            if self.audit.sink == AuditSinkKind::Http && self.audit.http_endpoint.is_none() {
                return Err(DspError::InvalidConfig(
                    "audit.http_endpoint is required for the http sink".into(),
                ));
            }
        }

        let sim = &self.simulation;
        if !(0.0..=1.0).contains(&sim.ctr_baseline) || !(0.0..=1.0).contains(&sim.cvr_baseline) {
            return Err(DspError::InvalidConfig(
                "simulation ctr/cvr baselines must be within [0, 1]".into(),
            ));
        }

        Ok(())
    }

    /// Campaign seeded into an empty in-memory ledger
    pub fn fallback_campaign(&self) -> CampaignState {
        CampaignState::new(
            self.default_campaign_id.as_str(),
            self.simulation.daily_budget,
            self.simulation.lifetime_budget,
        )
        .with_target_cpa(self.simulation.target_cpa)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            seat_id: default_seat_id(),
            default_campaign_id: default_campaign_id(),
            log_level: default_log_level(),
            log_json: false,
            engine: EngineConfig::default(),
            strategy: StrategyConfig::default(),
            ledger: LedgerConfig::default(),
            audit: AuditConfig::default(),
            simulation: SimulationSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Mutex, MutexGuard};

    // Tests that load from the environment must not interleave
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_guard() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn temp_config_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("qc-dsp-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.seat_id, PLACEHOLDER_SEAT_ID);
        assert_eq!(config.default_campaign_id, "default");
        assert_eq!(config.engine.decision_timeout(), Duration::from_millis(80));
        config.validate().expect("defaults should validate");
    }

    #[test]
    fn load_from_missing_dir_uses_defaults() {
        let dir = temp_config_dir().join("absent");
        let _env = env_guard();
        let config = AppConfig::load_from(&dir).expect("defaults should load");
        assert_eq!(config.strategy.kind, "simple_value");
        assert_eq!(config.strategy.margin, dec!(0.7));
        assert_eq!(config.ledger.backend, LedgerBackend::Memory);
    }

    #[test]
    fn load_from_reads_default_toml() {
        let dir = temp_config_dir();
        std::fs::write(
            dir.join("default.toml"),
            r#"
seat_id = "seat-77"
default_campaign_id = "spring"

[engine]
decision_timeout_ms = 40

[strategy]
kind = "paced_value"
experiment_kind = "simple_value"
experiment_share_pct = 10

[audit]
enabled = true
sink = "file"
workers = 4

[[ledger.campaigns]]
id = "spring"
daily_budget = 25
lifetime_budget = 500
target_cpa = 12.5
allowed_geos = ["US"]
"#,
        )
        .unwrap();

        let _env = env_guard();
        let config = AppConfig::load_from(&dir).expect("config should load");
        assert_eq!(config.seat_id, "seat-77");
        assert_eq!(config.default_campaign_id, "spring");
        assert_eq!(config.engine.decision_timeout_ms, 40);
        assert_eq!(config.strategy.kind, "paced_value");
        assert_eq!(config.strategy.experiment_share_pct, 10);
        assert_eq!(config.audit.sink, AuditSinkKind::File);
        assert_eq!(config.audit.workers, 4);
        assert_eq!(config.ledger.campaigns.len(), 1);
        assert_eq!(config.ledger.campaigns[0].target_cpa, dec!(12.5));
        assert!(config.ledger.campaigns[0].is_active);
        config.validate().expect("file config should validate");
    }

    #[test]
    fn load_from_reads_flat_and_nested_env_vars() {
        let dir = temp_config_dir();
        let _env = env_guard();
        std::env::set_var("BIDDER_PORT", "9999");
        std::env::set_var("BIDDER_SEAT_ID", "seat-env");
        std::env::set_var("BIDDER_DEFAULT_CAMPAIGN_ID", "autumn");
        std::env::set_var("BIDDER_AUDIT__WORKERS", "7");

        let loaded = AppConfig::load_from(&dir);

        for key in [
            "BIDDER_PORT",
            "BIDDER_SEAT_ID",
            "BIDDER_DEFAULT_CAMPAIGN_ID",
            "BIDDER_AUDIT__WORKERS",
        ] {
            std::env::remove_var(key);
        }

        let config = loaded.expect("env config should load");
        assert_eq!(config.port, 9999);
        assert_eq!(config.seat_id, "seat-env");
        assert_eq!(config.default_campaign_id, "autumn");
        assert_eq!(config.audit.workers, 7);
    }

    #[test]
    fn validate_rejects_bad_margin() {
        let mut config = AppConfig::default();
        config.strategy.margin = dec!(1.5);
        assert!(matches!(config.validate(), Err(DspError::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_postgres_without_url() {
        let mut config = AppConfig::default();
        config.ledger.backend = LedgerBackend::Postgres;
        assert!(config.validate().is_err());
        config.ledger.database_url = Some("postgres://localhost/dsp".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_audit_workers_only_when_enabled() {
        let mut config = AppConfig::default();
        config.audit.workers = 0;
        assert!(config.validate().is_ok());
        config.audit.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn fallback_campaign_uses_simulation_budget() {
        let config = AppConfig::default();
        let c = config.fallback_campaign();
        assert_eq!(c.id, "default");
        assert_eq!(c.daily_budget, dec!(100));
        assert_eq!(c.target_cpa, dec!(20));
    }
}
