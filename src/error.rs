use thiserror::Error;

/// Main error type for the bidder
#[derive(Error, Debug)]
pub enum DspError {
    // Ledger errors
    #[error("Campaign not found: {0}")]
    NotFound(String),

    #[error("Campaign store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid spend: {0}")]
    InvalidSpend(String),

    // Input errors
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    // Strategy errors (programmer-error class, never business outcomes)
    #[error("Strategy failure: {0}")]
    Strategy(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl DspError {
    /// Taxonomy label used in logs and counters
    pub fn kind(&self) -> &'static str {
        match self {
            DspError::NotFound(_) => "not_found",
            DspError::StoreUnavailable(_) | DspError::Database(_) => "store_unavailable",
            DspError::InvalidSpend(_) => "invalid_spend",
            DspError::MalformedInput(_) | DspError::Json(_) => "malformed_input",
            DspError::Strategy(_) => "strategy",
            DspError::Config(_) | DspError::InvalidConfig(_) => "config",
            DspError::Http(_) => "http",
            DspError::Io(_) => "io",
            DspError::Internal(_) | DspError::Other(_) => "internal",
        }
    }

    /// Whether the failure came from the ledger backing store
    pub fn is_store_failure(&self) -> bool {
        matches!(self, DspError::StoreUnavailable(_) | DspError::Database(_))
    }
}

/// Result type alias for DspError
pub type Result<T> = std::result::Result<T, DspError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_follow_taxonomy() {
        assert_eq!(DspError::NotFound("c1".into()).kind(), "not_found");
        assert_eq!(
            DspError::StoreUnavailable("timeout".into()).kind(),
            "store_unavailable"
        );
        assert_eq!(
            DspError::MalformedInput("no id".into()).kind(),
            "malformed_input"
        );
        assert_eq!(DspError::Strategy("nan".into()).kind(), "strategy");
    }

    #[test]
    fn store_failures_are_recognised() {
        assert!(DspError::StoreUnavailable("down".into()).is_store_failure());
        assert!(!DspError::NotFound("c1".into()).is_store_failure());
    }

    #[test]
    fn display_includes_campaign() {
        let msg = DspError::NotFound("summer-sale".into()).to_string();
        assert!(msg.contains("summer-sale"), "got: {msg}");
    }
}
