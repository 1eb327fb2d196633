pub mod health;
pub mod metrics;

pub use health::{ComponentHealth, HealthResponse, HealthState, HealthStatus};
pub use metrics::{Metrics, MetricsSnapshot};
