use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_FILTER: &str = "info,qc_dsp=debug,sqlx=warn";

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if log_level.eq_ignore_ascii_case("info") {
            EnvFilter::new(DEFAULT_FILTER)
        } else {
            EnvFilter::new(format!("{},sqlx=warn", log_level))
        }
    })
}

/// Console logging, plus a daily-rolling file when `BIDDER_LOG_DIR` is writable
pub fn init_logging(log_level: &str, json: bool) {
    let filter = env_filter(log_level);

    // `rolling::daily` panics when it cannot create the first file, so check writability first.
    let log_dir = std::env::var("BIDDER_LOG_DIR").ok();
    let file_layer = log_dir.as_deref().and_then(|dir| {
        let writable = std::fs::create_dir_all(dir).is_ok() && {
            let probe = std::path::Path::new(dir).join(".qc_dsp_write_test");
            let ok = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&probe)
                .is_ok();
            let _ = std::fs::remove_file(&probe);
            ok
        };
        if !writable {
            eprintln!(
                "Warning: Could not write to log directory {}, file logging disabled",
                dir
            );
            return None;
        }

        let file_appender = tracing_appender::rolling::daily(dir, "qc-dsp.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        // The process lives as long as the writer; keep the guard forever.
        Box::leak(Box::new(guard));

        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
    });

    let console_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    };

    let file_logging_enabled = file_layer.is_some();
    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let (true, Some(dir)) = (file_logging_enabled, log_dir) {
        eprintln!("Logging to: {}/qc-dsp.log", dir);
    }
}

pub fn init_logging_simple() {
    // Minimal logging for client-side commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
