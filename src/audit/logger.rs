use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::sink::{AuditSink, HttpSink, JsonLinesSink, TracingSink};
use super::AuditRecord;
use crate::config::{AuditConfig, AuditSinkKind};
use crate::error::{DspError, Result};

const HTTP_SINK_TIMEOUT: Duration = Duration::from_secs(2);

/// Delivery counters of the audit pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AuditStats {
    pub enqueued: u64,
    pub delivered: u64,
    /// Rejected at enqueue time (queue full or closed)
    pub dropped: u64,
    /// Accepted but the sink returned an error
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

/// Bounded queue drained by a fixed pool of delivery workers.
///
/// `log` never waits: when the queue is full the record is dropped and
/// counted.
pub struct AuditLogger {
    tx: RwLock<Option<mpsc::Sender<AuditRecord>>>,
    workers: StdMutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
    sink_name: String,
}

impl AuditLogger {
    /// Spawn `workers` delivery tasks on the current runtime
    pub fn start(sink: Arc<dyn AuditSink>, capacity: usize, workers: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));
        let counters = Arc::new(Counters::default());
        let sink_name = sink.name().to_string();

        let handles = (0..workers.max(1))
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    Arc::clone(&rx),
                    Arc::clone(&sink),
                    Arc::clone(&counters),
                ))
            })
            .collect();

        info!(sink = %sink_name, capacity, workers, "audit logger started");

        Self {
            tx: RwLock::new(Some(tx)),
            workers: StdMutex::new(handles),
            counters,
            sink_name,
        }
    }

    /// Build the configured pipeline, or `None` when auditing is disabled
    pub async fn from_config(config: &AuditConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }

        let sink: Arc<dyn AuditSink> = match config.sink {
            AuditSinkKind::Tracing => Arc::new(TracingSink),
            AuditSinkKind::File => Arc::new(JsonLinesSink::open(&config.file_path).await?),
            AuditSinkKind::Http => {
                let endpoint = config.http_endpoint.as_deref().ok_or_else(|| {
                    DspError::InvalidConfig("audit.http_endpoint is required for the http sink".into())
                })?;
                Arc::new(HttpSink::new(endpoint, HTTP_SINK_TIMEOUT)?)
            }
        };

        Ok(Some(Self::start(sink, config.queue_capacity, config.workers)))
    }

    /// Enqueue without waiting. Returns false when the record was dropped.
    pub fn log(&self, record: AuditRecord) -> bool {
        let guard = match self.tx.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let Some(tx) = guard.as_ref() else {
            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        match tx.try_send(record) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(mpsc::error::TrySendError::Full(rec)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(auction_id = %rec.auction_id, "audit queue full, record dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.counters.failed.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> AuditStats {
        AuditStats {
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    pub fn sink_name(&self) -> &str {
        &self.sink_name
    }

    /// Close the queue, let workers drain what is already queued, and wait
    /// for them. Records logged afterwards are dropped.
    pub async fn shutdown(&self) {
        {
            let mut tx = match self.tx.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            tx.take();
        }

        let handles: Vec<_> = match self.workers.lock() {
            Ok(mut guard) => guard.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        };
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "audit worker ended abnormally");
            }
        }

        let stats = self.stats();
        info!(
            delivered = stats.delivered,
            dropped = stats.dropped,
            failed = stats.failed,
            "audit logger stopped"
        );
    }
}

async fn run_worker(
    worker: usize,
    rx: Arc<Mutex<mpsc::Receiver<AuditRecord>>>,
    sink: Arc<dyn AuditSink>,
    counters: Arc<Counters>,
) {
    loop {
        // Only the wait for the next record is serialised; delivery runs in parallel
        let next = { rx.lock().await.recv().await };
        let Some(record) = next else {
            break;
        };

        match sink.deliver(&record).await {
            Ok(()) => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                counters.failed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    worker,
                    sink = sink.name(),
                    auction_id = %record.auction_id,
                    error = %e,
                    "audit delivery failed"
                );
            }
        }
    }
    debug!(worker, "audit worker exiting");
}
