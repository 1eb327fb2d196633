//! Audit record destinations

use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::AuditRecord;
use crate::error::{DspError, Result};

/// Somewhere an audit record can be delivered to.
///
/// Called from the logger's worker tasks, never from the request path.
#[async_trait]
pub trait AuditSink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, record: &AuditRecord) -> Result<()>;
}

/// Emits each record as a JSON event on the `audit` tracing target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl AuditSink for TracingSink {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn deliver(&self, record: &AuditRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        info!(target: "audit", auction_id = %record.auction_id, "{}", line);
        Ok(())
    }
}

/// Appends one JSON object per line to a local file
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesSink {
    /// Open (or create) the file for appending, creating parent directories
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        info!(path = %path.display(), "audit file sink opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditSink for JsonLinesSink {
    fn name(&self) -> &str {
        "file"
    }

    async fn deliver(&self, record: &AuditRecord) -> Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        // Whole-line writes under the lock keep concurrent workers from interleaving
        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

/// POSTs each record as JSON to a collector endpoint
#[derive(Clone)]
pub struct HttpSink {
    client: Client,
    endpoint: String,
}

impl HttpSink {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl AuditSink for HttpSink {
    fn name(&self) -> &str {
        "http"
    }

    async fn deliver(&self, record: &AuditRecord) -> Result<()> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header("x-partition-key", record.partition_key())
            .json(record)
            .send()
            .await?;

        if resp.status().is_success() {
            debug!(auction_id = %record.auction_id, "audit record posted");
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(DspError::Internal(format!(
                "audit collector returned {}: {}",
                status, body
            )))
        }
    }
}
