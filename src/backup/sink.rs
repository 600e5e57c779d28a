use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info};

use crate::core::error::DataFailure;

use super::artifact::ArtifactPath;

const UPLOAD_TIMEOUT_SECS: u64 = 60;

/// Durably persists one serialized snapshot before the record may be mutated.
///
/// `save` is idempotent by path: writing the same artifact twice overwrites
/// it with identical content. A failed save leaves no partially written
/// artifact observable to readers.
#[async_trait]
pub trait BackupSink: Send + Sync {
    async fn save(&self, path: &ArtifactPath, content: &Value) -> Result<(), DataFailure>;
}

/// Blob-store sink: one HTTP PUT per artifact under a base container URL.
pub struct BlobStoreSink {
    http: Client,
    base_url: String,
}

impl BlobStoreSink {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        info!("BlobStoreSink initialized (url={})", base_url);
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BackupSink for BlobStoreSink {
    async fn save(&self, path: &ArtifactPath, content: &Value) -> Result<(), DataFailure> {
        debug!("Writing backup artifact {}", path);

        let response = self
            .http
            .put(format!("{}/{}", self.base_url, path))
            .json(content)
            .send()
            .await
            .map_err(|e| DataFailure::Blob(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DataFailure::Blob(format!(
                "upload of {} returned {}: {}",
                path, status, body
            )));
        }

        debug!("Backup artifact {} written", path);
        Ok(())
    }
}
