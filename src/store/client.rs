use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum StoreClientError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Query failed: {0}")]
    Query(String),
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl StoreClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreClientError::NotFound(_))
    }
}

/// Thin HTTP client for the primary record store.
///
/// Queries are addressed by name and carry a serde-serializable parameter
/// object. Failures surface to the caller untouched: transient errors are a
/// caller-side retry concern, so this client never retries on its own.
pub struct StoreClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    is_connected: AtomicBool,
}

impl StoreClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, StoreClientError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| StoreClientError::Connection(format!("invalid base URL {}: {}", base_url, e)))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| StoreClientError::Connection(e.to_string()))?;

        info!("StoreClient created for {}", parsed);

        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            api_key,
            is_connected: AtomicBool::new(false),
        })
    }

    /// Executes a named query and deserializes the response body.
    ///
    /// A 404 from the store is reported as `NotFound` so callers can decide
    /// whether an absent document is an error in their context.
    pub async fn execute<T, P>(&self, query_name: &str, params: &P) -> Result<T, StoreClientError>
    where
        T: DeserializeOwned,
        P: Serialize + Sync,
    {
        debug!("Executing query: {}", query_name);

        let mut request = self
            .http
            .post(format!("{}/query/{}", self.base_url, query_name))
            .json(params);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                StoreClientError::Connection(e.to_string())
            } else {
                StoreClientError::Query(e.to_string())
            }
        })?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("Query {} returned not found", query_name);
            return Err(StoreClientError::NotFound(query_name.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreClientError::Query(format!(
                "{} returned {}: {}",
                query_name, status, body
            )));
        }

        if !self.is_connected.load(Ordering::Relaxed) {
            self.is_connected.store(true, Ordering::Relaxed);
        }

        let value = response.json::<T>().await?;
        debug!("Query {} succeeded", query_name);
        Ok(value)
    }

    pub async fn health_check(&self) -> Result<(), StoreClientError> {
        match self
            .execute::<serde_json::Value, _>("health", &serde_json::json!({}))
            .await
        {
            Ok(_) => Ok(()),
            // A store without a health query is still alive if it answered.
            Err(StoreClientError::NotFound(_)) => {
                info!("Health check passed (store alive, no health query)");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::Relaxed)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = StoreClient::new("http://localhost:8083", None);
        assert!(client.is_ok());
    }

    #[test]
    fn test_client_rejects_invalid_url() {
        let client = StoreClient::new("not a url", None);
        assert!(matches!(client, Err(StoreClientError::Connection(_))));
    }

    #[test]
    fn test_not_found_detection() {
        let err = StoreClientError::NotFound("getProfile".to_string());
        assert!(err.is_not_found());
        assert!(!StoreClientError::Query("boom".to_string()).is_not_found());
    }
}
