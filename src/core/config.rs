use serde::{Deserialize, Serialize};

use crate::{
    DEFAULT_PAGE_SIZE, DEFAULT_STEP_MAX_ATTEMPTS, DEFAULT_STEP_RETRY_DELAY_SECS,
    DEFAULT_STORE_PORT,
};

/// Runtime configuration for the erasure engine.
///
/// Everything can be overridden from the environment (`LETHE_*` variables);
/// defaults target a local development stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LetheConfig {
    pub store_host: String,
    pub store_port: u16,
    pub store_api_key: Option<String>,

    pub backup_url: String,
    pub backup_folder: String,

    pub notify_url: Option<String>,

    pub page_size: usize,

    pub step_max_attempts: u32,
    pub step_retry_delay_secs: u64,

    pub poll_interval_secs: u64,
}

impl LetheConfig {
    pub fn new(store_host: &str, store_port: u16) -> Self {
        Self {
            store_host: store_host.to_string(),
            store_port,
            store_api_key: None,

            backup_url: "http://localhost:10000/backups".to_string(),
            backup_folder: "user-data".to_string(),

            notify_url: None,

            page_size: DEFAULT_PAGE_SIZE,

            step_max_attempts: DEFAULT_STEP_MAX_ATTEMPTS,
            step_retry_delay_secs: DEFAULT_STEP_RETRY_DELAY_SECS,

            poll_interval_secs: 30,
        }
    }

    /// Base URL of the primary record store.
    pub fn store_url(&self) -> String {
        format!("http://{}:{}", self.store_host, self.store_port)
    }

    pub fn from_env() -> Self {
        let mut config = Self::new(
            &std::env::var("LETHE_STORE_HOST").unwrap_or_else(|_| "localhost".to_string()),
            std::env::var("LETHE_STORE_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_STORE_PORT),
        );

        if let Ok(key) = std::env::var("LETHE_STORE_API_KEY") {
            config.store_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("LETHE_BACKUP_URL") {
            config.backup_url = url;
        }
        if let Ok(folder) = std::env::var("LETHE_BACKUP_FOLDER") {
            config.backup_folder = folder;
        }
        if let Ok(url) = std::env::var("LETHE_NOTIFY_URL") {
            config.notify_url = Some(url);
        }
        if let Ok(size) = std::env::var("LETHE_PAGE_SIZE") {
            if let Ok(size) = size.parse() {
                config.page_size = size;
            }
        }
        if let Ok(attempts) = std::env::var("LETHE_STEP_MAX_ATTEMPTS") {
            if let Ok(attempts) = attempts.parse() {
                config.step_max_attempts = attempts;
            }
        }
        if let Ok(delay) = std::env::var("LETHE_STEP_RETRY_DELAY_SECS") {
            if let Ok(delay) = delay.parse() {
                config.step_retry_delay_secs = delay;
            }
        }
        if let Ok(interval) = std::env::var("LETHE_POLL_INTERVAL_SECS") {
            if let Ok(interval) = interval.parse() {
                config.poll_interval_secs = interval;
            }
        }

        config
    }
}

impl Default for LetheConfig {
    fn default() -> Self {
        Self::new("localhost", DEFAULT_STORE_PORT)
    }
}
