//! Configuration management for the diagnostic widget

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Environment variables consulted for the backend base URL, highest priority first
pub const BASE_URL_VARS: [&str; 3] = ["BACKEND_URL", "VITE_BACKEND_URL", "NEXT_PUBLIC_BACKEND_URL"];

/// Default per-probe timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(8000);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend base URL without trailing slashes; `None` when not configured
    base_url: Option<String>,

    /// Origin the widget reports itself as running from
    pub origin: String,

    /// Timeout applied to every probe
    pub timeout: Duration,

    /// Issue all probes at once instead of one after another
    pub concurrent: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: None,
            origin: "cli://localhost".to_string(),
            timeout: DEFAULT_TIMEOUT,
            concurrent: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        let base_url = BASE_URL_VARS
            .iter()
            .filter_map(|key| lookup(*key))
            .find(|value| !value.trim().is_empty());
        if let Some(base_url) = base_url {
            config = config.with_base_url(&base_url);
        }

        if let Some(origin) = lookup("DRWEB_ORIGIN") {
            config.origin = origin;
        } else if let Some(hostname) = lookup("HOSTNAME") {
            config.origin = format!("cli://{}", hostname);
        }

        if let Some(timeout) = lookup("DRWEB_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse::<u64>() {
                config.timeout = Duration::from_millis(ms);
            }
        }

        if let Some(concurrent) = lookup("DRWEB_CONCURRENT") {
            config.concurrent = concurrent.to_lowercase() == "true";
        }

        config
    }

    /// Set the backend base URL, stripping trailing slashes
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let trimmed = base_url.trim().trim_end_matches('/');
        self.base_url = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout.is_zero() {
            return Err("timeout must be greater than 0".to_string());
        }

        if self.origin.is_empty() {
            return Err("origin cannot be empty".to_string());
        }

        if let Some(base_url) = &self.base_url {
            let url = Url::parse(base_url)
                .map_err(|e| format!("invalid backend URL {}: {}", base_url, e))?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(format!("backend URL must use http or https, got {}", url.scheme()));
            }
        }

        Ok(())
    }
}
