//! Configuration types for dnsbatch
//!
//! This module defines all configuration structures used throughout the crate.
//! Structures are serde-derivable so they can be embedded in a host's own
//! configuration file; [`BatchConfig::from_env`] covers the environment-only
//! setup.

use serde::{Deserialize, Serialize};
use std::env;

/// Default DNSimple API base URL
pub const DEFAULT_API_BASE: &str = "https://api.dnsimple.com/v2";

/// Main dnsbatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Remote provider credentials and endpoint
    pub provider: ProviderConfig,

    /// Call scheduling
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// SPF merge behaviour
    #[serde(default)]
    pub spf: SpfConfig,

    /// Send mutations to the provider. When false every mutation is only logged.
    #[serde(default)]
    pub commit: bool,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl BatchConfig {
    /// Create a new dry-run configuration for the given credentials
    pub fn new(api_token: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            provider: ProviderConfig::new(api_token, account_id),
            scheduler: SchedulerConfig::default(),
            spf: SpfConfig::default(),
            commit: false,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// - `DNSIMPLE_V2_TOKEN`: API token (required)
    /// - `DNSIMPLE_ACCOUNTID`: account id (required)
    /// - `DNSBATCH_API_BASE`: API base URL
    /// - `DNSBATCH_THROTTLE_MS`: minimum interval between calls
    /// - `DNSBATCH_COMMIT`: `1`/`true`/`yes` to send mutations
    /// - `DNSBATCH_SPF_EXCLUDE`: comma-separated mechanisms to strip on merge
    /// - `DNSBATCH_SPF_ERRORS_ONLY`: only report error-severity SPF diagnostics
    pub fn from_env() -> Result<Self, crate::Error> {
        let api_token = env::var("DNSIMPLE_V2_TOKEN")
            .map_err(|_| crate::Error::config("DNSIMPLE_V2_TOKEN is not set"))?;
        let account_id = env::var("DNSIMPLE_ACCOUNTID")
            .map_err(|_| crate::Error::config("DNSIMPLE_ACCOUNTID is not set"))?;

        let mut config = Self::new(api_token, account_id);

        if let Ok(base_url) = env::var("DNSBATCH_API_BASE") {
            config.provider.base_url = base_url;
        }

        if let Ok(throttle) = env::var("DNSBATCH_THROTTLE_MS") {
            config.scheduler.min_interval_ms = throttle.trim().parse().map_err(|_| {
                crate::Error::config(format!(
                    "DNSBATCH_THROTTLE_MS must be a whole number of milliseconds. Got: {}",
                    throttle
                ))
            })?;
        }

        config.commit = env::var("DNSBATCH_COMMIT")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        if let Ok(exclusions) = env::var("DNSBATCH_SPF_EXCLUDE") {
            config.spf.exclusions = split_list(&exclusions);
        }

        config.spf.errors_only = env::var("DNSBATCH_SPF_ERRORS_ONLY")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;

        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        Ok(())
    }
}

/// Remote provider configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Bearer token
    /// ⚠️ NEVER log this value
    pub api_token: String,

    /// Account the zones belong to
    pub account_id: String,

    /// API base URL, without trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl ProviderConfig {
    /// Create a provider configuration against the public API
    pub fn new(api_token: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            api_token: api_token.into(),
            account_id: account_id.into(),
            base_url: default_base_url(),
        }
    }

    /// Point the provider at a different API endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.api_token.is_empty() {
            return Err(crate::Error::config("API token cannot be empty"));
        }
        if self.account_id.is_empty() {
            return Err(crate::Error::config("Account id cannot be empty"));
        }
        if !self.base_url.starts_with("https://") && !self.base_url.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "API base URL must use HTTP or HTTPS scheme. Got: {}",
                self.base_url
            )));
        }
        Ok(())
    }
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_token", &"<REDACTED>")
            .field("account_id", &self.account_id)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Remote call scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Floor delay after every call when no rate-limit pressure is seen
    ///
    /// The default of 1500ms keeps a continuous run inside a 2400 calls/hour
    /// window. Set to 0 to only pause on pressure.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Padding added past the server's reset timestamp before resuming
    #[serde(default = "default_reset_pad_ms")]
    pub reset_pad_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            reset_pad_ms: default_reset_pad_ms(),
        }
    }
}

/// SPF merge configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpfConfig {
    /// Mechanisms stripped from every rewritten record (exact match)
    #[serde(default)]
    pub exclusions: Vec<String>,

    /// Only report error-severity validation diagnostics
    #[serde(default)]
    pub errors_only: bool,
}

fn default_base_url() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_min_interval_ms() -> u64 {
    1500
}

fn default_reset_pad_ms() -> u64 {
    60_000
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
