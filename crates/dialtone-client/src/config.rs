//! Contact sync configuration loaded from environment variables.
//!
//! All settings have defaults so a host can start with zero configuration.

use std::time::Duration;

use dialtone_shared::constants::{
    DEFAULT_COUNTRY_CODE, DEFAULT_DIRECTORY_BATCH_SIZE, DEFAULT_STALENESS_SECS,
};

use crate::retry::{Backoff, RetryPolicy};

/// Contact sync configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Calling code prepended to bare local numbers.
    /// Env: `DIALTONE_DEFAULT_COUNTRY_CODE`
    /// Default: `973`
    pub default_country_code: String,

    /// Snapshots younger than this are served without re-syncing.
    /// Env: `DIALTONE_CONTACT_STALENESS_SECS`
    /// Default: 300 seconds
    pub staleness_threshold: Duration,

    /// Maximum phone numbers per directory query.
    /// Env: `DIALTONE_DIRECTORY_BATCH_SIZE`
    /// Default: `10`
    pub directory_batch_size: usize,

    /// Retry applied to each directory batch.
    /// Env: `DIALTONE_DIRECTORY_MAX_ATTEMPTS`, `DIALTONE_DIRECTORY_RETRY_DELAY_MS`
    /// Default: 2 attempts, 250 ms exponential backoff
    pub directory_retry: RetryPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            default_country_code: DEFAULT_COUNTRY_CODE.to_string(),
            staleness_threshold: Duration::from_secs(DEFAULT_STALENESS_SECS),
            directory_batch_size: DEFAULT_DIRECTORY_BATCH_SIZE,
            directory_retry: RetryPolicy::default(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SyncConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(code) = lookup("DIALTONE_DEFAULT_COUNTRY_CODE") {
            match parse_country_code(&code) {
                Ok(code) => config.default_country_code = code,
                Err(e) => {
                    tracing::warn!(
                        value = %code,
                        error = %e,
                        "Invalid DIALTONE_DEFAULT_COUNTRY_CODE, using default"
                    );
                }
            }
        }

        if let Some(val) = lookup("DIALTONE_CONTACT_STALENESS_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.staleness_threshold = Duration::from_secs(secs);
            } else {
                tracing::warn!(value = %val, "Invalid DIALTONE_CONTACT_STALENESS_SECS, using default");
            }
        }

        if let Some(val) = lookup("DIALTONE_DIRECTORY_BATCH_SIZE") {
            match val.parse::<usize>() {
                Ok(n) => config.directory_batch_size = n.max(1),
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid DIALTONE_DIRECTORY_BATCH_SIZE, using default");
                }
            }
        }

        if let Some(val) = lookup("DIALTONE_DIRECTORY_MAX_ATTEMPTS") {
            if let Ok(n) = val.parse::<u32>() {
                config.directory_retry.max_attempts = n.max(1);
            }
        }

        if let Some(val) = lookup("DIALTONE_DIRECTORY_RETRY_DELAY_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                config.directory_retry.base_delay = Duration::from_millis(ms);
                config.directory_retry.backoff = Backoff::Exponential;
            }
        }

        config
    }
}

/// Accept `973`, `+973` or `00973`; calling codes are 1-3 digits.
fn parse_country_code(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim();
    let code = trimmed
        .strip_prefix('+')
        .or_else(|| trimmed.strip_prefix("00"))
        .unwrap_or(trimmed);

    if code.is_empty() || code.len() > 3 {
        return Err(format!("expected 1-3 digits, got {}", code.len()));
    }
    if !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("non-digit in calling code: {code}"));
    }
    if code.starts_with('0') {
        return Err("calling codes never start with 0".to_string());
    }
    Ok(code.to_string())
}
