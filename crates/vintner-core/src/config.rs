//! Client configuration.
//!
//! [`ClientConfig`] is built by the caller and handed to the client constructor. Defaults
//! match the host's published limits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::{Backoff, RetryConfig};
use crate::ValidationError;

pub const DEFAULT_BASE_URL: &str = "https://api.stlouisfed.org/fred/";

/// Largest number of vintage-date columns the host accepts per observations request.
pub const MAX_VINTAGE_CHUNK_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Attempts per logical request, including the first.
    pub max_download_retries: u32,
    pub max_concurrent_downloads: usize,
    /// Delay after a failed attempt before retrying.
    pub error_delay_ms: u64,
    pub max_requests_per_minute: u32,
    /// Length of the rolling request window. One minute against the live host.
    pub rate_window_ms: u64,
    pub vintage_chunk_size: usize,
    pub vintage_date_page_size: usize,
    /// Page size for generic paginated endpoints.
    pub page_size: usize,
    pub request_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::from(DEFAULT_BASE_URL),
            api_key: None,
            max_download_retries: 4,
            max_concurrent_downloads: 2,
            error_delay_ms: 2_000,
            max_requests_per_minute: 120,
            rate_window_ms: 60_000,
            vintage_chunk_size: MAX_VINTAGE_CHUNK_SIZE,
            vintage_date_page_size: 10_000,
            page_size: 1_000,
            request_timeout_ms: 30_000,
        }
    }
}

impl ClientConfig {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Defaults overlaid with `VINTNER_*` environment variables.
    ///
    /// Unparseable numeric values are ignored and keep their default.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(base_url) = lookup("VINTNER_BASE_URL") {
            config.base_url = base_url;
        }
        config.api_key = lookup("VINTNER_FRED_API_KEY").filter(|key| !key.trim().is_empty());

        overlay(&lookup, "VINTNER_MAX_DOWNLOAD_RETRIES", &mut config.max_download_retries);
        overlay(&lookup, "VINTNER_MAX_CONCURRENT_DOWNLOADS", &mut config.max_concurrent_downloads);
        overlay(&lookup, "VINTNER_ERROR_DELAY_MS", &mut config.error_delay_ms);
        overlay(&lookup, "VINTNER_MAX_REQUESTS_PER_MINUTE", &mut config.max_requests_per_minute);
        overlay(&lookup, "VINTNER_RATE_WINDOW_MS", &mut config.rate_window_ms);
        overlay(&lookup, "VINTNER_VINTAGE_CHUNK_SIZE", &mut config.vintage_chunk_size);
        overlay(&lookup, "VINTNER_VINTAGE_DATE_PAGE_SIZE", &mut config.vintage_date_page_size);
        overlay(&lookup, "VINTNER_PAGE_SIZE", &mut config.page_size);
        overlay(&lookup, "VINTNER_REQUEST_TIMEOUT_MS", &mut config.request_timeout_ms);

        config
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.base_url.trim().is_empty() {
            return Err(ValidationError::EmptyBaseUrl);
        }

        let limits = [
            ("max_download_retries", self.max_download_retries as usize),
            ("max_concurrent_downloads", self.max_concurrent_downloads),
            ("max_requests_per_minute", self.max_requests_per_minute as usize),
            ("rate_window_ms", self.rate_window_ms as usize),
            ("vintage_chunk_size", self.vintage_chunk_size),
            ("vintage_date_page_size", self.vintage_date_page_size),
            ("page_size", self.page_size),
        ];
        if let Some((field, _)) = limits.into_iter().find(|(_, value)| *value == 0) {
            return Err(ValidationError::ZeroLimit { field });
        }

        if self.vintage_chunk_size > MAX_VINTAGE_CHUNK_SIZE {
            return Err(ValidationError::ChunkTooLarge {
                size: self.vintage_chunk_size,
                max: MAX_VINTAGE_CHUNK_SIZE,
            });
        }

        Ok(())
    }

    pub fn rate_window(&self) -> Duration {
        Duration::from_millis(self.rate_window_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_download_retries,
            backoff: Backoff::Fixed {
                delay: Duration::from_millis(self.error_delay_ms),
            },
        }
    }

    /// Base URL with exactly one trailing slash.
    pub fn normalized_base_url(&self) -> String {
        let trimmed = self.base_url.trim().trim_end_matches('/');
        format!("{trimmed}/")
    }
}

fn overlay<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    target: &mut T,
) {
    if let Some(value) = lookup(name).and_then(|raw| raw.trim().parse().ok()) {
        *target = value;
    }
}
