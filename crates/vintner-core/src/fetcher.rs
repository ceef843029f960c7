//! One logical request: gate admission, the HTTP call, response classification and retry.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::http_client::{HttpClient, HttpRequest, StatusClass};
use crate::retry::RetryConfig;
use crate::statistics::DownloadStatistics;
use crate::throttling::RequestGate;
use crate::SourceError;

/// Appends `name=value` to a URI, URL-encoding the value.
pub fn append_query(uri: &str, name: &str, value: &str) -> String {
    let separator = if uri.contains('?') { '&' } else { '?' };
    format!("{uri}{separator}{name}={}", urlencoding::encode(value))
}

/// Downloads payloads through the shared [`RequestGate`], retrying transient failures.
///
/// Missing resources and exhausted retries yield `Ok(None)`. Errors are reserved for
/// invalid input and cancellation.
#[derive(Clone)]
pub struct RetryingFetcher {
    http: Arc<dyn HttpClient>,
    gate: Arc<RequestGate>,
    retry: RetryConfig,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    statistics: Option<Arc<dyn DownloadStatistics>>,
    cancel: CancellationToken,
}

impl RetryingFetcher {
    pub fn new(
        config: &ClientConfig,
        http: Arc<dyn HttpClient>,
        gate: Arc<RequestGate>,
        statistics: Option<Arc<dyn DownloadStatistics>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            http,
            gate,
            retry: config.retry_config(),
            base_url: config.normalized_base_url(),
            api_key: config.api_key.clone().filter(|key| !key.trim().is_empty()),
            timeout: config.request_timeout(),
            statistics,
            cancel,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn gate(&self) -> &Arc<RequestGate> {
        &self.gate
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fetches `uri` (relative to the base URL, or absolute).
    pub async fn download(&self, uri: &str) -> Result<Option<String>, SourceError> {
        if uri.trim().is_empty() {
            return Err(SourceError::invalid_request("request uri cannot be empty"));
        }

        let url = self.absolute_url(uri);
        let attempts = self.retry.attempts();

        for attempt in 0..attempts {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(cancelled(&url)),
                permit = self.gate.acquire() => permit?,
            };

            let outcome = {
                let _in_flight = InFlight::start(self.statistics.as_deref());
                let request = HttpRequest::get(self.authenticated(&url)).with_timeout(self.timeout);
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(cancelled(&url)),
                    response = self.http.execute(request) => response,
                }
            };

            let needs_delay = match outcome {
                Ok(response) => match response.class() {
                    StatusClass::Success => return Ok(Some(response.body)),
                    StatusClass::NotFound => {
                        tracing::error!(uri = %url, "status 404 received");
                        return Ok(None);
                    }
                    StatusClass::RateLimited => {
                        self.gate.force_block();
                        false
                    }
                    StatusClass::Retryable => {
                        tracing::error!(
                            uri = %url,
                            status = response.status,
                            attempt = attempt + 1,
                            "unexpected status received"
                        );
                        true
                    }
                },
                Err(error) => {
                    tracing::error!(uri = %url, attempt = attempt + 1, %error, "request failed");
                    true
                }
            };

            permit.release();

            if needs_delay && attempt + 1 < attempts {
                let delay = self.retry.delay_for_attempt(attempt);
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Err(cancelled(&url)),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }

        tracing::error!(uri = %url, attempts, "max retry count exceeded");
        Ok(None)
    }

    fn absolute_url(&self, uri: &str) -> String {
        let uri = uri.trim();
        if uri.starts_with("http://") || uri.starts_with("https://") {
            uri.to_owned()
        } else {
            format!("{}{}", self.base_url, uri.trim_start_matches('/'))
        }
    }

    /// Adds the API key. The result must never be logged.
    fn authenticated(&self, url: &str) -> String {
        match &self.api_key {
            Some(key) => append_query(url, "api_key", key),
            None => url.to_owned(),
        }
    }
}

fn cancelled(url: &str) -> SourceError {
    SourceError::cancelled(format!("request cancelled: {url}"))
}

/// Keeps the in-flight counter balanced even when the request future is dropped.
struct InFlight<'a> {
    statistics: Option<&'a dyn DownloadStatistics>,
}

impl<'a> InFlight<'a> {
    fn start(statistics: Option<&'a dyn DownloadStatistics>) -> Self {
        if let Some(stats) = statistics {
            stats.increment_total_requests(1);
            stats.adjust_active_requests(1);
        }
        Self { statistics }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if let Some(stats) = self.statistics {
            stats.adjust_active_requests(-1);
        }
    }
}
