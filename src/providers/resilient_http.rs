//! Downloads wrapped in retry and timeout middleware.
//!
//! Each request runs through a [`seatbelt`] stack: a retry layer around a per-attempt timeout
//! around the actual `GET`, so a hung server counts as one more transient failure.

use crate::{Error, Result};
use core::time::Duration;
use layered::{Execute, Service, Stack};
use ohno::{AppError, IntoAppError, app_err, bail};
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use seatbelt::retry::{Backoff, Retry};
use seatbelt::timeout::Timeout;
use seatbelt::{RecoveryInfo, ResilienceContext};
use tick::Clock;
use url::Url;

const LOG_TARGET: &str = "      http";
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// An HTTP client that retries transient failures with exponential backoff.
///
/// Connection errors, attempts exceeding the timeout, `5xx` responses and `429 Too Many Requests`
/// are retried up to `max_retries` times after the first attempt. A `Retry-After` header in
/// seconds on a `429` overrides the computed delay.
#[derive(Debug, Clone)]
pub struct ResilientClient {
    client: reqwest::Client,
    max_retries: u32,
    base_delay: Duration,
    timeout: Duration,
}

impl Default for ResilientClient {
    fn default() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("metric-catalog/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self::new(client)
    }
}

impl ResilientClient {
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_retries(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    /// Limit on each individual attempt, not on the download as a whole.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Download `url` as text.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Fetch`] once retries are exhausted or on a non-retryable failure.
    pub async fn get_text(&self, url: &Url) -> Result<String> {
        log::info!(target: LOG_TARGET, "Downloading '{url}'");

        self.get_text_core(url).await.map_err(|e| Error::Fetch {
            url: url.to_string(),
            reason: format!("{e:#}"),
        })
    }

    async fn get_text_core(&self, url: &Url) -> Result<String, AppError> {
        let response = self.resilient_get(url).await?;

        let status = response.status();
        if !status.is_success() {
            bail!("HTTP {status}");
        }

        let text = response.text().await.into_app_err("unable to read response body")?;
        log::debug!(target: LOG_TARGET, "Downloaded {} bytes from '{url}'", text.len());
        Ok(text)
    }

    async fn resilient_get(&self, url: &Url) -> Result<reqwest::Response, AppError> {
        let clock = Clock::new_tokio();
        let context = ResilienceContext::new(&clock).name("http_get");

        let client = self.client.clone();
        let target = url.to_string();
        let max_retries = self.max_retries;
        let service = (
            Retry::layer("retry", &context)
                .clone_input()
                .recovery_with(|result: &Result<reqwest::Response, AppError>, _| classify(result))
                .max_retry_attempts(max_retries)
                .base_delay(self.base_delay)
                .backoff(Backoff::Exponential)
                .on_retry(move |_output, args| {
                    log::warn!(
                        target: LOG_TARGET,
                        "Retrying '{target}' in {}ms (retry {} of {max_retries})",
                        args.retry_delay().as_millis(),
                        args.attempt().index() + 1,
                    );
                }),
            Timeout::layer("timeout", &context)
                .timeout_error(|_| app_err!("HTTP request timed out"))
                .timeout(self.timeout),
            Execute::new(move |url: Url| {
                let client = client.clone();
                async move { client.get(url).send().await.map_err(AppError::from) }
            }),
        )
            .into_service();

        service.execute(url.clone()).await
    }
}

fn classify(result: &Result<reqwest::Response, AppError>) -> RecoveryInfo {
    match result {
        Err(e) => {
            log::debug!(target: LOG_TARGET, "Request failed: {e}");
            RecoveryInfo::retry()
        }

        Ok(response) if response.status() == StatusCode::TOO_MANY_REQUESTS => {
            retry_after(response.headers()).map_or_else(RecoveryInfo::retry, |delay| RecoveryInfo::retry().delay(delay))
        }

        Ok(response) if is_retryable(response.status()) => {
            log::debug!(target: LOG_TARGET, "Request returned HTTP {}", response.status());
            RecoveryInfo::retry()
        }

        Ok(_) => RecoveryInfo::never(),
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let seconds = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(!is_retryable(StatusCode::NOT_FOUND));
        assert!(!is_retryable(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_retry_after_is_capped() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);

        let _ = headers.insert(RETRY_AFTER, HeaderValue::from_static(" 7 "));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));

        let _ = headers.insert(RETRY_AFTER, HeaderValue::from_static("3600"));
        assert_eq!(retry_after(&headers), Some(MAX_RETRY_AFTER));

        let _ = headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }
}
