//! Shared HTTP access for every upstream call.
//!
//! All requests go through one [`HttpFetcher`], which owns the client, a
//! concurrency semaphore and a rate limiter, so the worker pool can never
//! exceed either bound no matter how many datasets are in flight.

use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use tokio::sync::Semaphore;

use crate::utils::error::{EtlError, Result};

const USER_AGENT: &str = concat!("ons-compendium/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(30),
        }
    }

    /// Delay before `attempt` (1-based retry count): base, 2x base, 4x base ...
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32 << (attempt - 1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(500))
    }
}

#[derive(Debug, Clone)]
pub struct FetcherSettings {
    pub timeout: Duration,
    pub concurrent_requests: usize,
    pub rate_limit_per_second: u32,
    pub retry: RetryPolicy,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            concurrent_requests: 8,
            rate_limit_per_second: 10,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    concurrency_limiter: Arc<Semaphore>,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(settings: FetcherSettings) -> Result<Self> {
        // Connect and per-read limits only; JSON calls add a whole-request
        // limit per request in `get_once`.
        let client = Client::builder()
            .connect_timeout(settings.timeout)
            .read_timeout(settings.timeout)
            .user_agent(USER_AGENT)
            .build()?;
        let rate = NonZeroU32::new(settings.rate_limit_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            client,
            concurrency_limiter: Semaphore::new(settings.concurrent_requests.max(1)).into(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(rate))),
            retry: settings.retry,
            timeout: settings.timeout,
        })
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// One GET, no retry. Non-success statuses become `HttpStatusError`.
    /// `total` bounds the whole exchange, body included.
    async fn get_once(
        &self,
        url: &str,
        query: &[(&str, String)],
        total: Option<Duration>,
    ) -> Result<String> {
        let _permit = self
            .concurrency_limiter
            .acquire()
            .await
            .map_err(|e| EtlError::ProcessingError {
                message: format!("request limiter closed: {}", e),
            })?;
        self.rate_limiter.until_ready().await;

        tracing::debug!("GET {} {:?}", url, query);
        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(total) = total {
            request = request.timeout(total);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EtlError::HttpStatusError {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    async fn with_retry<T, F, Fut>(&self, url: &str, policy: &RetryPolicy, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error: Option<String> = None;

        for attempt in 0..policy.max_attempts {
            if attempt > 0 {
                let delay = policy.delay_for(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying {}", url);
                tokio::time::sleep(delay).await;
            }

            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts = policy.max_attempts,
                        "Request to {} failed, will retry",
                        url
                    );
                    last_error = Some(e.to_string());
                }
                Err(e) => return Err(e),
            }
        }

        Err(EtlError::RetriesExhaustedError {
            attempts: policy.max_attempts,
            message: last_error.unwrap_or_else(|| format!("no response from {}", url)),
        })
    }

    /// Text bodies (CSV downloads, HTML pages) may be large, so only the
    /// connect and read timeouts apply.
    pub async fn get_text(&self, url: &str, policy: &RetryPolicy) -> Result<String> {
        self.with_retry(url, policy, || self.get_once(url, &[], None)).await
    }

    /// Fetch and decode JSON. A body that does not decode is retried like a
    /// transport failure.
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        policy: &RetryPolicy,
    ) -> Result<serde_json::Value> {
        self.with_retry(url, policy, || async move {
            let body = self.get_once(url, query, Some(self.timeout)).await?;
            Ok(serde_json::from_str(&body)?)
        })
        .await
    }

    /// Connectivity check: any final failure is reported as
    /// `ConnectivityCheckError`.
    pub async fn probe(&self, url: &str, query: &[(&str, String)]) -> Result<()> {
        self.with_retry(url, &self.retry, || self.get_once(url, query, Some(self.timeout)))
            .await
            .map(|_| ())
            .map_err(|e| EtlError::ConnectivityCheckError {
                url: url.to_string(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn fast_fetcher(attempts: u32) -> HttpFetcher {
        HttpFetcher::new(FetcherSettings {
            timeout: Duration::from_secs(5),
            concurrent_requests: 4,
            rate_limit_per_second: 1000,
            retry: RetryPolicy::new(attempts, Duration::from_millis(1)),
        })
        .unwrap()
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_delay: Duration::from_millis(500),
            ..RetryPolicy::new(10, Duration::from_millis(100))
        };
        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(40), Duration::from_millis(500));
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        assert_eq!(RetryPolicy::new(0, Duration::from_millis(1)).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_server_error_retried_until_exhausted() {
        let server = MockServer::start();
        let failing = server.mock(|when, then| {
            when.method(GET).path("/flaky");
            then.status(503);
        });

        let fetcher = fast_fetcher(3);
        let result = fetcher
            .get_json(&server.url("/flaky"), &[], &fetcher.retry_policy().clone())
            .await;

        failing.assert_hits(3);
        match result {
            Err(EtlError::RetriesExhaustedError { attempts, message }) => {
                assert_eq!(attempts, 3);
                assert!(message.contains("503"));
            }
            other => panic!("expected exhaustion, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let server = MockServer::start();
        let missing = server.mock(|when, then| {
            when.method(GET).path("/gone");
            then.status(404);
        });

        let fetcher = fast_fetcher(5);
        let result = fetcher.get_text(&server.url("/gone"), fetcher.retry_policy()).await;

        missing.assert_hits(1);
        assert!(matches!(
            result,
            Err(EtlError::HttpStatusError { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_probe_failure_is_connectivity_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/datasets");
            then.status(500);
        });

        let fetcher = fast_fetcher(2);
        let result = fetcher.probe(&server.url("/datasets"), &[]).await;

        assert!(matches!(result, Err(EtlError::ConnectivityCheckError { .. })));
    }

    #[tokio::test]
    async fn test_get_json_passes_query() {
        let server = MockServer::start();
        let page = server.mock(|when, then| {
            when.method(GET).path("/datasets").query_param("offset", "20");
            then.status(200).json_body(serde_json::json!({"items": [], "count": 0}));
        });

        let fetcher = fast_fetcher(1);
        let value = fetcher
            .get_json(
                &server.url("/datasets"),
                &[("offset", "20".to_string())],
                fetcher.retry_policy(),
            )
            .await
            .unwrap();

        page.assert();
        assert_eq!(value["count"], 0);
    }

    #[tokio::test]
    async fn test_json_request_bounded_by_total_timeout() {
        let server = MockServer::start();
        let slow = server.mock(|when, then| {
            when.method(GET).path("/slow");
            then.status(200)
                .delay(Duration::from_millis(1500))
                .json_body(serde_json::json!({"items": []}));
        });

        let fetcher = HttpFetcher::new(FetcherSettings {
            timeout: Duration::from_millis(200),
            concurrent_requests: 1,
            rate_limit_per_second: 1000,
            retry: RetryPolicy::new(1, Duration::from_millis(1)),
        })
        .unwrap();
        let result = fetcher
            .get_json(&server.url("/slow"), &[], fetcher.retry_policy())
            .await;

        slow.assert_hits(1);
        assert!(matches!(
            result,
            Err(EtlError::RetriesExhaustedError { attempts: 1, .. })
        ));
    }
}
