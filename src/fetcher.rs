use std::time::Duration;

use async_trait::async_trait;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use rand::Rng;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use url::Url;

use crate::error::FetchError;

/// Result of a GET after redirects have been followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// URL the client ended up on. ATS detection keys off this, not the
    /// registry URL.
    pub final_url: String,
    pub status: u16,
    pub body: String,
}

/// Anything that can GET a page. The scrape pipeline only talks to this
/// trait so strategies can be exercised without a network.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub user_agent: String,
    pub accept_language: String,
    pub host_interval: Duration,
    pub retry: RetryPolicy,
}

/// Retry only timeouts, with exponential backoff plus jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// `attempt` is the number of retries already made.
    pub fn should_retry(&self, error: &FetchError, attempt: u32) -> bool {
        error.is_retryable() && attempt < self.max_retries
    }

    /// Backoff before retry number `attempt + 1`, without jitter.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    /// Backoff with up to 50% random jitter on top.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay_for(attempt);
        let jitter_ms = (base.as_millis() / 2) as u64;
        if jitter_ms == 0 {
            return base;
        }
        base + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }
}

/// reqwest-backed fetcher with a browser-like header set, a per-host
/// minimum interval and the timeout retry policy.
pub struct HttpFetcher {
    client: reqwest::Client,
    limiter: Option<DefaultKeyedRateLimiter<String>>,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8",
            ),
        );
        let language = HeaderValue::from_str(&settings.accept_language)
            .map_err(|e| FetchError::Connection(format!("invalid Accept-Language: {e}")))?;
        headers.insert(ACCEPT_LANGUAGE, language);
        headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
        headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
        headers.insert("sec-fetch-site", HeaderValue::from_static("none"));

        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .default_headers(headers)
            .timeout(settings.timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::Connection(format!("Failed to build HTTP client: {e}")))?;

        let limiter = Quota::with_period(settings.host_interval).map(RateLimiter::keyed);

        Ok(Self {
            client,
            limiter,
            retry: settings.retry,
        })
    }

    async fn fetch_once(&self, url: &str, host: &str) -> Result<FetchedPage, FetchError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_key_ready(&host.to_string()).await;
        }

        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let final_url = resp.url().to_string();

        if !(status.is_success() || status.is_redirection()) {
            return Err(FetchError::Http(status.as_u16()));
        }

        let body = resp.text().await?;
        Ok(FetchedPage {
            final_url,
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl(format!("{url}: no host")))?
            .to_lowercase();

        let mut attempt = 0;
        loop {
            match self.fetch_once(url, &host).await {
                Ok(page) => return Ok(page),
                Err(e) if self.retry.should_retry(&e, attempt) => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::debug!("Retrying {url} in {delay:?} after {e}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
        }
    }

    #[test]
    fn retries_timeouts_up_to_the_limit() {
        let p = policy();
        assert!(p.should_retry(&FetchError::Timeout, 0));
        assert!(p.should_retry(&FetchError::Timeout, 1));
        assert!(!p.should_retry(&FetchError::Timeout, 2));
    }

    #[test]
    fn never_retries_http_or_connection_errors() {
        let p = policy();
        assert!(!p.should_retry(&FetchError::Http(404), 0));
        assert!(!p.should_retry(&FetchError::Http(502), 0));
        assert!(!p.should_retry(&FetchError::Connection("reset".into()), 0));
    }

    #[test]
    fn backoff_doubles_and_jitter_stays_within_half() {
        let p = policy();
        assert_eq!(p.base_delay_for(0), Duration::from_millis(100));
        assert_eq!(p.base_delay_for(1), Duration::from_millis(200));
        assert_eq!(p.base_delay_for(2), Duration::from_millis(400));
        for _ in 0..20 {
            let d = p.delay_for(1);
            assert!(d >= Duration::from_millis(200) && d <= Duration::from_millis(300));
        }
    }

    #[test]
    fn zero_interval_disables_host_gate() {
        let fetcher = HttpFetcher::new(&FetchSettings {
            timeout: Duration::from_secs(5),
            user_agent: crate::config::DEFAULT_USER_AGENT.to_string(),
            accept_language: "en-US".to_string(),
            host_interval: Duration::ZERO,
            retry: RetryPolicy::default(),
        })
        .unwrap();
        assert!(fetcher.limiter.is_none());
    }

    #[tokio::test]
    async fn rejects_urls_without_host() {
        let fetcher = HttpFetcher::new(&FetchSettings {
            timeout: Duration::from_secs(5),
            user_agent: "test".to_string(),
            accept_language: "en-US".to_string(),
            host_interval: Duration::from_millis(10),
            retry: RetryPolicy::default(),
        })
        .unwrap();
        let err = fetcher.fetch("not a url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }
}
