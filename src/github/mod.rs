pub mod pages;

pub use pages::Pages;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, ACCEPT, LINK, USER_AGENT};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to fetch data after {retries} retries: {url}")]
    RateLimited { url: String, retries: u32 },

    #[error("GitHub API returned {status} for {url}")]
    Status { url: String, status: StatusCode },

    #[error("GitHub API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Bounded retry on rate-limit responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first
    pub retries: u32,
    /// Fixed pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Pause between retry attempts. Split out so tests can observe backoff
/// without waiting on the wall clock.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// A decoded response body plus the `rel="next"` link, if the API sent one.
#[derive(Debug)]
pub struct Fetched<T> {
    pub body: T,
    pub next: Option<String>,
}

/// Authenticated GitHub REST client. The only place network faults are absorbed.
///
/// Cheap to clone: the underlying connection pool and sleeper are shared.
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl GitHubClient {
    pub fn new(api_url: &str, token: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.into(),
            policy,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    #[cfg(test)]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Base URL of the REST API, without a trailing slash.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// GET `url` and decode the JSON body, retrying on rate-limit responses.
    ///
    /// 403 and 429 are treated as rate limiting: the request is repeated up to
    /// `policy.retries` attempts with `policy.delay` between them. Any other
    /// non-success status fails immediately.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> Result<Fetched<T>, FetchError> {
        let attempts = self.policy.retries.max(1);
        for attempt in 1..=attempts {
            let response = self
                .http
                .get(url)
                .query(query)
                .header(USER_AGENT, "pr-harvester")
                .header(ACCEPT, "application/vnd.github+json")
                .bearer_auth(&self.token)
                .send()
                .await?;

            let status = response.status();
            if is_rate_limited(status) {
                warn!(%status, attempt, retries = attempts, "rate limit hit");
                if attempt < attempts {
                    debug!(delay_ms = self.policy.delay.as_millis() as u64, "backing off");
                    self.sleeper.sleep(self.policy.delay).await;
                }
                continue;
            }
            if !status.is_success() {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status,
                });
            }

            let next = next_link(response.headers());
            let text = response.text().await?;
            let body = serde_json::from_str(&text).map_err(|source| FetchError::Decode {
                url: url.to_string(),
                source,
            })?;
            debug!(bytes = text.len(), has_next = next.is_some(), "fetched");
            return Ok(Fetched { body, next });
        }

        Err(FetchError::RateLimited {
            url: url.to_string(),
            retries: attempts,
        })
    }
}

fn is_rate_limited(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::FORBIDDEN
}

/// Extract the `rel="next"` target from a `Link` header.
///
/// GitHub format: `<https://api.github.com/...?page=2>; rel="next", <...>; rel="last"`
fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}
