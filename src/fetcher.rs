//! Resilient page fetching with retry, exponential backoff, and payload validation.
//!
//! # Architecture
//!
//! - [`Fetcher`]: capability trait the pipeline depends on
//! - [`HttpTransport`]: one HTTP GET, classified into success or [`AttemptFailure`]
//! - [`ReqwestTransport`]: pooled `reqwest` client that follows redirects
//! - [`HttpFetcher`]: retry loop over any transport, plus the optional [`ContentValidator`]
//!
//! # Retry Strategy
//!
//! Attempts are numbered `0..max_attempts`. After a failed attempt `i` that is
//! not the last one, the fetcher sleeps `base_delay * 2^i` (1s, 2s, 4s, ... with
//! the defaults). Non-2xx statuses, timeouts, connection failures and any other
//! transport error are retried. A validator rejection is returned at once: a
//! tiny or blank body on a 200 is a soft-404, not flakiness.
//!
//! Each attempt carries a User-Agent picked at random from [`USER_AGENTS`].

use crate::config::FetchConfig;
use crate::error::{AttemptFailure, ConfigError, FetchError};
use crate::utils::{bounded_reason, host_of};
use rand::{rng, seq::IndexedRandom};
use reqwest::{Client, header, redirect::Policy};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// Browser identities rotated across attempts.
pub const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_2) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:122.0) Gecko/20100101 Firefox/122.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Mobile/15E148 Safari/604.1",
];

/// `Accept` header sent with every attempt.
pub const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Pick a User-Agent for the next attempt.
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Something that can turn a URL into raw page bytes.
#[allow(async_fn_in_trait)]
pub trait Fetcher {
    /// Fetch `url`, retrying transient failures.
    ///
    /// # Arguments
    ///
    /// * `url` - Page to download; a malformed URL fails like any transport error
    ///
    /// # Returns
    ///
    /// The raw response body of the first 2xx attempt the validator accepts.
    ///
    /// # Errors
    ///
    /// [`FetchError::ContentRejected`] when the validator refuses a payload,
    /// [`FetchError::Exhausted`] when every attempt failed.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// How many attempts to make and how long to wait between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// # Errors
    ///
    /// `max_attempts` must be at least 1 and `base_delay` non-zero.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if base_delay.is_zero() {
            return Err(ConfigError::Invalid(
                "backoff base delay must be positive".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            base_delay,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Sleep after failed attempt `attempt` (0-indexed): `base_delay * 2^attempt`.
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

/// Caller-supplied acceptance test for a successfully transported payload.
#[derive(Clone)]
pub struct ContentValidator(Arc<dyn Fn(&[u8]) -> bool + Send + Sync>);

impl ContentValidator {
    pub fn new(predicate: impl Fn(&[u8]) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Accept payloads strictly longer than `min_bytes` that are not all whitespace.
    pub fn min_length(min_bytes: usize) -> Self {
        Self::new(move |body| body.len() > min_bytes && !body.trim_ascii().is_empty())
    }

    pub fn accepts(&self, body: &[u8]) -> bool {
        (self.0)(body)
    }
}

impl fmt::Debug for ContentValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ContentValidator(..)")
    }
}

/// Status and body of a transport-level response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// A single HTTP GET. Implementations must be safe to share across concurrent fetches.
#[allow(async_fn_in_trait)]
pub trait HttpTransport {
    async fn get(&self, url: &str, user_agent: &str) -> Result<TransportResponse, AttemptFailure>;
}

/// `reqwest`-backed transport with connection pooling and redirect following.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    accept_language: String,
}

impl ReqwestTransport {
    /// Build the shared client. `timeout` applies to each attempt as a whole.
    pub fn new(
        timeout: Duration,
        max_redirects: usize,
        accept_language: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::limited(max_redirects))
            .build()?;
        Ok(Self {
            client,
            accept_language: accept_language.into(),
        })
    }
}

impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, user_agent: &str) -> Result<TransportResponse, AttemptFailure> {
        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, user_agent)
            .header(header::ACCEPT, ACCEPT_HTML)
            .header(header::ACCEPT_LANGUAGE, self.accept_language.as_str())
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Ok(TransportResponse {
                status: status.as_u16(),
                body: Vec::new(),
            });
        }

        let body = response.bytes().await.map_err(classify_reqwest_error)?;
        Ok(TransportResponse {
            status: status.as_u16(),
            body: body.to_vec(),
        })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> AttemptFailure {
    if e.is_timeout() {
        AttemptFailure::Timeout
    } else if e.is_connect() {
        AttemptFailure::Connect(bounded_reason(&e))
    } else if let Some(status) = e.status() {
        AttemptFailure::HttpStatus(status.as_u16())
    } else {
        AttemptFailure::Transport(bounded_reason(&e))
    }
}

/// Retrying fetcher over an [`HttpTransport`].
#[derive(Debug)]
pub struct HttpFetcher<T = ReqwestTransport> {
    transport: T,
    policy: RetryPolicy,
    validator: Option<ContentValidator>,
}

impl HttpFetcher<ReqwestTransport> {
    /// Build the production fetcher, including the minimum-length validator if configured.
    ///
    /// # Arguments
    ///
    /// * `config` - Fetch section of the config file
    ///
    /// # Returns
    ///
    /// A fetcher over a pooled [`ReqwestTransport`], or [`ConfigError`] when the
    /// attempt count, backoff base or timeout is unusable or the client cannot be built.
    pub fn from_config(config: &FetchConfig) -> Result<Self, ConfigError> {
        let policy = RetryPolicy::new(
            config.max_attempts,
            Duration::from_millis(config.backoff_base_ms),
        )?;
        let transport = ReqwestTransport::new(
            config.timeout()?,
            config.max_redirects,
            config.accept_language.clone(),
        )?;
        let fetcher = HttpFetcher::new(transport, policy);
        Ok(match config.min_content_bytes {
            Some(min) => fetcher.with_validator(ContentValidator::min_length(min)),
            None => fetcher,
        })
    }
}

impl<T> HttpFetcher<T> {
    /// A fetcher with no validator: every 2xx payload is accepted.
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            validator: None,
        }
    }

    pub fn with_validator(mut self, validator: ContentValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: HttpTransport> Fetcher for HttpFetcher<T> {
    /// Run up to `max_attempts` GETs against `url`.
    ///
    /// # Arguments
    ///
    /// * `url` - Page to download
    ///
    /// # Returns
    ///
    /// The body of the first 2xx response. Each attempt picks a fresh
    /// User-Agent; failed attempt `i` is followed by `base_delay * 2^i` of
    /// sleep unless it was the last. A validator rejection returns
    /// [`FetchError::ContentRejected`] at once; running out of attempts
    /// returns [`FetchError::Exhausted`] with the last attempt's failure.
    #[instrument(level = "info", skip_all, fields(url = %url, host = ?host_of(url)))]
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let max = self.policy.max_attempts();
        let mut last = AttemptFailure::Transport("no attempt made".to_string());

        for attempt in 0..max {
            let user_agent = random_user_agent();
            debug!(attempt = attempt + 1, max, user_agent, "Issuing GET");

            let failure = match self.transport.get(url, user_agent).await {
                Ok(response) if (200..300).contains(&response.status) => {
                    if let Some(validator) = &self.validator {
                        if !validator.accepts(&response.body) {
                            let bytes = response.body.len();
                            warn!(bytes, "Payload failed content validation; not retrying");
                            return Err(FetchError::ContentRejected {
                                url: url.to_string(),
                                reason: format!("payload did not pass validation ({bytes} bytes)"),
                            });
                        }
                    }
                    debug!(attempt = attempt + 1, bytes = response.body.len(), "Fetched page");
                    return Ok(response.body);
                }
                Ok(response) => AttemptFailure::HttpStatus(response.status),
                Err(failure) => failure,
            };

            warn!(
                attempt = attempt + 1,
                max,
                kind = failure.kind(),
                reason = %failure,
                "Fetch attempt failed"
            );

            if attempt + 1 < max {
                let delay = self.policy.backoff_after(attempt);
                warn!(?delay, next_attempt = attempt + 2, "Backing off before retry");
                sleep(delay).await;
            }
            last = failure;
        }

        error!(attempts = max, reason = %last, "All fetch attempts failed");
        Err(FetchError::Exhausted {
            url: url.to_string(),
            attempts: max,
            last,
        })
    }
}
