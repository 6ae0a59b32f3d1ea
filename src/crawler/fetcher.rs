//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building HTTP clients with a polite, identifying user agent
//! - The fetch pipeline: retry -> rate limit -> transport
//! - Redirect validation against the requested URL
//! - Outcome classification

use crate::config::{FetchConfig, UserAgentConfig};
use crate::crawler::limiter::RateLimiter;
use crate::state::FailureReason;
use crate::url::same_resource;
use crate::HarvestError;
use reqwest::header::{HeaderMap, HeaderValue, FROM};
use reqwest::{Client, StatusCode};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// The one status treated as transient and worth retrying
pub const RETRY_STATUS: StatusCode = StatusCode::INTERNAL_SERVER_ERROR;

/// A response body with the URL it finally resolved to
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Page body content
    pub body: String,
    /// Final URL after redirects
    pub final_url: Url,
    /// Response headers (repeated headers joined with ", ")
    pub headers: BTreeMap<String, String>,
}

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchOutcome {
    /// Successfully fetched the requested resource
    Success(FetchedPage),

    /// HTTP 404: the normal end of pagination
    NotFound,

    /// The response resolved to a different resource than requested
    RedirectMismatch {
        /// The URL that was requested
        requested: Url,
        /// The URL the response resolved to
        actual: Url,
    },

    /// A single attempt answered with the transient status
    TransientFailure {
        /// The HTTP status code
        status: u16,
    },

    /// Every attempt answered with the transient status
    RetryExhausted {
        /// Number of attempts made
        attempts: u32,
    },

    /// Network error, timeout, unexpected status, or unreadable body
    FatalError(String),
}

/// What the frontier does with a fetch outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Emit the page and keep paginating
    Emit,
    /// Pagination ended normally
    End,
    /// Drop the seed without emitting
    Abandon(FailureReason),
}

impl FetchOutcome {
    /// Classifies the outcome for the frontier
    ///
    /// | Outcome | Disposition |
    /// |---------|-------------|
    /// | Success | Emit |
    /// | NotFound | End |
    /// | RedirectMismatch | Abandon |
    /// | RetryExhausted | Abandon |
    /// | TransientFailure | Abandon (only reachable without the retry stage) |
    /// | FatalError | Abandon |
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::Success(_) => Disposition::Emit,
            Self::NotFound => Disposition::End,
            Self::RedirectMismatch { actual, .. } => {
                Disposition::Abandon(FailureReason::RedirectMismatch {
                    actual: actual.to_string(),
                })
            }
            Self::RetryExhausted { attempts } => Disposition::Abandon(FailureReason::RetryExhausted {
                attempts: *attempts,
            }),
            Self::TransientFailure { status } => Disposition::Abandon(FailureReason::Fatal(
                format!("transient status {} without retry", status),
            )),
            Self::FatalError(cause) => Disposition::Abandon(FailureReason::Fatal(cause.clone())),
        }
    }

    /// Converts the outcome into a page, or an error naming `url`
    pub fn into_page(self, url: &Url) -> Result<FetchedPage, HarvestError> {
        match self {
            Self::Success(page) => Ok(page),
            Self::NotFound => Err(HarvestError::Status {
                url: url.to_string(),
                status: StatusCode::NOT_FOUND.as_u16(),
            }),
            Self::RedirectMismatch { requested, actual } => Err(HarvestError::RedirectMismatch {
                requested: requested.to_string(),
                actual: actual.to_string(),
            }),
            Self::TransientFailure { status } => Err(HarvestError::Status {
                url: url.to_string(),
                status,
            }),
            Self::RetryExhausted { attempts } => Err(HarvestError::RetryExhausted {
                url: url.to_string(),
                attempts,
            }),
            Self::FatalError(message) => Err(HarvestError::Fetch {
                url: url.to_string(),
                message,
            }),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// The user agent names the project and its operator, and every request
/// carries a `From` header with the contact email.
///
/// # Example
///
/// ```no_run
/// use listing_harvester::config::UserAgentConfig;
/// use listing_harvester::crawler::build_http_client;
/// use std::time::Duration;
///
/// let config = UserAgentConfig {
///     crawler_name: "ReviewResearch".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.org/project".to_string(),
///     contact_email: "ops@example.org".to_string(),
/// };
///
/// let client = build_http_client(&config, Duration::from_secs(5)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, HarvestError> {
    let mut headers = HeaderMap::new();
    let from = HeaderValue::from_str(&config.contact_email).map_err(|e| {
        HarvestError::Config(crate::ConfigError::Validation(format!(
            "contact-email is not a valid header value: {}",
            e
        )))
    })?;
    headers.insert(FROM, from);

    let client = Client::builder()
        .user_agent(config.user_agent_string())
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(timeout)
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

/// Rate-limited, retrying fetcher shared by discovery and pagination
///
/// Each call runs the pipeline `retry(rate_limit(transport))`: every attempt,
/// retries included, spends one unit of the global budget.
pub struct Fetcher {
    client: Client,
    limiter: Mutex<RateLimiter>,
    retry_attempts: u32,
    retry_wait: Duration,
}

impl Fetcher {
    /// Creates a fetcher around an existing client
    pub fn new(client: Client, config: &FetchConfig) -> Self {
        Self::with_limiter(
            client,
            RateLimiter::new(config.max_calls_per_minute),
            config.retry_attempts,
            config.retry_wait(),
        )
    }

    /// Creates a fetcher with an explicit limiter and retry policy
    pub fn with_limiter(
        client: Client,
        limiter: RateLimiter,
        retry_attempts: u32,
        retry_wait: Duration,
    ) -> Self {
        Self {
            client,
            limiter: Mutex::new(limiter),
            retry_attempts: retry_attempts.max(1),
            retry_wait,
        }
    }

    /// Builds the client and fetcher from configuration
    pub fn from_config(
        user_agent: &UserAgentConfig,
        fetch: &FetchConfig,
    ) -> Result<Self, HarvestError> {
        let client = build_http_client(user_agent, fetch.timeout())?;
        Ok(Self::new(client, fetch))
    }

    /// Fetches a pagination URL and validates where it resolved to
    pub async fn fetch(&self, url: &Url) -> FetchOutcome {
        match self.fetch_with_retry(url).await {
            FetchOutcome::Success(page) if !same_resource(url, &page.final_url) => {
                FetchOutcome::RedirectMismatch {
                    requested: url.clone(),
                    actual: page.final_url,
                }
            }
            outcome => outcome,
        }
    }

    /// Fetches a discovery document; redirects are followed without validation
    pub async fn fetch_document(&self, url: &Url) -> Result<FetchedPage, HarvestError> {
        self.fetch_with_retry(url).await.into_page(url)
    }

    /// Retry stage: repeats the transient status up to the attempt budget
    async fn fetch_with_retry(&self, url: &Url) -> FetchOutcome {
        for attempt in 1..=self.retry_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.retry_wait).await;
            }

            match self.fetch_rate_limited(url).await {
                FetchOutcome::TransientFailure { status } => {
                    tracing::warn!(
                        "Server error ({}) at {} (attempt {}/{}), retrying",
                        status,
                        url,
                        attempt,
                        self.retry_attempts
                    );
                }
                outcome => return outcome,
            }
        }

        FetchOutcome::RetryExhausted {
            attempts: self.retry_attempts,
        }
    }

    /// Rate limit stage: waits for the global budget, then sends
    async fn fetch_rate_limited(&self, url: &Url) -> FetchOutcome {
        self.limiter.lock().await.acquire().await;
        self.transport(url).await
    }

    /// Transport stage: one GET, mapped onto an outcome
    async fn transport(&self, url: &Url) -> FetchOutcome {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => return FetchOutcome::FatalError(describe_error(&e)),
        };

        let status = response.status();

        if status == RETRY_STATUS {
            return FetchOutcome::TransientFailure {
                status: status.as_u16(),
            };
        }

        if status == StatusCode::NOT_FOUND {
            return FetchOutcome::NotFound;
        }

        if !status.is_success() {
            return FetchOutcome::FatalError(format!("HTTP {}", status));
        }

        let final_url = response.url().clone();
        let headers = collect_headers(response.headers());

        match response.text().await {
            Ok(body) => FetchOutcome::Success(FetchedPage {
                body,
                final_url,
                headers,
            }),
            Err(e) => FetchOutcome::FatalError(describe_error(&e)),
        }
    }
}

/// Flattens a header map into name -> value, joining repeated headers
fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut collected: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        collected
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    collected
}

/// Classifies a client error into a short description
fn describe_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        format!("Connection failed: {}", error)
    } else if error.is_redirect() {
        format!("Redirect error: {}", error)
    } else {
        error.to_string()
    }
}
