//! HTTP retry helpers for transient errors.
//!
//! Every remote call goes through [`send_json`] or [`send_text`] rather
//! than `reqwest::RequestBuilder::send()` directly, so timeouts,
//! connection resets, rate limiting and server errors are retried with
//! exponential backoff.
//!
//! ```ignore
//! let body = retry::send_json(&policy, || client.get(&url).query(&params)).await?;
//! let text = retry::send_text(&policy, || client.get(&url)).await?;
//! ```

use std::time::Duration;

use crate::SourceError;

/// Maximum length of the response body preview included in error logs.
const BODY_PREVIEW_LEN: usize = 300;

/// Backoff parameters for [`send_json`] and [`send_text`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Connection-level retries (errors, 429, 5xx).
    pub max_retries: u32,
    /// Full re-fetches when the body cannot be read or decoded.
    pub max_body_retries: u32,
    /// Delay before the first retry; doubled on each further attempt.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    /// 1s, 2s, 4s between connection attempts; worst case a little over
    /// a minute for one logical call.
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_body_retries: 2,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            max_body_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << attempt.saturating_sub(1).min(16))
    }
}

/// Sends an HTTP request and parses the response body as JSON.
///
/// `build_request` is called on each attempt since builders are consumed
/// by `.send()`.
///
/// # Retry behaviour
///
/// 1. **Connection-level**: retries up to [`RetryPolicy::max_retries`]
///    times on connection errors, timeouts, HTTP 429 and HTTP 5xx.
/// 2. **Body-decode**: if the body cannot be read or parsed as JSON the
///    whole request is re-fetched up to [`RetryPolicy::max_body_retries`]
///    times.
///
/// HTTP 4xx other than 429 is permanent.
///
/// # Errors
///
/// Returns [`SourceError`] if the request still fails after all retries.
pub async fn send_json<F>(
    policy: &RetryPolicy,
    build_request: F,
) -> Result<serde_json::Value, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder + Send + Sync,
{
    let mut body_attempt = 0;
    loop {
        let response = send_inner(policy, &build_request).await?;
        let url = response.url().to_string();
        let status = response.status();

        let error = match response.text().await {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    log::warn!(
                        "JSON parse failed for {url} (status {status}, {} bytes): {e}\n  body preview: {}",
                        text.len(),
                        preview(&text),
                    );
                    SourceError::Json(e)
                }
            },
            Err(e) => {
                log::warn!("Response body read failed for {url} (status {status}): {e}");
                SourceError::Http(e)
            }
        };

        if body_attempt >= policy.max_body_retries {
            log::error!(
                "Giving up on {url} after {} body retries",
                policy.max_body_retries
            );
            return Err(error);
        }
        body_attempt += 1;
        let delay = policy.delay(body_attempt);
        log::warn!(
            "  body retry {body_attempt}/{} in {delay:?}...",
            policy.max_body_retries
        );
        tokio::time::sleep(delay).await;
    }
}

/// Sends an HTTP request and returns the response body as a `String`.
///
/// Behaves like [`send_json`] without the JSON decoding step.
///
/// # Errors
///
/// Returns [`SourceError`] if the request fails after all retries or the
/// body cannot be read.
pub async fn send_text<F>(policy: &RetryPolicy, build_request: F) -> Result<String, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder + Send + Sync,
{
    let mut body_attempt = 0;
    loop {
        let response = send_inner(policy, &build_request).await?;
        let url = response.url().to_string();

        match response.text().await {
            Ok(text) => return Ok(text),
            Err(e) if body_attempt < policy.max_body_retries => {
                body_attempt += 1;
                let delay = policy.delay(body_attempt);
                log::warn!(
                    "Text body read failed for {url} (body retry {body_attempt}/{}), \
                     re-fetching in {delay:?}: {e}",
                    policy.max_body_retries
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(SourceError::Http(e)),
        }
    }
}

/// Core retry loop shared by [`send_json`] and [`send_text`]. Returns the
/// first response with a 2xx or 3xx status.
async fn send_inner<F>(
    policy: &RetryPolicy,
    build_request: &F,
) -> Result<reqwest::Response, SourceError>
where
    F: Fn() -> reqwest::RequestBuilder + Send + Sync,
{
    let max_retries = policy.max_retries;
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let delay = policy.delay(attempt);
            log::warn!("  retry {attempt}/{max_retries} in {delay:?}...");
            tokio::time::sleep(delay).await;
        }

        match build_request().send().await {
            Err(e) => {
                if is_transient(&e) && attempt < max_retries {
                    log::warn!("  transient error: {e}");
                    attempt += 1;
                    continue;
                }
                return Err(SourceError::Http(e));
            }
            Ok(response) => {
                let status = response.status();
                let retryable = status == reqwest::StatusCode::TOO_MANY_REQUESTS
                    || status.is_server_error();

                if retryable && attempt < max_retries {
                    log::warn!("  HTTP {status} from {}", response.url());
                    attempt += 1;
                    continue;
                }

                if retryable || status.is_client_error() {
                    return Err(SourceError::Status {
                        status,
                        url: response.url().to_string(),
                    });
                }

                return Ok(response);
            }
        }
    }
}

/// Returns `true` if the error is likely transient and worth retrying.
fn is_transient(e: &reqwest::Error) -> bool {
    e.is_timeout() || e.is_connect() || e.is_body() || e.is_decode() || e.is_request()
}

fn preview(text: &str) -> &str {
    if text.len() <= BODY_PREVIEW_LEN {
        return text;
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
