use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::HeaderMap;

use crate::error::LlmError;

const BASE_BACKOFF_MS: u64 = 500;

/// Parse the `Retry-After` header value as seconds, falling back to exponential backoff.
pub(crate) fn retry_delay(headers: &HeaderMap, attempt: u32) -> Duration {
    if let Some(val) = headers.get("retry-after")
        && let Ok(s) = val.to_str()
        && let Ok(secs) = s.trim().parse::<u64>()
    {
        return Duration::from_secs(secs);
    }
    backoff(attempt)
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(BASE_BACKOFF_MS << attempt.min(16))
}

/// Map a non-success HTTP status to an error. Google reports an invalid key as
/// `400 INVALID_ARGUMENT` with reason `API_KEY_INVALID`.
pub(crate) fn classify_status(provider: &str, status: StatusCode, body: &str) -> LlmError {
    match status.as_u16() {
        401 | 403 => LlmError::Unauthorized {
            provider: provider.to_owned(),
        },
        400 if body.contains("API_KEY_INVALID") => LlmError::Unauthorized {
            provider: provider.to_owned(),
        },
        429 => LlmError::RateLimited {
            provider: provider.to_owned(),
        },
        500..=599 => LlmError::Transient {
            provider: provider.to_owned(),
            reason: format!("status {status}"),
        },
        code => LlmError::Api {
            provider: provider.to_owned(),
            status: code,
        },
    }
}

fn classify_transport(provider: &str, err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout {
            provider: provider.to_owned(),
        }
    } else if err.is_connect() {
        LlmError::Transient {
            provider: provider.to_owned(),
            reason: err.to_string(),
        }
    } else {
        LlmError::Http(err)
    }
}

/// Send an HTTP request, retrying up to `max_retries` times on rate limiting,
/// 5xx responses, timeouts and connection failures.
///
/// `f` builds and sends a fresh request on every call. Authentication failures
/// and other client errors are returned immediately. Returns the successful
/// `Response` for further processing by the caller.
///
/// # Errors
///
/// Returns the classified error of the last attempt.
pub(crate) async fn send_with_retry<F, Fut>(
    provider_name: &str,
    max_retries: u32,
    mut f: F,
) -> Result<reqwest::Response, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        let (err, delay) = match f().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }
                let delay = retry_delay(response.headers(), attempt);
                let body = response.text().await.unwrap_or_default();
                let err = classify_status(provider_name, status, &body);
                if !err.is_transient() {
                    tracing::error!(provider = provider_name, %status, "API error: {body}");
                    return Err(err);
                }
                (err, delay)
            }
            Err(e) => {
                let err = classify_transport(provider_name, e);
                if !err.is_transient() {
                    tracing::error!(provider = provider_name, "request failed: {err}");
                    return Err(err);
                }
                (err, backoff(attempt))
            }
        };

        if attempt >= max_retries {
            tracing::warn!(
                provider = provider_name,
                attempts = attempt + 1,
                "giving up: {err}"
            );
            return Err(err);
        }
        attempt += 1;
        tracing::warn!(
            "{err}, retrying in {}ms ({attempt}/{max_retries})",
            delay.as_millis()
        );
        tokio::time::sleep(delay).await;
    }
}
