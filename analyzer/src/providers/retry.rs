//! Retry logic with exponential backoff for provider requests.

use anyhow::Result;
use std::time::Duration;

use crate::providers::ProviderError;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial backoff duration
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Backoff multiplier
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A configuration that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }
}

/// Execute a function with exponential backoff retry logic.
///
/// A rate-limit error waits at least as long as the server asked for,
/// capped at `max_backoff`.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;
    let mut backoff = config.initial_backoff;

    loop {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                attempt += 1;
                if attempt > config.max_retries || !is_retryable(&e) {
                    return Err(e);
                }

                let wait = match e.downcast_ref::<ProviderError>() {
                    Some(ProviderError::RateLimited { retry_after_secs }) => backoff
                        .max(Duration::from_secs(*retry_after_secs))
                        .min(config.max_backoff),
                    _ => backoff,
                };

                tracing::warn!(
                    attempt = attempt,
                    max_retries = config.max_retries,
                    backoff_ms = wait.as_millis(),
                    error = %e,
                    "Request failed, retrying"
                );

                tokio::time::sleep(wait).await;

                // Exponential backoff with cap
                backoff = Duration::from_secs_f64(
                    (backoff.as_secs_f64() * config.multiplier)
                        .min(config.max_backoff.as_secs_f64()),
                );
            }
        }
    }
}

/// Determine if an error is worth another attempt.
pub fn is_retryable(error: &anyhow::Error) -> bool {
    match error.downcast_ref::<ProviderError>() {
        Some(ProviderError::RateLimited { .. }) => return true,
        Some(ProviderError::Http { status, .. }) => {
            return matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504);
        }
        Some(_) => return false,
        None => {}
    }

    if let Some(e) = error.downcast_ref::<reqwest::Error>()
        && (e.is_timeout() || e.is_connect())
    {
        return true;
    }

    let error_str = error.to_string().to_lowercase();

    // Client errors echo the request back in their body; only the status counts.
    if error_str.contains("http 4") && !error_str.contains("http 429") {
        return false;
    }

    if error_str.contains("connection")
        || error_str.contains("timeout")
        || error_str.contains("dns")
        || error_str.contains("network")
    {
        return true;
    }

    ["http 429", "http 500", "http 502", "http 503", "http 504"]
        .iter()
        .any(|code| error_str.contains(code))
}
