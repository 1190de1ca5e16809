//! Shared retry loop for JSON-over-HTTP providers.
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: `base_delay × 2^(attempt-1)`, exponent capped at 5
//!   (1s, 2s, 4s, 8s, 16s, 32s with the default base)

use std::time::Duration;

use tracing::warn;

/// How a request authenticates. Credentials never go in the URL.
#[derive(Debug, Clone, Copy)]
pub enum Auth<'a> {
    None,
    Bearer(&'a str),
    Header(&'static str, &'a str),
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(1),
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << (attempt - 1).min(5))
    }
}

/// POST `body` to `url` and return the parsed JSON response.
///
/// `label` names the service in error messages and log lines. The error
/// string is meant to be wrapped by the caller's error type.
pub async fn post_json(
    client: &reqwest::Client,
    label: &str,
    url: &str,
    auth: Auth<'_>,
    body: &serde_json::Value,
    policy: &RetryPolicy,
) -> Result<serde_json::Value, String> {
    let mut last_err = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.delay(attempt);
            warn!(
                service = label,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "retrying request"
            );
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        match auth {
            Auth::None => {}
            Auth::Bearer(token) => request = request.bearer_auth(token),
            Auth::Header(name, value) => request = request.header(name, value),
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| {
                            format!("{} returned invalid JSON: {}", label, e.without_url())
                        });
                }

                let body_text = response.text().await.unwrap_or_default();
                let err = format!("{} API error {}: {}", label, status, body_text);
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(err);
                    continue;
                }
                return Err(err);
            }
            Err(e) => {
                last_err = Some(format!("{} request failed: {}", label, e.without_url()));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| format!("{} failed after retries", label)))
}
