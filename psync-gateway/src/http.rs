//! Shared blocking HTTP plumbing: agent setup, throttling retries, paging headers.

use std::thread::sleep;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use ureq::{Agent, AgentBuilder, Request, Response};

use crate::GatewayError;

/// Upper bound on a single throttling wait.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    agent: Agent,
    max_retries: u32,
}

impl HttpClient {
    pub(crate) fn new(timeout: Duration, max_retries: u32) -> Self {
        let agent = AgentBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("psync/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent, max_retries }
    }

    pub(crate) fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Send `request`, retrying HTTP 429 up to `max_retries` times.
    pub(crate) fn call(
        &self,
        request: Request,
        body: Option<&serde_json::Value>,
    ) -> Result<Response, GatewayError> {
        let url = request.url().to_owned();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match body {
                Some(json) => request.clone().send_json(json.clone()),
                None => request.clone().call(),
            };
            match result {
                Ok(response) => return Ok(response),
                Err(ureq::Error::Status(429, response)) => {
                    if attempt > self.max_retries {
                        return Err(GatewayError::RateLimited {
                            url,
                            attempts: attempt,
                        });
                    }
                    let wait = backoff(&response, attempt);
                    tracing::warn!(
                        url = %url,
                        attempt,
                        wait_secs = wait.as_secs(),
                        "rate limited; retrying"
                    );
                    sleep(wait);
                }
                Err(ureq::Error::Status(status, response)) => {
                    let body = response.into_string().unwrap_or_default();
                    return Err(GatewayError::Http { status, url, body });
                }
                Err(ureq::Error::Transport(transport)) => {
                    return Err(GatewayError::Transport {
                        url,
                        message: transport.to_string(),
                    });
                }
            }
        }
    }
}

/// Decode a JSON body, keeping the URL for context.
pub(crate) fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
    let url = response.get_url().to_owned();
    response
        .into_json()
        .map_err(|source| GatewayError::Decode { url, source })
}

/// Wait derived from `Retry-After` (seconds) or `X-Rate-Limit-Reset` (epoch
/// seconds), falling back to linear backoff.
fn backoff(response: &Response, attempt: u32) -> Duration {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let hinted = response
        .header("retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .or_else(|| {
            response
                .header("x-rate-limit-reset")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|reset| reset.saturating_sub(now))
        });
    let secs = hinted.unwrap_or(u64::from(attempt)).max(1);
    Duration::from_secs(secs).min(MAX_BACKOFF)
}

/// Target of the `rel="next"` entry of an RFC 8288 `Link` header.
pub(crate) fn next_link(header: Option<&str>) -> Option<String> {
    header?.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|p| {
            let p = p.trim();
            p == "rel=\"next\"" || p == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_owned)
    })
}

/// `X-Next-Page` value, `None` on the last page.
pub(crate) fn next_page(header: Option<&str>) -> Option<u32> {
    header.and_then(|v| v.trim().parse().ok())
}
