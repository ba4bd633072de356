//! Shared HTTP plumbing for the source adapters

use std::time::Duration;

use harvester_domain::SourceError;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use time::OffsetDateTime;

pub const USER_AGENT: &str = concat!("resource-harvester/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout used when the configuration does not set one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Longest error body excerpt kept in a [`SourceError`]
const MAX_ERROR_BODY: usize = 200;

pub fn build_client(timeout: Duration) -> Result<Client, SourceError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| SourceError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Send the request and turn non-success statuses into [`SourceError`]s
pub async fn send(request: RequestBuilder) -> Result<Response, SourceError> {
    let response = request.send().await.map_err(map_transport_error)?;
    check_status(response).await
}

/// Send the request and decode a JSON body
pub async fn get_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, SourceError> {
    let response = send(request).await?;
    response.json::<T>().await.map_err(|e| {
        if e.is_timeout() {
            SourceError::Timeout
        } else {
            SourceError::Parse(e.to_string())
        }
    })
}

pub fn map_transport_error(error: reqwest::Error) -> SourceError {
    if error.is_timeout() {
        SourceError::Timeout
    } else if error.is_builder() {
        SourceError::Config(error.to_string())
    } else {
        SourceError::Network(error.to_string())
    }
}

pub async fn check_status(response: Response) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if is_rate_limited(status, response.headers()) {
        let retry_after = retry_after(response.headers(), OffsetDateTime::now_utc());
        tracing::warn!(status = %status, retry_after = ?retry_after, "Upstream rate limit hit");
        return Err(SourceError::RateLimited { retry_after });
    }

    let body = response.text().await.unwrap_or_default();
    let message: String = body.chars().take(MAX_ERROR_BODY).collect();
    let status = status.as_u16();

    if status >= 500 || status == 408 {
        Err(SourceError::Server { status, message })
    } else {
        Err(SourceError::Client { status, message })
    }
}

/// 429, or 403 with an explicit zero remaining quota
pub fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN
            && (header_u64(headers, "x-ratelimit-remaining") == Some(0)
                || header_u64(headers, "ratelimit-remaining") == Some(0)))
}

/// Time until the quota window resets, from reset timestamps (unix seconds)
/// or a `retry-after` delay
pub fn retry_after(headers: &HeaderMap, now: OffsetDateTime) -> Option<Duration> {
    let reset = header_u64(headers, "x-ratelimit-reset")
        .or_else(|| header_u64(headers, "x-rate-limit-reset"))
        .or_else(|| header_u64(headers, "ratelimit-reset"));

    if let Some(reset) = reset {
        let now = u64::try_from(now.unix_timestamp()).unwrap_or(0);
        return Some(Duration::from_secs(reset.saturating_sub(now)));
    }

    header_u64(headers, "retry-after").map(Duration::from_secs)
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
}

/// Decode every entry on its own, skipping the ones that do not fit `T`
pub fn decode_lenient<T: DeserializeOwned>(source: &str, values: Vec<serde_json::Value>) -> Vec<T> {
    let total = values.len();
    let decoded: Vec<T> = values
        .into_iter()
        .filter_map(|value| match serde_json::from_value(value) {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::debug!(source = %source, error = %e, "Skipping malformed entry");
                None
            }
        })
        .collect();

    if decoded.len() < total {
        tracing::warn!(
            source = %source,
            skipped = total - decoded.len(),
            total,
            "Skipped malformed entries"
        );
    }
    decoded
}
