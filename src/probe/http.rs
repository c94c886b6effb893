//! HTTP probe implementation.

use super::{ProbeError, ProbeResult};
use crate::registry::{HttpMethod, ProbeTarget};

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use std::error::Error as StdError;
use std::time::{Duration, Instant};

/// Header carrying the AI provider API key.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Executes probes with a shared HTTP client.
///
/// Holds no mutable state; concurrent `execute` calls are independent.
#[derive(Clone)]
pub struct ProbeExecutor {
    client: reqwest::Client,
    api_key: Option<String>,
}

/// A response read to completion.
struct RawResponse {
    status: u16,
    body: Vec<u8>,
}

impl ProbeExecutor {
    /// Create an executor sending the given User-Agent and optional API key.
    pub fn new(user_agent: &str, api_key: Option<String>) -> Result<Self, ProbeError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent)
                .map_err(|e| ProbeError::Network(format!("invalid user agent: {}", e)))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ProbeError::Network(e.to_string()))?;

        Ok(Self { client, api_key })
    }

    /// Run one probe against `target`, bounded by `timeout`.
    ///
    /// Never returns an error: every failure is folded into the result.
    pub async fn execute(&self, target: &ProbeTarget, timeout: Duration) -> ProbeResult {
        let start = Instant::now();

        let outcome = match tokio::time::timeout(timeout, self.send(target, timeout)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProbeError::Timeout(timeout)),
        };
        let latency_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(raw) if raw.status >= 500 => {
                ProbeResult::failed(target, ProbeError::Server(raw.status), Some(latency_ms))
            }
            Ok(raw) => {
                let size = raw.body.len();
                ProbeResult::completed(target, raw.status, latency_ms, parse_payload(&raw.body), size)
            }
            Err(e) => ProbeResult::failed(target, e, None),
        }
    }

    async fn send(&self, target: &ProbeTarget, timeout: Duration) -> Result<RawResponse, ProbeError> {
        let url = target.url();

        let mut request = match target.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
        }
        .timeout(timeout);

        if target.requires_auth {
            if let Some(key) = &self.api_key {
                request = request.header(API_KEY_HEADER, key);
            }
        }

        if target.method == HttpMethod::Post {
            if let Some(payload) = &target.test_payload {
                request = request.json(payload);
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_transport_error(e, timeout))?;
        let status = response.status().as_u16();

        // Read the full body so latency covers the complete transfer
        let body = response
            .bytes()
            .await
            .map_err(|e| classify_transport_error(e, timeout))?;

        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }
}

/// Parse a response body as JSON.
///
/// Empty bodies yield `None`; non-JSON bodies are kept as a JSON string.
pub fn parse_payload(body: &[u8]) -> Option<serde_json::Value> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return None;
    }
    match serde_json::from_slice(body) {
        Ok(value) => Some(value),
        Err(_) => Some(serde_json::Value::String(
            String::from_utf8_lossy(body).into_owned(),
        )),
    }
}

/// Map a transport error onto the probe error taxonomy.
fn classify_transport_error(err: reqwest::Error, timeout: Duration) -> ProbeError {
    if err.is_timeout() {
        return ProbeError::Timeout(timeout);
    }
    classify_error_chain(&err, timeout)
}

/// Walk an error and its sources looking for io kinds or resolver failures.
fn classify_error_chain(err: &(dyn StdError + 'static), timeout: Duration) -> ProbeError {
    let mut messages = Vec::new();
    let mut current = Some(err);
    while let Some(cause) = current {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionRefused => {
                    return ProbeError::ConnectionRefused(err.to_string());
                }
                std::io::ErrorKind::TimedOut => return ProbeError::Timeout(timeout),
                _ => {}
            }
        }
        messages.push(cause.to_string());
        current = cause.source();
    }

    let chain = messages.join(": ").to_lowercase();
    if chain.contains("dns error") || chain.contains("failed to lookup address") {
        ProbeError::Dns(chain)
    } else {
        ProbeError::Network(chain)
    }
}
