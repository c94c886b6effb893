//! Per-service payload shape heuristics.
//!
//! Upstream schemas are externally owned and unstable, so health is inferred
//! from structural checks. Each heuristic is a plain function registered under
//! a classifier key.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// How bad an error reported inside a successful response is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Degraded,
    Failed,
}

/// Result of matching a payload against a service's known shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    /// Payload matches a known healthy shape.
    Recognized { detail: Option<String> },
    /// Payload carries an explicit error.
    ReportedError { severity: Severity, message: String },
    /// Payload matches nothing known.
    Unrecognized,
}

impl Shape {
    fn recognized(detail: impl Into<Option<String>>) -> Self {
        Shape::Recognized {
            detail: detail.into(),
        }
    }
}

pub type Heuristic = fn(&Value) -> Shape;

/// Registry of heuristics keyed by classifier key.
#[derive(Clone, Default)]
pub struct Heuristics {
    by_key: HashMap<String, Heuristic>,
}

impl fmt::Debug for Heuristics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.by_key.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("Heuristics").field("keys", &keys).finish()
    }
}

impl Heuristics {
    /// Heuristics for every built-in service family.
    pub fn builtin() -> Self {
        let mut h = Self::default();
        h.register("chat-completion", chat_completion);
        h.register("document-files", document_files);
        h.register("image-generation", image_generation);
        h.register("daemon-node-count", daemon_node_count);
        h.register("daemon-info", daemon_info);
        h.register("app-list", app_list);
        h.register("explorer-stats", explorer_stats);
        h.register("stats-nodes", stats_nodes);
        h.register("transaction-list", transaction_list);
        h.register("model-list", model_list);
        h
    }

    pub fn register(&mut self, key: &str, heuristic: Heuristic) {
        self.by_key.insert(key.to_string(), heuristic);
    }

    pub fn get(&self, key: &str) -> Option<Heuristic> {
        self.by_key.get(key).copied()
    }
}

/// Human-readable text of an `error` field, if the payload has one.
pub fn error_text(payload: &Value) -> Option<String> {
    let error = payload.get("error")?;
    match error {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) => Some(s.clone()),
        Value::Object(obj) => Some(
            obj.get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string()),
        ),
        other => Some(other.to_string()),
    }
}

static NULL: Value = Value::Null;

/// Unwrap the Flux daemon `{"status": ..., "data": ...}` envelope.
///
/// Returns `None` when the payload is not enveloped.
fn flux_envelope(payload: &Value) -> Option<Result<&Value, String>> {
    let status = payload.get("status")?.as_str()?;
    let data = payload.get("data").unwrap_or(&NULL);
    match status {
        "success" => Some(Ok(data)),
        "error" => Some(Err(data
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| data.to_string()))),
        _ => None,
    }
}

fn non_empty_array(value: Option<&Value>) -> Option<usize> {
    value
        .and_then(Value::as_array)
        .map(Vec::len)
        .filter(|len| *len > 0)
}

fn chat_completion(payload: &Value) -> Shape {
    let model = payload
        .get("model")
        .and_then(Value::as_str)
        .map(|m| format!("model {}", m));

    if non_empty_array(payload.get("choices")).is_some() {
        return Shape::recognized(model);
    }
    if payload.get("id").is_some() && model.is_some() {
        return Shape::recognized(model);
    }
    if let Some(message) = error_text(payload) {
        return Shape::ReportedError {
            severity: Severity::Degraded,
            message,
        };
    }
    Shape::Unrecognized
}

fn document_files(payload: &Value) -> Shape {
    if let Some(count) = payload.get("data").and_then(Value::as_array).map(Vec::len) {
        return Shape::recognized(format!("{} files", count));
    }
    if payload.get("success").and_then(Value::as_bool) == Some(true) {
        return Shape::Recognized { detail: None };
    }
    if let Some(count) = payload.get("count").and_then(Value::as_u64) {
        return Shape::recognized(format!("{} files", count));
    }
    if payload.get("storage_used").is_some() {
        return Shape::Recognized { detail: None };
    }
    if let Some(message) = error_text(payload) {
        return Shape::ReportedError {
            severity: Severity::Degraded,
            message,
        };
    }
    Shape::Unrecognized
}

fn image_generation(payload: &Value) -> Shape {
    // An empty image list still proves the endpoint answered in the right shape
    let images = payload
        .get("images")
        .and_then(Value::as_array)
        .or_else(|| payload.get("data").and_then(Value::as_array));
    if let Some(images) = images {
        return Shape::recognized(format!("{} images", images.len()));
    }
    if payload.get("url").and_then(Value::as_str).is_some() {
        return Shape::Recognized { detail: None };
    }
    if let Some(message) = error_text(payload) {
        return Shape::ReportedError {
            severity: Severity::Degraded,
            message,
        };
    }
    Shape::Unrecognized
}

/// Daemon payloads are enveloped; an error envelope means the daemon itself
/// is unhealthy.
fn daemon_payload<F>(payload: &Value, inner: F) -> Shape
where
    F: Fn(&Value) -> Shape,
{
    match flux_envelope(payload) {
        Some(Ok(data)) => inner(data),
        Some(Err(message)) => Shape::ReportedError {
            severity: Severity::Failed,
            message,
        },
        None => match error_text(payload) {
            Some(message) => Shape::ReportedError {
                severity: Severity::Failed,
                message,
            },
            None => inner(payload),
        },
    }
}

fn daemon_node_count(payload: &Value) -> Shape {
    daemon_payload(payload, |data| {
        let count = data
            .as_u64()
            .or_else(|| data.get("total").and_then(Value::as_u64))
            .or_else(|| data.get("count").and_then(Value::as_u64));
        match count {
            Some(n) => Shape::recognized(format!("{} nodes", n)),
            None => Shape::Unrecognized,
        }
    })
}

fn daemon_info(payload: &Value) -> Shape {
    daemon_payload(payload, |data| {
        if let Some(blocks) = data.get("blocks").and_then(Value::as_u64) {
            return Shape::recognized(format!("block height {}", blocks));
        }
        if data.get("version").is_some() {
            return Shape::Recognized { detail: None };
        }
        Shape::Unrecognized
    })
}

fn app_list(payload: &Value) -> Shape {
    daemon_payload(payload, |data| match data.as_array() {
        Some(apps) => Shape::recognized(format!("{} applications", apps.len())),
        None => Shape::Unrecognized,
    })
}

fn explorer_stats(payload: &Value) -> Shape {
    if let Some(message) = error_text(payload) {
        return Shape::ReportedError {
            severity: Severity::Degraded,
            message,
        };
    }
    let stats = payload.get("info").unwrap_or(payload);
    if let Some(height) = stats.get("blocks").and_then(Value::as_u64) {
        return Shape::recognized(format!("block height {}", height));
    }
    match stats.as_object() {
        Some(obj) if obj.values().any(Value::is_number) => Shape::Recognized { detail: None },
        _ => Shape::Unrecognized,
    }
}

fn stats_nodes(payload: &Value) -> Shape {
    daemon_payload(payload, |data| {
        if let Some(n) = non_empty_array(Some(data)) {
            return Shape::recognized(format!("{} nodes", n));
        }
        if let Some(n) = non_empty_array(data.get("data")) {
            return Shape::recognized(format!("{} nodes", n));
        }
        Shape::Unrecognized
    })
}

fn transaction_list(payload: &Value) -> Shape {
    if let Some(message) = error_text(payload) {
        return Shape::ReportedError {
            severity: Severity::Degraded,
            message,
        };
    }
    match payload.get("txs").unwrap_or(payload).as_array() {
        Some(txs) => Shape::recognized(format!("{} transactions", txs.len())),
        None => Shape::Unrecognized,
    }
}

fn model_list(payload: &Value) -> Shape {
    let models = payload
        .as_array()
        .or_else(|| payload.get("data").and_then(Value::as_array));
    if let Some(models) = models {
        return Shape::recognized(format!("{} models", models.len()));
    }
    if let Some(message) = error_text(payload) {
        return Shape::ReportedError {
            severity: Severity::Degraded,
            message,
        };
    }
    Shape::Unrecognized
}
