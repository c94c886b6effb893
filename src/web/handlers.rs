//! HTTP request handlers.

use super::AppState;
use crate::cache::ReportCache;
use crate::registry::HttpMethod;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

// ============================================================================
// Templates
// ============================================================================

const DASHBOARD_TEMPLATE: &str = include_str!("templates/dashboard.html");
const LAYOUT_TEMPLATE: &str = include_str!("templates/layout.html");

// ============================================================================
// Dashboard
// ============================================================================

pub async fn handle_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    let groups: Vec<&str> = state.registry.group_keys().collect();
    let groups_json = serde_json::to_string(&groups).unwrap_or_else(|_| "[]".to_string());

    let content = DASHBOARD_TEMPLATE
        .replace("{{groups_json}}", &groups_json)
        .replace("{{refresh_ms}}", &state.config.cache_ttl.as_millis().max(5_000).to_string());

    let page = LAYOUT_TEMPLATE
        .replace("{{title}}", "Flux Cockpit")
        .replace("{{content}}", &content);

    Html(page)
}

// ============================================================================
// API: Aggregation
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct AggregateQuery {
    #[serde(default)]
    pub refresh: bool,
}

pub async fn handle_health_aggregate(
    State(state): State<AppState>,
    Path(group): Path<String>,
    Query(query): Query<AggregateQuery>,
) -> Response {
    let Some(targets) = state.registry.group(&group) else {
        return unknown_group(&group);
    };

    // A zero TTL always recomputes but keeps the old entry as a fallback
    let ttl = if query.refresh {
        Duration::ZERO
    } else {
        state.config.cache_ttl
    };
    let aggregator = state.aggregator.clone();
    let timeout = state.config.probe_timeout;

    let result = state
        .cache
        .get_or_try_compute(&group, ttl, || async move {
            aggregator.aggregate(&targets, timeout).await
        })
        .await;

    match result {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            tracing::error!("Aggregation failed for {}: {}", group, e);
            stale_or_unavailable(&state.cache, &group).await
        }
    }
}

/// Serve the last cached report marked stale, or an explicit unavailable body.
pub async fn stale_or_unavailable(cache: &ReportCache, group: &str) -> Response {
    match cache.peek(group).await {
        Some((mut report, age)) => {
            tracing::warn!("Serving stale report for {} (age {:?})", group, age);
            report.stale = true;
            Json(report).into_response()
        }
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "status": "unavailable",
                "error": "Health data is currently unavailable",
                "group": group,
            })),
        )
            .into_response(),
    }
}

pub async fn handle_invalidate(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> Response {
    if state.registry.group(&group).is_none() {
        return unknown_group(&group);
    }

    let evicted = state.cache.invalidate(&group).await;
    tracing::info!("Cache invalidated for {} (evicted: {})", group, evicted);

    Json(json!({ "success": true, "evicted": evicted })).into_response()
}

fn unknown_group(group: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": format!("Unknown group: {}", group),
        })),
    )
        .into_response()
}

// ============================================================================
// API: Groups
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub name: String,
    pub description: String,
    pub endpoint: String,
    pub method: HttpMethod,
    pub requires_auth: bool,
}

#[derive(Debug, Serialize)]
pub struct GroupInfo {
    pub key: String,
    pub targets: Vec<TargetInfo>,
}

pub async fn handle_groups(State(state): State<AppState>) -> impl IntoResponse {
    let groups: Vec<GroupInfo> = state
        .registry
        .group_keys()
        .map(|key| GroupInfo {
            key: key.to_string(),
            targets: state
                .registry
                .group(key)
                .unwrap_or_default()
                .into_iter()
                .map(|t| TargetInfo {
                    name: t.name,
                    description: t.description,
                    endpoint: t.path,
                    method: t.method,
                    requires_auth: t.requires_auth,
                })
                .collect(),
        })
        .collect();

    Json(groups)
}

// ============================================================================
// Service health
// ============================================================================

pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "uptimeSeconds": state.started_at.elapsed().as_secs(),
        "cache": {
            "size": state.cache.len().await,
            "keys": state.cache.keys().await,
        },
    }))
}

// ============================================================================
// Static Assets
// ============================================================================

/// Flux-blue pulse mark shown in the browser tab.
const FAVICON_SVG: &str = concat!(
    r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 32 32">"##,
    r##"<rect width="32" height="32" rx="6" fill="#2b6cb0"/>"##,
    r##"<polyline points="4,17 10,17 13,9 18,24 21,14 28,14" fill="none" stroke="#fff" stroke-width="2.5"/>"##,
    "</svg>",
);

pub async fn handle_favicon() -> Response {
    (
        [
            (header::CONTENT_TYPE, "image/svg+xml"),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        FAVICON_SVG,
    )
        .into_response()
}
