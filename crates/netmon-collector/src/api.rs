//! HTTP handlers.

use std::sync::Arc;

use askama::Template;
use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use serde::Deserialize;
use serde_json::json;

use crate::prometheus::render_prometheus;
use crate::record::MetricRecord;
use crate::store::MetricStore;

pub const DEFAULT_HISTORY: usize = 30;

/// Shared state for handlers.
#[derive(Clone)]
pub struct CollectorState {
    pub store: Arc<MetricStore>,
}

// ── API ────────────────────────────────────────────────────────

/// GET /api/latest
///
/// Serves `latest.json` from disk, so it survives collector restarts.
pub async fn latest(State(state): State<CollectorState>) -> impl IntoResponse {
    let path = state.store.latest_path();
    let path_str = path.display().to_string();
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "latest.json not found yet", "path": path_str })),
            )
                .into_response();
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string(), "path": path_str })),
            )
                .into_response();
        }
    };
    match serde_json::from_str::<serde_json::Value>(&content) {
        Ok(value) => Json(value).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string(), "path": path_str })),
        )
            .into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub n: Option<usize>,
    pub device: Option<String>,
}

/// GET /api/history?n=&device=
pub async fn history(
    State(state): State<CollectorState>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<MetricRecord>> {
    let n = query.n.unwrap_or(DEFAULT_HISTORY).min(state.store.capacity());
    let device = query.device.as_deref().filter(|d| !d.is_empty());
    Json(state.store.history(n, device))
}

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<CollectorState>) -> impl IntoResponse {
    let (messages, rejected) = state.store.counters();
    let body = render_prometheus(&state.store.latest_per_device(), messages, rejected);
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

// ── Dashboard ──────────────────────────────────────────────────

/// One row of the overview table.
pub struct DeviceRow {
    pub device: String,
    pub state: String,
    pub state_class: &'static str,
    pub rssi: String,
    pub router_ms: String,
    pub linux_ms: String,
    pub ts: String,
}

impl DeviceRow {
    fn from_record(r: &MetricRecord) -> Self {
        let state = r.state.clone().unwrap_or_else(|| "-".to_string());
        let state_class = match state.as_str() {
            "OK" => "ok",
            "DEG" => "degraded",
            "DOWN" => "down",
            "REC" => "recovering",
            _ => "unknown",
        };
        let num = |v: Option<i64>| match v {
            Some(v) if v >= 0 => v.to_string(),
            Some(_) | None => "-".to_string(),
        };
        Self {
            device: r.device.clone(),
            state,
            state_class,
            rssi: r.rssi.map_or_else(|| "-".to_string(), |v| v.to_string()),
            router_ms: num(r.router_ms),
            linux_ms: num(r.linux_ms),
            ts: r.ts.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    devices: Vec<DeviceRow>,
    messages: u64,
    rejected: u64,
}

/// GET /
pub async fn index(State(state): State<CollectorState>) -> Html<String> {
    let (messages, rejected) = state.store.counters();
    let tmpl = IndexTemplate {
        devices: state.store.latest_per_device().iter().map(DeviceRow::from_record).collect(),
        messages,
        rejected,
    };
    Html(tmpl.render().unwrap_or_else(|e| format!("<pre>Template error: {e}</pre>")))
}
