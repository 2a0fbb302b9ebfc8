//! Router-level tests for the collector HTTP surface.

use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use netmon_collector::{MetricRecord, MetricStore, build_router};

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_string(resp: axum::response::Response) -> String {
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn seeded_store(dir: &std::path::Path) -> Arc<MetricStore> {
    let store = MetricStore::open(dir, 100).unwrap();
    let messages: [(&str, &[u8], &str); 4] = [
        ("netmon/attic/metrics", br#"{"rssi":-61,"router_ms":4,"linux_ms":11,"state":"OK"}"#, "2026-05-01T10:00:00Z"),
        ("netmon/garage/metrics", br#"{"rssi":-77,"router_ms":-1,"linux_ms":-1,"state":"DOWN"}"#, "2026-05-01T10:00:01Z"),
        ("netmon/attic/metrics", b"not-json", "2026-05-01T10:00:02Z"),
        ("netmon/attic/metrics", br#"{"rssi":-60,"router_ms":5,"linux_ms":95,"state":"DEG"}"#, "2026-05-01T10:00:03Z"),
    ];
    for (topic, body, ts) in messages {
        store.ingest(topic, body, ts).unwrap();
    }
    Arc::new(store)
}

#[tokio::test]
async fn latest_before_any_message() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(Arc::new(MetricStore::open(dir.path(), 10).unwrap()));

    let resp = router.oneshot(get("/api/latest")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(body["error"], "latest.json not found yet");
    assert!(body["path"].as_str().unwrap().ends_with("latest.json"));
}

#[tokio::test]
async fn latest_is_the_newest_valid_record() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(seeded_store(dir.path()));

    let resp = router.oneshot(get("/api/latest")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let record: MetricRecord = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(record.device, "attic");
    assert_eq!(record.state.as_deref(), Some("DEG"));
    assert_eq!(record.ts, "2026-05-01T10:00:03Z");
}

#[tokio::test]
async fn history_filters_and_limits() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(seeded_store(dir.path()));

    let resp = router.clone().oneshot(get("/api/history")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let all: Vec<MetricRecord> = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].device, "attic");
    assert_eq!(all[1].device, "garage");

    let resp = router.clone().oneshot(get("/api/history?device=attic&n=1")).await.unwrap();
    let attic: Vec<MetricRecord> = serde_json::from_str(&body_string(resp).await).unwrap();
    assert_eq!(attic.len(), 1);
    assert_eq!(attic[0].state.as_deref(), Some("DEG"));

    let resp = router.oneshot(get("/api/history?n=abc")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn metrics_exposition() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(seeded_store(dir.path()));

    let resp = router.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));

    let text = body_string(resp).await;
    assert!(text.contains("netmon_linux_latency_ms{device=\"attic\"} 95\n"));
    assert!(text.contains("netmon_state{device=\"garage\",state=\"DOWN\"} 1\n"));
    assert!(!text.contains("netmon_router_latency_ms{device=\"garage\"}"));
    assert!(text.contains("netmon_messages_total 4\n"));
    assert!(text.contains("netmon_rejected_total 1\n"));
}

#[tokio::test]
async fn overview_page_lists_devices() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(seeded_store(dir.path()));

    let resp = router.oneshot(get("/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_string(resp).await;
    assert!(html.contains("attic"));
    assert!(html.contains("garage"));
    assert!(html.contains("class=\"state down\""));
}

#[tokio::test]
async fn overview_page_when_empty() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(Arc::new(MetricStore::open(dir.path(), 10).unwrap()));

    let html = body_string(router.oneshot(get("/")).await.unwrap()).await;
    assert!(html.contains("No telemetry received yet."));
}
