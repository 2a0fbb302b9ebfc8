//! netmon-collector: receives device telemetry and serves it over HTTP.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | Overview page, one row per device |
//! | GET | `/api/latest` | Most recent record (from `latest.json`) |
//! | GET | `/api/history?n=&device=` | Last `n` records, oldest first |
//! | GET | `/metrics` | Prometheus exposition |

pub mod api;
pub mod error;
pub mod prometheus;
pub mod record;
pub mod store;
pub mod subscriber;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;

pub use error::{CollectorError, CollectorResult};
pub use record::MetricRecord;
pub use store::MetricStore;
pub use subscriber::SubscriberOptions;

/// Build the HTTP router.
pub fn build_router(store: Arc<MetricStore>) -> Router {
    let state = api::CollectorState { store };
    Router::new()
        .route("/", get(api::index))
        .route("/api/latest", get(api::latest))
        .route("/api/history", get(api::history))
        .route("/metrics", get(api::prometheus_metrics))
        .with_state(state)
}
