//! # stp-api: STEP Thumbnail Service
//!
//! HTTP front end for the preview and mesh pipeline. Uploads and server
//! paths are normalized into [`stp_core::SourceFile`] values and handed to
//! the [`orchestration::Orchestrator`], which consults the content cache
//! before invoking the geometry engine.
//!
//! ## API Surface
//!
//! | Route                         | Module                      |
//! |-------------------------------|-----------------------------|
//! | `GET  /health`                | [`routes::health`]          |
//! | `POST /thumbnail`             | [`routes::thumbnail`]       |
//! | `POST /thumbnail/from-path`   | [`routes::thumbnail`]       |
//! | `POST /convert/stl`           | [`routes::convert`]         |
//! | `POST /convert/stl/from-path` | [`routes::convert`]         |
//! | `GET  /metrics`               | [`prometheus_metrics`]      |
//! | `GET  /openapi.json`          | [`openapi`]                 |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → BodyLimit → Handler
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod openapi;
pub mod orchestration;
pub mod routes;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::{Extension, Router};
use stp_core::MAX_UPLOAD_BYTES;
use tower_http::trace::TraceLayer;

use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

/// Headroom above the largest accepted file for multipart framing and form fields.
const BODY_OVERHEAD: usize = 1024 * 1024;

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let metrics_on = state.config.metrics_enabled;
    let metrics = state.metrics.clone();

    let mut router = Router::new()
        .merge(routes::router())
        .merge(openapi::router());

    if metrics_on {
        router = router.route("/metrics", axum::routing::get(prometheus_metrics));
    }

    let mut router = router.layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + BODY_OVERHEAD));

    if metrics_on {
        router = router
            .layer(from_fn(middleware::metrics::metrics_middleware))
            .layer(Extension(metrics));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

/// GET /metrics: Prometheus metrics scrape endpoint.
///
/// Refreshes the cache size gauges from disk on each scrape (pull model),
/// then encodes all metrics in Prometheus text exposition format.
async fn prometheus_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> impl IntoResponse {
    let orchestrator = state.orchestrator.clone();
    match tokio::task::spawn_blocking(move || orchestrator.cache().stats()).await {
        Ok(Ok(stats)) => {
            metrics.cache_entries().set(stats.entries as f64);
            metrics.cache_bytes().set(stats.bytes as f64);
        }
        Ok(Err(e)) => tracing::warn!(error = %e, "failed to scan cache for metrics"),
        Err(e) => tracing::warn!(error = %e, "cache scan task failed"),
    }

    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}
