//! # Prometheus Metrics
//!
//! HTTP-level metrics (request counts, latency, errors) are recorded in
//! middleware. Cache lookups and engine failures are recorded by the
//! handlers as each orchestration finishes. Cache size gauges are refreshed
//! on each `/metrics` scrape (pull model); see the metrics handler in `lib.rs`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{
    core::Collector, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use stp_core::ArtifactKind;

use crate::orchestration::CacheStatus;

/// Paths that may be used as a label when the router did not record a match.
const KNOWN_ROUTES: &[&str] = &[
    "/health",
    "/thumbnail",
    "/thumbnail/from-path",
    "/convert/stl",
    "/convert/stl/from-path",
    "/metrics",
    "/openapi.json",
];

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,

    // -- HTTP middleware metrics (push model) --
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,

    // -- Orchestration metrics (push model, recorded by handlers) --
    cache_lookups_total: IntCounterVec,
    generation_duration_seconds: HistogramVec,
    engine_failures_total: IntCounterVec,

    // -- Cache gauges (pull model, updated on /metrics scrape) --
    cache_entries: Gauge,
    cache_bytes: Gauge,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("errors", &self.errors())
            .finish()
    }
}

impl ApiMetrics {
    /// Create a new metrics instance with a fresh Prometheus registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("stp_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "stp_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
            ]),
            &["method", "path"],
        )
        .expect("metric can be created");

        let http_errors_total = IntCounterVec::new(
            Opts::new("stp_http_errors_total", "Total HTTP errors (4xx and 5xx)"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let cache_lookups_total = IntCounterVec::new(
            Opts::new(
                "stp_cache_lookups_total",
                "Artifact cache lookups by artifact kind and result",
            ),
            &["kind", "result"],
        )
        .expect("metric can be created");

        let generation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "stp_generation_duration_seconds",
                "Time spent producing an artifact on a cache miss",
            )
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
            &["kind"],
        )
        .expect("metric can be created");

        let engine_failures_total = IntCounterVec::new(
            Opts::new(
                "stp_engine_failures_total",
                "Geometry engine failures by artifact kind",
            ),
            &["kind"],
        )
        .expect("metric can be created");

        let cache_entries = Gauge::new("stp_cache_entries", "Committed artifacts in the cache")
            .expect("metric can be created");

        let cache_bytes = Gauge::new("stp_cache_bytes", "Total size of committed artifacts")
            .expect("metric can be created");

        let collectors: Vec<Box<dyn Collector>> = vec![
            Box::new(http_requests_total.clone()),
            Box::new(http_request_duration_seconds.clone()),
            Box::new(http_errors_total.clone()),
            Box::new(cache_lookups_total.clone()),
            Box::new(generation_duration_seconds.clone()),
            Box::new(engine_failures_total.clone()),
            Box::new(cache_entries.clone()),
            Box::new(cache_bytes.clone()),
        ];
        for collector in collectors {
            registry
                .register(collector)
                .expect("metric can be registered");
        }

        Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_errors_total,
                cache_lookups_total,
                generation_duration_seconds,
                engine_failures_total,
                cache_entries,
                cache_bytes,
            }),
        }
    }

    /// Return current total request count (sum across all labels).
    pub fn requests(&self) -> u64 {
        sum_counter(&self.inner.http_requests_total)
    }

    /// Return current total error count (sum across all labels).
    pub fn errors(&self) -> u64 {
        sum_counter(&self.inner.http_errors_total)
    }

    /// Lookups of `kind` that ended with `status`.
    pub fn cache_lookups(&self, kind: ArtifactKind, status: CacheStatus) -> u64 {
        self.inner
            .cache_lookups_total
            .with_label_values(&[kind.as_str(), status.as_label()])
            .get()
    }

    pub fn engine_failures(&self, kind: ArtifactKind) -> u64 {
        self.inner
            .engine_failures_total
            .with_label_values(&[kind.as_str()])
            .get()
    }

    /// Record an HTTP request (called by the middleware).
    fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();

        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);

        if status >= 400 {
            self.inner
                .http_errors_total
                .with_label_values(&[method, path, &status_str])
                .inc();
        }
    }

    /// Record a finished cache lookup; misses also record generation time.
    pub fn record_lookup(&self, kind: ArtifactKind, status: CacheStatus, duration_secs: f64) {
        self.inner
            .cache_lookups_total
            .with_label_values(&[kind.as_str(), status.as_label()])
            .inc();
        if status == CacheStatus::Miss {
            self.inner
                .generation_duration_seconds
                .with_label_values(&[kind.as_str()])
                .observe(duration_secs);
        }
    }

    pub fn record_engine_failure(&self, kind: ArtifactKind) {
        self.inner
            .engine_failures_total
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    /// Access the cache entry gauge for updating.
    pub fn cache_entries(&self) -> &Gauge {
        &self.inner.cache_entries
    }

    /// Access the cache size gauge for updating.
    pub fn cache_bytes(&self) -> &Gauge {
        &self.inner.cache_bytes
    }

    /// Gather all metrics and encode to Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer)
            .map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn sum_counter(counter: &IntCounterVec) -> u64 {
    counter
        .collect()
        .iter()
        .flat_map(|mf| mf.get_metric())
        .map(|m| m.get_counter().get_value() as u64)
        .sum()
}

/// Route label for a request, bounded to the routes this service serves.
fn route_label(request: &Request) -> String {
    if let Some(matched) = request.extensions().get::<MatchedPath>() {
        return matched.as_str().to_string();
    }
    let path = request.uri().path();
    if KNOWN_ROUTES.contains(&path) {
        path.to_string()
    } else {
        "unmatched".to_string()
    }
}

/// Middleware that records HTTP request metrics via Prometheus.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = route_label(&request);
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        let duration = start.elapsed().as_secs_f64();
        let status = response.status().as_u16();
        m.record_request(&method, &path, status, duration);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn api_metrics_new_starts_at_zero() {
        let m = ApiMetrics::new();
        assert_eq!(m.requests(), 0);
        assert_eq!(m.errors(), 0);
        assert_eq!(m.cache_lookups(ArtifactKind::Preview, CacheStatus::Hit), 0);
    }

    #[test]
    fn requests_and_errors_counted_separately() {
        let m = ApiMetrics::new();
        m.record_request("GET", "/health", 200, 0.001);
        m.record_request("POST", "/thumbnail", 400, 0.002);
        m.record_request("POST", "/thumbnail", 500, 0.5);
        assert_eq!(m.requests(), 3);
        assert_eq!(m.errors(), 2);
    }

    #[test]
    fn lookups_are_labelled_by_kind_and_result() {
        let m = ApiMetrics::new();
        m.record_lookup(ArtifactKind::Preview, CacheStatus::Miss, 1.2);
        m.record_lookup(ArtifactKind::Preview, CacheStatus::Hit, 0.0);
        m.record_lookup(ArtifactKind::Preview, CacheStatus::Hit, 0.0);
        m.record_lookup(ArtifactKind::Mesh, CacheStatus::Miss, 3.4);
        assert_eq!(m.cache_lookups(ArtifactKind::Preview, CacheStatus::Hit), 2);
        assert_eq!(m.cache_lookups(ArtifactKind::Preview, CacheStatus::Miss), 1);
        assert_eq!(m.cache_lookups(ArtifactKind::Mesh, CacheStatus::Miss), 1);
        assert_eq!(m.cache_lookups(ArtifactKind::Mesh, CacheStatus::Hit), 0);
    }

    #[test]
    fn engine_failures_counted() {
        let m = ApiMetrics::new();
        m.record_engine_failure(ArtifactKind::Mesh);
        assert_eq!(m.engine_failures(ArtifactKind::Mesh), 1);
        assert_eq!(m.engine_failures(ArtifactKind::Preview), 0);
    }

    #[test]
    fn encode_contains_metric_names() {
        let m = ApiMetrics::new();
        m.record_request("GET", "/health", 200, 0.001);
        m.record_lookup(ArtifactKind::Mesh, CacheStatus::Miss, 0.3);
        m.cache_entries().set(4.0);
        let text = m.gather_and_encode().unwrap();
        assert!(text.contains("stp_http_requests_total"));
        assert!(text.contains("stp_cache_lookups_total"));
        assert!(text.contains("stp_generation_duration_seconds"));
        assert!(text.contains("stp_cache_entries 4"));
    }

    #[test]
    fn unknown_paths_collapse_to_one_label() {
        let request = Request::builder()
            .uri("/thumbnail/../../etc/passwd")
            .body(Body::empty())
            .unwrap();
        assert_eq!(route_label(&request), "unmatched");

        let request = Request::builder()
            .uri("/convert/stl")
            .body(Body::empty())
            .unwrap();
        assert_eq!(route_label(&request), "/convert/stl");
    }
}
