//! # Middleware Stack
//!
//! - [`metrics`]: Prometheus request, cache, and engine metrics.
//!
//! Request tracing uses `tower_http::trace::TraceLayer` directly in
//! [`app`](crate::app).

pub mod metrics;
