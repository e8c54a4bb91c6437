//! # Application State
//!
//! Shared, read-only handles injected into every handler. Constructed once
//! at startup; nothing in here is mutated afterwards.

use std::sync::Arc;

use stp_cache::ContentCache;
use stp_engine::GeometryEngine;

use crate::config::AppConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::orchestration::Orchestrator;

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub orchestrator: Arc<Orchestrator>,
    pub metrics: ApiMetrics,
}

impl AppState {
    /// Wire the cache at `config.cache_dir` to `engine`.
    pub fn new(config: AppConfig, engine: Arc<dyn GeometryEngine>) -> Self {
        let mut orchestrator = Orchestrator::new(ContentCache::new(&config.cache_dir), engine);
        if let Some(dir) = &config.staging_dir {
            orchestrator = orchestrator.with_staging_dir(dir);
        }
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            metrics: ApiMetrics::new(),
        }
    }
}
