//! Application state shared across HTTP handlers

use crate::config::Config;
use crate::core::router::Engine;
use crate::monitoring::Metrics;
use std::sync::Arc;

/// Shared resources handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    /// Gateway configuration (read-only after startup)
    pub config: Arc<Config>,
    /// Routing engine
    pub engine: Arc<Engine>,
    /// Request metrics registry
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Create a new state bundle.
    pub fn new(config: Config, engine: Arc<Engine>) -> Self {
        Self {
            config: Arc::new(config),
            engine,
            metrics: Arc::new(Metrics::new()),
        }
    }
}
