//! HTTP server assembly
//!
//! Builds the provider set and routing engine from configuration, then
//! serves the inference, admin, and health surfaces.

pub mod routes;
pub mod state;

pub use state::AppState;

use crate::config::Config;
use crate::core::providers::{MockProvider, OpenAiProvider, Provider};
use crate::core::resilience::ResilientProvider;
use crate::core::router::{Engine, EngineOptions};
use crate::utils::error::{GatewayError, Result};
use actix_web::{App, HttpServer as ActixHttpServer, middleware::Logger, web};
use std::sync::Arc;
use tracing::{info, warn};

/// Build the resilient provider set declared by the configuration, in
/// registration order: OpenAI first when a key is present, then the mock.
pub fn build_providers(config: &Config) -> Vec<Arc<ResilientProvider>> {
    let mut providers: Vec<Arc<ResilientProvider>> = Vec::new();
    let opts = config.resilience_options();

    if !config.openai.api_key.is_empty() {
        let openai: Box<dyn Provider> = Box::new(OpenAiProvider::new(config.openai.api_key.clone()));
        providers.push(Arc::new(ResilientProvider::new(openai, opts.clone())));
    }
    if config.mock.enabled {
        let mock: Box<dyn Provider> = Box::new(MockProvider::new(
            config.mock.mean_latency_ms,
            config.mock.p95_latency_ms,
            config.mock.error_rate,
            config.mock.cost_per_1k_usd,
        ));
        providers.push(Arc::new(ResilientProvider::new(mock, opts)));
    }

    if providers.is_empty() {
        warn!("no providers configured; completions will be rejected with 503");
    }
    providers
}

/// Build the routing engine from configuration.
pub fn build_engine(config: &Config) -> Arc<Engine> {
    let providers = build_providers(config);
    let engine = Engine::new(
        providers,
        EngineOptions {
            slo_target: config.router.slo_target,
            default_policy: config.router.default_policy,
            rng_seed: config.router.rng_seed,
        },
    );
    engine.configure_canary(
        config.canary.stages.clone(),
        config.canary.window,
        config.canary.burn_multiplier,
    );
    Arc::new(engine)
}

/// Start the HTTP server and run until shutdown.
pub async fn run_server(config: Config) -> Result<()> {
    info!(config = ?config.mask_secrets(), "starting gateway");

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let engine = build_engine(&config);
    let state = web::Data::new(AppState::new(config, engine));

    let server = ActixHttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .configure(routes::completions::configure_routes)
            .configure(routes::admin::configure_routes)
            .configure(routes::health::configure_routes)
    })
    .bind(&bind_addr)
    .map_err(|e| GatewayError::server(format!("failed to bind to {bind_addr}: {e}")))?
    .run();

    info!("gateway listening on {}", bind_addr);
    server
        .await
        .map_err(|e| GatewayError::server(format!("server error: {e}")))?;

    info!("gateway stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::router::RoutingPolicy;

    #[test]
    fn test_build_providers_from_config() {
        let mut config = Config::default();
        assert!(build_providers(&config).is_empty());

        config.mock.enabled = true;
        let providers = build_providers(&config);
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].name(), "mock");

        config.openai.api_key = "sk-test".to_string();
        let providers = build_providers(&config);
        assert_eq!(providers.len(), 2);
        // OpenAI registers first.
        assert_eq!(providers[0].name(), "openai");
        assert_eq!(providers[1].name(), "mock");
    }

    #[test]
    fn test_build_engine_applies_config() {
        let mut config = Config::default();
        config.mock.enabled = true;
        config.router.default_policy = RoutingPolicy::SloBurnAware;
        config.canary.stages = vec![2.0, 20.0];
        config.canary.window = 50;

        let engine = build_engine(&config);
        assert_eq!(engine.default_policy(), RoutingPolicy::SloBurnAware);
        let status = engine.canary_status();
        assert_eq!(status.window_size, 50);
        // Single provider: no candidate, zero split.
        assert_eq!(status.percent, 0.0);
    }
}
