//! # slo-router
//!
//! Cost- and SLO-aware routing gateway for LLM inference providers.
//!
//! For each incoming completion request the engine picks one provider
//! according to a configurable policy trading cost against latency and
//! reliability, calls it through a resilience wrapper (per-attempt
//! timeout, bounded retries with backoff and jitter, per-provider circuit
//! breaker), records the outcome into sliding-window statistics that feed
//! back into subsequent decisions, and runs a canary traffic splitter
//! that progressively shifts traffic to a candidate provider and rolls
//! back on error-budget burn.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use slo_router::{Config, server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = Config::from_env()?;
//!     server::run_server(config).await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod monitoring;
pub mod server;
pub mod utils;

// Re-export main types
pub use config::Config;
pub use core::providers::{Completion, CompletionRequest, MockProvider, OpenAiProvider, Provider};
pub use core::resilience::{
    BreakerState, CircuitBreaker, OutcomeStats, ResilienceOptions, ResilientProvider,
};
pub use core::router::{CanaryStatus, Engine, EngineOptions, ProviderMetrics, RoutingPolicy};
pub use utils::error::{GatewayError, Result};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Name of the crate
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
        assert_eq!(NAME, "slo-router");
    }
}
