//! Routing engine test suites

mod canary_tests;

use crate::core::providers::{Completion, CompletionRequest, Provider};
use crate::core::resilience::{ResilienceOptions, ResilientProvider};
use crate::utils::error::{GatewayError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Fixed-cost, fixed-latency provider stub for engine tests.
pub(super) struct StubProvider {
    name: String,
    cost: f64,
    fail: bool,
}

impl StubProvider {
    pub(super) fn new(name: &str, cost: f64) -> Self {
        Self {
            name: name.to_string(),
            cost,
            fail: false,
        }
    }

    pub(super) fn failing(name: &str, cost: f64) -> Self {
        Self {
            name: name.to_string(),
            cost,
            fail: true,
        }
    }
}

#[async_trait]
impl Provider for StubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn cost_per_1k_tokens_usd(&self, _model: &str) -> f64 {
        self.cost
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion> {
        if self.fail {
            return Err(GatewayError::Provider {
                provider: self.name.clone(),
                message: "stub failure".to_string(),
            });
        }
        Ok(Completion {
            text: "ok".to_string(),
            cost_usd: self.cost / 1000.0,
            latency_ms: 1,
        })
    }
}

/// Wrap a stub with fast-test resilience options.
pub(super) fn resilient(provider: StubProvider) -> Arc<ResilientProvider> {
    Arc::new(ResilientProvider::new(
        Box::new(provider),
        ResilienceOptions {
            timeout: Duration::from_millis(200),
            max_retries: 0,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(10),
            jitter_frac: 0.0,
            cb_window: 20,
            cb_cooldown: Duration::from_millis(10),
        },
    ))
}
