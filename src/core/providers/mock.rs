//! Mock provider for local development and load testing
//!
//! Samples latency from a lognormal distribution fitted to a configured
//! mean and p95, injects failures at a configured rate, and returns a
//! canned completion. Useful for exercising the routing engine without
//! real backends.

use super::{Completion, CompletionRequest, Provider};
use crate::utils::error::{GatewayError, Result};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

const PROVIDER_NAME: &str = "mock";

/// z-score of the 95th percentile of the standard normal distribution.
const Z_95: f64 = 1.644_853_626_95;

/// Configurable fake backend with a lognormal latency profile.
pub struct MockProvider {
    mean_ms: f64,
    error_rate: f64,
    cost_per_1k: f64,
    /// Lognormal parameters derived from (mean, p95)
    mu: f64,
    sigma: f64,
    /// Outlier clamp, 3x the configured p95
    max_ms: f64,
}

impl MockProvider {
    /// Create a mock with the given latency profile, failure rate in
    /// `[0, 1]`, and list price per 1k tokens.
    pub fn new(mean_ms: f64, p95_ms: f64, error_rate: f64, cost_per_1k: f64) -> Self {
        let p95_ms = p95_ms.max(mean_ms);
        let sigma = solve_sigma(mean_ms, p95_ms);
        let mu = mean_ms.ln() - sigma * sigma / 2.0;
        Self {
            mean_ms,
            error_rate,
            cost_per_1k,
            mu,
            sigma,
            max_ms: 3.0 * p95_ms,
        }
    }

    /// Draw one latency sample in milliseconds.
    fn sample_latency_ms(&self) -> f64 {
        if self.mean_ms <= 0.0 {
            return 0.0;
        }
        let n = standard_normal();
        (self.mu + self.sigma * n).exp().clamp(0.0, self.max_ms)
    }
}

/// Solve `p95/mean = exp(sigma * (z - sigma/2))` for sigma by bisection.
fn solve_sigma(mean_ms: f64, p95_ms: f64) -> f64 {
    if mean_ms <= 0.0 || p95_ms <= mean_ms {
        return 1e-6;
    }
    let ratio = p95_ms / mean_ms;
    let f = |s: f64| (s * (Z_95 - s / 2.0)).exp() - ratio;
    let (mut lo, mut hi) = (1e-6f64, 3.0f64);
    for _ in 0..40 {
        let mid = (lo + hi) / 2.0;
        if f(mid) > 0.0 {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    (lo + hi) / 2.0
}

/// One standard normal draw via Box-Muller.
fn standard_normal() -> f64 {
    let mut rng = rand::thread_rng();
    let u1: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn cost_per_1k_tokens_usd(&self, _model: &str) -> f64 {
        self.cost_per_1k
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let latency = self.sample_latency_ms();
        tokio::time::sleep(Duration::from_micros((latency * 1000.0) as u64)).await;

        if rand::thread_rng().gen::<f64>() < self.error_rate {
            return Err(GatewayError::Provider {
                provider: PROVIDER_NAME.to_string(),
                message: "injected mock failure".to_string(),
            });
        }

        let tokens = if request.max_tokens > 0 {
            request.max_tokens
        } else {
            super::COST_ESTIMATE_TOKEN_FLOOR
        };
        Ok(Completion {
            text: "(mock) hello".to_string(),
            cost_usd: self.cost_per_1k * f64::from(tokens) / 1000.0,
            latency_ms: latency as u64,
        })
    }
}
