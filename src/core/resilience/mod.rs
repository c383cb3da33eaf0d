//! Resilience wrapper around a provider
//!
//! Every registered provider is wrapped in a [`ResilientProvider`] that
//! enforces a per-attempt timeout, bounded retries with exponential
//! backoff and jitter, and a circuit-breaker gate, while recording every
//! attempt outcome into the provider's sliding-window statistics.

pub mod breaker;
pub mod stats;

pub use breaker::{BreakerState, CircuitBreaker};
pub use stats::{Outcome, OutcomeStats};

use crate::core::providers::{Completion, CompletionRequest, Provider};
use crate::utils::error::{GatewayError, Result};
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::debug;

/// Number of outcomes kept per provider for routing statistics.
pub const DEFAULT_STATS_WINDOW: usize = 100;

/// Knobs for the resilience wrapper.
#[derive(Debug, Clone)]
pub struct ResilienceOptions {
    /// Per-attempt deadline
    pub timeout: Duration,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Backoff before the first retry
    pub base_backoff: Duration,
    /// Backoff ceiling; zero disables the cap
    pub max_backoff: Duration,
    /// Jitter fraction in `[0, 1]` applied to each backoff
    pub jitter_frac: f64,
    /// Circuit-breaker window size
    pub cb_window: usize,
    /// Circuit-breaker cooldown
    pub cb_cooldown: Duration,
}

impl Default for ResilienceOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            base_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(2),
            jitter_frac: 0.2,
            cb_window: 20,
            cb_cooldown: Duration::from_secs(30),
        }
    }
}

/// A provider wrapped with timeout, retry, and circuit breaking, with
/// outcome statistics recorded for the routing policies.
pub struct ResilientProvider {
    inner: Box<dyn Provider>,
    opts: ResilienceOptions,
    stats: OutcomeStats,
    breaker: CircuitBreaker,
}

impl ResilientProvider {
    /// Wrap a provider.
    pub fn new(inner: Box<dyn Provider>, opts: ResilienceOptions) -> Self {
        let stats = OutcomeStats::new(DEFAULT_STATS_WINDOW);
        let breaker = CircuitBreaker::new(inner.name().to_string(), opts.cb_window, opts.cb_cooldown);
        Self {
            inner,
            opts,
            stats,
            breaker,
        }
    }

    /// Inner provider name.
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Inner provider cost hint.
    pub fn cost_per_1k_tokens_usd(&self, model: &str) -> f64 {
        self.inner.cost_per_1k_tokens_usd(model)
    }

    /// Outcome statistics read by the routing policies.
    pub fn stats(&self) -> &OutcomeStats {
        &self.stats
    }

    /// Current breaker state.
    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    /// Call the provider under the configured resilience envelope.
    ///
    /// A breaker denial returns [`GatewayError::CircuitOpen`] without
    /// recording any outcome. Otherwise up to `max_retries + 1` attempts
    /// are made, each under its own deadline; every attempt records into
    /// the stats window and the breaker. The returned completion carries
    /// the successful attempt's measured latency. Dropping the future,
    /// during an attempt or a backoff sleep, abandons the call.
    pub async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        if !self.breaker.allow() {
            return Err(GatewayError::CircuitOpen(self.name().to_string()));
        }

        let mut last_err = None;
        let attempts = self.opts.max_retries + 1;
        for attempt in 1..=attempts {
            let started = Instant::now();
            let result = match tokio::time::timeout(self.opts.timeout, self.inner.complete(request))
                .await
            {
                Ok(inner_result) => inner_result,
                Err(_) => Err(GatewayError::Timeout(self.name().to_string())),
            };
            let latency_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(mut completion) => {
                    self.stats.record(latency_ms, false);
                    self.breaker.on_result(false);
                    completion.latency_ms = latency_ms;
                    return Ok(completion);
                }
                Err(err) => {
                    self.stats.record(latency_ms, true);
                    self.breaker.on_result(true);
                    debug!(
                        provider = self.name(),
                        attempt,
                        latency_ms,
                        error = %err,
                        "provider attempt failed"
                    );
                    last_err = Some(err);
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.backoff_for(attempt)).await;
            }
        }

        Err(last_err.unwrap_or_else(|| {
            GatewayError::Internal(format!("provider {} retry loop yielded no result", self.name()))
        }))
    }

    /// Backoff for the retry following `attempt` (1-based):
    /// `min(max_backoff, base * 2^(attempt-1))` scaled by
    /// `1 + U(-jitter_frac, +jitter_frac)`.
    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        let mut backoff = self.opts.base_backoff.saturating_mul(factor);
        if self.opts.max_backoff > Duration::ZERO && backoff > self.opts.max_backoff {
            backoff = self.opts.max_backoff;
        }
        if self.opts.jitter_frac <= 0.0 {
            return backoff;
        }
        let jitter = (rand::thread_rng().gen::<f64>() * 2.0 - 1.0) * self.opts.jitter_frac;
        backoff.mul_f64((1.0 + jitter).max(0.0))
    }
}
