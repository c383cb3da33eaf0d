//! Routing engine
//!
//! The single routing decision authority for the process. Constructed
//! once at startup from a frozen, ordered provider list and handed by
//! reference to every handler; there is no global registry. Policy
//! evaluation is a pure read over the providers' statistics and breaker
//! state, plus one RNG draw for the canary split.

use super::canary::{CanaryController, CanaryTransition};
use super::policy::RoutingPolicy;
use crate::core::resilience::ResilientProvider;
use crate::utils::error::Result;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Default error-budget target: 1% of calls may fail.
pub const DEFAULT_SLO_TARGET: f64 = 0.01;
/// Default seed for the canary split RNG.
pub const DEFAULT_RNG_SEED: u64 = 42;

/// Engine construction knobs.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Maximum tolerated error fraction
    pub slo_target: f64,
    /// Policy used when a request names none
    pub default_policy: RoutingPolicy,
    /// Seed for the split RNG; fixed seeds make tests deterministic
    pub rng_seed: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            slo_target: DEFAULT_SLO_TARGET,
            default_policy: RoutingPolicy::Cheapest,
            rng_seed: DEFAULT_RNG_SEED,
        }
    }
}

/// Point-in-time canary state for the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct CanaryStatus {
    /// Current candidate traffic percentage
    pub percent: f64,
    /// Current stage index
    pub stage_index: usize,
    /// Candidate provider name, if any
    pub candidate_provider: Option<String>,
    /// Evaluation window size
    pub window_size: u64,
    /// Most recent transition
    pub last_transition: Option<CanaryTransition>,
}

/// Derived per-provider metrics for the admin surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderMetrics {
    /// Provider name
    pub name: String,
    /// Breaker state gauge: open=0, half_open=1, closed=2
    pub cb_state: f64,
    /// Error rate over the last minute
    pub error_rate_1m: f64,
    /// Error rate over the last five minutes
    pub error_rate_5m: f64,
    /// Error rate over the last hour
    pub error_rate_1h: f64,
    /// p95 latency over successful calls
    pub p95_latency_ms: u64,
    /// List price hint
    pub cost_per_1k_tokens_usd: f64,
}

/// Routing decision authority: providers, policies, and canary state.
pub struct Engine {
    providers: Vec<Arc<ResilientProvider>>,
    slo_target: f64,
    default_policy: RwLock<RoutingPolicy>,
    canary: Mutex<CanaryController>,
    rng: Mutex<StdRng>,
}

impl Engine {
    /// Build an engine over a frozen, ordered provider list. The canary
    /// candidate is fixed here as the second-cheapest provider by list
    /// price, ties broken by registration order.
    pub fn new(providers: Vec<Arc<ResilientProvider>>, opts: EngineOptions) -> Self {
        let candidate = cheapest_pair(&providers, "").map(|(_, second)| second.name().to_string());
        Self {
            providers,
            slo_target: opts.slo_target,
            default_policy: RwLock::new(opts.default_policy),
            canary: Mutex::new(CanaryController::new(candidate)),
            rng: Mutex::new(StdRng::seed_from_u64(opts.rng_seed)),
        }
    }

    /// Registered providers in registration order.
    pub fn providers(&self) -> &[Arc<ResilientProvider>] {
        &self.providers
    }

    /// Error-budget target.
    pub fn slo_target(&self) -> f64 {
        self.slo_target
    }

    /// Policy applied when a request names none.
    pub fn default_policy(&self) -> RoutingPolicy {
        *self.default_policy.read()
    }

    /// Update the default policy.
    pub fn set_default_policy(&self, policy: RoutingPolicy) {
        *self.default_policy.write() = policy;
    }

    /// Select one provider for a request under the given policy. Returns
    /// `None` only when the registry is empty.
    pub fn choose(&self, policy: RoutingPolicy, model: &str) -> Option<Arc<ResilientProvider>> {
        match policy {
            RoutingPolicy::Cheapest => self.cheapest(model),
            RoutingPolicy::FastestP95 => self.fastest_p95(model),
            RoutingPolicy::SloBurnAware => {
                let cheapest = self.cheapest(model)?;
                let burn = cheapest.stats().error_rate() / self.slo_target;
                if burn > 1.0 {
                    self.healthiest_alternative(model)
                } else {
                    Some(cheapest)
                }
            }
            RoutingPolicy::Canary => match cheapest_pair(&self.providers, model) {
                Some((primary, candidate)) => {
                    let percent = self.canary.lock().percent();
                    let draw: f64 = self.rng.lock().gen();
                    if draw < percent / 100.0 {
                        Some(candidate)
                    } else {
                        Some(primary)
                    }
                }
                // Fewer than two providers: all traffic to the primary.
                None => self.cheapest(model),
            },
        }
    }

    /// Feed a completed call back into the canary state machine. Calls
    /// against the candidate count toward the evaluation window whatever
    /// policy routed them.
    pub fn record_result(&self, provider_name: &str, failed: bool) {
        trace!(provider = provider_name, failed, "routing outcome recorded");
        let mut canary = self.canary.lock();
        canary.record_result(provider_name, || self.burn_rate(provider_name));
    }

    /// Current canary state snapshot.
    pub fn canary_status(&self) -> CanaryStatus {
        let canary = self.canary.lock();
        CanaryStatus {
            percent: canary.percent(),
            stage_index: canary.stage_index(),
            candidate_provider: canary.candidate().map(str::to_string),
            window_size: canary.window(),
            last_transition: canary.last_transition().cloned(),
        }
    }

    /// Advance the canary one stage; `force` skips the burn guardrail.
    pub fn canary_advance(&self, force: bool) -> Result<()> {
        let mut canary = self.canary.lock();
        let burn = canary
            .candidate()
            .map(|name| self.burn_rate(name))
            .unwrap_or(0.0);
        canary.advance(force, burn)
    }

    /// Roll the canary back to the first stage.
    pub fn canary_rollback(&self) {
        self.canary.lock().rollback();
    }

    /// Replace the canary configuration.
    pub fn configure_canary(&self, stages: Vec<f64>, window: u64, burn_multiplier: f64) {
        self.canary
            .lock()
            .configure(stages, window, burn_multiplier);
    }

    /// Derived metrics for every provider, in registration order.
    pub fn provider_metrics(&self) -> Vec<ProviderMetrics> {
        self.providers
            .iter()
            .map(|p| ProviderMetrics {
                name: p.name().to_string(),
                cb_state: p.breaker_state().as_f64(),
                error_rate_1m: p.stats().error_rate_since(Duration::from_secs(60)),
                error_rate_5m: p.stats().error_rate_since(Duration::from_secs(300)),
                error_rate_1h: p.stats().error_rate_since(Duration::from_secs(3600)),
                p95_latency_ms: p.stats().p95_latency_ms(),
                cost_per_1k_tokens_usd: p.cost_per_1k_tokens_usd(""),
            })
            .collect()
    }

    /// Error-budget burn rate for a provider; 0 for unknown names.
    pub fn burn_rate(&self, provider_name: &str) -> f64 {
        self.find(provider_name)
            .map(|p| p.stats().error_rate() / self.slo_target)
            .unwrap_or(0.0)
    }

    fn find(&self, name: &str) -> Option<&Arc<ResilientProvider>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    fn cheapest(&self, model: &str) -> Option<Arc<ResilientProvider>> {
        let mut best: Option<(&Arc<ResilientProvider>, f64)> = None;
        for p in &self.providers {
            let cost = p.cost_per_1k_tokens_usd(model);
            match best {
                Some((_, best_cost)) if cost >= best_cost => {}
                _ => best = Some((p, cost)),
            }
        }
        best.map(|(p, _)| Arc::clone(p))
    }

    fn fastest_p95(&self, model: &str) -> Option<Arc<ResilientProvider>> {
        let first = self.providers.first()?;
        let mut best = first;
        let mut best_p95 = first.stats().p95_latency_ms();
        for p in &self.providers[1..] {
            let p95 = p.stats().p95_latency_ms();
            if p95 > 0 && (best_p95 == 0 || p95 < best_p95) {
                best = p;
                best_p95 = p95;
            }
        }
        if best_p95 == 0 {
            // No successful calls anywhere yet.
            return self.cheapest(model);
        }
        Some(Arc::clone(best))
    }

    fn healthiest_alternative(&self, model: &str) -> Option<Arc<ResilientProvider>> {
        let first = self.providers.first()?;
        let mut best = first;
        let mut best_error_rate = first.stats().error_rate();
        for p in &self.providers[1..] {
            let error_rate = p.stats().error_rate();
            if error_rate < best_error_rate
                || (error_rate == best_error_rate
                    && p.cost_per_1k_tokens_usd(model) < best.cost_per_1k_tokens_usd(model))
            {
                best = p;
                best_error_rate = error_rate;
            }
        }
        Some(Arc::clone(best))
    }
}

/// The two cheapest providers by list price, ties broken by registration
/// order. `None` when fewer than two providers are registered.
fn cheapest_pair(
    providers: &[Arc<ResilientProvider>],
    model: &str,
) -> Option<(Arc<ResilientProvider>, Arc<ResilientProvider>)> {
    if providers.len() < 2 {
        return None;
    }
    let mut ordered: Vec<&Arc<ResilientProvider>> = providers.iter().collect();
    // Stable sort keeps registration order among equal costs.
    ordered.sort_by(|a, b| {
        a.cost_per_1k_tokens_usd(model)
            .total_cmp(&b.cost_per_1k_tokens_usd(model))
    });
    Some((Arc::clone(ordered[0]), Arc::clone(ordered[1])))
}
