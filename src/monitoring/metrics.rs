//! Request counters and Prometheus text rendering
//!
//! Counters are fed by the completions handler; gauges (breaker states,
//! burn rates, canary stage) are read from the engine at scrape time.
//! State is process-local; each instance reports its own traffic.

use crate::core::router::{Engine, RoutingPolicy};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

/// Process-local request metrics.
pub struct Metrics {
    started_at: Instant,
    /// (provider, policy, code) -> count
    requests: RwLock<BTreeMap<(String, &'static str, &'static str), u64>>,
    /// (provider, reason) -> count
    errors: RwLock<BTreeMap<(String, &'static str), u64>>,
    /// provider -> accumulated cost estimate
    cost_usd: RwLock<BTreeMap<String, f64>>,
}

impl Metrics {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            requests: RwLock::new(BTreeMap::new()),
            errors: RwLock::new(BTreeMap::new()),
            cost_usd: RwLock::new(BTreeMap::new()),
        }
    }

    /// Count one routed request.
    pub fn observe_request(&self, provider: &str, policy: RoutingPolicy, code: &'static str) {
        let mut requests = self.requests.write();
        *requests
            .entry((provider.to_string(), policy.as_str(), code))
            .or_insert(0) += 1;
    }

    /// Count one failed request.
    pub fn observe_error(&self, provider: &str, reason: &'static str) {
        let mut errors = self.errors.write();
        *errors.entry((provider.to_string(), reason)).or_insert(0) += 1;
    }

    /// Accumulate a cost estimate for a successful request.
    pub fn observe_cost(&self, provider: &str, cost: f64) {
        let mut cost_usd = self.cost_usd.write();
        *cost_usd.entry(provider.to_string()).or_insert(0.0) += cost;
    }

    /// Process uptime.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Render the Prometheus text exposition, combining the counters with
    /// gauges derived from the engine.
    pub fn render_prometheus(&self, engine: &Engine) -> String {
        let mut out = String::new();

        let _ = writeln!(
            out,
            "# HELP router_uptime_seconds Gateway uptime in seconds"
        );
        let _ = writeln!(out, "# TYPE router_uptime_seconds counter");
        let _ = writeln!(out, "router_uptime_seconds {}", self.uptime().as_secs());

        let _ = writeln!(
            out,
            "# HELP router_requests_total Total requests processed by the router"
        );
        let _ = writeln!(out, "# TYPE router_requests_total counter");
        for ((provider, policy, code), count) in self.requests.read().iter() {
            let _ = writeln!(
                out,
                "router_requests_total{{provider=\"{provider}\",policy=\"{policy}\",code=\"{code}\"}} {count}"
            );
        }

        let _ = writeln!(
            out,
            "# HELP router_errors_total Total errors by provider and reason"
        );
        let _ = writeln!(out, "# TYPE router_errors_total counter");
        for ((provider, reason), count) in self.errors.read().iter() {
            let _ = writeln!(
                out,
                "router_errors_total{{provider=\"{provider}\",reason=\"{reason}\"}} {count}"
            );
        }

        let _ = writeln!(
            out,
            "# HELP router_cost_usd_total Accumulated provider cost estimates in USD"
        );
        let _ = writeln!(out, "# TYPE router_cost_usd_total counter");
        for (provider, cost) in self.cost_usd.read().iter() {
            let _ = writeln!(out, "router_cost_usd_total{{provider=\"{provider}\"}} {cost}");
        }

        let _ = writeln!(
            out,
            "# HELP router_cb_state Circuit breaker state per provider (0=open,1=half,2=closed)"
        );
        let _ = writeln!(out, "# TYPE router_cb_state gauge");
        for metrics in engine.provider_metrics() {
            let _ = writeln!(
                out,
                "router_cb_state{{provider=\"{}\"}} {}",
                metrics.name, metrics.cb_state
            );
        }

        let _ = writeln!(
            out,
            "# HELP router_burn_rate Max error-budget burn rate over rolling windows"
        );
        let _ = writeln!(out, "# TYPE router_burn_rate gauge");
        let slo = engine.slo_target();
        let provider_metrics = engine.provider_metrics();
        let max_burn = |rates: Vec<f64>| rates.iter().fold(0.0_f64, |acc, r| acc.max(r / slo));
        let windows = [
            (
                "1m",
                max_burn(provider_metrics.iter().map(|m| m.error_rate_1m).collect()),
            ),
            (
                "5m",
                max_burn(provider_metrics.iter().map(|m| m.error_rate_5m).collect()),
            ),
            (
                "1h",
                max_burn(provider_metrics.iter().map(|m| m.error_rate_1h).collect()),
            ),
        ];
        for (window, burn) in windows {
            let _ = writeln!(out, "router_burn_rate{{window=\"{window}\"}} {burn}");
        }

        let _ = writeln!(
            out,
            "# HELP router_canary_stage_percent Current canary traffic percentage"
        );
        let _ = writeln!(out, "# TYPE router_canary_stage_percent gauge");
        let _ = writeln!(
            out,
            "router_canary_stage_percent {}",
            engine.canary_status().percent
        );

        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
