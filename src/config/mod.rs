//! Configuration management for the gateway
//!
//! All configuration is plain values resolved once at startup: built-in
//! defaults overridden by environment variables. Secrets are masked
//! before any config value reaches a log line.

use crate::core::router::RoutingPolicy;
use crate::core::router::canary::{
    DEFAULT_BURN_MULTIPLIER, DEFAULT_CANARY_STAGES, DEFAULT_CANARY_WINDOW,
};
use crate::core::router::engine::{DEFAULT_RNG_SEED, DEFAULT_SLO_TARGET};
use crate::core::resilience::ResilienceOptions;
use crate::utils::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Main configuration struct for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server binding
    #[serde(default)]
    pub server: ServerConfig,
    /// Routing engine settings
    #[serde(default)]
    pub router: RouterSettings,
    /// Resilience wrapper settings applied to every provider
    #[serde(default)]
    pub resilience: ResilienceSettings,
    /// Canary rollout settings
    #[serde(default)]
    pub canary: CanarySettings,
    /// OpenAI provider settings
    #[serde(default)]
    pub openai: OpenAiSettings,
    /// Mock provider settings
    #[serde(default)]
    pub mock: MockSettings,
    /// Bearer token guarding the admin surface; empty disables the guard
    #[serde(default)]
    pub admin_token: String,
}

/// HTTP server binding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Routing engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterSettings {
    /// Policy applied when a request names none
    #[serde(default = "default_policy")]
    pub default_policy: RoutingPolicy,
    /// Maximum tolerated error fraction
    #[serde(default = "default_slo_target")]
    pub slo_target: f64,
    /// Seed for the canary split RNG
    #[serde(default = "default_rng_seed")]
    pub rng_seed: u64,
}

/// Resilience wrapper settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceSettings {
    /// Per-attempt timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Initial backoff in milliseconds
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    /// Backoff ceiling in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Jitter fraction in `[0, 1]`
    #[serde(default = "default_jitter_frac")]
    pub jitter_frac: f64,
    /// Circuit-breaker window size
    #[serde(default = "default_cb_window")]
    pub cb_window: usize,
    /// Circuit-breaker cooldown in milliseconds
    #[serde(default = "default_cb_cooldown_ms")]
    pub cb_cooldown_ms: u64,
}

/// Canary rollout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanarySettings {
    /// Traffic percentages per stage
    #[serde(default = "default_canary_stages")]
    pub stages: Vec<f64>,
    /// Candidate calls per evaluation window
    #[serde(default = "default_canary_window")]
    pub window: u64,
    /// Burn-rate multiplier triggering rollback
    #[serde(default = "default_burn_multiplier")]
    pub burn_multiplier: f64,
}

/// OpenAI provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenAiSettings {
    /// API key; the provider is registered only when non-empty
    #[serde(default)]
    pub api_key: String,
    /// Model used when a request names none
    #[serde(default = "default_openai_model")]
    pub default_model: String,
}

/// Mock provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockSettings {
    /// Register the mock provider
    #[serde(default)]
    pub enabled: bool,
    /// Target mean latency in milliseconds
    #[serde(default = "default_mock_mean_ms")]
    pub mean_latency_ms: f64,
    /// Target p95 latency in milliseconds
    #[serde(default = "default_mock_p95_ms")]
    pub p95_latency_ms: f64,
    /// Injected failure rate in `[0, 1]`
    #[serde(default = "default_mock_error_rate")]
    pub error_rate: f64,
    /// List price per 1k tokens in USD
    #[serde(default = "default_mock_cost")]
    pub cost_per_1k_usd: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_policy() -> RoutingPolicy {
    RoutingPolicy::Cheapest
}
fn default_slo_target() -> f64 {
    DEFAULT_SLO_TARGET
}
fn default_rng_seed() -> u64 {
    DEFAULT_RNG_SEED
}
fn default_timeout_ms() -> u64 {
    30_000
}
fn default_max_retries() -> u32 {
    2
}
fn default_base_backoff_ms() -> u64 {
    200
}
fn default_max_backoff_ms() -> u64 {
    2_000
}
fn default_jitter_frac() -> f64 {
    0.2
}
fn default_cb_window() -> usize {
    20
}
fn default_cb_cooldown_ms() -> u64 {
    30_000
}
fn default_canary_stages() -> Vec<f64> {
    DEFAULT_CANARY_STAGES.to_vec()
}
fn default_canary_window() -> u64 {
    DEFAULT_CANARY_WINDOW
}
fn default_burn_multiplier() -> f64 {
    DEFAULT_BURN_MULTIPLIER
}
fn default_openai_model() -> String {
    "gpt-4o".to_string()
}
fn default_mock_mean_ms() -> f64 {
    40.0
}
fn default_mock_p95_ms() -> f64 {
    120.0
}
fn default_mock_error_rate() -> f64 {
    0.01
}
fn default_mock_cost() -> f64 {
    0.002
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            default_policy: default_policy(),
            slo_target: default_slo_target(),
            rng_seed: default_rng_seed(),
        }
    }
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            jitter_frac: default_jitter_frac(),
            cb_window: default_cb_window(),
            cb_cooldown_ms: default_cb_cooldown_ms(),
        }
    }
}

impl Default for CanarySettings {
    fn default() -> Self {
        Self {
            stages: default_canary_stages(),
            window: default_canary_window(),
            burn_multiplier: default_burn_multiplier(),
        }
    }
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            mean_latency_ms: default_mock_mean_ms(),
            p95_latency_ms: default_mock_p95_ms(),
            error_rate: default_mock_error_rate(),
            cost_per_1k_usd: default_mock_cost(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            router: RouterSettings::default(),
            resilience: ResilienceSettings::default(),
            canary: CanarySettings::default(),
            openai: OpenAiSettings {
                api_key: String::new(),
                default_model: default_openai_model(),
            },
            mock: MockSettings::default(),
            admin_token: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables over the defaults.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Config::default();

        if let Ok(host) = std::env::var("HOST") {
            cfg.server.host = host;
        }
        if let Some(port) = env_parse("PORT") {
            cfg.server.port = port;
        }
        if let Ok(policy) = std::env::var("ROUTER_POLICY") {
            cfg.router.default_policy = policy
                .parse()
                .map_err(|_| GatewayError::Config(format!("invalid ROUTER_POLICY: {policy}")))?;
        }
        if let Some(slo) = env_parse("SLO_TARGET") {
            cfg.router.slo_target = slo;
        }
        if let Some(seed) = env_parse("ROUTER_RNG_SEED") {
            cfg.router.rng_seed = seed;
        }

        if let Some(ms) = env_parse("PROVIDER_TIMEOUT_MS") {
            cfg.resilience.timeout_ms = ms;
        }
        if let Some(retries) = env_parse("PROVIDER_MAX_RETRIES") {
            cfg.resilience.max_retries = retries;
        }
        if let Some(ms) = env_parse("PROVIDER_BASE_BACKOFF_MS") {
            cfg.resilience.base_backoff_ms = ms;
        }
        if let Some(ms) = env_parse("PROVIDER_MAX_BACKOFF_MS") {
            cfg.resilience.max_backoff_ms = ms;
        }
        if let Some(frac) = env_parse("PROVIDER_JITTER_FRAC") {
            cfg.resilience.jitter_frac = frac;
        }
        if let Some(window) = env_parse("CB_WINDOW") {
            cfg.resilience.cb_window = window;
        }
        if let Some(ms) = env_parse("CB_COOLDOWN_MS") {
            cfg.resilience.cb_cooldown_ms = ms;
        }

        if let Ok(stages) = std::env::var("CANARY_STAGES") {
            if let Some(parsed) = parse_stages(&stages) {
                cfg.canary.stages = parsed;
            }
        }
        if let Some(window) = env_parse::<u64>("CANARY_WINDOW") {
            if window > 0 {
                cfg.canary.window = window;
            }
        }
        if let Some(multiplier) = env_parse::<f64>("CANARY_BURN_MULTIPLIER") {
            if multiplier > 0.0 {
                cfg.canary.burn_multiplier = multiplier;
            }
        }

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            cfg.openai.api_key = key;
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            cfg.openai.default_model = model;
        }

        cfg.mock.enabled = std::env::var("ENABLE_MOCK_PROVIDER")
            .map(|v| !v.is_empty() && v != "0")
            .unwrap_or(false);
        if let Some(ms) = env_parse::<f64>("MOCK_MEAN_LATENCY_MS") {
            if ms > 0.0 {
                cfg.mock.mean_latency_ms = ms;
            }
        }
        if let Some(ms) = env_parse::<f64>("MOCK_P95_LATENCY_MS") {
            if ms > 0.0 {
                cfg.mock.p95_latency_ms = ms;
            }
        }
        if let Some(rate) = env_parse::<f64>("MOCK_ERROR_RATE") {
            if (0.0..=1.0).contains(&rate) {
                cfg.mock.error_rate = rate;
            }
        }
        if let Some(cost) = env_parse::<f64>("MOCK_COST_PER_1K_TOKENS_USD") {
            if cost >= 0.0 {
                cfg.mock.cost_per_1k_usd = cost;
            }
        }

        if let Ok(token) = std::env::var("ADMIN_TOKEN") {
            cfg.admin_token = token;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate the configuration, logging warnings for degraded setups.
    pub fn validate(&self) -> Result<()> {
        if self.router.slo_target <= 0.0 {
            return Err(GatewayError::Config(
                "slo_target must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.resilience.jitter_frac) {
            return Err(GatewayError::Config(
                "jitter_frac must be within [0, 1]".to_string(),
            ));
        }
        if self.resilience.cb_window == 0 {
            return Err(GatewayError::Config(
                "cb_window must be positive".to_string(),
            ));
        }
        if self.canary.stages.is_empty() {
            return Err(GatewayError::Config(
                "canary stages must not be empty".to_string(),
            ));
        }
        if self
            .canary
            .stages
            .iter()
            .any(|s| !(0.0..=100.0).contains(s))
        {
            return Err(GatewayError::Config(
                "canary stages must be percentages within [0, 100]".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.mock.error_rate) {
            return Err(GatewayError::Config(
                "mock error_rate must be within [0, 1]".to_string(),
            ));
        }

        if self.router.default_policy == RoutingPolicy::Canary && self.provider_count() < 2 {
            warn!("canary policy requires at least 2 providers, split stays on the primary");
        }
        Ok(())
    }

    /// Number of providers this configuration registers.
    pub fn provider_count(&self) -> usize {
        usize::from(!self.openai.api_key.is_empty()) + usize::from(self.mock.enabled)
    }

    /// Resilience options derived from the settings.
    pub fn resilience_options(&self) -> ResilienceOptions {
        ResilienceOptions {
            timeout: Duration::from_millis(self.resilience.timeout_ms),
            max_retries: self.resilience.max_retries,
            base_backoff: Duration::from_millis(self.resilience.base_backoff_ms),
            max_backoff: Duration::from_millis(self.resilience.max_backoff_ms),
            jitter_frac: self.resilience.jitter_frac,
            cb_window: self.resilience.cb_window,
            cb_cooldown: Duration::from_millis(self.resilience.cb_cooldown_ms),
        }
    }

    /// Copy with secrets masked for logging.
    pub fn mask_secrets(&self) -> Self {
        let mut masked = self.clone();
        if !masked.openai.api_key.is_empty() {
            masked.openai.api_key = "***masked***".to_string();
        }
        if !masked.admin_token.is_empty() {
            masked.admin_token = "***masked***".to_string();
        }
        masked
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Parse a comma-separated stage list, skipping entries that are not
/// nonnegative numbers. Returns `None` when nothing parses.
fn parse_stages(raw: &str) -> Option<Vec<f64>> {
    let stages: Vec<f64> = raw
        .split(',')
        .filter_map(|part| part.trim().parse::<f64>().ok())
        .filter(|v| *v >= 0.0)
        .collect();
    (!stages.is_empty()).then_some(stages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.router.default_policy, RoutingPolicy::Cheapest);
        assert_eq!(cfg.canary.stages, vec![1.0, 5.0, 25.0]);
        assert_eq!(cfg.canary.window, 200);
    }

    #[test]
    fn test_parse_stages() {
        assert_eq!(parse_stages("1,5,25"), Some(vec![1.0, 5.0, 25.0]));
        assert_eq!(parse_stages(" 0.5, 10 "), Some(vec![0.5, 10.0]));
        // Junk entries are skipped, negatives rejected.
        assert_eq!(parse_stages("1,x,25"), Some(vec![1.0, 25.0]));
        assert_eq!(parse_stages("-5"), None);
        assert_eq!(parse_stages(""), None);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.router.slo_target = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.resilience.jitter_frac = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.canary.stages = vec![150.0];
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.canary.stages.clear();
        assert!(cfg.validate().is_err());

        let mut cfg = Config::default();
        cfg.mock.error_rate = 2.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_mask_secrets() {
        let mut cfg = Config::default();
        cfg.openai.api_key = "sk-very-secret".to_string();
        cfg.admin_token = "admin-secret".to_string();
        let masked = cfg.mask_secrets();
        assert_eq!(masked.openai.api_key, "***masked***");
        assert_eq!(masked.admin_token, "***masked***");
        // The original is untouched.
        assert_eq!(cfg.openai.api_key, "sk-very-secret");
    }

    #[test]
    fn test_provider_count() {
        let mut cfg = Config::default();
        assert_eq!(cfg.provider_count(), 0);
        cfg.mock.enabled = true;
        assert_eq!(cfg.provider_count(), 1);
        cfg.openai.api_key = "sk-test".to_string();
        assert_eq!(cfg.provider_count(), 2);
    }

    #[test]
    fn test_resilience_options_conversion() {
        let cfg = Config::default();
        let opts = cfg.resilience_options();
        assert_eq!(opts.timeout, Duration::from_secs(30));
        assert_eq!(opts.max_retries, 2);
        assert_eq!(opts.base_backoff, Duration::from_millis(200));
        assert_eq!(opts.cb_window, 20);
    }
}
