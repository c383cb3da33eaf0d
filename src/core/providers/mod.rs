//! Provider adapters
//!
//! Each adapter translates the uniform completion contract into one remote
//! backend's wire protocol. The routing engine only sees this trait; every
//! failure class a backend can produce (transport, non-2xx status, decode,
//! deadline) surfaces as a single opaque error.

pub mod mock;
pub mod openai;

pub use mock::MockProvider;
pub use openai::OpenAiProvider;

use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Token count floor used when estimating call cost from `max_tokens`.
pub const COST_ESTIMATE_TOKEN_FLOOR: u32 = 50;

/// A single text completion request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Target model name
    pub model: String,
    /// Prompt text
    pub prompt: String,
    /// Token cap; 0 means backend default
    #[serde(default)]
    pub max_tokens: u32,
    /// Streaming flag; accepted and ignored
    #[serde(default)]
    pub stream: bool,
}

/// A completed provider call.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Generated text
    pub text: String,
    /// List-price cost estimate in USD; a metrics figure, never an
    /// accounting one
    pub cost_usd: f64,
    /// Call latency in milliseconds
    pub latency_ms: u64,
}

/// Uniform call contract over a remote inference backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Stable provider name, unique within an engine.
    fn name(&self) -> &str;

    /// Nonnegative list-price hint in USD per 1k tokens, used only for
    /// cost-ordering routing decisions.
    fn cost_per_1k_tokens_usd(&self, model: &str) -> f64;

    /// Issue the backend call. Cancelled promptly when the enclosing
    /// deadline fires.
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}

/// List-price cost estimate for one call: `cost_per_1k / 1000 *
/// max(max_tokens, 50)`.
pub(crate) fn estimate_cost_usd(cost_per_1k: f64, max_tokens: u32) -> f64 {
    cost_per_1k / 1000.0 * f64::from(max_tokens.max(COST_ESTIMATE_TOKEN_FLOOR))
}
