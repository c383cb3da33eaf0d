//! Inference endpoint
//!
//! `POST /v1/completions` resolves the effective policy, asks the engine
//! for a provider, runs the call through the provider's resilience
//! wrapper, and feeds the outcome back for canary bookkeeping before
//! answering.

use crate::core::providers::CompletionRequest;
use crate::core::router::RoutingPolicy;
use crate::server::state::AppState;
use crate::utils::error::{GatewayError, Result};
use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Configure the inference routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/v1/completions", web::post().to(create_completion));
}

/// Inference request body.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionApiRequest {
    /// Target model; the configured default when empty
    #[serde(default)]
    pub model: String,
    /// Prompt text
    pub prompt: String,
    /// Token cap; 0 means backend default
    #[serde(default)]
    pub max_tokens: u32,
    /// Streaming flag; accepted and ignored
    #[serde(default)]
    pub stream: bool,
    /// Per-request policy override
    #[serde(default)]
    pub policy: Option<String>,
}

/// Inference response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionApiResponse {
    /// Provider that served the request
    pub provider: String,
    /// Generated text
    pub text: String,
    /// List-price cost estimate
    pub cost_usd: f64,
    /// Call latency in milliseconds
    pub latency_ms: u64,
}

async fn create_completion(
    state: web::Data<AppState>,
    body: web::Json<CompletionApiRequest>,
) -> Result<HttpResponse> {
    let api_request = body.into_inner();
    let policy = api_request
        .policy
        .as_deref()
        .map(RoutingPolicy::parse_lossy)
        .unwrap_or_else(|| state.engine.default_policy());
    let model = if api_request.model.is_empty() {
        state.config.openai.default_model.clone()
    } else {
        api_request.model
    };

    let chosen = state
        .engine
        .choose(policy, &model)
        .ok_or(GatewayError::NoProviders)?;
    let provider = chosen.name().to_string();
    let request_id = Uuid::new_v4();

    let request = CompletionRequest {
        model: model.clone(),
        prompt: api_request.prompt,
        max_tokens: api_request.max_tokens,
        stream: api_request.stream,
    };
    let started = Instant::now();
    let result = chosen.complete(&request).await;
    state.engine.record_result(&provider, result.is_err());

    let burn = state.engine.burn_rate(&provider);
    if burn > 1.0 {
        warn!(%request_id, provider = %provider, burn, "error budget burning");
    }

    match result {
        Ok(completion) => {
            state.metrics.observe_request(&provider, policy, "200");
            state.metrics.observe_cost(&provider, completion.cost_usd);
            info!(
                %request_id,
                provider = %provider,
                policy = %policy,
                model = %model,
                success = true,
                code_class = "200",
                latency_ms = completion.latency_ms,
                cost_estimate_usd = completion.cost_usd,
                "completion served"
            );
            Ok(HttpResponse::Ok().json(CompletionApiResponse {
                provider,
                text: completion.text,
                cost_usd: completion.cost_usd,
                latency_ms: completion.latency_ms,
            }))
        }
        Err(err) => {
            let latency_ms = started.elapsed().as_millis() as u64;
            let (code, reason) = match &err {
                GatewayError::CircuitOpen(_) => ("503", "circuit_open"),
                GatewayError::Timeout(_) => ("502", "provider_timeout"),
                _ => ("502", "provider_error"),
            };
            state.metrics.observe_request(&provider, policy, code);
            state.metrics.observe_error(&provider, reason);
            error!(
                %request_id,
                provider = %provider,
                policy = %policy,
                model = %model,
                success = false,
                code_class = code,
                latency_ms,
                error = %err,
                "completion failed"
            );
            Err(err)
        }
    }
}
