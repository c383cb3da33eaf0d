//! Admin control surface
//!
//! Status, canary control, and policy updates. When `ADMIN_TOKEN` is set,
//! every endpoint requires a matching bearer token; authorization beyond
//! that shared secret belongs to the deployment.

use crate::core::router::{CanaryStatus, ProviderMetrics, RoutingPolicy};
use crate::server::state::AppState;
use crate::utils::error::{GatewayError, Result};
use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Configure the admin routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v1/admin")
            .route("/status", web::get().to(admin_status))
            .route("/canary/status", web::get().to(canary_status))
            .route("/canary/advance", web::post().to(canary_advance))
            .route("/canary/rollback", web::post().to(canary_rollback))
            .route("/policy", web::post().to(update_policy))
            .route("/providers/reload", web::post().to(providers_reload)),
    );
}

/// Admin status payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminStatusResponse {
    /// Crate version
    pub version: String,
    /// Seconds since process start
    pub uptime_seconds: u64,
    /// Policy applied when a request names none
    pub default_policy: RoutingPolicy,
    /// Per-provider derived metrics
    pub providers: Vec<ProviderMetrics>,
    /// Max burn rates across providers per rolling window
    pub burn_rates: BurnRates,
    /// Current canary traffic percentage
    pub canary_stage_percent: f64,
}

/// Max error-budget burn rates across providers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BurnRates {
    /// Over the last minute
    pub burn_rate_1m: f64,
    /// Over the last five minutes
    pub burn_rate_5m: f64,
    /// Over the last hour
    pub burn_rate_1h: f64,
}

#[derive(Debug, Deserialize)]
struct CanaryAdvanceRequest {
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Deserialize)]
struct PolicyUpdateRequest {
    default_policy: String,
}

/// Reject unless the request carries the configured admin bearer token.
fn authorize(state: &AppState, request: &HttpRequest) -> Result<()> {
    if state.config.admin_token.is_empty() {
        return Ok(());
    }
    let header = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    match header.strip_prefix("Bearer ") {
        Some(token) if token == state.config.admin_token => Ok(()),
        _ => Err(GatewayError::Unauthorized(
            "admin token required".to_string(),
        )),
    }
}

async fn admin_status(state: web::Data<AppState>, request: HttpRequest) -> Result<HttpResponse> {
    authorize(&state, &request)?;

    let providers = state.engine.provider_metrics();
    let slo = state.engine.slo_target();
    let mut burn_rates = BurnRates::default();
    for p in &providers {
        burn_rates.burn_rate_1m = burn_rates.burn_rate_1m.max(p.error_rate_1m / slo);
        burn_rates.burn_rate_5m = burn_rates.burn_rate_5m.max(p.error_rate_5m / slo);
        burn_rates.burn_rate_1h = burn_rates.burn_rate_1h.max(p.error_rate_1h / slo);
    }

    Ok(HttpResponse::Ok().json(AdminStatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.metrics.uptime().as_secs(),
        default_policy: state.engine.default_policy(),
        providers,
        burn_rates,
        canary_stage_percent: state.engine.canary_status().percent,
    }))
}

async fn canary_status(state: web::Data<AppState>, request: HttpRequest) -> Result<HttpResponse> {
    authorize(&state, &request)?;
    let status: CanaryStatus = state.engine.canary_status();
    Ok(HttpResponse::Ok().json(status))
}

async fn canary_advance(
    state: web::Data<AppState>,
    request: HttpRequest,
    body: web::Json<CanaryAdvanceRequest>,
) -> Result<HttpResponse> {
    authorize(&state, &request)?;

    let before = state.engine.canary_status();
    state.engine.canary_advance(body.force)?;
    let after = state.engine.canary_status();
    info!(
        event = "canary_advance",
        candidate = after.candidate_provider.as_deref().unwrap_or(""),
        old_stage = before.stage_index,
        new_stage = after.stage_index,
        old_percent = before.percent,
        new_percent = after.percent,
        forced = body.force,
        "canary stage advanced"
    );
    Ok(HttpResponse::NoContent().finish())
}

async fn canary_rollback(state: web::Data<AppState>, request: HttpRequest) -> Result<HttpResponse> {
    authorize(&state, &request)?;

    let before = state.engine.canary_status();
    state.engine.canary_rollback();
    info!(
        event = "canary_rollback",
        candidate = before.candidate_provider.as_deref().unwrap_or(""),
        old_stage = before.stage_index,
        old_percent = before.percent,
        new_percent = state.engine.canary_status().percent,
        "canary rolled back"
    );
    Ok(HttpResponse::NoContent().finish())
}

async fn update_policy(
    state: web::Data<AppState>,
    request: HttpRequest,
    body: web::Json<PolicyUpdateRequest>,
) -> Result<HttpResponse> {
    authorize(&state, &request)?;

    let policy: RoutingPolicy = body.default_policy.parse()?;
    let old_policy = state.engine.default_policy();
    state.engine.set_default_policy(policy);
    info!(
        event = "policy_update",
        old_policy = %old_policy,
        new_policy = %policy,
        "default policy updated"
    );
    Ok(HttpResponse::NoContent().finish())
}

async fn providers_reload(
    state: web::Data<AppState>,
    request: HttpRequest,
) -> Result<HttpResponse> {
    authorize(&state, &request)?;
    info!(
        event = "providers_reload",
        status = "not_implemented",
        "providers reload requested"
    );
    Err(GatewayError::NotImplemented(
        "providers reload".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::providers::{MockProvider, OpenAiProvider};
    use crate::core::resilience::{ResilienceOptions, ResilientProvider};
    use crate::core::router::{Engine, EngineOptions};
    use actix_web::{App, test};
    use std::sync::Arc;

    /// Two providers: "mock" is primary (cheapest) and "openai" is the
    /// canary candidate. Neither is called by these tests.
    fn test_state(admin_token: &str) -> AppState {
        let providers = vec![
            Arc::new(ResilientProvider::new(
                Box::new(MockProvider::new(1.0, 2.0, 0.0, 0.002)),
                ResilienceOptions::default(),
            )),
            Arc::new(ResilientProvider::new(
                Box::new(OpenAiProvider::new("sk-test")),
                ResilienceOptions::default(),
            )),
        ];
        let engine = Arc::new(Engine::new(providers, EngineOptions::default()));
        let mut config = Config::default();
        config.admin_token = admin_token.to_string();
        AppState::new(config, engine)
    }

    macro_rules! service {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($state))
                    .configure(configure_routes),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_admin_status_payload() {
        let app = service!(test_state(""));
        let request = test::TestRequest::get().uri("/v1/admin/status").to_request();
        let status: AdminStatusResponse = test::call_and_read_body_json(&app, request).await;

        assert!(!status.version.is_empty());
        assert_eq!(status.default_policy, RoutingPolicy::Cheapest);
        assert_eq!(status.providers.len(), 2);
        assert_eq!(status.providers[0].name, "mock");
        assert!((status.providers[0].cost_per_1k_tokens_usd - 0.002).abs() < 1e-9);
        assert!((status.canary_stage_percent - 1.0).abs() < 1e-9);
    }

    #[actix_web::test]
    async fn test_canary_status_payload() {
        let state = test_state("");
        state.engine.configure_canary(vec![1.0, 5.0, 25.0], 200, 2.0);
        let app = service!(state);

        let request = test::TestRequest::get()
            .uri("/v1/admin/canary/status")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, request).await;
        assert_eq!(body["percent"], 1.0);
        assert_eq!(body["stage_index"], 0);
        assert_eq!(body["window_size"], 200);
        assert_eq!(body["candidate_provider"], "openai");
    }

    #[actix_web::test]
    async fn test_canary_advance_and_rollback() {
        let state = test_state("");
        let app = service!(state.clone());

        let request = test::TestRequest::post()
            .uri("/v1/admin/canary/advance")
            .set_json(serde_json::json!({ "force": true }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status().as_u16(), 204);
        assert_eq!(state.engine.canary_status().stage_index, 1);
        assert!((state.engine.canary_status().percent - 5.0).abs() < 1e-9);

        let request = test::TestRequest::post()
            .uri("/v1/admin/canary/rollback")
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status().as_u16(), 204);
        assert_eq!(state.engine.canary_status().stage_index, 0);
    }

    #[actix_web::test]
    async fn test_advance_guardrail_returns_412() {
        let state = test_state("");
        // Fill the candidate's window with failures.
        let candidate = state.engine.providers()[1].clone();
        for _ in 0..20 {
            candidate.stats().record(100, true);
        }
        let app = service!(state.clone());

        let request = test::TestRequest::post()
            .uri("/v1/admin/canary/advance")
            .set_json(serde_json::json!({ "force": false }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status().as_u16(), 412);
        assert_eq!(state.engine.canary_status().stage_index, 0);
    }

    #[actix_web::test]
    async fn test_policy_update_validation() {
        let state = test_state("");
        let app = service!(state.clone());

        let request = test::TestRequest::post()
            .uri("/v1/admin/policy")
            .set_json(serde_json::json!({ "default_policy": "fastest_p95" }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status().as_u16(), 204);
        assert_eq!(state.engine.default_policy(), RoutingPolicy::FastestP95);

        let request = test::TestRequest::post()
            .uri("/v1/admin/policy")
            .set_json(serde_json::json!({ "default_policy": "invalid_policy" }))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status().as_u16(), 400);
        assert_eq!(state.engine.default_policy(), RoutingPolicy::FastestP95);
    }

    #[actix_web::test]
    async fn test_providers_reload_not_implemented() {
        let app = service!(test_state(""));
        let request = test::TestRequest::post()
            .uri("/v1/admin/providers/reload")
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status().as_u16(), 501);
    }

    #[actix_web::test]
    async fn test_admin_token_guard() {
        let app = service!(test_state("secret-token"));

        // Missing token.
        let request = test::TestRequest::get().uri("/v1/admin/status").to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status().as_u16(), 401);

        // Wrong token.
        let request = test::TestRequest::get()
            .uri("/v1/admin/status")
            .insert_header(("Authorization", "Bearer wrong"))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert_eq!(response.status().as_u16(), 401);

        // Correct token.
        let request = test::TestRequest::get()
            .uri("/v1/admin/status")
            .insert_header(("Authorization", "Bearer secret-token"))
            .to_request();
        let response = test::call_service(&app, request).await;
        assert!(response.status().is_success());
    }
}
