//! Health, readiness, and metrics endpoints

use crate::server::state::AppState;
use actix_web::{HttpResponse, web};
use serde::Serialize;
use tracing::debug;

/// Configure the health routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/healthz", web::get().to(health_check))
        .route("/readyz", web::get().to(readiness_check))
        .route("/metrics", web::get().to(metrics));
}

/// Liveness payload.
#[derive(Debug, Clone, Serialize)]
struct HealthStatus {
    status: &'static str,
    timestamp: chrono::DateTime<chrono::Utc>,
    version: &'static str,
}

/// Basic liveness check used by load balancers.
async fn health_check() -> HttpResponse {
    debug!("health check requested");
    HttpResponse::Ok().json(HealthStatus {
        status: "ok",
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Ready once at least one provider is registered.
async fn readiness_check(state: web::Data<AppState>) -> HttpResponse {
    let providers = state.engine.providers().len();
    if providers == 0 {
        return HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "status": "no providers registered"
        }));
    }
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ready",
        "providers": providers
    }))
}

/// Prometheus text exposition.
async fn metrics(state: web::Data<AppState>) -> HttpResponse {
    let body = state.metrics.render_prometheus(&state.engine);
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4; charset=utf-8")
        .body(body)
}
