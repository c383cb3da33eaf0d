//! Error handling for the gateway
//!
//! This module defines all error types used throughout the gateway.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

/// Result type alias for the gateway
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// No providers are registered with the engine
    #[error("no providers available")]
    NoProviders,

    /// Circuit breaker denied admission for a provider
    #[error("circuit open for provider {0}")]
    CircuitOpen(String),

    /// Provider call failed (transport, non-2xx status, decode)
    #[error("provider {provider} error: {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Opaque failure description
        message: String,
    },

    /// Per-attempt deadline fired; treated as a provider failure
    #[error("provider {0} timed out")]
    Timeout(String),

    /// Canary advance rejected because the candidate is burning budget
    #[error("canary burn rate too high: {burn:.2}")]
    CanaryGuardrail {
        /// Observed burn rate at rejection time
        burn: f64,
    },

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unauthorized errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Not implemented errors
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Server lifecycle errors
    #[error("Server error: {0}")]
    Server(String),

    /// Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Helper for server lifecycle failures
    pub fn server(message: impl Into<String>) -> Self {
        GatewayError::Server(message.into())
    }

    /// True for failures produced by a provider call path, including
    /// per-attempt timeouts and breaker denials.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            GatewayError::Provider { .. } | GatewayError::Timeout(_) | GatewayError::CircuitOpen(_)
        )
    }

    /// Stable machine-readable code for telemetry and error bodies
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Config(_) => "config_error",
            GatewayError::NoProviders => "no_providers",
            GatewayError::CircuitOpen(_) => "circuit_open",
            GatewayError::Provider { .. } => "provider_error",
            GatewayError::Timeout(_) => "provider_timeout",
            GatewayError::CanaryGuardrail { .. } => "canary_guardrail",
            GatewayError::Validation(_) => "validation_error",
            GatewayError::Unauthorized(_) => "unauthorized",
            GatewayError::NotImplemented(_) => "not_implemented",
            GatewayError::Server(_) => "server_error",
            GatewayError::Internal(_) => "internal_error",
        }
    }
}

impl ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::NoProviders | GatewayError::CircuitOpen(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::Provider { .. } | GatewayError::Timeout(_) => StatusCode::BAD_GATEWAY,
            GatewayError::CanaryGuardrail { .. } => StatusCode::PRECONDITION_FAILED,
            GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
            GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            GatewayError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            GatewayError::Config(_) | GatewayError::Server(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GatewayError::NoProviders.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            GatewayError::CircuitOpen("openai".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            GatewayError::Provider {
                provider: "openai".into(),
                message: "status 500".into(),
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::Timeout("mock".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            GatewayError::CanaryGuardrail { burn: 4.2 }.status_code(),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            GatewayError::NotImplemented("providers reload".into()).status_code(),
            StatusCode::NOT_IMPLEMENTED
        );
    }

    #[test]
    fn test_provider_failure_classification() {
        assert!(GatewayError::Timeout("mock".into()).is_provider_failure());
        assert!(GatewayError::CircuitOpen("mock".into()).is_provider_failure());
        assert!(!GatewayError::NoProviders.is_provider_failure());
    }

    #[test]
    fn test_guardrail_message_includes_burn() {
        let err = GatewayError::CanaryGuardrail { burn: 12.5 };
        assert!(err.to_string().contains("12.50"));
    }
}
