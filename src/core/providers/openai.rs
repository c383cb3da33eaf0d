//! OpenAI chat-completions adapter

use super::{Completion, CompletionRequest, Provider, estimate_cost_usd};
use crate::utils::error::{GatewayError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

const PROVIDER_NAME: &str = "openai";
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1/chat/completions";

/// List price in USD per 1k tokens when the model is not in the table.
const FALLBACK_PRICE_PER_1K: f64 = 10.0;

/// Adapter for the OpenAI chat completions API.
pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    price_per_1k: HashMap<String, f64>,
}

impl OpenAiProvider {
    /// Create an adapter against the public OpenAI endpoint with the
    /// built-in price table.
    pub fn new(api_key: impl Into<String>) -> Self {
        let price_per_1k = HashMap::from([
            ("gpt-4o".to_string(), 5.00),
            ("gpt-4o-mini".to_string(), 0.60),
            ("gpt-4.1".to_string(), 10.00),
        ]);
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_API_BASE.to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(60))
                .build()
                .unwrap_or_default(),
            price_per_1k,
        }
    }

    /// Point the adapter at a different endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replace the price table so tests and deployments can pin values.
    pub fn with_prices(mut self, price_per_1k: HashMap<String, f64>) -> Self {
        self.price_per_1k = price_per_1k;
        self
    }

    fn failure(message: impl Into<String>) -> GatewayError {
        GatewayError::Provider {
            provider: PROVIDER_NAME.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionReply {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    #[serde(default)]
    content: String,
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn cost_per_1k_tokens_usd(&self, model: &str) -> f64 {
        self.price_per_1k
            .get(model)
            .copied()
            .unwrap_or(FALLBACK_PRICE_PER_1K)
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let body = ChatCompletionBody {
            model: &request.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &request.prompt,
            }],
            max_tokens: (request.max_tokens > 0).then_some(request.max_tokens),
        };

        let started = Instant::now();
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::failure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::failure(format!("status {}", status.as_u16())));
        }

        let reply: ChatCompletionReply = response
            .json()
            .await
            .map_err(|e| Self::failure(format!("decode: {e}")))?;
        let latency_ms = started.elapsed().as_millis() as u64;

        let text = reply
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        let cost_usd = estimate_cost_usd(
            self.cost_per_1k_tokens_usd(&request.model),
            request.max_tokens,
        );

        Ok(Completion {
            text,
            cost_usd,
            latency_ms,
        })
    }
}
