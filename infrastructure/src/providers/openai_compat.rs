//! OpenAI-compatible chat-completions gateway adapter
//!
//! Speaks the `/v1/chat/completions` wire format that most routers and
//! self-hosted inference servers expose. All provider idiosyncrasies
//! stop at this boundary: HTTP outcomes are mapped onto the engine's
//! gateway error taxonomy.

use async_trait::async_trait;
use conclave_application::ports::provider_gateway::{
    Completion, CompletionRequest, GatewayError, ProviderGateway,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

/// Map a non-success HTTP status onto the gateway error taxonomy
fn map_status(status: u16, retry_after: Option<Duration>, body: String) -> GatewayError {
    match status {
        401 | 403 => GatewayError::AuthFailed(body),
        429 => GatewayError::RateLimited { retry_after },
        400 | 404 | 422 => GatewayError::Malformed(body),
        _ => GatewayError::Transport(format!("HTTP {}: {}", status, body)),
    }
}

/// Gateway adapter for OpenAI-compatible completion endpoints
pub struct OpenAiCompatGateway {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OpenAiCompatGateway {
    /// Create a gateway against the given chat-completions endpoint
    pub fn new(endpoint: impl Into<String>) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: None,
        })
    }

    /// Attach a bearer token sent with every request
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ProviderGateway for OpenAiCompatGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, GatewayError> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system_prompt {
            messages.push(ChatMessage {
                role: "system",
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: request.prompt.clone(),
        });

        let payload = ChatRequest {
            model: request.model.to_string(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let started = Instant::now();
        let mut http_request = self
            .http
            .post(&self.endpoint)
            .timeout(request.timeout)
            .json(&payload);
        if let Some(api_key) = &self.api_key {
            http_request = http_request.bearer_auth(api_key);
        }

        let response = http_request.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout
            } else {
                GatewayError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            warn!(model = %request.model, status = status.as_u16(), "Provider returned an error");
            return Err(map_status(status.as_u16(), retry_after, body));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("invalid response body: {}", e)))?;

        let choice = chat
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::Transport("response carried no choices".to_string()))?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(GatewayError::ContentPolicy(
                "completion stopped by content filter".to_string(),
            ));
        }

        let text = choice.message.content.unwrap_or_default();
        let latency_ms = started.elapsed().as_millis() as u64;

        // Fall back to a rough length-based estimate when the endpoint
        // reports no usage
        let (prompt_tokens, completion_tokens) = match chat.usage {
            Some(usage) => (usage.prompt_tokens, usage.completion_tokens),
            None => (
                (request.prompt.len() / 4) as u32,
                (text.len() / 4) as u32,
            ),
        };

        debug!(
            model = %request.model,
            latency_ms,
            completion_tokens,
            "Completion received"
        );

        Ok(Completion {
            text,
            prompt_tokens,
            completion_tokens,
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status(401, None, String::new()),
            GatewayError::AuthFailed(_)
        ));
        assert!(matches!(
            map_status(403, None, String::new()),
            GatewayError::AuthFailed(_)
        ));
        assert!(matches!(
            map_status(429, Some(Duration::from_secs(2)), String::new()),
            GatewayError::RateLimited {
                retry_after: Some(_)
            }
        ));
        assert!(matches!(
            map_status(400, None, String::new()),
            GatewayError::Malformed(_)
        ));
        assert!(matches!(
            map_status(500, None, String::new()),
            GatewayError::Transport(_)
        ));
    }

    #[test]
    fn test_transient_statuses_are_retryable() {
        assert!(map_status(429, None, String::new()).is_transient());
        assert!(map_status(503, None, String::new()).is_transient());
        assert!(!map_status(401, None, String::new()).is_transient());
    }

    #[test]
    fn test_gateway_construction() {
        let gateway = OpenAiCompatGateway::new("http://localhost:8000/v1/chat/completions")
            .unwrap()
            .with_api_key("sk-test");
        assert_eq!(
            gateway.endpoint(),
            "http://localhost:8000/v1/chat/completions"
        );
    }

    #[test]
    fn test_response_parsing() {
        let raw = r#"{
            "choices": [{"message": {"content": "hello"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3}
        }"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hello"));
        assert_eq!(parsed.usage.as_ref().unwrap().prompt_tokens, 12);
    }
}
