//! Provider Gateway port
//!
//! Defines the interface for completing prompts against an LLM provider.
//! This boundary is the only place provider idiosyncrasies live; the
//! engine never constructs provider-specific payloads itself.

use async_trait::async_trait;
use conclave_domain::ModelId;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during a provider completion call
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("Request timed out")]
    Timeout,

    #[error("Rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Rejected by content policy: {0}")]
    ContentPolicy(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed request: {0}")]
    Malformed(String),
}

impl GatewayError {
    /// Whether retrying the same call can plausibly succeed.
    ///
    /// Auth failures, malformed requests, and content-policy rejections
    /// are terminal for the call; the Dispatcher abandons them.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GatewayError::Timeout | GatewayError::RateLimited { .. } | GatewayError::Transport(_)
        )
    }
}

/// One completion request to one model
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: ModelId,
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Per-call deadline; adapters should give up after this long
    pub timeout: Duration,
}

impl CompletionRequest {
    pub fn new(model: ModelId, prompt: impl Into<String>) -> Self {
        Self {
            model,
            system_prompt: None,
            prompt: prompt.into(),
            max_tokens: 1024,
            temperature: 0.3,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A successful completion from a provider
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub latency_ms: u64,
}

/// Gateway for provider completion calls
///
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    /// Complete a prompt against the requested model
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, GatewayError>;
}
