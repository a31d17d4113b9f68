//! Candidate answers produced by individual provider calls

use crate::core::model::ModelId;
use serde::{Deserialize, Serialize};

/// Role a model was assigned within a strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Sole answering model (single-best, race winner)
    Primary,
    /// One of several competing answerers
    Candidate,
    /// Critic reviewing a generator's output
    Critic,
    /// Panel member covering one aspect of the query
    Panelist { aspect: String },
}

impl Role {
    /// Whether this role produces answer text (as opposed to critique)
    pub fn is_answering(&self) -> bool {
        !matches!(self, Role::Critic)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Primary => write!(f, "primary"),
            Role::Candidate => write!(f, "candidate"),
            Role::Critic => write!(f, "critic"),
            Role::Panelist { aspect } => write!(f, "panelist({})", aspect),
        }
    }
}

/// Output of one successful provider call (Value Object)
///
/// Immutable once created; owned by the Aggregator during combination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateAnswer {
    /// The model that produced this answer
    pub model: ModelId,
    /// Role the model played in the strategy
    pub role: Role,
    /// The answer text
    pub text: String,
    /// Prompt tokens billed for this call
    pub prompt_tokens: u32,
    /// Completion tokens billed for this call
    pub completion_tokens: u32,
    /// Wall-clock latency of the call
    pub latency_ms: u64,
    /// Provider-reported or derived confidence, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl CandidateAnswer {
    pub fn new(model: ModelId, role: Role, text: impl Into<String>) -> Self {
        Self {
            model,
            role,
            text: text.into(),
            prompt_tokens: 0,
            completion_tokens: 0,
            latency_ms: 0,
            confidence: None,
        }
    }

    pub fn with_usage(mut self, prompt_tokens: u32, completion_tokens: u32) -> Self {
        self.prompt_tokens = prompt_tokens;
        self.completion_tokens = completion_tokens;
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Attach a confidence score (clamped to [0.0, 1.0])
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence.clamp(0.0, 1.0));
        self
    }

    /// Reported confidence, or the given default when none was reported
    pub fn confidence_or(&self, default: f64) -> f64 {
        self.confidence.unwrap_or(default)
    }

    /// Total tokens billed for this call
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}
