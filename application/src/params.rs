//! Engine parameters — orchestration loop control
//!
//! [`EngineParams`] groups the static parameters that control the
//! verify→retry loop, per-call policy, and aggregation thresholds.
//! These are application-layer concerns, not domain policy.

use std::time::Duration;

/// Orchestration loop control parameters
#[derive(Debug, Clone)]
pub struct EngineParams {
    /// Maximum verify→retry iterations after the initial round
    pub max_iterations: usize,
    /// Maximum retries per provider call on transient failure
    pub max_call_retries: u32,
    /// Per-call timeout when the query has no deadline
    pub default_call_timeout: Duration,
    /// Base backoff between call retries (doubled per attempt)
    pub retry_backoff: Duration,
    /// Max completion tokens per call
    pub max_tokens: u32,
    /// Sampling temperature for provider calls
    pub temperature: f32,
    /// Confidence assumed when a candidate reports none
    pub default_confidence: f64,
    /// Token cost ceiling for a whole session, if any
    pub cost_ceiling_tokens: Option<u64>,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            max_iterations: 2,
            max_call_retries: 2,
            default_call_timeout: Duration::from_secs(60),
            retry_backoff: Duration::from_millis(500),
            max_tokens: 1024,
            temperature: 0.3,
            default_confidence: 0.6,
            cost_ceiling_tokens: None,
        }
    }
}

impl EngineParams {
    // ==================== Builder Methods ====================

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_max_call_retries(mut self, max: u32) -> Self {
        self.max_call_retries = max;
        self
    }

    pub fn with_default_call_timeout(mut self, timeout: Duration) -> Self {
        self.default_call_timeout = timeout;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_default_confidence(mut self, confidence: f64) -> Self {
        self.default_confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_cost_ceiling(mut self, tokens: u64) -> Self {
        self.cost_ceiling_tokens = Some(tokens);
        self
    }

    /// Total rounds a session may run (initial round plus retries)
    pub fn expected_rounds(&self) -> usize {
        self.max_iterations + 1
    }
}
