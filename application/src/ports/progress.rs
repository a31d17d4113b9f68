//! Progress notification port
//!
//! Callback interface for hosts that want to render orchestration
//! progress. The engine calls these between awaits; implementations
//! must not block.

use conclave_domain::{ModelId, Strategy, VerificationStatus};

/// Callback for progress updates during orchestration
pub trait ProgressNotifier: Send + Sync {
    /// Called once after strategy selection
    fn on_strategy_selected(&self, strategy: Strategy, calls: usize);

    /// Called as each provider call reaches a terminal state
    fn on_call_complete(&self, model: &ModelId, success: bool);

    /// Called after each round is verified
    fn on_round_verified(&self, round: usize, status: VerificationStatus);
}

/// No-op progress notifier
pub struct NoProgress;

impl ProgressNotifier for NoProgress {
    fn on_strategy_selected(&self, _strategy: Strategy, _calls: usize) {}
    fn on_call_complete(&self, _model: &ModelId, _success: bool) {}
    fn on_round_verified(&self, _round: usize, _status: VerificationStatus) {}
}
