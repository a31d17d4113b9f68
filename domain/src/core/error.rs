//! Orchestration error taxonomy

use thiserror::Error;

/// Which budget a session ran out of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetKind {
    /// The query deadline passed
    Deadline,
    /// The configured token cost ceiling was hit
    CostCeiling,
}

impl std::fmt::Display for BudgetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BudgetKind::Deadline => write!(f, "deadline"),
            BudgetKind::CostCeiling => write!(f, "cost ceiling"),
        }
    }
}

/// Session-level errors surfaced to the caller.
///
/// Per-call provider failures are absorbed and recorded inside the
/// Dispatcher; only these terminal outcomes cross the engine boundary.
#[derive(Error, Debug)]
pub enum OrchestrationError {
    #[error("No eligible provider for skill '{0}'")]
    NoEligibleProvider(String),

    #[error("All provider calls failed ({attempted} attempted)")]
    AllProvidersFailed { attempted: usize },

    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    #[error("Budget exceeded ({0}) before any round completed")]
    BudgetExceeded(BudgetKind),
}

impl OrchestrationError {
    /// Check if this error was raised before any provider was called
    pub fn is_pre_dispatch(&self) -> bool {
        matches!(
            self,
            OrchestrationError::NoEligibleProvider(_)
                | OrchestrationError::BudgetExceeded(BudgetKind::Deadline)
        )
    }
}
