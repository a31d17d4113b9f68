//! Orchestration sessions and the refinement state machine
//!
//! The state machine is the single source of truth for the verify→retry
//! flow. Only the orchestrate loop mutates a session, and only between
//! rounds, so no synchronization is needed around it.

use crate::consensus::ConsensusResult;
use crate::verification::VerificationReport;
use serde::{Deserialize, Serialize};

/// Position of a session in the refinement flow
///
/// ```text
/// Init → Dispatched → Aggregated → Verified → Done
///   ↑                                 │   └──→ Escalated
///   └────────────── Retry ←───────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Init,
    Dispatched,
    Aggregated,
    Verified,
    Done,
    Retry,
    Escalated,
}

impl SessionState {
    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Init, Dispatched)
                | (Dispatched, Aggregated)
                | (Aggregated, Verified)
                | (Verified, Done)
                | (Verified, Retry)
                | (Verified, Escalated)
                | (Retry, Dispatched)
                // A session may escalate mid-round when the budget runs out
                | (Dispatched, Escalated)
                | (Aggregated, Escalated)
        )
    }

    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Done | SessionState::Escalated)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Init => "init",
            SessionState::Dispatched => "dispatched",
            SessionState::Aggregated => "aggregated",
            SessionState::Verified => "verified",
            SessionState::Done => "done",
            SessionState::Retry => "retry",
            SessionState::Escalated => "escalated",
        };
        write!(f, "{}", s)
    }
}

/// One completed round: a consensus and its verification verdict
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    /// Round number (1-indexed)
    pub round: usize,
    pub consensus: ConsensusResult,
    pub report: VerificationReport,
}

impl Round {
    /// Issues still demanding action after this round
    pub fn outstanding_issues(&self) -> usize {
        self.report.outstanding()
    }
}

/// Mutable context for one query's full lifecycle
///
/// Created at query entry, mutated by the orchestrate loop between
/// rounds, archived or dropped when the session terminates.
#[derive(Debug, Clone)]
pub struct OrchestrationSession {
    state: SessionState,
    /// Completed rounds, in order
    pub rounds: Vec<Round>,
    /// Retries performed so far (round count minus one, floored at zero)
    pub iteration: usize,
    /// Accumulated token cost across all calls, including discarded ones
    pub total_tokens: u64,
    /// Accumulated wall-clock latency of provider calls
    pub total_latency_ms: u64,
}

impl Default for OrchestrationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestrationSession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Init,
            rounds: Vec::new(),
            iteration: 0,
            total_tokens: 0,
            total_latency_ms: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Advance the state machine
    ///
    /// # Panics
    /// Panics on an illegal transition; transitions are the orchestrate
    /// loop's invariant, not a recoverable condition.
    pub fn advance(&mut self, next: SessionState) {
        assert!(
            self.state.can_transition_to(next),
            "illegal session transition: {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }

    /// Record billed usage from one round of provider calls
    pub fn add_usage(&mut self, tokens: u64, latency_ms: u64) {
        self.total_tokens += tokens;
        self.total_latency_ms += latency_ms;
    }

    /// Record a completed round
    pub fn record_round(&mut self, consensus: ConsensusResult, report: VerificationReport) {
        let round = Round {
            round: self.rounds.len() + 1,
            consensus,
            report,
        };
        self.rounds.push(round);
        self.iteration = self.rounds.len().saturating_sub(1);
    }

    /// The round with the fewest outstanding issues, preferring later
    /// rounds on ties (later rounds incorporate more feedback).
    pub fn best_round(&self) -> Option<&Round> {
        self.rounds.iter().fold(None, |best, round| match best {
            None => Some(round),
            Some(current) if round.outstanding_issues() <= current.outstanding_issues() => {
                Some(round)
            }
            Some(current) => Some(current),
        })
    }

    /// The most recent round
    pub fn latest_round(&self) -> Option<&Round> {
        self.rounds.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{CandidateAnswer, Role};
    use crate::core::model::ModelId;
    use crate::strategy::Strategy;
    use crate::verification::{Issue, IssueKind};

    fn consensus(text: &str) -> ConsensusResult {
        ConsensusResult::new(
            text,
            0.8,
            Strategy::SingleBest,
            vec![CandidateAnswer::new(ModelId::Gpt52, Role::Primary, text)],
        )
    }

    fn report_with_issues(n: usize) -> VerificationReport {
        let issues = (0..n)
            .map(|i| Issue::fixable(IssueKind::IncompleteAnswer, format!("issue {}", i)))
            .collect();
        VerificationReport::from_issues(issues)
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut session = OrchestrationSession::new();
        assert_eq!(session.state(), SessionState::Init);

        session.advance(SessionState::Dispatched);
        session.advance(SessionState::Aggregated);
        session.advance(SessionState::Verified);
        session.advance(SessionState::Done);

        assert!(session.state().is_terminal());
    }

    #[test]
    fn test_retry_loops_back_to_dispatch() {
        let mut session = OrchestrationSession::new();
        session.advance(SessionState::Dispatched);
        session.advance(SessionState::Aggregated);
        session.advance(SessionState::Verified);
        session.advance(SessionState::Retry);
        session.advance(SessionState::Dispatched);

        assert_eq!(session.state(), SessionState::Dispatched);
    }

    #[test]
    #[should_panic(expected = "illegal session transition")]
    fn test_illegal_transition_panics() {
        let mut session = OrchestrationSession::new();
        session.advance(SessionState::Verified);
    }

    #[test]
    #[should_panic(expected = "illegal session transition")]
    fn test_terminal_state_is_final() {
        let mut session = OrchestrationSession::new();
        session.advance(SessionState::Dispatched);
        session.advance(SessionState::Aggregated);
        session.advance(SessionState::Verified);
        session.advance(SessionState::Done);
        session.advance(SessionState::Retry);
    }

    #[test]
    fn test_mid_round_escalation_allowed() {
        let mut session = OrchestrationSession::new();
        session.advance(SessionState::Dispatched);
        session.advance(SessionState::Escalated);
        assert!(session.state().is_terminal());
    }

    #[test]
    fn test_usage_accumulates() {
        let mut session = OrchestrationSession::new();
        session.add_usage(120, 400);
        session.add_usage(80, 300);
        assert_eq!(session.total_tokens, 200);
        assert_eq!(session.total_latency_ms, 700);
    }

    #[test]
    fn test_round_numbering_and_iteration() {
        let mut session = OrchestrationSession::new();
        session.record_round(consensus("a"), report_with_issues(1));
        assert_eq!(session.rounds[0].round, 1);
        assert_eq!(session.iteration, 0);

        session.record_round(consensus("b"), report_with_issues(0));
        assert_eq!(session.rounds[1].round, 2);
        assert_eq!(session.iteration, 1);
    }

    #[test]
    fn test_best_round_prefers_fewest_issues_then_latest() {
        let mut session = OrchestrationSession::new();
        session.record_round(consensus("a"), report_with_issues(2));
        session.record_round(consensus("b"), report_with_issues(1));
        session.record_round(consensus("c"), report_with_issues(1));

        let best = session.best_round().unwrap();
        assert_eq!(best.consensus.text, "c");
    }
}
