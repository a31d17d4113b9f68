//! Consensus results, the engine's single combined output per round

pub mod divergence;

use crate::candidate::{CandidateAnswer, Role};
use crate::strategy::Strategy;
use serde::{Deserialize, Serialize};

/// The combined output of one orchestration round (Value Object)
///
/// Exactly one exists per round, and never without at least one
/// successful candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    /// The selected or synthesized answer text
    pub text: String,
    /// Confidence in [0.0, 1.0]
    pub confidence: f64,
    /// Strategy that produced this result
    pub strategy: Strategy,
    /// Candidates that contributed (retained for audit)
    pub contributors: Vec<CandidateAnswer>,
    /// Whether the round ran below the strategy's intended success count
    pub degraded: bool,
}

impl ConsensusResult {
    /// Create a consensus result
    ///
    /// # Panics
    /// Panics if `contributors` is empty; a consensus is never
    /// fabricated without at least one successful candidate.
    pub fn new(
        text: impl Into<String>,
        confidence: f64,
        strategy: Strategy,
        contributors: Vec<CandidateAnswer>,
    ) -> Self {
        assert!(
            !contributors.is_empty(),
            "ConsensusResult requires at least one contributing candidate"
        );
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            strategy,
            contributors,
            degraded: false,
        }
    }

    /// Mark this result as produced in degraded mode
    pub fn degraded(mut self) -> Self {
        self.degraded = true;
        self
    }

    /// The critique text attached by a critic contributor, if any
    pub fn critique(&self) -> Option<&str> {
        self.contributors
            .iter()
            .find(|c| c.role == Role::Critic)
            .map(|c| c.text.as_str())
    }

    /// Total tokens billed across all contributors
    pub fn total_tokens(&self) -> u32 {
        self.contributors.iter().map(|c| c.total_tokens()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::ModelId;

    fn candidate(text: &str) -> CandidateAnswer {
        CandidateAnswer::new(ModelId::Gpt52, Role::Candidate, text).with_usage(10, 5)
    }

    #[test]
    fn test_consensus_creation() {
        let result = ConsensusResult::new(
            "42",
            0.9,
            Strategy::BestOfN,
            vec![candidate("42"), candidate("41")],
        );
        assert_eq!(result.text, "42");
        assert_eq!(result.confidence, 0.9);
        assert!(!result.degraded);
        assert_eq!(result.total_tokens(), 30);
    }

    #[test]
    #[should_panic]
    fn test_consensus_requires_contributors() {
        ConsensusResult::new("x", 0.5, Strategy::SingleBest, vec![]);
    }

    #[test]
    fn test_confidence_clamped() {
        let result = ConsensusResult::new("x", 1.3, Strategy::SingleBest, vec![candidate("x")]);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_critique_lookup() {
        let critic = CandidateAnswer::new(ModelId::Gemini3Pro, Role::Critic, "off by one");
        let result = ConsensusResult::new(
            "answer",
            0.5,
            Strategy::ChallengeAndRefine,
            vec![candidate("answer"), critic],
        );
        assert_eq!(result.critique(), Some("off by one"));
    }

    #[test]
    fn test_degraded_flag() {
        let result =
            ConsensusResult::new("x", 0.5, Strategy::QualityWeightedFusion, vec![candidate("x")])
                .degraded();
        assert!(result.degraded);
    }
}
