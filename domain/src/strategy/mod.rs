//! Orchestration strategies and dispatch plans
//!
//! A strategy is the chosen method for combining one or more model calls
//! into one answer. The set is closed; the Aggregator matches on it
//! exhaustively, so a new strategy cannot be added without handling its
//! combination semantics.

pub mod selector;

use crate::candidate::Role;
use crate::core::model::ModelId;
use serde::{Deserialize, Serialize};

/// The closed set of orchestration strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One call to the single best-rated model
    SingleBest,
    /// Concurrent calls, first valid answer wins, siblings cancelled
    ParallelRace,
    /// Concurrent calls, a judge pass selects one candidate verbatim
    BestOfN,
    /// Concurrent calls, answers fused weighted by model capability
    QualityWeightedFusion,
    /// Concurrent calls, each covering an assigned aspect, then merged
    ExpertPanel,
    /// Sequential generator, critic, and regenerate loop
    ChallengeAndRefine,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::SingleBest => "single_best",
            Strategy::ParallelRace => "parallel_race",
            Strategy::BestOfN => "best_of_n",
            Strategy::QualityWeightedFusion => "quality_weighted_fusion",
            Strategy::ExpertPanel => "expert_panel",
            Strategy::ChallengeAndRefine => "challenge_and_refine",
        }
    }

    /// Whether sibling calls run concurrently.
    ///
    /// Challenge-and-refine is strictly sequential by definition.
    pub fn is_concurrent(&self) -> bool {
        !matches!(self, Strategy::ChallengeAndRefine)
    }

    /// Whether the strategy completes on the first valid result
    pub fn races(&self) -> bool {
        matches!(self, Strategy::ParallelRace)
    }

    /// Successful calls needed for the strategy to be meaningful.
    ///
    /// Below this count (but above zero) the round proceeds in degraded
    /// mode; at zero successes the round is a hard failure. Fusion and
    /// panels need two answers to combine; challenge-and-refine needs
    /// both the generator and the critic.
    pub fn meaningful_successes(&self) -> usize {
        match self {
            Strategy::QualityWeightedFusion
            | Strategy::ExpertPanel
            | Strategy::ChallengeAndRefine => 2,
            _ => 1,
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "single_best" => Ok(Strategy::SingleBest),
            "parallel_race" | "race" => Ok(Strategy::ParallelRace),
            "best_of_n" => Ok(Strategy::BestOfN),
            "quality_weighted_fusion" | "fusion" => Ok(Strategy::QualityWeightedFusion),
            "expert_panel" | "panel" => Ok(Strategy::ExpertPanel),
            "challenge_and_refine" => Ok(Strategy::ChallengeAndRefine),
            other => Err(format!("Unknown strategy: {}", other)),
        }
    }
}

/// One (model, role) pair the Dispatcher will invoke
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub model: ModelId,
    pub role: Role,
}

impl Assignment {
    pub fn new(model: ModelId, role: Role) -> Self {
        Self { model, role }
    }
}

/// The selector's output: a strategy plus the ordered calls it implies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyPlan {
    pub strategy: Strategy,
    /// Ordered (model, role) pairs; order is meaningful for sequential
    /// strategies and as the deterministic tie-break elsewhere.
    pub assignments: Vec<Assignment>,
}

impl StrategyPlan {
    pub fn new(strategy: Strategy, assignments: Vec<Assignment>) -> Self {
        Self {
            strategy,
            assignments,
        }
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// The generator assignment of a challenge-and-refine plan
    pub fn generator(&self) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.role == Role::Primary)
    }

    /// The critic assignment of a challenge-and-refine plan
    pub fn critic(&self) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.role == Role::Critic)
    }
}
