//! Strategy selection: deterministic rules from query to dispatch plan

use crate::candidate::Role;
use crate::core::error::OrchestrationError;
use crate::core::model::{ModelProfile, ProviderRoster};
use crate::core::query::{AccuracyLevel, Query};
use crate::strategy::{Assignment, Strategy, StrategyPlan};

/// Widest fan-out for concurrent strategies
const MAX_FAN_OUT: usize = 3;

/// Aspects assigned to expert panel members, in invocation order
const PANEL_ASPECTS: [&str; 3] = [
    "background and key facts",
    "trade-offs and comparisons",
    "recommendation and caveats",
];

/// Choose a strategy and the (model, role) assignments for a query.
///
/// Rules are applied in priority order and are fully deterministic for
/// a given (query, roster) pair:
///
/// 1. Minimal accuracy on a simple task → single best model.
/// 2. Verifiable artifact (code, arithmetic) and ≥2 models →
///    challenge-and-refine with distinct generator and critic.
/// 3. Breadth-seeking task and ≥3 models → expert panel.
/// 4. Maximal accuracy and ≥2 models → best-of-n for single-winner
///    tasks, quality-weighted fusion for complementary ones.
/// 5. Latency prioritized and ≥2 models → parallel race.
/// 6. Fallback → single best model.
pub fn select(query: &Query, roster: &ProviderRoster) -> Result<StrategyPlan, OrchestrationError> {
    let skill = query.task.primary_skill();
    let eligible = roster.ranked(skill);

    if eligible.is_empty() {
        return Err(OrchestrationError::NoEligibleProvider(skill.to_string()));
    }

    let simple_task =
        !query.task.requires_verifiable_artifact() && !query.task.requires_breadth();

    // Rule 1
    if query.accuracy == AccuracyLevel::Minimal && simple_task {
        return Ok(single_best(&eligible));
    }

    // Rule 2
    if query.task.requires_verifiable_artifact() && eligible.len() >= 2 {
        return Ok(StrategyPlan::new(
            Strategy::ChallengeAndRefine,
            vec![
                Assignment::new(eligible[0].model.clone(), Role::Primary),
                Assignment::new(eligible[1].model.clone(), Role::Critic),
            ],
        ));
    }

    // Rule 3
    if query.task.requires_breadth() && eligible.len() >= 3 {
        let assignments = eligible
            .iter()
            .take(PANEL_ASPECTS.len())
            .zip(PANEL_ASPECTS)
            .map(|(profile, aspect)| {
                Assignment::new(
                    profile.model.clone(),
                    Role::Panelist {
                        aspect: aspect.to_string(),
                    },
                )
            })
            .collect();
        return Ok(StrategyPlan::new(Strategy::ExpertPanel, assignments));
    }

    // Rule 4
    if query.accuracy == AccuracyLevel::Maximal && eligible.len() >= 2 {
        let strategy = if query.task.is_single_winner() {
            Strategy::BestOfN
        } else {
            Strategy::QualityWeightedFusion
        };
        return Ok(StrategyPlan::new(strategy, candidates(&eligible)));
    }

    // Rule 5
    if query.prioritize_latency && eligible.len() >= 2 {
        return Ok(StrategyPlan::new(
            Strategy::ParallelRace,
            candidates(&eligible),
        ));
    }

    // Rule 6
    Ok(single_best(&eligible))
}

fn single_best(eligible: &[&ModelProfile]) -> StrategyPlan {
    StrategyPlan::new(
        Strategy::SingleBest,
        vec![Assignment::new(eligible[0].model.clone(), Role::Primary)],
    )
}

fn candidates(eligible: &[&ModelProfile]) -> Vec<Assignment> {
    eligible
        .iter()
        .take(MAX_FAN_OUT)
        .map(|profile| Assignment::new(profile.model.clone(), Role::Candidate))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{ModelId, ProviderRoster, Skill};
    use crate::core::query::TaskKind;

    fn roster() -> ProviderRoster {
        ProviderRoster::default_roster()
    }

    #[test]
    fn test_minimal_simple_selects_single_best() {
        let query = Query::new("What is the capital of France?")
            .with_accuracy(AccuracyLevel::Minimal);
        let plan = select(&query, &roster()).unwrap();

        assert_eq!(plan.strategy, Strategy::SingleBest);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.assignments[0].role, Role::Primary);
    }

    #[test]
    fn test_verifiable_task_selects_challenge_and_refine() {
        let query = Query::new("What is 12345*67890?").with_task(TaskKind::Arithmetic);
        let plan = select(&query, &roster()).unwrap();

        assert_eq!(plan.strategy, Strategy::ChallengeAndRefine);
        assert_eq!(plan.len(), 2);
        let generator = plan.generator().unwrap();
        let critic = plan.critic().unwrap();
        assert_ne!(generator.model, critic.model);
    }

    #[test]
    fn test_verifiable_with_one_model_falls_back() {
        let single = ProviderRoster::new(vec![
            crate::core::model::ModelProfile::new(ModelId::Gpt52)
                .with_capability(Skill::Math, 0.9),
        ]);
        let query = Query::new("What is 2+2?").with_task(TaskKind::Arithmetic);
        let plan = select(&query, &single).unwrap();

        assert_eq!(plan.strategy, Strategy::SingleBest);
    }

    #[test]
    fn test_breadth_task_selects_expert_panel() {
        let query = Query::new("Compare Rust, Go, and Zig for systems work")
            .with_task(TaskKind::Comparison);
        let plan = select(&query, &roster()).unwrap();

        assert_eq!(plan.strategy, Strategy::ExpertPanel);
        assert_eq!(plan.len(), 3);
        assert!(
            plan.assignments
                .iter()
                .all(|a| matches!(a.role, Role::Panelist { .. }))
        );
    }

    #[test]
    fn test_maximal_single_winner_selects_best_of_n() {
        let query = Query::new("Who wrote The Trial?").with_accuracy(AccuracyLevel::Maximal);
        let plan = select(&query, &roster()).unwrap();

        assert_eq!(plan.strategy, Strategy::BestOfN);
        assert!(plan.len() >= 2);
    }

    #[test]
    fn test_maximal_complementary_selects_fusion() {
        let query = Query::new("Write a short story about a lighthouse")
            .with_task(TaskKind::Creative)
            .with_accuracy(AccuracyLevel::Maximal);
        let plan = select(&query, &roster()).unwrap();

        assert_eq!(plan.strategy, Strategy::QualityWeightedFusion);
    }

    #[test]
    fn test_latency_priority_selects_race() {
        let query = Query::new("Quick fact: boiling point of water?").prioritizing_latency();
        let plan = select(&query, &roster()).unwrap();

        assert_eq!(plan.strategy, Strategy::ParallelRace);
        assert!(plan.len() >= 2);
    }

    #[test]
    fn test_no_eligible_provider_fails_selection() {
        let no_math = ProviderRoster::new(vec![
            crate::core::model::ModelProfile::new(ModelId::Gpt52)
                .with_capability(Skill::Writing, 0.9),
        ]);
        let query = Query::new("What is 2+2?").with_task(TaskKind::Arithmetic);
        let result = select(&query, &no_math);

        assert!(matches!(
            result,
            Err(OrchestrationError::NoEligibleProvider(_))
        ));
    }

    #[test]
    fn test_selection_is_deterministic() {
        let query = Query::new("Compare A and B?").with_task(TaskKind::Comparison);
        let a = select(&query, &roster()).unwrap();
        let b = select(&query, &roster()).unwrap();
        assert_eq!(a.strategy, b.strategy);
        assert_eq!(a.assignments, b.assignments);
    }

    #[test]
    fn test_verifiable_beats_minimal_accuracy() {
        // Rule 1 requires a simple task; code is not simple
        let query = Query::new("Write fizzbuzz")
            .with_task(TaskKind::Code)
            .with_accuracy(AccuracyLevel::Minimal);
        let plan = select(&query, &roster()).unwrap();
        assert_eq!(plan.strategy, Strategy::ChallengeAndRefine);
    }
}
