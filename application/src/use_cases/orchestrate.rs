//! Orchestrate use case, the caller-facing entry point
//!
//! Drives the full lifecycle of one query: strategy selection, dispatch,
//! aggregation, verification, and the verify→retry loop, bounded by the
//! iteration budget. The session state machine is the single source of
//! truth for the flow; this loop only follows its transitions.

use crate::params::EngineParams;
use crate::ports::audit::{AuditEvent, AuditSink};
use crate::ports::progress::{NoProgress, ProgressNotifier};
use crate::ports::provider_gateway::ProviderGateway;
use crate::ports::retrieval::Retrieval;
use crate::use_cases::aggregate::Aggregator;
use crate::use_cases::dispatch::Dispatcher;
use crate::use_cases::verify::Verifier;
use conclave_domain::{
    Assignment, BudgetKind, ConsensusResult, OrchestrationError, OrchestrationSession,
    PromptTemplate, ProviderRoster, Query, Role, SessionState, Strategy, StrategyPlan,
    VerificationReport, VerificationStatus, select,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Input for the Orchestrate use case
pub struct OrchestrateInput {
    pub query: Query,
    /// Immutable provider roster for this session
    pub roster: ProviderRoster,
}

impl OrchestrateInput {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            roster: ProviderRoster::default_roster(),
        }
    }

    pub fn with_roster(mut self, roster: ProviderRoster) -> Self {
        self.roster = roster;
        self
    }
}

/// The engine's final output for one query
#[derive(Debug, Clone, Serialize)]
pub struct FinalAnswer {
    pub text: String,
    /// Confidence in [0.0, 1.0]
    pub confidence: f64,
    pub strategy_used: Strategy,
    /// Rounds executed, including the initial one
    pub iterations: usize,
    /// Human-readable warnings attached to the answer
    pub caveats: Vec<String>,
    /// True when verification never fully passed and the best-effort
    /// result was returned instead
    pub escalated: bool,
}

/// Use case orchestrating one query across providers
pub struct OrchestrateUseCase<G: ProviderGateway + 'static> {
    gateway: Arc<G>,
    params: EngineParams,
    retrieval: Option<Arc<dyn Retrieval>>,
    audit: Option<Arc<dyn AuditSink>>,
}

impl<G: ProviderGateway + 'static> OrchestrateUseCase<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            params: EngineParams::default(),
            retrieval: None,
            audit: None,
        }
    }

    pub fn with_params(mut self, params: EngineParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_retrieval(mut self, retrieval: Arc<dyn Retrieval>) -> Self {
        self.retrieval = Some(retrieval);
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Execute with no progress reporting
    pub async fn execute(&self, input: OrchestrateInput) -> Result<FinalAnswer, OrchestrationError> {
        self.execute_with_progress(input, &NoProgress).await
    }

    /// Execute with progress callbacks
    pub async fn execute_with_progress(
        &self,
        input: OrchestrateInput,
        progress: &dyn ProgressNotifier,
    ) -> Result<FinalAnswer, OrchestrationError> {
        let OrchestrateInput { query, roster } = input;
        let query = self.attach_context(query).await;

        let plan = select(&query, &roster)?;
        progress.on_strategy_selected(plan.strategy, plan.len());
        self.audit_event(
            "strategy_selected",
            json!({ "strategy": plan.strategy, "calls": plan.len() }),
        );
        info!(strategy = %plan.strategy, calls = plan.len(), "Strategy selected");

        let dispatcher = Dispatcher::new(Arc::clone(&self.gateway), self.params.clone());
        let aggregator = Aggregator::new(&roster, &self.params);
        let verifier = Verifier::new();

        let mut session = OrchestrationSession::new();
        let mut round_query = query.clone();
        let mut round_plan = plan.clone();

        loop {
            session.advance(SessionState::Dispatched);
            let rounds_remaining = self
                .params
                .expected_rounds()
                .saturating_sub(session.rounds.len())
                .max(1);

            let outcome = match dispatcher
                .dispatch(&round_query, &round_plan, rounds_remaining, progress)
                .await
            {
                Ok(outcome) => outcome,
                Err(OrchestrationError::BudgetExceeded(kind)) => {
                    return self.finish_out_of_budget(&mut session, plan.strategy, kind);
                }
                Err(error) => return Err(error),
            };

            session.add_usage(outcome.billed_tokens, outcome.billed_latency_ms);

            if !outcome.has_answer() {
                warn!(attempted = round_plan.len(), "No provider produced an answer");
                return Err(OrchestrationError::AllProvidersFailed {
                    attempted: round_plan.len(),
                });
            }

            session.advance(SessionState::Aggregated);
            let consensus = aggregator.aggregate(
                &round_query,
                round_plan.strategy,
                outcome.candidates,
                outcome.degraded,
            );

            session.advance(SessionState::Verified);
            let report = verifier.verify(&query, &consensus);
            progress.on_round_verified(session.rounds.len() + 1, report.status);
            self.audit_event(
                "round_verified",
                json!({
                    "round": session.rounds.len() + 1,
                    "status": report.status,
                    "issues": report.issues.len(),
                    "confidence": consensus.confidence,
                }),
            );

            let status = report.status;
            session.record_round(consensus.clone(), report.clone());

            match status {
                VerificationStatus::Pass => {
                    session.advance(SessionState::Done);
                    let answer = self.final_answer(&session, &consensus, &report, plan.strategy);
                    self.audit_event(
                        "session_done",
                        json!({ "iterations": answer.iterations, "confidence": answer.confidence }),
                    );
                    info!(iterations = answer.iterations, "Session done");
                    return Ok(answer);
                }
                VerificationStatus::Fail => {
                    session.advance(SessionState::Done);
                    self.audit_event("session_failed", json!({ "issues": report.feedback() }));
                    // A hard failure is surfaced to the caller, never
                    // dressed as a confident answer.
                    return Err(OrchestrationError::VerificationFailed(report.feedback()));
                }
                VerificationStatus::NeedsRevision => {
                    let retries_done = session.rounds.len() - 1;
                    let over_cost = self
                        .params
                        .cost_ceiling_tokens
                        .is_some_and(|ceiling| session.total_tokens >= ceiling);

                    if retries_done < self.params.max_iterations
                        && !query.deadline_expired()
                        && !over_cost
                    {
                        session.advance(SessionState::Retry);
                        round_query = revision_query(&query, &consensus, &report);
                        round_plan = revision_plan(&query, &roster);
                        info!(
                            round = session.rounds.len() + 1,
                            outstanding = report.outstanding(),
                            "Revision round"
                        );
                        continue;
                    }

                    session.advance(SessionState::Escalated);
                    let answer = self.escalated_answer(&session, plan.strategy);
                    self.audit_event(
                        "session_escalated",
                        json!({ "iterations": answer.iterations, "confidence": answer.confidence }),
                    );
                    info!(iterations = answer.iterations, "Session escalated");
                    return Ok(answer);
                }
            }
        }
    }

    /// Fetch retrieval passages when the query carries none
    async fn attach_context(&self, query: Query) -> Query {
        let Some(retrieval) = &self.retrieval else {
            return query;
        };
        if !query.context_passages.is_empty() {
            return query;
        }

        match retrieval.retrieve(query.text()).await {
            Ok(passages) if !passages.is_empty() => {
                debug!(count = passages.len(), "Attached retrieval passages");
                let texts = passages.into_iter().map(|p| p.text).collect();
                query.with_context_passages(texts)
            }
            Ok(_) => query,
            Err(error) => {
                warn!("Retrieval failed, continuing without context: {}", error);
                query
            }
        }
    }

    fn final_answer(
        &self,
        session: &OrchestrationSession,
        consensus: &ConsensusResult,
        report: &VerificationReport,
        strategy: Strategy,
    ) -> FinalAnswer {
        let mut caveats = Vec::new();
        if consensus.degraded {
            caveats.push("produced in degraded mode after partial provider failure".to_string());
        }

        FinalAnswer {
            text: consensus.text.clone(),
            confidence: (consensus.confidence * report.confidence).clamp(0.0, 1.0),
            strategy_used: strategy,
            iterations: session.rounds.len(),
            caveats,
            escalated: false,
        }
    }

    /// Best-effort answer after the iteration budget ran out
    fn escalated_answer(&self, session: &OrchestrationSession, strategy: Strategy) -> FinalAnswer {
        let best = session
            .best_round()
            .expect("escalation requires at least one completed round");
        let mut caveats = vec![format!(
            "verification did not fully pass after {} round(s)",
            session.rounds.len()
        )];
        let feedback = best.report.feedback();
        if !feedback.is_empty() {
            caveats.push(format!("outstanding issues:\n{}", feedback));
        }

        FinalAnswer {
            text: best.consensus.text.clone(),
            confidence: (best.consensus.confidence * best.report.confidence).clamp(0.0, 1.0),
            strategy_used: strategy,
            iterations: session.rounds.len(),
            caveats,
            escalated: true,
        }
    }

    /// Budget ran out mid-session: escalate with the best partial
    /// result, or fail when no round ever completed.
    fn finish_out_of_budget(
        &self,
        session: &mut OrchestrationSession,
        strategy: Strategy,
        kind: BudgetKind,
    ) -> Result<FinalAnswer, OrchestrationError> {
        if session.rounds.is_empty() {
            self.audit_event("session_failed", json!({ "budget": kind.to_string() }));
            return Err(OrchestrationError::BudgetExceeded(kind));
        }

        session.advance(SessionState::Escalated);
        let mut answer = self.escalated_answer(session, strategy);
        answer.caveats.push(format!("{} exhausted mid-session", kind));
        self.audit_event(
            "session_escalated",
            json!({ "budget": kind.to_string(), "iterations": answer.iterations }),
        );
        Ok(answer)
    }

    fn audit_event(&self, event_type: &'static str, payload: serde_json::Value) {
        if let Some(audit) = &self.audit {
            audit.record(AuditEvent::new(event_type, payload));
        }
    }
}

/// Follow-up query embedding the prior answer, the specific issues,
/// and the critic's review when the prior round produced one
fn revision_query(
    original: &Query,
    consensus: &ConsensusResult,
    report: &VerificationReport,
) -> Query {
    let mut text =
        PromptTemplate::revision_prompt(original.text(), &consensus.text, &report.issues);
    if let Some(critique) = consensus.critique() {
        text.push_str(&PromptTemplate::critique_addendum(critique));
    }
    let mut query = Query::new(text)
        .with_task(original.task)
        .with_accuracy(original.accuracy);
    if let Some(deadline) = original.deadline {
        query = query.with_deadline(deadline);
    }
    if let Some(format) = original.expected_format {
        query = query.with_expected_format(format);
    }
    query
}

/// Revision rounds use challenge-and-refine semantics regardless of the
/// original strategy: the goal is targeted correction.
fn revision_plan(original: &Query, roster: &ProviderRoster) -> StrategyPlan {
    let skill = original.task.primary_skill();
    let eligible = roster.ranked(skill);

    let mut assignments = Vec::new();
    if let Some(generator) = eligible.first() {
        assignments.push(Assignment::new(generator.model.clone(), Role::Primary));
    }
    if let Some(critic) = eligible.get(1) {
        assignments.push(Assignment::new(critic.model.clone(), Role::Critic));
    }
    StrategyPlan::new(Strategy::ChallengeAndRefine, assignments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::provider_gateway::GatewayError;
    use crate::test_support::StubGateway;
    use conclave_domain::{
        AccuracyLevel, AuthoritativeResult, ModelId, ModelProfile, Skill, TaskKind,
    };
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Roster with a clear generator/critic ordering for math
    fn math_roster() -> ProviderRoster {
        ProviderRoster::new(vec![
            ModelProfile::new(ModelId::Custom("gen-model".into()))
                .with_capability(Skill::Math, 0.9)
                .with_capability(Skill::Reasoning, 0.9),
            ModelProfile::new(ModelId::Custom("critic-model".into()))
                .with_capability(Skill::Math, 0.8)
                .with_capability(Skill::Reasoning, 0.8),
        ])
    }

    #[tokio::test(start_paused = true)]
    async fn test_simple_query_resolves_with_confidence_in_range() {
        let gateway = Arc::new(StubGateway::new());
        gateway.script("gen-model", "Paris is the capital of France.");

        let use_case = OrchestrateUseCase::new(Arc::clone(&gateway));
        let input = OrchestrateInput::new(
            Query::new("What is the capital of France?").with_accuracy(AccuracyLevel::Minimal),
        )
        .with_roster(math_roster());

        let answer = use_case.execute(input).await.unwrap();

        assert_eq!(answer.text, "Paris is the capital of France.");
        assert_eq!(answer.strategy_used, Strategy::SingleBest);
        assert!((0.0..=1.0).contains(&answer.confidence));
        assert!(!answer.escalated);
        assert_eq!(answer.iterations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_arithmetic_scenario_corrects_against_calculator() {
        let gateway = Arc::new(StubGateway::new());
        // Wrong on the first round, corrected after the mismatch feedback
        gateway.script("gen-model", "12345*67890 = 838102051");
        gateway.script("gen-model", "The correct product is 838102050.");
        gateway.script("critic-model", "The last digit looks wrong.");

        let use_case = OrchestrateUseCase::new(Arc::clone(&gateway));
        let input = OrchestrateInput::new(
            Query::new("What is 12345*67890?")
                .with_task(TaskKind::Arithmetic)
                .with_authoritative(AuthoritativeResult::new("calculator", "838102050")),
        )
        .with_roster(math_roster());

        let answer = use_case.execute(input).await.unwrap();

        assert!(answer.text.contains("838102050"));
        assert_eq!(answer.strategy_used, Strategy::ChallengeAndRefine);
        assert_eq!(answer.iterations, 2);
        assert!(!answer.escalated);
        assert!((0.0..=1.0).contains(&answer.confidence));
        // The revision prompt embedded the prior wrong answer
        let calls = gateway.calls();
        let revision_call = calls
            .iter()
            .filter(|(m, _)| m == "gen-model")
            .nth(1)
            .unwrap();
        assert!(revision_call.1.contains("838102051"));
        assert!(revision_call.1.contains("calculator"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_revision_escalates_after_max_iterations() {
        let gateway = Arc::new(StubGateway::new());
        // Never matches the authoritative value, so every round needs revision
        gateway.script("gen-model", "The answer is 111.");
        gateway.script("critic-model", "Unconvincing.");

        let use_case = OrchestrateUseCase::new(Arc::clone(&gateway));
        let input = OrchestrateInput::new(
            Query::new("What is 12345*67890?")
                .with_task(TaskKind::Arithmetic)
                .with_authoritative(AuthoritativeResult::new("calculator", "838102050")),
        )
        .with_roster(math_roster());

        let answer = use_case.execute(input).await.unwrap();

        // Initial round plus exactly max_iterations retries, never more
        assert_eq!(answer.iterations, EngineParams::default().max_iterations + 1);
        assert!(answer.escalated);
        assert!(!answer.caveats.is_empty());
        assert!((0.0..=1.0).contains(&answer.confidence));
        assert_eq!(gateway.calls_to("gen-model"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_providers_failed_yields_typed_error() {
        let gateway = Arc::new(StubGateway::new());
        gateway.script_err("gen-model", GatewayError::AuthFailed("bad key".into()));
        gateway.script_err("critic-model", GatewayError::AuthFailed("bad key".into()));

        let use_case = OrchestrateUseCase::new(Arc::clone(&gateway));
        let input = OrchestrateInput::new(
            Query::new("What is 2+2?").with_task(TaskKind::Arithmetic),
        )
        .with_roster(math_roster());

        let result = use_case.execute(input).await;

        assert!(matches!(
            result,
            Err(OrchestrationError::AllProvidersFailed { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_deadline_terminates_before_any_call() {
        let gateway = Arc::new(StubGateway::new());
        gateway.script("gen-model", "never used");

        let use_case = OrchestrateUseCase::new(Arc::clone(&gateway));
        let input = OrchestrateInput::new(
            Query::new("Anything?").with_deadline(Instant::now() - Duration::from_secs(1)),
        )
        .with_roster(math_roster());

        let result = use_case.execute(input).await;

        assert!(matches!(
            result,
            Err(OrchestrationError::BudgetExceeded(BudgetKind::Deadline))
        ));
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_eligible_provider_fails_before_dispatch() {
        let gateway = Arc::new(StubGateway::new());

        let roster = ProviderRoster::new(vec![
            ModelProfile::new(ModelId::Custom("writer".into()))
                .with_capability(Skill::Writing, 0.9),
        ]);
        let use_case = OrchestrateUseCase::new(Arc::clone(&gateway));
        let input = OrchestrateInput::new(
            Query::new("What is 2+2?").with_task(TaskKind::Arithmetic),
        )
        .with_roster(roster);

        let result = use_case.execute(input).await;

        assert!(matches!(
            result,
            Err(OrchestrationError::NoEligibleProvider(_))
        ));
        assert_eq!(gateway.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cost_ceiling_stops_retries() {
        let gateway = Arc::new(StubGateway::new());
        gateway.script("gen-model", "The answer is 111.");
        gateway.script("critic-model", "Unconvincing.");

        let params = EngineParams::default().with_cost_ceiling(1);
        let use_case = OrchestrateUseCase::new(Arc::clone(&gateway)).with_params(params);
        let input = OrchestrateInput::new(
            Query::new("What is 12345*67890?")
                .with_task(TaskKind::Arithmetic)
                .with_authoritative(AuthoritativeResult::new("calculator", "838102050")),
        )
        .with_roster(math_roster());

        let answer = use_case.execute(input).await.unwrap();

        // The ceiling is hit after the first round, so no retry happens
        assert_eq!(answer.iterations, 1);
        assert!(answer.escalated);
    }

    struct StubRetrieval;

    #[async_trait::async_trait]
    impl Retrieval for StubRetrieval {
        async fn retrieve(
            &self,
            _query: &str,
        ) -> Result<Vec<crate::ports::retrieval::Passage>, crate::ports::retrieval::RetrievalError>
        {
            Ok(vec![crate::ports::retrieval::Passage::new(
                "Paris has been the capital of France since 987.",
            )])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retrieval_passages_reach_the_prompt() {
        let gateway = Arc::new(StubGateway::new());
        gateway.script("gen-model", "Paris.");

        let use_case =
            OrchestrateUseCase::new(Arc::clone(&gateway)).with_retrieval(Arc::new(StubRetrieval));
        let input = OrchestrateInput::new(
            Query::new("Capital of France?").with_accuracy(AccuracyLevel::Minimal),
        )
        .with_roster(math_roster());

        use_case.execute(input).await.unwrap();

        let calls = gateway.calls();
        assert!(calls[0].1.contains("since 987"));
        assert!(calls[0].1.contains("Capital of France?"));
    }

    struct RecordingSink {
        events: Mutex<Vec<&'static str>>,
    }

    impl AuditSink for RecordingSink {
        fn record(&self, event: AuditEvent) {
            self.events.lock().unwrap().push(event.event_type);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_audit_trail_covers_the_session() {
        let gateway = Arc::new(StubGateway::new());
        gateway.script("gen-model", "Paris.");

        let sink = Arc::new(RecordingSink {
            events: Mutex::new(Vec::new()),
        });
        let use_case = OrchestrateUseCase::new(Arc::clone(&gateway))
            .with_audit(Arc::clone(&sink) as Arc<dyn AuditSink>);
        let input = OrchestrateInput::new(
            Query::new("Capital of France?").with_accuracy(AccuracyLevel::Minimal),
        )
        .with_roster(math_roster());

        use_case.execute(input).await.unwrap();

        let events = sink.events.lock().unwrap();
        assert_eq!(
            *events,
            vec!["strategy_selected", "round_verified", "session_done"]
        );
    }
}
