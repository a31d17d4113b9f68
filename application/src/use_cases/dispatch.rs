//! Dispatcher: executes a strategy plan's provider calls
//!
//! Calls run as independent tokio tasks; the only suspension points are
//! the provider call boundaries. A sibling's failure never aborts the
//! others. Race cancellation is cooperative: in-flight calls that
//! already completed are still drained so their cost is accounted, and
//! only their results are discarded.

use crate::params::EngineParams;
use crate::ports::progress::ProgressNotifier;
use crate::ports::provider_gateway::{CompletionRequest, GatewayError, ProviderGateway};
use conclave_domain::{
    Assignment, BudgetKind, CandidateAnswer, ModelId, OrchestrationError, PromptTemplate, Query,
    Role, StrategyPlan,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Floor for derived per-call timeouts
const MIN_CALL_TIMEOUT: Duration = Duration::from_secs(1);

/// One provider call that reached terminal failure
#[derive(Debug)]
pub struct CallFailure {
    pub model: ModelId,
    pub error: GatewayError,
    /// Attempts made, including the first
    pub attempts: u32,
}

/// Result of one Dispatcher invocation
#[derive(Debug)]
pub struct DispatchOutcome {
    /// Successful candidates, in arrival order
    pub candidates: Vec<CandidateAnswer>,
    /// Calls that failed after exhausting their retries
    pub failures: Vec<CallFailure>,
    /// Fewer successes than the strategy needs to be meaningful
    pub degraded: bool,
    /// Tokens billed across all completed calls, including discarded
    /// race losers
    pub billed_tokens: u64,
    /// Summed wall-clock latency across all completed calls
    pub billed_latency_ms: u64,
}

impl DispatchOutcome {
    fn empty() -> Self {
        Self {
            candidates: Vec::new(),
            failures: Vec::new(),
            degraded: false,
            billed_tokens: 0,
            billed_latency_ms: 0,
        }
    }

    /// Whether at least one answering candidate survived
    pub fn has_answer(&self) -> bool {
        self.candidates.iter().any(|c| c.role.is_answering())
    }
}

/// Cheap validity check used by the race path: non-empty and not a refusal
fn is_valid_answer(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }
    let lower = trimmed.to_lowercase();
    const REFUSAL_MARKERS: [&str; 4] = [
        "i can't help",
        "i cannot help",
        "i'm sorry, but i",
        "i am unable to",
    ];
    !REFUSAL_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Split a trailing `[confidence: 0.85]` marker off a completion text
pub(crate) fn split_confidence(text: &str) -> (String, Option<f64>) {
    if let Some(start) = text.rfind("[confidence:")
        && let Some(end) = text[start..].find(']')
        && end > 12
        && let Ok(value) = text[start + 12..start + end].trim().parse::<f64>()
    {
        let mut cleaned = text[..start].trim_end().to_string();
        cleaned.push_str(text[start + end + 1..].trim_end());
        return (cleaned, Some(value.clamp(0.0, 1.0)));
    }
    (text.to_string(), None)
}

/// Executes the provider calls implied by a strategy plan
pub struct Dispatcher<G> {
    gateway: Arc<G>,
    params: EngineParams,
}

impl<G: ProviderGateway + 'static> Dispatcher<G> {
    pub fn new(gateway: Arc<G>, params: EngineParams) -> Self {
        Self { gateway, params }
    }

    /// Execute a plan, returning as soon as the strategy's completion
    /// condition is met or every call has reached a terminal state.
    ///
    /// A deadline already in the past issues zero calls.
    pub async fn dispatch(
        &self,
        query: &Query,
        plan: &StrategyPlan,
        rounds_remaining: usize,
        progress: &dyn ProgressNotifier,
    ) -> Result<DispatchOutcome, OrchestrationError> {
        if query.deadline_expired() {
            warn!("Query deadline already expired, issuing zero calls");
            return Err(OrchestrationError::BudgetExceeded(BudgetKind::Deadline));
        }

        let timeout = self.call_timeout(query, rounds_remaining);
        debug!(
            strategy = %plan.strategy,
            calls = plan.len(),
            timeout_ms = timeout.as_millis() as u64,
            "Dispatching"
        );

        let outcome = if plan.strategy.is_concurrent() {
            self.dispatch_concurrent(query, plan, timeout, progress).await
        } else {
            self.dispatch_sequential(query, plan, timeout, progress).await
        };

        info!(
            strategy = %plan.strategy,
            successes = outcome.candidates.len(),
            failures = outcome.failures.len(),
            degraded = outcome.degraded,
            "Dispatch complete"
        );

        Ok(outcome)
    }

    /// Per-call timeout: the remaining deadline split across the rounds
    /// still expected, floored at one second; the configured default
    /// when the query has no deadline.
    fn call_timeout(&self, query: &Query, rounds_remaining: usize) -> Duration {
        let default = self.params.default_call_timeout.max(MIN_CALL_TIMEOUT);
        match query.remaining_time() {
            Some(remaining) => {
                let share = remaining / rounds_remaining.max(1) as u32;
                share.max(MIN_CALL_TIMEOUT).min(default)
            }
            None => default,
        }
    }

    fn build_request(
        &self,
        query: &Query,
        assignment: &Assignment,
        timeout: Duration,
    ) -> CompletionRequest {
        let (system, prompt) = match &assignment.role {
            Role::Panelist { aspect } => (
                PromptTemplate::panelist_system(),
                PromptTemplate::panelist_prompt(query.text(), aspect, &query.context_passages),
            ),
            _ => (
                PromptTemplate::answer_system(query.task),
                PromptTemplate::answer_prompt(query.text(), &query.context_passages),
            ),
        };

        CompletionRequest::new(assignment.model.clone(), prompt)
            .with_system_prompt(system)
            .with_max_tokens(self.params.max_tokens)
            .with_temperature(self.params.temperature)
            .with_timeout(timeout)
    }

    /// One call with up to `max_retries` retries on transient failure.
    ///
    /// Rate limits honor the provider's retry-after when given;
    /// everything else backs off exponentially. Non-retryable failures
    /// are abandoned immediately.
    async fn call_with_retry(
        gateway: Arc<G>,
        request: CompletionRequest,
        role: Role,
        max_retries: u32,
        backoff: Duration,
    ) -> Result<CandidateAnswer, CallFailure> {
        let mut attempt = 0u32;
        loop {
            let result =
                tokio::time::timeout(request.timeout, gateway.complete(request.clone())).await;
            let outcome = match result {
                Ok(inner) => inner,
                Err(_) => Err(GatewayError::Timeout),
            };

            match outcome {
                Ok(completion) => {
                    let (text, confidence) = split_confidence(&completion.text);
                    let mut candidate = CandidateAnswer::new(request.model.clone(), role, text)
                        .with_usage(completion.prompt_tokens, completion.completion_tokens)
                        .with_latency(completion.latency_ms);
                    if let Some(confidence) = confidence {
                        candidate = candidate.with_confidence(confidence);
                    }
                    return Ok(candidate);
                }
                Err(error) if error.is_transient() && attempt < max_retries => {
                    let delay = match &error {
                        GatewayError::RateLimited {
                            retry_after: Some(after),
                        } => *after,
                        _ => backoff * 2u32.pow(attempt),
                    };
                    debug!(
                        model = %request.model,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Transient provider error, retrying: {}",
                        error
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => {
                    return Err(CallFailure {
                        model: request.model.clone(),
                        error,
                        attempts: attempt + 1,
                    });
                }
            }
        }
    }

    /// Concurrent fan-out: gather-all for most strategies, first valid
    /// wins for a race.
    async fn dispatch_concurrent(
        &self,
        query: &Query,
        plan: &StrategyPlan,
        timeout: Duration,
        progress: &dyn ProgressNotifier,
    ) -> DispatchOutcome {
        let token = CancellationToken::new();
        let mut join_set = JoinSet::new();

        for assignment in &plan.assignments {
            let gateway = Arc::clone(&self.gateway);
            let request = self.build_request(query, assignment, timeout);
            let role = assignment.role.clone();
            let token = token.clone();
            let max_retries = self.params.max_call_retries;
            let backoff = self.params.retry_backoff;

            join_set.spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => None,
                    result = Self::call_with_retry(gateway, request, role, max_retries, backoff) => {
                        Some(result)
                    }
                }
            });
        }

        let races = plan.strategy.races();
        let mut outcome = DispatchOutcome::empty();
        let mut winner_found = false;

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Some(Ok(candidate))) => {
                    outcome.billed_tokens += u64::from(candidate.total_tokens());
                    outcome.billed_latency_ms += candidate.latency_ms;
                    progress.on_call_complete(&candidate.model, true);

                    if races && winner_found {
                        debug!(model = %candidate.model, "Race loser discarded (still billed)");
                        continue;
                    }
                    if races && !is_valid_answer(&candidate.text) {
                        debug!(model = %candidate.model, "Race result failed validity check");
                        continue;
                    }

                    outcome.candidates.push(candidate);

                    if races {
                        winner_found = true;
                        token.cancel();
                    }
                }
                Ok(Some(Err(failure))) => {
                    warn!(
                        model = %failure.model,
                        attempts = failure.attempts,
                        "Provider call failed: {}",
                        failure.error
                    );
                    progress.on_call_complete(&failure.model, false);
                    outcome.failures.push(failure);
                }
                Ok(None) => {
                    // Stood down cooperatively after the race was won
                }
                Err(e) => {
                    warn!("Task join error: {}", e);
                }
            }
        }

        outcome.degraded = !outcome.candidates.is_empty()
            && outcome.candidates.len() < plan.len().min(plan.strategy.meaningful_successes());
        outcome
    }

    /// Sequential generator→critic flow for challenge-and-refine
    async fn dispatch_sequential(
        &self,
        query: &Query,
        plan: &StrategyPlan,
        timeout: Duration,
        progress: &dyn ProgressNotifier,
    ) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::empty();

        let Some(generator) = plan.generator() else {
            warn!("Sequential plan has no generator assignment");
            return outcome;
        };

        let request = self.build_request(query, generator, timeout);
        match Self::call_with_retry(
            Arc::clone(&self.gateway),
            request,
            generator.role.clone(),
            self.params.max_call_retries,
            self.params.retry_backoff,
        )
        .await
        {
            Ok(candidate) => {
                outcome.billed_tokens += u64::from(candidate.total_tokens());
                outcome.billed_latency_ms += candidate.latency_ms;
                progress.on_call_complete(&candidate.model, true);
                outcome.candidates.push(candidate);
            }
            Err(failure) => {
                warn!(model = %failure.model, "Generator failed: {}", failure.error);
                progress.on_call_complete(&failure.model, false);
                outcome.failures.push(failure);
                // Nothing to critique without a generator answer
                return outcome;
            }
        }

        if let Some(critic) = plan.critic() {
            let generated = outcome.candidates[0].text.clone();
            let request = CompletionRequest::new(
                critic.model.clone(),
                PromptTemplate::critique_prompt(query.text(), &generated),
            )
            .with_system_prompt(PromptTemplate::critic_system())
            .with_max_tokens(self.params.max_tokens)
            .with_temperature(self.params.temperature)
            .with_timeout(timeout);

            match Self::call_with_retry(
                Arc::clone(&self.gateway),
                request,
                critic.role.clone(),
                self.params.max_call_retries,
                self.params.retry_backoff,
            )
            .await
            {
                Ok(candidate) => {
                    outcome.billed_tokens += u64::from(candidate.total_tokens());
                    outcome.billed_latency_ms += candidate.latency_ms;
                    progress.on_call_complete(&candidate.model, true);
                    outcome.candidates.push(candidate);
                }
                Err(failure) => {
                    warn!(model = %failure.model, "Critic failed: {}", failure.error);
                    progress.on_call_complete(&failure.model, false);
                    outcome.failures.push(failure);
                }
            }
        }

        outcome.degraded = !outcome.candidates.is_empty()
            && outcome.candidates.len() < plan.len().min(plan.strategy.meaningful_successes());
        outcome
    }
}
