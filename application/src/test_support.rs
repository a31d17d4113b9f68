//! Scripted gateway stub for dispatcher and orchestrator tests

use crate::ports::provider_gateway::{
    Completion, CompletionRequest, GatewayError, ProviderGateway,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Clone)]
enum Scripted {
    Ok { text: String, delay: Duration },
    Err(GatewayError),
}

/// In-memory gateway with per-model scripted responses.
///
/// Responses for a model are consumed in order; the last entry repeats
/// once the queue is down to one, so a single `script` call answers any
/// number of rounds. An unscripted model fails with a transport error.
pub(crate) struct StubGateway {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl StubGateway {
    pub(crate) fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, model: &str, scripted: Scripted) {
        self.scripts
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(scripted);
    }

    /// Script an instant successful response
    pub(crate) fn script(&self, model: &str, text: &str) {
        self.script_with_delay(model, text, Duration::from_millis(1));
    }

    /// Script a successful response arriving after `delay`
    pub(crate) fn script_with_delay(&self, model: &str, text: &str, delay: Duration) {
        self.push(
            model,
            Scripted::Ok {
                text: text.to_string(),
                delay,
            },
        );
    }

    /// Script a failure
    pub(crate) fn script_err(&self, model: &str, error: GatewayError) {
        self.push(model, Scripted::Err(error));
    }

    /// All calls made so far as (model, prompt) pairs, in order
    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of calls made so far
    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Number of calls made to one model
    pub(crate) fn calls_to(&self, model: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == model)
            .count()
    }
}

#[async_trait]
impl ProviderGateway for StubGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, GatewayError> {
        let model = request.model.to_string();

        let scripted = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((model.clone(), request.prompt.clone()));

            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(&model) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match scripted {
            Some(Scripted::Ok { text, delay }) => {
                tokio::time::sleep(delay).await;
                Ok(Completion {
                    prompt_tokens: (request.prompt.len() / 4) as u32,
                    completion_tokens: (text.len() / 4).max(1) as u32,
                    latency_ms: delay.as_millis() as u64,
                    text,
                })
            }
            Some(Scripted::Err(error)) => Err(error),
            None => Err(GatewayError::Transport(format!(
                "no scripted response for {}",
                model
            ))),
        }
    }
}
