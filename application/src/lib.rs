//! Application layer for conclave
//!
//! This crate contains the engine's use cases and port definitions.
//! It depends only on the domain layer; adapters for the ports live in
//! the infrastructure layer.

pub mod params;
pub mod ports;
pub mod use_cases;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use params::EngineParams;
pub use ports::{
    audit::{AuditEvent, AuditSink, NoAudit},
    progress::{NoProgress, ProgressNotifier},
    provider_gateway::{Completion, CompletionRequest, GatewayError, ProviderGateway},
    retrieval::{Passage, Retrieval, RetrievalError},
    tool_broker::{ToolBroker, ToolError, ToolOutput},
};
pub use use_cases::aggregate::Aggregator;
pub use use_cases::dispatch::{CallFailure, DispatchOutcome, Dispatcher};
pub use use_cases::orchestrate::{FinalAnswer, OrchestrateInput, OrchestrateUseCase};
pub use use_cases::verify::Verifier;
