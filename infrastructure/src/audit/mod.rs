//! Audit sink adapters

pub mod jsonl;

pub use jsonl::JsonlAuditSink;
