//! Retrieval port
//!
//! The engine does not implement retrieval; passages returned by this
//! port are concatenated into prompts before dispatch.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during retrieval
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Retrieval backend unavailable: {0}")]
    Unavailable(String),

    #[error("Retrieval failed: {0}")]
    Failed(String),
}

/// One retrieved passage, in relevance order
#[derive(Debug, Clone)]
pub struct Passage {
    pub text: String,
    pub source: Option<String>,
}

impl Passage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Port for semantic/lexical retrieval
#[async_trait]
pub trait Retrieval: Send + Sync {
    /// Retrieve passages relevant to a query, most relevant first
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>, RetrievalError>;
}
