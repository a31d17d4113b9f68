//! Provider gateway adapters

pub mod openai_compat;

pub use openai_compat::OpenAiCompatGateway;
