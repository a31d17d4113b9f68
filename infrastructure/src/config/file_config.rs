//! Configuration file schema
//!
//! Serde structs mirroring `conclave.toml`. Defaults here are the
//! single source of truth for out-of-the-box behavior.

use conclave_application::EngineParams;
use conclave_domain::{ModelProfile, ProviderRoster};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub providers: ProvidersConfig,
    pub engine: EngineConfig,
}

/// Provider endpoint and roster configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// OpenAI-compatible chat-completions endpoint
    pub endpoint: String,
    /// Environment variable holding the API key, if the endpoint needs one
    pub api_key_env: Option<String>,
    /// Model profiles with per-skill capability scores; empty uses the
    /// built-in default roster
    pub models: Vec<ModelProfile>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/v1/chat/completions".to_string(),
            api_key_env: None,
            models: Vec::new(),
        }
    }
}

impl ProvidersConfig {
    /// Build the immutable roster handed to each session
    pub fn roster(&self) -> ProviderRoster {
        if self.models.is_empty() {
            ProviderRoster::default_roster()
        } else {
            ProviderRoster::new(self.models.clone())
        }
    }
}

/// Engine loop and per-call parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_iterations: usize,
    pub max_call_retries: u32,
    pub call_timeout_secs: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    pub default_confidence: f64,
    pub cost_ceiling_tokens: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let params = EngineParams::default();
        Self {
            max_iterations: params.max_iterations,
            max_call_retries: params.max_call_retries,
            call_timeout_secs: params.default_call_timeout.as_secs(),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            default_confidence: params.default_confidence,
            cost_ceiling_tokens: params.cost_ceiling_tokens,
        }
    }
}

impl EngineConfig {
    /// Convert the file representation into runtime parameters
    pub fn params(&self) -> EngineParams {
        let mut params = EngineParams::default()
            .with_max_iterations(self.max_iterations)
            .with_max_call_retries(self.max_call_retries)
            .with_default_call_timeout(Duration::from_secs(self.call_timeout_secs))
            .with_max_tokens(self.max_tokens)
            .with_default_confidence(self.default_confidence);
        params.temperature = self.temperature;
        if let Some(ceiling) = self.cost_ceiling_tokens {
            params = params.with_cost_ceiling(ceiling);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_domain::Skill;

    #[test]
    fn test_defaults_match_engine_params() {
        let config = FileConfig::default();
        let params = config.engine.params();
        assert_eq!(params.max_iterations, 2);
        assert_eq!(params.max_call_retries, 2);
        assert!(config.providers.models.is_empty());
        assert_eq!(config.providers.roster().len(), 3);
    }

    #[test]
    fn test_parse_full_config() {
        let raw = r#"
            [providers]
            endpoint = "http://10.0.0.5:8000/v1/chat/completions"
            api_key_env = "CONCLAVE_API_KEY"

            [[providers.models]]
            model = "local-llama-70b"
            capabilities = { code = 0.8, math = 0.7, reasoning = 0.75 }

            [[providers.models]]
            model = "claude-sonnet-4.5"
            capabilities = { code = 0.9, math = 0.85, reasoning = 0.9 }

            [engine]
            max_iterations = 3
            cost_ceiling_tokens = 50000
        "#;
        let config: FileConfig = toml::from_str(raw).unwrap();

        assert_eq!(config.providers.models.len(), 2);
        assert_eq!(
            config.providers.models[0].capability(Skill::Code),
            0.8
        );
        let params = config.engine.params();
        assert_eq!(params.max_iterations, 3);
        assert_eq!(params.cost_ceiling_tokens, Some(50_000));
        // Unspecified fields keep their defaults
        assert_eq!(params.max_call_retries, 2);

        let roster = config.providers.roster();
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_empty_config_parses() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert_eq!(config.engine.max_iterations, 2);
    }
}
