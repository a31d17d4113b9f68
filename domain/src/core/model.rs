//! Model identifiers, capability profiles, and the provider roster

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// Minimum capability score for a model to count as eligible for a skill
pub const MIN_ELIGIBLE_CAPABILITY: f64 = 0.2;

/// Available LLM models (Value Object)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModelId {
    // Claude models
    ClaudeOpus45,
    ClaudeSonnet45,
    ClaudeHaiku45,
    // GPT models
    Gpt52,
    Gpt5Mini,
    // Gemini models
    Gemini3Pro,
    // Custom
    Custom(String),
}

impl ModelId {
    /// Get the string identifier for this model
    pub fn as_str(&self) -> &str {
        match self {
            ModelId::ClaudeOpus45 => "claude-opus-4.5",
            ModelId::ClaudeSonnet45 => "claude-sonnet-4.5",
            ModelId::ClaudeHaiku45 => "claude-haiku-4.5",
            ModelId::Gpt52 => "gpt-5.2",
            ModelId::Gpt5Mini => "gpt-5-mini",
            ModelId::Gemini3Pro => "gemini-3-pro-preview",
            ModelId::Custom(s) => s,
        }
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ModelId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "claude-opus-4.5" => ModelId::ClaudeOpus45,
            "claude-sonnet-4.5" => ModelId::ClaudeSonnet45,
            "claude-haiku-4.5" => ModelId::ClaudeHaiku45,
            "gpt-5.2" => ModelId::Gpt52,
            "gpt-5-mini" => ModelId::Gpt5Mini,
            "gemini-3-pro-preview" => ModelId::Gemini3Pro,
            other => ModelId::Custom(other.to_string()),
        })
    }
}

impl Serialize for ModelId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ModelId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(s.parse().unwrap())
    }
}

/// Skills a model can be rated on (Value Object)
///
/// A query's task kind maps to exactly one primary skill; eligibility
/// and capability weighting are evaluated against that skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Skill {
    Reasoning,
    Code,
    Math,
    Research,
    Writing,
}

impl std::fmt::Display for Skill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Skill::Reasoning => "reasoning",
            Skill::Code => "code",
            Skill::Math => "math",
            Skill::Research => "research",
            Skill::Writing => "writing",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Skill {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reasoning" => Ok(Skill::Reasoning),
            "code" => Ok(Skill::Code),
            "math" => Ok(Skill::Math),
            "research" => Ok(Skill::Research),
            "writing" => Ok(Skill::Writing),
            other => Err(format!(
                "Unknown skill: {}. Valid: reasoning, code, math, research, writing",
                other
            )),
        }
    }
}

/// Static capability profile for one model
///
/// Profiles are constructed once (from configuration) and passed into
/// the selector and dispatcher; there is no process-wide registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelProfile {
    /// The model this profile describes
    pub model: ModelId,
    /// Capability score per skill, each in [0.0, 1.0]
    #[serde(default)]
    pub capabilities: BTreeMap<Skill, f64>,
}

impl ModelProfile {
    /// Create a profile with no rated skills
    pub fn new(model: ModelId) -> Self {
        Self {
            model,
            capabilities: BTreeMap::new(),
        }
    }

    /// Rate this model for a skill (clamped to [0.0, 1.0])
    pub fn with_capability(mut self, skill: Skill, score: f64) -> Self {
        self.capabilities.insert(skill, score.clamp(0.0, 1.0));
        self
    }

    /// Rate this model uniformly across all skills
    pub fn with_uniform_capability(mut self, score: f64) -> Self {
        for skill in [
            Skill::Reasoning,
            Skill::Code,
            Skill::Math,
            Skill::Research,
            Skill::Writing,
        ] {
            self.capabilities.insert(skill, score.clamp(0.0, 1.0));
        }
        self
    }

    /// Capability score for a skill (0.0 when unrated)
    pub fn capability(&self, skill: Skill) -> f64 {
        self.capabilities.get(&skill).copied().unwrap_or(0.0)
    }

    /// Whether this model is eligible to handle the given skill
    pub fn is_eligible(&self, skill: Skill) -> bool {
        self.capability(skill) >= MIN_ELIGIBLE_CAPABILITY
    }
}

/// Immutable set of provider profiles available to one session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderRoster {
    profiles: Vec<ModelProfile>,
}

impl ProviderRoster {
    /// Build a roster from profiles; later duplicates of a model are dropped
    pub fn new(profiles: Vec<ModelProfile>) -> Self {
        let mut seen = Vec::new();
        let mut deduped = Vec::new();
        for profile in profiles {
            if !seen.contains(&profile.model) {
                seen.push(profile.model.clone());
                deduped.push(profile);
            }
        }
        Self { profiles: deduped }
    }

    /// Default roster used when no configuration is supplied
    pub fn default_roster() -> Self {
        Self::new(vec![
            ModelProfile::new(ModelId::ClaudeSonnet45)
                .with_capability(Skill::Reasoning, 0.9)
                .with_capability(Skill::Code, 0.9)
                .with_capability(Skill::Math, 0.8)
                .with_capability(Skill::Research, 0.85)
                .with_capability(Skill::Writing, 0.9),
            ModelProfile::new(ModelId::Gpt52)
                .with_capability(Skill::Reasoning, 0.9)
                .with_capability(Skill::Code, 0.85)
                .with_capability(Skill::Math, 0.85)
                .with_capability(Skill::Research, 0.8)
                .with_capability(Skill::Writing, 0.85),
            ModelProfile::new(ModelId::Gemini3Pro)
                .with_capability(Skill::Reasoning, 0.85)
                .with_capability(Skill::Code, 0.8)
                .with_capability(Skill::Math, 0.8)
                .with_capability(Skill::Research, 0.9)
                .with_capability(Skill::Writing, 0.8),
        ])
    }

    /// Number of models in the roster
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the roster is empty
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// All profiles, in configuration order
    pub fn profiles(&self) -> &[ModelProfile] {
        &self.profiles
    }

    /// Look up the profile for a model
    pub fn get(&self, model: &ModelId) -> Option<&ModelProfile> {
        self.profiles.iter().find(|p| &p.model == model)
    }

    /// Capability score of a model for a skill (0.0 when unknown)
    pub fn capability(&self, model: &ModelId, skill: Skill) -> f64 {
        self.get(model).map(|p| p.capability(skill)).unwrap_or(0.0)
    }

    /// Profiles eligible for a skill, ranked by descending capability.
    ///
    /// Ties keep configuration order, so ranking is deterministic.
    pub fn ranked(&self, skill: Skill) -> Vec<&ModelProfile> {
        let mut eligible: Vec<&ModelProfile> =
            self.profiles.iter().filter(|p| p.is_eligible(skill)).collect();
        eligible.sort_by(|a, b| {
            b.capability(skill)
                .partial_cmp(&a.capability(skill))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        eligible
    }
}
