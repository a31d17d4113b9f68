//! Query value object and task classification hints

use crate::core::model::Skill;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Declared kind of task a query represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    #[default]
    GeneralQa,
    Code,
    Arithmetic,
    Research,
    Comparison,
    Creative,
    Summarization,
}

impl TaskKind {
    /// Tasks whose output can be checked against an external artifact
    pub fn requires_verifiable_artifact(&self) -> bool {
        matches!(self, TaskKind::Code | TaskKind::Arithmetic)
    }

    /// Tasks that benefit from breadth of perspectives
    pub fn requires_breadth(&self) -> bool {
        matches!(self, TaskKind::Research | TaskKind::Comparison)
    }

    /// Tasks where exactly one candidate should win outright.
    ///
    /// Open-ended tasks produce complementary answers and fuse better.
    pub fn is_single_winner(&self) -> bool {
        matches!(
            self,
            TaskKind::GeneralQa | TaskKind::Code | TaskKind::Arithmetic
        )
    }

    /// The primary skill used for eligibility and capability weighting
    pub fn primary_skill(&self) -> Skill {
        match self {
            TaskKind::GeneralQa => Skill::Reasoning,
            TaskKind::Code => Skill::Code,
            TaskKind::Arithmetic => Skill::Math,
            TaskKind::Research => Skill::Research,
            TaskKind::Comparison => Skill::Research,
            TaskKind::Creative => Skill::Writing,
            TaskKind::Summarization => Skill::Writing,
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskKind::GeneralQa => "general_qa",
            TaskKind::Code => "code",
            TaskKind::Arithmetic => "arithmetic",
            TaskKind::Research => "research",
            TaskKind::Comparison => "comparison",
            TaskKind::Creative => "creative",
            TaskKind::Summarization => "summarization",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "general_qa" | "qa" => Ok(TaskKind::GeneralQa),
            "code" => Ok(TaskKind::Code),
            "arithmetic" | "math" => Ok(TaskKind::Arithmetic),
            "research" => Ok(TaskKind::Research),
            "comparison" => Ok(TaskKind::Comparison),
            "creative" => Ok(TaskKind::Creative),
            "summarization" | "summary" => Ok(TaskKind::Summarization),
            other => Err(format!("Unknown task kind: {}", other)),
        }
    }
}

/// The accuracy/quality dial declared on a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccuracyLevel {
    Minimal,
    #[default]
    Standard,
    Maximal,
}

impl std::str::FromStr for AccuracyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minimal" | "min" => Ok(AccuracyLevel::Minimal),
            "standard" => Ok(AccuracyLevel::Standard),
            "maximal" | "max" => Ok(AccuracyLevel::Maximal),
            other => Err(format!("Unknown accuracy level: {}", other)),
        }
    }
}

/// Output format the caller declared for the answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedFormat {
    PlainText,
    Markdown,
    CodeOnly,
    Json,
}

/// An authoritative value produced by the tool broker upstream.
///
/// When present, the Verifier treats this value as ground truth for
/// domain-specific checks; a disagreeing answer is always an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthoritativeResult {
    /// Tool that produced the value (e.g., "calculator")
    pub tool: String,
    /// The authoritative value as text
    pub value: String,
}

impl AuthoritativeResult {
    pub fn new(tool: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            value: value.into(),
        }
    }
}

/// Immutable input to one orchestration session (Value Object)
#[derive(Debug, Clone)]
pub struct Query {
    text: String,
    /// Declared task kind
    pub task: TaskKind,
    /// Accuracy/quality dial
    pub accuracy: AccuracyLevel,
    /// Whether latency beats exhaustiveness for this query
    pub prioritize_latency: bool,
    /// Absolute deadline for the whole session
    pub deadline: Option<Instant>,
    /// Declared output format, if any
    pub expected_format: Option<ExpectedFormat>,
    /// Authoritative tool result injected upstream, if any
    pub authoritative: Option<AuthoritativeResult>,
    /// Retrieval passages concatenated into prompts before dispatch
    pub context_passages: Vec<String>,
}

impl Query {
    /// Create a new query
    ///
    /// # Panics
    /// Panics if the text is empty or only whitespace
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        assert!(!text.trim().is_empty(), "Query cannot be empty");
        Self {
            text,
            task: TaskKind::default(),
            accuracy: AccuracyLevel::default(),
            prioritize_latency: false,
            deadline: None,
            expected_format: None,
            authoritative: None,
            context_passages: Vec::new(),
        }
    }

    /// Try to create a new query, returning None if the text is blank
    pub fn try_new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            None
        } else {
            Some(Self::new(text))
        }
    }

    pub fn with_task(mut self, task: TaskKind) -> Self {
        self.task = task;
        self
    }

    pub fn with_accuracy(mut self, accuracy: AccuracyLevel) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn prioritizing_latency(mut self) -> Self {
        self.prioritize_latency = true;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the deadline relative to now
    pub fn with_deadline_in(self, budget: Duration) -> Self {
        self.with_deadline(Instant::now() + budget)
    }

    pub fn with_expected_format(mut self, format: ExpectedFormat) -> Self {
        self.expected_format = Some(format);
        self
    }

    pub fn with_authoritative(mut self, result: AuthoritativeResult) -> Self {
        self.authoritative = Some(result);
        self
    }

    pub fn with_context_passages(mut self, passages: Vec<String>) -> Self {
        self.context_passages = passages;
        self
    }

    /// Get the query text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Time left until the deadline, if one is set.
    ///
    /// Returns `Some(Duration::ZERO)` once the deadline has passed.
    pub fn remaining_time(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Whether the deadline has already passed
    pub fn deadline_expired(&self) -> bool {
        self.remaining_time()
            .is_some_and(|remaining| remaining.is_zero())
    }

    /// Explicit sub-questions contained in the query text.
    ///
    /// A sub-question is a sentence terminated by '?'. Used by the
    /// Verifier's completeness check.
    pub fn sub_questions(&self) -> Vec<String> {
        self.text
            .split_inclusive('?')
            .filter(|s| s.ends_with('?'))
            .map(|s| s.trim_start_matches(['.', '!', ' ', '\n']).trim().to_string())
            .filter(|s| s.len() > 1)
            .collect()
    }
}
