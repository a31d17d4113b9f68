//! Verification reports produced by the quality gate

use serde::{Deserialize, Serialize};

/// Overall verdict on a consensus result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pass,
    NeedsRevision,
    Fail,
}

impl VerificationStatus {
    pub fn is_pass(&self) -> bool {
        matches!(self, VerificationStatus::Pass)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self, VerificationStatus::Fail)
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationStatus::Pass => write!(f, "PASS"),
            VerificationStatus::NeedsRevision => write!(f, "NEEDS_REVISION"),
            VerificationStatus::Fail => write!(f, "FAIL"),
        }
    }
}

/// How serious an issue is
///
/// Fixable issues trigger a revision round; a single blocking issue
/// fails the session outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Advisory,
    Fixable,
    Blocking,
}

/// What kind of defect an issue describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// An explicit sub-question was not addressed
    IncompleteAnswer,
    /// The answer contradicts itself
    InternalContradiction,
    /// The answer does not match the declared output format
    FormatMismatch,
    /// An arithmetic task has no numeric final answer
    MissingNumericAnswer,
    /// The answer disagrees with the authoritative tool result
    ToolMismatch,
    /// The answer violates safety constraints
    SafetyViolation,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IssueKind::IncompleteAnswer => "incomplete_answer",
            IssueKind::InternalContradiction => "internal_contradiction",
            IssueKind::FormatMismatch => "format_mismatch",
            IssueKind::MissingNumericAnswer => "missing_numeric_answer",
            IssueKind::ToolMismatch => "tool_mismatch",
            IssueKind::SafetyViolation => "safety_violation",
        };
        write!(f, "{}", s)
    }
}

/// One flagged problem with a consensus result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: IssueSeverity,
    pub description: String,
}

impl Issue {
    pub fn advisory(kind: IssueKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            severity: IssueSeverity::Advisory,
            description: description.into(),
        }
    }

    pub fn fixable(kind: IssueKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            severity: IssueSeverity::Fixable,
            description: description.into(),
        }
    }

    pub fn blocking(kind: IssueKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            severity: IssueSeverity::Blocking,
            description: description.into(),
        }
    }
}

/// The Verifier's structured verdict for one round
///
/// Status derives purely from issue severities; iteration budgets are
/// the refinement controller's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub status: VerificationStatus,
    pub issues: Vec<Issue>,
    /// Verifier confidence in [0.0, 1.0]
    pub confidence: f64,
}

impl VerificationReport {
    /// Derive a report from a list of issues.
    ///
    /// Any blocking issue → FAIL; any fixable issue → NEEDS_REVISION;
    /// otherwise (advisory-only or clean) → PASS.
    ///
    /// # Example
    ///
    /// ```
    /// use conclave_domain::{Issue, IssueKind, VerificationReport, VerificationStatus};
    ///
    /// let report = VerificationReport::from_issues(vec![
    ///     Issue::fixable(IssueKind::IncompleteAnswer, "second question unaddressed"),
    /// ]);
    /// assert_eq!(report.status, VerificationStatus::NeedsRevision);
    /// ```
    pub fn from_issues(issues: Vec<Issue>) -> Self {
        let blocking = issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Blocking)
            .count();
        let fixable = issues
            .iter()
            .filter(|i| i.severity == IssueSeverity::Fixable)
            .count();
        let advisory = issues.len() - blocking - fixable;

        let status = if blocking > 0 {
            VerificationStatus::Fail
        } else if fixable > 0 {
            VerificationStatus::NeedsRevision
        } else {
            VerificationStatus::Pass
        };

        let confidence = if blocking > 0 {
            0.0
        } else {
            (1.0 - 0.25 * fixable as f64 - 0.1 * advisory as f64).clamp(0.0, 1.0)
        };

        Self {
            status,
            issues,
            confidence,
        }
    }

    /// A clean passing report
    pub fn pass() -> Self {
        Self::from_issues(Vec::new())
    }

    /// Issues that still demand action (fixable or blocking)
    pub fn outstanding(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity >= IssueSeverity::Fixable)
            .count()
    }

    /// Render the issues as a feedback block for a revision prompt
    pub fn feedback(&self) -> String {
        self.issues
            .iter()
            .map(|i| format!("- [{}] {}", i.kind, i.description))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
