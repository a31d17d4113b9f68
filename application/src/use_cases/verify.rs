//! Verifier: checks a consensus result against acceptance criteria
//!
//! A pure function of the query and the consensus; every check emits
//! zero or more issues and the report status derives from the worst
//! severity present. Iteration budgets are the refinement controller's
//! concern, not the Verifier's.

use conclave_domain::{
    ConsensusResult, ExpectedFormat, Issue, IssueKind, Query, TaskKind, VerificationReport,
};
use tracing::debug;

/// Fraction of a sub-question's content words that must appear in the
/// answer for it to count as addressed
const COMPLETENESS_FRACTION: f64 = 0.5;

/// Validates aggregated answers, producing a [`VerificationReport`]
pub struct Verifier;

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Verifier {
    pub fn new() -> Self {
        Self
    }

    /// Run every applicable check and derive the report
    pub fn verify(&self, query: &Query, consensus: &ConsensusResult) -> VerificationReport {
        let mut issues = Vec::new();
        let text = consensus.text.as_str();

        check_safety(text, &mut issues);
        check_completeness(query, text, &mut issues);
        check_consistency(text, &mut issues);
        check_format(query.expected_format, text, &mut issues);
        check_domain(query, text, &mut issues);

        let report = VerificationReport::from_issues(issues);
        debug!(
            status = %report.status,
            issues = report.issues.len(),
            "Verification complete"
        );
        report
    }
}

/// A refusal cannot be repaired by revision; it blocks the session.
fn check_safety(text: &str, issues: &mut Vec<Issue>) {
    let lower = text.to_lowercase();
    const REFUSAL_MARKERS: [&str; 3] = [
        "i can't help with",
        "i cannot help with",
        "i am unable to assist",
    ];
    if REFUSAL_MARKERS.iter().any(|marker| lower.contains(marker)) {
        issues.push(Issue::blocking(
            IssueKind::SafetyViolation,
            "the combined answer is a refusal",
        ));
    }
}

/// Every explicit sub-question must be addressed.
///
/// Only runs when the query asks more than one question; a single
/// question is addressed by the answer as a whole.
fn check_completeness(query: &Query, text: &str, issues: &mut Vec<Issue>) {
    let sub_questions = query.sub_questions();
    if sub_questions.len() < 2 {
        return;
    }

    let answer_lower = text.to_lowercase();
    for sub_question in &sub_questions {
        let content_words: Vec<String> = sub_question
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 3)
            .map(|w| w.to_lowercase())
            .collect();
        if content_words.is_empty() {
            continue;
        }

        let covered = content_words
            .iter()
            .filter(|w| answer_lower.contains(w.as_str()))
            .count();
        if (covered as f64) < COMPLETENESS_FRACTION * content_words.len() as f64 {
            issues.push(Issue::fixable(
                IssueKind::IncompleteAnswer,
                format!("sub-question not addressed: {}", sub_question),
            ));
        }
    }
}

/// Flag sentence pairs that assert X and "not X".
fn check_consistency(text: &str, issues: &mut Vec<Issue>) {
    let sentences: Vec<String> = text
        .split(['.', '!', '?', '\n'])
        .map(normalize_sentence)
        .filter(|s| !s.is_empty())
        .collect();

    for sentence in &sentences {
        if let Some(stripped) = strip_negation(sentence)
            && sentences.iter().any(|other| *other == stripped)
        {
            issues.push(Issue::fixable(
                IssueKind::InternalContradiction,
                format!("the answer both asserts and denies: \"{}\"", stripped),
            ));
            return; // one contradiction issue is enough to force revision
        }
    }
}

/// The answer must match any declared output format.
fn check_format(format: Option<ExpectedFormat>, text: &str, issues: &mut Vec<Issue>) {
    match format {
        Some(ExpectedFormat::CodeOnly) => {
            if !text.contains("```") {
                issues.push(Issue::fixable(
                    IssueKind::FormatMismatch,
                    "expected code output but found no code block",
                ));
            }
        }
        Some(ExpectedFormat::Json) => {
            if serde_json::from_str::<serde_json::Value>(text.trim()).is_err() {
                issues.push(Issue::fixable(
                    IssueKind::FormatMismatch,
                    "expected JSON output but the answer does not parse",
                ));
            }
        }
        _ => {}
    }
}

/// Domain-specific checks: numeric final answer for arithmetic, and
/// agreement with the authoritative tool result when one was injected.
fn check_domain(query: &Query, text: &str, issues: &mut Vec<Issue>) {
    let numbers = extract_numbers(text);

    if query.task == TaskKind::Arithmetic && numbers.is_empty() {
        issues.push(Issue::fixable(
            IssueKind::MissingNumericAnswer,
            "arithmetic task but the answer contains no number",
        ));
    }

    if let Some(authoritative) = &query.authoritative {
        let expected = authoritative.value.trim();
        let agrees = if is_numeric(expected) {
            let normalized = normalize_number(expected);
            // Integers compare by value so signs and separators can't
            // produce spurious mismatches; decimals compare as text
            match normalized.parse::<i128>() {
                Ok(value) => numbers.iter().any(|n| n.parse::<i128>() == Ok(value)),
                Err(_) => numbers.iter().any(|n| *n == normalized),
            }
        } else {
            text.to_lowercase().contains(&expected.to_lowercase())
        };

        // The tool result is authoritative: disagreement is always an issue
        if !agrees {
            issues.push(Issue::fixable(
                IssueKind::ToolMismatch,
                format!(
                    "answer disagrees with authoritative {} result {}",
                    authoritative.tool, authoritative.value
                ),
            ));
        }
    }
}

fn normalize_sentence(sentence: &str) -> String {
    sentence
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Remove a single "not" from a normalized sentence, if present
fn strip_negation(sentence: &str) -> Option<String> {
    let words: Vec<&str> = sentence.split(' ').collect();
    let position = words.iter().position(|w| *w == "not")?;
    let mut stripped = words.clone();
    stripped.remove(position);
    Some(stripped.join(" "))
}

fn is_numeric(value: &str) -> bool {
    let stripped = value.replace([',', '-', '.'], "");
    !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit())
}

fn normalize_number(value: &str) -> String {
    value.replace(',', "").trim_end_matches('.').to_string()
}

/// Signed number tokens in the text, comma-separators stripped.
///
/// A '-' directly followed by a digit starts a negative number, so the
/// calculator's negative results round-trip with their sign intact.
fn extract_numbers(text: &str) -> Vec<String> {
    let mut numbers = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        let negative = c == '-' && chars.peek().is_some_and(|d| d.is_ascii_digit());
        if !negative && !c.is_ascii_digit() {
            continue;
        }

        let mut current = String::new();
        current.push(if negative { '-' } else { c });
        while let Some(&d) = chars.peek() {
            if d.is_ascii_digit() || d == ',' || d == '.' {
                current.push(d);
                chars.next();
            } else {
                break;
            }
        }
        numbers.push(normalize_number(&current));
    }
    numbers
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_domain::{
        AuthoritativeResult, CandidateAnswer, ModelId, Role, Strategy, VerificationStatus,
    };

    fn consensus(text: &str) -> ConsensusResult {
        ConsensusResult::new(
            text,
            0.8,
            Strategy::SingleBest,
            vec![CandidateAnswer::new(ModelId::Gpt52, Role::Primary, text)],
        )
    }

    #[test]
    fn test_clean_answer_passes() {
        let query = Query::new("What is the capital of France?");
        let report = Verifier::new().verify(&query, &consensus("The capital of France is Paris."));
        assert!(report.status.is_pass());
    }

    #[test]
    fn test_tool_mismatch_is_fixable() {
        let query = Query::new("What is 12345*67890?")
            .with_task(TaskKind::Arithmetic)
            .with_authoritative(AuthoritativeResult::new("calculator", "838102050"));

        let report = Verifier::new().verify(&query, &consensus("12345*67890 = 838102051"));

        assert_eq!(report.status, VerificationStatus::NeedsRevision);
        assert!(
            report
                .issues
                .iter()
                .any(|i| i.kind == IssueKind::ToolMismatch)
        );
    }

    #[test]
    fn test_tool_agreement_passes() {
        let query = Query::new("What is 12345*67890?")
            .with_task(TaskKind::Arithmetic)
            .with_authoritative(AuthoritativeResult::new("calculator", "838102050"));

        let report =
            Verifier::new().verify(&query, &consensus("The product is 838,102,050 exactly."));

        assert!(report.status.is_pass());
    }

    #[test]
    fn test_arithmetic_without_number_needs_revision() {
        let query = Query::new("What is 2+2?").with_task(TaskKind::Arithmetic);
        let report = Verifier::new().verify(&query, &consensus("It is a small even sum."));

        assert_eq!(report.status, VerificationStatus::NeedsRevision);
        assert!(
            report
                .issues
                .iter()
                .any(|i| i.kind == IssueKind::MissingNumericAnswer)
        );
    }

    #[test]
    fn test_unaddressed_sub_question_flagged() {
        let query = Query::new("What is ownership in Rust? How does borrowing differ?");
        let report = Verifier::new().verify(
            &query,
            &consensus("Ownership means each value has a single owning binding in Rust."),
        );

        assert_eq!(report.status, VerificationStatus::NeedsRevision);
        assert!(
            report
                .issues
                .iter()
                .any(|i| i.kind == IssueKind::IncompleteAnswer)
        );
    }

    #[test]
    fn test_single_question_skips_completeness() {
        let query = Query::new("What is 12345*67890?").with_task(TaskKind::Arithmetic);
        let report = Verifier::new().verify(&query, &consensus("838102050"));
        assert!(report.status.is_pass());
    }

    #[test]
    fn test_contradiction_flagged() {
        let query = Query::new("Is the function thread safe?");
        let report = Verifier::new().verify(
            &query,
            &consensus("The function is thread safe. The function is not thread safe."),
        );

        assert_eq!(report.status, VerificationStatus::NeedsRevision);
        assert!(
            report
                .issues
                .iter()
                .any(|i| i.kind == IssueKind::InternalContradiction)
        );
    }

    #[test]
    fn test_json_format_enforced() {
        let query = Query::new("List the fields").with_expected_format(ExpectedFormat::Json);

        let bad = Verifier::new().verify(&query, &consensus("not json at all"));
        assert_eq!(bad.status, VerificationStatus::NeedsRevision);

        let good = Verifier::new().verify(&query, &consensus(r#"{"fields": ["a", "b"]}"#));
        assert!(good.status.is_pass());
    }

    #[test]
    fn test_refusal_is_blocking() {
        let query = Query::new("Do something");
        let report =
            Verifier::new().verify(&query, &consensus("I can't help with that request."));

        assert!(report.status.is_fail());
    }

    #[test]
    fn test_negative_authoritative_result_matches() {
        let query = Query::new("What is -(2+3)*4?")
            .with_task(TaskKind::Arithmetic)
            .with_authoritative(AuthoritativeResult::new("calculator", "-20"));

        let good = Verifier::new().verify(&query, &consensus("The result is -20."));
        assert!(good.status.is_pass());

        // Dropping the sign is a real disagreement
        let bad = Verifier::new().verify(&query, &consensus("The result is 20."));
        assert_eq!(bad.status, VerificationStatus::NeedsRevision);
        assert!(bad.issues.iter().any(|i| i.kind == IssueKind::ToolMismatch));
    }

    #[test]
    fn test_extract_numbers() {
        assert_eq!(
            extract_numbers("the product is 838,102,050 and 42."),
            vec!["838102050".to_string(), "42".to_string()]
        );
        assert_eq!(extract_numbers("it comes to -20 exactly"), vec!["-20".to_string()]);
        // A hyphen between words is not a sign
        assert_eq!(extract_numbers("a well-known sum: 7"), vec!["7".to_string()]);
        assert!(extract_numbers("no digits here").is_empty());
    }
}
