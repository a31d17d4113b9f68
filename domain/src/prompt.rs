//! Prompt templates for each role in an orchestration round

use crate::core::query::TaskKind;
use crate::verification::Issue;

/// Templates for rendering role-specific prompts
pub struct PromptTemplate;

impl PromptTemplate {
    /// System prompt for an answering model
    pub fn answer_system(task: TaskKind) -> &'static str {
        match task {
            TaskKind::Code => {
                r#"You are an expert software engineer. Produce correct, idiomatic code
that solves the stated problem. Keep prose to a minimum unless asked.
At the end of your response, state your confidence (0.0-1.0) in brackets
like [confidence: 0.85]."#
            }
            TaskKind::Arithmetic => {
                r#"You are a careful calculator. Work through the arithmetic step by
step and finish with the final numeric answer on its own line.
At the end of your response, state your confidence (0.0-1.0) in brackets
like [confidence: 0.85]."#
            }
            _ => {
                r#"You are a knowledgeable expert. Provide a clear, well-reasoned and
accurate answer to the question. Be concise but complete.
At the end of your response, state your confidence (0.0-1.0) in brackets
like [confidence: 0.85]."#
            }
        }
    }

    /// User prompt for an answering model, with optional retrieval context
    pub fn answer_prompt(question: &str, passages: &[String]) -> String {
        let mut prompt = String::new();

        if !passages.is_empty() {
            prompt.push_str("Relevant context:\n");
            for passage in passages {
                prompt.push_str("---\n");
                prompt.push_str(passage);
                prompt.push('\n');
            }
            prompt.push_str("---\n\n");
        }

        prompt.push_str(question);
        prompt
    }

    /// System prompt for a critic reviewing a generator's answer
    pub fn critic_system() -> &'static str {
        r#"You are a rigorous critic. Examine the answer for factual errors,
logical flaws, missed requirements, and unsupported claims. List each
concrete problem you find. If the answer is sound, say so explicitly."#
    }

    /// User prompt for a critic
    pub fn critique_prompt(question: &str, answer: &str) -> String {
        format!(
            r#"Original question:
{}

Answer under review:
{}

List the concrete problems with this answer, most serious first."#,
            question, answer
        )
    }

    /// System prompt for a panel member
    pub fn panelist_system() -> &'static str {
        r#"You are one expert on a panel. Cover ONLY your assigned aspect of the
question; other panelists cover the rest. Be thorough within your aspect
and do not stray outside it.
At the end of your response, state your confidence (0.0-1.0) in brackets
like [confidence: 0.85]."#
    }

    /// User prompt for a panel member
    pub fn panelist_prompt(question: &str, aspect: &str, passages: &[String]) -> String {
        format!(
            "{}\n\nYour assigned aspect: {}",
            Self::answer_prompt(question, passages),
            aspect
        )
    }

    /// User prompt for a revision round, embedding the prior answer and
    /// the specific issues to fix
    pub fn revision_prompt(question: &str, prior_answer: &str, issues: &[Issue]) -> String {
        let mut issue_list = String::new();
        for issue in issues {
            issue_list.push_str(&format!("- {}\n", issue.description));
        }

        format!(
            r#"Original question:
{}

Your previous answer:
{}

The following problems were found:
{}
Produce a corrected answer that fixes every listed problem. Answer the
original question in full; do not describe the fixes."#,
            question, prior_answer, issue_list
        )
    }

    /// Reviewer notes appended to a revision prompt when the prior
    /// round produced a critique
    pub fn critique_addendum(critique: &str) -> String {
        format!("\n\nA reviewer also noted:\n{}", critique)
    }
}
