//! Aggregator: combines candidate answers into one consensus per round
//!
//! A pure function of its inputs: no I/O, no shared state. Each
//! strategy has its own combination semantics, matched exhaustively.

use crate::params::EngineParams;
use conclave_domain::{
    CandidateAnswer, ConsensusResult, DISAGREEMENT_CONFIDENCE_CAP, ExpectedFormat, ProviderRoster,
    Query, Role, Strategy, materially_disagrees,
};
use tracing::debug;

/// Scores considered tied in the best-of-n judge pass
const SCORE_EPSILON: f64 = 1e-9;

/// Combines successful candidates per strategy semantics
pub struct Aggregator<'a> {
    roster: &'a ProviderRoster,
    params: &'a EngineParams,
}

impl<'a> Aggregator<'a> {
    pub fn new(roster: &'a ProviderRoster, params: &'a EngineParams) -> Self {
        Self { roster, params }
    }

    /// Combine candidates into one consensus result.
    ///
    /// # Panics
    /// Panics when `candidates` is empty; the orchestrate loop turns
    /// zero successes into `AllProvidersFailed` before aggregation.
    pub fn aggregate(
        &self,
        query: &Query,
        strategy: Strategy,
        candidates: Vec<CandidateAnswer>,
        degraded: bool,
    ) -> ConsensusResult {
        assert!(!candidates.is_empty(), "aggregate requires candidates");

        let mut consensus = match strategy {
            Strategy::SingleBest | Strategy::ParallelRace => {
                self.pass_through(strategy, candidates)
            }
            Strategy::BestOfN => self.best_of_n(query, candidates),
            Strategy::QualityWeightedFusion => self.fuse(query, candidates),
            Strategy::ExpertPanel => self.panel_merge(candidates),
            Strategy::ChallengeAndRefine => self.latest_generation(candidates),
        };

        if degraded {
            debug!(strategy = %strategy, "Aggregating in degraded mode");
            consensus.confidence = consensus.confidence.min(DISAGREEMENT_CONFIDENCE_CAP);
            consensus = consensus.degraded();
        }
        consensus
    }

    /// Pass through the sole (or first-arrived) answering candidate
    fn pass_through(&self, strategy: Strategy, candidates: Vec<CandidateAnswer>) -> ConsensusResult {
        let index = candidates
            .iter()
            .position(|c| c.role.is_answering())
            .unwrap_or(0);
        let confidence = candidates[index].confidence_or(self.params.default_confidence);
        ConsensusResult::new(candidates[index].text.clone(), confidence, strategy, candidates)
    }

    /// Judge pass: a lightweight heuristic scorer picks exactly one
    /// candidate verbatim. Ties prefer the higher-capability model for
    /// the task, then the first successful in arrival order.
    fn best_of_n(&self, query: &Query, candidates: Vec<CandidateAnswer>) -> ConsensusResult {
        let skill = query.task.primary_skill();
        let answering: Vec<usize> = (0..candidates.len())
            .filter(|&i| candidates[i].role.is_answering())
            .collect();

        let mut best = answering[0];
        let mut best_score = self.judge_score(query, &candidates[best]);

        for &i in &answering[1..] {
            let score = self.judge_score(query, &candidates[i]);
            let capability = self.roster.capability(&candidates[i].model, skill);
            let best_capability = self.roster.capability(&candidates[best].model, skill);

            if score > best_score + SCORE_EPSILON
                || ((score - best_score).abs() <= SCORE_EPSILON
                    && capability > best_capability + SCORE_EPSILON)
            {
                best = i;
                best_score = score;
            }
        }

        let texts: Vec<&str> = answering.iter().map(|&i| candidates[i].text.as_str()).collect();
        let mut confidence = candidates[best].confidence_or(self.params.default_confidence);
        if materially_disagrees(&texts) {
            debug!("Candidates materially disagree, capping confidence");
            confidence = confidence.min(DISAGREEMENT_CONFIDENCE_CAP);
        }

        ConsensusResult::new(
            candidates[best].text.clone(),
            confidence,
            Strategy::BestOfN,
            candidates,
        )
    }

    /// Synthesize a new answer drawing from all candidates, weighted by
    /// each model's static capability score for the task.
    fn fuse(&self, query: &Query, candidates: Vec<CandidateAnswer>) -> ConsensusResult {
        let answering: Vec<usize> = (0..candidates.len())
            .filter(|&i| candidates[i].role.is_answering())
            .collect();

        if answering.len() == 1 {
            // Degraded fusion falls back to whatever succeeded
            let index = answering[0];
            let confidence = candidates[index].confidence_or(self.params.default_confidence);
            return ConsensusResult::new(
                candidates[index].text.clone(),
                confidence,
                Strategy::QualityWeightedFusion,
                candidates,
            );
        }

        let texts: Vec<&str> = answering.iter().map(|&i| candidates[i].text.as_str()).collect();

        // Identical inputs need no synthesis and carry no divergence
        // penalty: confidence is the plain average.
        if texts.windows(2).all(|pair| pair[0] == pair[1]) {
            let confidence = answering
                .iter()
                .map(|&i| candidates[i].confidence_or(self.params.default_confidence))
                .sum::<f64>()
                / answering.len() as f64;
            return ConsensusResult::new(
                texts[0].to_string(),
                confidence,
                Strategy::QualityWeightedFusion,
                candidates,
            );
        }

        let skill = query.task.primary_skill();
        let mut weighted: Vec<(usize, f64)> = answering
            .iter()
            .map(|&i| (i, self.roster.capability(&candidates[i].model, skill)))
            .collect();
        // Unrated contributors still count equally
        if weighted.iter().all(|(_, w)| *w <= 0.0) {
            for entry in weighted.iter_mut() {
                entry.1 = 1.0;
            }
        }
        weighted.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        // Merge paragraphs in capability order, dropping duplicates
        let mut seen: Vec<String> = Vec::new();
        let mut parts: Vec<&str> = Vec::new();
        for &(i, _) in &weighted {
            for paragraph in candidates[i].text.split("\n\n") {
                let normalized = normalize(paragraph);
                if normalized.is_empty() || seen.contains(&normalized) {
                    continue;
                }
                seen.push(normalized);
                parts.push(paragraph.trim());
            }
        }
        let text = parts.join("\n\n");

        let weight_sum: f64 = weighted.iter().map(|(_, w)| w).sum();
        let mut confidence = weighted
            .iter()
            .map(|&(i, w)| w * candidates[i].confidence_or(self.params.default_confidence))
            .sum::<f64>()
            / weight_sum;
        if materially_disagrees(&texts) {
            debug!("Fusion inputs materially disagree, capping confidence");
            confidence = confidence.min(DISAGREEMENT_CONFIDENCE_CAP);
        }

        ConsensusResult::new(text, confidence, Strategy::QualityWeightedFusion, candidates)
    }

    /// Merge panel answers by their assigned aspect rather than voting
    fn panel_merge(&self, candidates: Vec<CandidateAnswer>) -> ConsensusResult {
        let mut sections = Vec::new();
        let mut confidences = Vec::new();

        for candidate in candidates.iter().filter(|c| c.role.is_answering()) {
            match &candidate.role {
                Role::Panelist { aspect } => {
                    sections.push(format!("## {}\n\n{}", capitalize(aspect), candidate.text));
                }
                _ => sections.push(candidate.text.clone()),
            }
            confidences.push(candidate.confidence_or(self.params.default_confidence));
        }

        let confidence = confidences.iter().sum::<f64>() / confidences.len() as f64;
        ConsensusResult::new(
            sections.join("\n\n"),
            confidence,
            Strategy::ExpertPanel,
            candidates,
        )
    }

    /// The latest generator output; quality enforcement happens in the
    /// verify→refine loop, not here.
    fn latest_generation(&self, candidates: Vec<CandidateAnswer>) -> ConsensusResult {
        let index = candidates
            .iter()
            .rposition(|c| c.role == Role::Primary)
            .or_else(|| candidates.iter().rposition(|c| c.role.is_answering()))
            .unwrap_or(0);
        let confidence = candidates[index].confidence_or(self.params.default_confidence);
        ConsensusResult::new(
            candidates[index].text.clone(),
            confidence,
            Strategy::ChallengeAndRefine,
            candidates,
        )
    }

    /// Heuristic judge score: query-term coverage, declared-format
    /// compliance, and length sanity.
    fn judge_score(&self, query: &Query, candidate: &CandidateAnswer) -> f64 {
        0.6 * keyword_coverage(query.text(), &candidate.text)
            + 0.2 * format_score(query.expected_format, &candidate.text)
            + 0.2 * length_score(&candidate.text)
    }
}

fn normalize(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Fraction of the query's content words present in the answer
fn keyword_coverage(query_text: &str, answer: &str) -> f64 {
    let answer_lower = answer.to_lowercase();
    let content_words: Vec<String> = query_text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .map(|w| w.to_lowercase())
        .collect();

    if content_words.is_empty() {
        return 1.0;
    }

    let covered = content_words
        .iter()
        .filter(|w| answer_lower.contains(w.as_str()))
        .count();
    covered as f64 / content_words.len() as f64
}

fn format_score(format: Option<ExpectedFormat>, text: &str) -> f64 {
    match format {
        None | Some(ExpectedFormat::PlainText) => 1.0,
        Some(ExpectedFormat::CodeOnly) => {
            if text.contains("```") {
                1.0
            } else {
                0.0
            }
        }
        Some(ExpectedFormat::Json) => {
            if serde_json::from_str::<serde_json::Value>(text.trim()).is_ok() {
                1.0
            } else {
                0.0
            }
        }
        Some(ExpectedFormat::Markdown) => {
            if text.contains('#') || text.contains("- ") || text.contains("**") {
                1.0
            } else {
                0.8
            }
        }
    }
}

fn length_score(text: &str) -> f64 {
    let len = text.trim().len();
    if len == 0 {
        0.0
    } else if (20..=6000).contains(&len) {
        1.0
    } else {
        0.5
    }
}
