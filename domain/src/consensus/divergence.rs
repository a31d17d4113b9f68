//! Lexical divergence scoring between candidate answers
//!
//! Divergence of a pair is 1 minus the Jaccard similarity of the two
//! lowercase word sets; the aggregate score for a candidate set is the
//! maximum over all pairs. Cheap, deterministic, dependency-free.

use std::collections::BTreeSet;

/// Divergence above which candidates are considered to materially disagree
pub const DIVERGENCE_THRESHOLD: f64 = 0.6;

/// Confidence cap applied when candidates materially disagree
pub const DISAGREEMENT_CONFIDENCE_CAP: f64 = 0.7;

/// Lower bound of the "high confidence" band
pub const HIGH_CONFIDENCE_BOUNDARY: f64 = 0.75;

fn word_set(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// Divergence between two texts in [0.0, 1.0]
///
/// # Example
///
/// ```
/// use conclave_domain::pair_divergence;
///
/// assert_eq!(pair_divergence("the answer is 42", "the answer is 42"), 0.0);
/// assert!(pair_divergence("rust is fast", "go is simple") > 0.5);
/// ```
pub fn pair_divergence(a: &str, b: &str) -> f64 {
    let set_a = word_set(a);
    let set_b = word_set(b);

    if set_a.is_empty() && set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count() as f64;
    let union = set_a.union(&set_b).count() as f64;
    1.0 - intersection / union
}

/// Maximum pairwise divergence across a candidate set.
///
/// Zero or one text trivially agrees with itself.
pub fn max_pairwise_divergence<T: AsRef<str>>(texts: &[T]) -> f64 {
    let mut max = 0.0_f64;
    for i in 0..texts.len() {
        for j in (i + 1)..texts.len() {
            max = max.max(pair_divergence(texts[i].as_ref(), texts[j].as_ref()));
        }
    }
    max
}

/// Whether a candidate set materially disagrees
pub fn materially_disagrees<T: AsRef<str>>(texts: &[T]) -> bool {
    max_pairwise_divergence(texts) > DIVERGENCE_THRESHOLD
}
