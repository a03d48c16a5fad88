//! Similarity functions used by text-based invalidation.
//!
//! Contract: identical inputs score 1.0; anything else is a heuristic in
//! `[0, 1]`.

/// Pluggable similarity over two text fingerprints.
pub type SimilarityFn = fn(&str, &str) -> f64;

/// Ratio of positions holding the same char, over the longer length.
///
/// Operates on fingerprints, so near-duplicate texts only match by chance.
/// Exact reuse always scores 1.0.
#[must_use]
pub fn positional_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 0.0;
    }
    let matches = a.chars().zip(b.chars()).filter(|(x, y)| x == y).count();
    matches as f64 / longest as f64
}

/// 1.0 for identical inputs, otherwise 0.0.
#[must_use]
pub fn exact_similarity(a: &str, b: &str) -> f64 {
    if a == b { 1.0 } else { 0.0 }
}
