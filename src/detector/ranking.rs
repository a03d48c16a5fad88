//! Suggestion ranking.
use std::collections::HashSet;

use crate::text::{char_len, words};

/// Share of the original span's words that also appear in `candidate`.
fn word_overlap(candidate: &str, original: &str) -> f64 {
    let original: HashSet<String> = words(original).collect();
    if original.is_empty() {
        return 0.0;
    }
    let candidate: HashSet<String> = words(candidate).collect();
    original.intersection(&candidate).count() as f64 / original.len() as f64
}

/// Starts with a letter or digit and has balanced parentheses and quotes.
fn looks_grammatical(candidate: &str) -> bool {
    let Some(first) = candidate.chars().next() else {
        return false;
    };
    if !first.is_alphanumeric() {
        return false;
    }

    let mut depth = 0i32;
    for c in candidate.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0 && candidate.matches('"').count() % 2 == 0
}

#[must_use]
pub fn score(candidate: &str, original: &str) -> f64 {
    let mut score = 0.0;
    if (char_len(candidate) as f64) < 1.5 * char_len(original) as f64 {
        score += 1.0;
    }
    score += 2.0 * word_overlap(candidate, original);
    if looks_grammatical(candidate) {
        score += 1.0;
    }
    score
}

/// Sort `candidates` by descending score; equal scores keep their order.
#[must_use]
pub fn rank_suggestions(candidates: Vec<String>, original: &str) -> Vec<String> {
    let mut scored: Vec<(f64, String)> = candidates
        .into_iter()
        .map(|c| (score(&c, original), c))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, c)| c).collect()
}
