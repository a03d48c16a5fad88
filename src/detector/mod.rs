//! Provider response → validated, deduplicated issues.
//!
//! Two parse paths: structured JSON (possibly wrapped in prose) and a
//! line-oriented heuristic fallback. Malformed output is never an error; it
//! yields an empty list with `parse_error` set.
pub mod classify;
pub mod heuristic;
pub mod json;
pub mod ranking;

use std::collections::HashSet;

use tracing::debug;
use uuid::Uuid;

use crate::models::{Issue, IssueType};
use crate::text::{char_len, char_slice, find_chars, find_chars_ignore_case};
use json::RawIssue;
pub use ranking::rank_suggestions;

pub const DEFAULT_MESSAGE: &str = "Issue detected.";

const BASE_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsePath {
    Structured,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutcome {
    pub issues: Vec<Issue>,
    /// No usable JSON issue list was found in the response.
    pub parse_error: bool,
    pub path: ParsePath,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IssueDetector;

impl IssueDetector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Issues found in `response` for `source`, in ascending start order.
    #[must_use]
    pub fn parse_issues(&self, response: &str, source: &str, context: &str) -> Vec<Issue> {
        self.parse_response(response, source, context).issues
    }

    #[must_use]
    pub fn parse_response(&self, response: &str, source: &str, context: &str) -> ParseOutcome {
        let (raws, path, parse_error) = match json::extract_issue_array(response) {
            Some(items) => (
                items.iter().map(RawIssue::from_value).collect::<Vec<_>>(),
                ParsePath::Structured,
                false,
            ),
            None => {
                debug!("{context}: no JSON issue list in response, using line heuristics");
                (
                    heuristic::parse_lines(response, source),
                    ParsePath::Heuristic,
                    true,
                )
            }
        };

        let total = raws.len();
        let mut issues: Vec<Issue> = raws
            .into_iter()
            .filter_map(|raw| normalize(raw, source))
            .collect();
        let normalized = issues.len();
        issues = dedupe(issues);
        issues.sort_by_key(|i| i.start_index);

        debug!(
            "{context}: {total} raw, {normalized} valid, {} unique issue(s)",
            issues.len()
        );

        ParseOutcome {
            issues,
            parse_error,
            path,
        }
    }
}

/// Resolve the span of a raw issue: explicit indices when given, else the
/// position of its echoed text. The flag reports whether indices were explicit.
fn resolve_span(raw: &RawIssue, source: &str) -> Option<(usize, usize, bool)> {
    if let Some(start) = raw.start {
        let end = raw
            .end
            .or_else(|| raw.text.as_deref().map(|t| start.saturating_add(char_len(t))))
            .unwrap_or(start.saturating_add(1));
        return Some((start, end, true));
    }

    let text = raw.text.as_deref()?;
    let pos = find_chars(source, text, 0).or_else(|| find_chars_ignore_case(source, text))?;
    Some((pos, pos + char_len(text), false))
}

/// Trim, capitalize, and terminate with punctuation.
#[must_use]
pub fn normalize_message(message: Option<&str>) -> String {
    let trimmed = message.map(str::trim).unwrap_or_default();
    let mut chars = trimmed.chars();
    let Some(first) = chars.next() else {
        return DEFAULT_MESSAGE.to_string();
    };

    let mut out: String = first.to_uppercase().chain(chars).collect();
    if !out.ends_with(['.', '!', '?']) {
        out.push('.');
    }
    out
}

#[must_use]
pub fn confidence(has_suggestions: bool, message: &str, explicit_indices: bool, span_len: usize) -> f64 {
    let mut score = BASE_CONFIDENCE;
    if has_suggestions {
        score += 0.2;
    }
    if char_len(message) > 20 {
        score += 0.1;
    }
    if explicit_indices {
        score += 0.1;
    }
    if span_len < 2 {
        score -= 0.2;
    }
    score.clamp(0.0, 1.0)
}

/// Validate and clamp one raw issue against `source`.
fn normalize(raw: RawIssue, source: &str) -> Option<Issue> {
    let len = char_len(source);
    if len == 0 {
        return None;
    }
    let Some((start, end, explicit)) = resolve_span(&raw, source) else {
        debug!("dropping issue without a locatable span: {:?}", raw.message);
        return None;
    };

    let start = start.min(len - 1);
    let end = end.clamp(start + 1, len);
    let original_text = char_slice(source, start, end).to_string();

    let mut suggestions: Vec<String> = Vec::new();
    for s in raw.suggestions {
        let s = s.trim().to_string();
        if !s.is_empty() && s != original_text && !suggestions.contains(&s) {
            suggestions.push(s);
        }
    }
    let suggestions = rank_suggestions(suggestions, &original_text);

    let message = normalize_message(raw.message.as_deref());
    let confidence = confidence(
        !suggestions.is_empty(),
        &message,
        explicit,
        char_len(&original_text),
    );

    Some(Issue {
        id: Uuid::new_v4().to_string(),
        issue_type: classify::classify_type(raw.issue_type.as_deref()),
        severity: classify::classify_severity(raw.severity.as_deref()),
        start_index: start,
        end_index: end,
        message,
        suggestions,
        confidence,
        original_text,
    })
}

/// Keep the first issue for each `(start, end, type)`.
#[must_use]
pub fn dedupe(issues: Vec<Issue>) -> Vec<Issue> {
    let mut seen: HashSet<(usize, usize, IssueType)> = HashSet::new();
    issues
        .into_iter()
        .filter(|i| seen.insert((i.start_index, i.end_index, i.issue_type)))
        .collect()
}
