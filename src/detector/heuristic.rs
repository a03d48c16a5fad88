//! Line-oriented fallback for freeform provider responses.
//!
//! Each non-empty line is a candidate issue. A line is kept only when it
//! quotes a span that exists in the source text, or when it names an issue
//! category and shares a content word with the source.
use std::sync::LazyLock;

use regex::Regex;

use super::classify::{SEVERITY_TABLE, match_severity, match_type};
use super::json::RawIssue;
use crate::models::Severity;
use crate::text::{char_len, char_offsets, find_chars, find_chars_ignore_case};

static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*•>]|\d+[.)])\s*").unwrap());

static QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""([^"\n]+)"|“([^”\n]+)”|(?:^|[^\w])'([^'\n]+)'(?:[^\w]|$)"#).unwrap()
});

static SUGGESTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(?:try|use|consider|replace (?:it |this )?with|change (?:it |this )?to|should be)\s+["“']?([^"”'.,;:!?\n]+)"#,
    )
    .unwrap()
});

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\w']+").unwrap());

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "this", "that", "are", "was", "were", "you", "your", "should",
    "could", "would", "use", "try", "consider", "instead", "here", "there", "which", "from", "have",
    "has", "not", "but", "can", "will", "its", "it's", "into", "than", "then", "also", "more",
];

fn quoted_spans(line: &str) -> Vec<String> {
    QUOTED
        .captures_iter(line)
        .filter_map(|caps| caps.get(1).or(caps.get(2)).or(caps.get(3)))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn names_an_issue(line: &str) -> bool {
    match_type(line).is_some() || matches!(match_severity_strict(line), Some(Severity::Error))
}

/// Severity keywords only from the error row; warning/suggestion words are
/// too common in ordinary prose to qualify a line on their own.
fn match_severity_strict(line: &str) -> Option<Severity> {
    let lower = line.to_lowercase();
    SEVERITY_TABLE
        .first()
        .filter(|(needles, _)| needles.iter().any(|n| lower.contains(n)))
        .map(|(_, s)| *s)
}

/// First content word of `line` that also occurs as a whole word in `source`.
fn overlapping_word(line: &str, source: &str) -> Option<(usize, usize)> {
    let matches: Vec<_> = WORD.find_iter(source).collect();
    let starts: Vec<usize> = matches.iter().map(|m| m.start()).collect();
    let source_words: Vec<(usize, String)> = char_offsets(source, &starts)
        .into_iter()
        .zip(&matches)
        .map(|(start, m)| (start, m.as_str().to_lowercase()))
        .collect();

    WORD.find_iter(line)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| char_len(w) >= 3 && !STOPWORDS.contains(&w.as_str()))
        .filter(|w| match_type(w).is_none() && match_severity(w).is_none())
        .find_map(|w| {
            source_words
                .iter()
                .find(|(_, sw)| *sw == w)
                .map(|(start, sw)| (*start, start + char_len(sw)))
        })
}

fn locate(span: &str, source: &str) -> Option<usize> {
    find_chars(source, span, 0).or_else(|| find_chars_ignore_case(source, span))
}

fn parse_line(line: &str, source: &str) -> Option<RawIssue> {
    let line = BULLET.replace(line, "");
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let quoted = quoted_spans(line);
    let located = quoted
        .iter()
        .enumerate()
        .find_map(|(i, q)| locate(q, source).map(|pos| (i, pos, char_len(q))));

    let (start, end, span_idx) = match located {
        Some((i, pos, len)) => (pos, pos + len, Some(i)),
        None if names_an_issue(line) => {
            let (s, e) = overlapping_word(line, source)?;
            (s, e, None)
        }
        None => return None,
    };

    let mut suggestions: Vec<String> = quoted
        .iter()
        .enumerate()
        .filter(|(i, _)| Some(*i) != span_idx)
        .map(|(_, q)| q.clone())
        .collect();
    for caps in SUGGESTION.captures_iter(line) {
        if let Some(m) = caps.get(1) {
            let candidate = m.as_str().trim();
            if !candidate.is_empty() && !suggestions.iter().any(|s| s == candidate) {
                suggestions.push(candidate.to_string());
            }
        }
    }

    Some(RawIssue {
        issue_type: match_type(line).map(|t| t.as_str().to_string()),
        severity: match_severity(line).map(|s| s.as_str().to_string()),
        start: Some(start),
        end: Some(end),
        message: Some(line.to_string()),
        suggestions,
        text: None,
    })
}

/// Raw issues recovered from a non-JSON response, in line order.
#[must_use]
pub fn parse_lines(response: &str, source: &str) -> Vec<RawIssue> {
    response
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| parse_line(l, source))
        .collect()
}
