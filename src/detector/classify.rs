//! Free-form type/severity strings onto the closed enums.
//!
//! Tables are checked top to bottom and the first row with a matching
//! substring wins, so more specific categories sit above broader ones.
use crate::models::{IssueType, Severity};

pub const TYPE_TABLE: &[(&[&str], IssueType)] = &[
    (
        &["word_choice", "word choice", "word-choice", "vocabulary", "diction"],
        IssueType::WordChoice,
    ),
    (
        &["sentence_structure", "sentence structure", "run-on", "fragment", "structure"],
        IssueType::SentenceStructure,
    ),
    (
        &["punctuation", "comma", "apostrophe", "semicolon", "hyphen"],
        IssueType::Punctuation,
    ),
    (&["spelling", "misspel", "typo", "spelled"], IssueType::Spelling),
    (
        &["grammar", "grammatical", "agreement", "tense", "article", "plural"],
        IssueType::Grammar,
    ),
    (
        &["clarity", "unclear", "ambiguous", "confusing", "wordy", "concise"],
        IssueType::Clarity,
    ),
    (
        &["style", "tone", "passive", "formal", "repetit", "redundan"],
        IssueType::Style,
    ),
];

pub const SEVERITY_TABLE: &[(&[&str], Severity)] = &[
    (&["error", "critical", "incorrect", "wrong", "high", "major"], Severity::Error),
    (&["warning", "warn", "medium", "moderate"], Severity::Warning),
    (
        &["suggestion", "suggest", "info", "hint", "low", "minor", "optional", "consider"],
        Severity::Suggestion,
    ),
];

pub const DEFAULT_TYPE: IssueType = IssueType::Style;
pub const DEFAULT_SEVERITY: Severity = Severity::Warning;

fn lookup<T: Copy>(table: &[(&[&str], T)], text: &str) -> Option<T> {
    let lower = text.to_lowercase();
    table
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| lower.contains(n)))
        .map(|(_, value)| *value)
}

/// Type named in `text`, if any row matches.
#[must_use]
pub fn match_type(text: &str) -> Option<IssueType> {
    lookup(TYPE_TABLE, text)
}

/// Severity named in `text`, if any row matches.
#[must_use]
pub fn match_severity(text: &str) -> Option<Severity> {
    lookup(SEVERITY_TABLE, text)
}

#[must_use]
pub fn classify_type(raw: Option<&str>) -> IssueType {
    raw.and_then(|s| {
        let lower = s.trim().to_lowercase();
        IssueType::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .or_else(|| match_type(&lower))
    })
    .unwrap_or(DEFAULT_TYPE)
}

#[must_use]
pub fn classify_severity(raw: Option<&str>) -> Severity {
    raw.and_then(match_severity).unwrap_or(DEFAULT_SEVERITY)
}
