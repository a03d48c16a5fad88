use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::clock::Millis;
use crate::text::char_slice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    Grammar,
    Spelling,
    Style,
    Clarity,
    Punctuation,
    WordChoice,
    SentenceStructure,
}

impl IssueType {
    pub const ALL: [IssueType; 7] = [
        IssueType::Grammar,
        IssueType::Spelling,
        IssueType::Style,
        IssueType::Clarity,
        IssueType::Punctuation,
        IssueType::WordChoice,
        IssueType::SentenceStructure,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Grammar => "grammar",
            IssueType::Spelling => "spelling",
            IssueType::Style => "style",
            IssueType::Clarity => "clarity",
            IssueType::Punctuation => "punctuation",
            IssueType::WordChoice => "word_choice",
            IssueType::SentenceStructure => "sentence_structure",
        }
    }

    /// Human label used in summary advisories.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            IssueType::Grammar => "grammar",
            IssueType::Spelling => "spelling",
            IssueType::Style => "style",
            IssueType::Clarity => "clarity",
            IssueType::Punctuation => "punctuation",
            IssueType::WordChoice => "word choice",
            IssueType::SentenceStructure => "sentence structure",
        }
    }
}

/// Ordered so that `Error > Warning > Suggestion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Suggestion,
    Warning,
    Error,
}

impl Severity {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Suggestion => "suggestion",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// One detected problem in a span of the analyzed text.
///
/// `start_index`/`end_index` are half-open char offsets; `original_text` is
/// always the real substring at that range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: Severity,
    pub start_index: usize,
    pub end_index: usize,
    pub message: String,
    #[serde(default)]
    pub suggestions: Vec<String>,
    pub confidence: f64,
    pub original_text: String,
}

impl Issue {
    /// Build an issue over `[start, end)` of `source`, assigning a fresh id.
    #[must_use]
    pub fn new(
        issue_type: IssueType,
        severity: Severity,
        start: usize,
        end: usize,
        source: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            issue_type,
            severity,
            start_index: start,
            end_index: end,
            message: message.into(),
            suggestions: Vec::new(),
            confidence: 0.5,
            original_text: char_slice(source, start, end).to_string(),
        }
    }

    #[must_use]
    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end_index <= self.start_index
    }

    /// Shift into whole-document coordinates and re-derive `original_text`
    /// from `full_text`.
    pub fn rebase(&mut self, base: usize, full_text: &str) {
        self.start_index += base;
        self.end_index += base;
        self.original_text = char_slice(full_text, self.start_index, self.end_index).to_string();
    }
}

/// Type-level advisory derived from a set of issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarySuggestion {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub count: usize,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisMetadata {
    pub text_length: usize,
    pub chunk_count: usize,
    pub from_cache: bool,
    pub processing_time_ms: u64,
    pub timestamp: Millis,
}

/// Output of one analysis call. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub issues: Vec<Issue>,
    pub suggestions: Vec<SummarySuggestion>,
    pub metadata: AnalysisMetadata,
    pub original_text: String,
}

impl AnalysisResult {
    #[must_use]
    pub fn empty(text: &str, timestamp: Millis) -> Self {
        Self {
            issues: Vec::new(),
            suggestions: Vec::new(),
            metadata: AnalysisMetadata {
                text_length: crate::text::char_len(text),
                chunk_count: 0,
                from_cache: false,
                processing_time_ms: 0,
                timestamp,
            },
            original_text: text.to_string(),
        }
    }

    /// Highest severity present, for status aggregation.
    #[must_use]
    pub fn max_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity).max()
    }

    #[must_use]
    pub fn severity_counts(&self) -> BTreeMap<Severity, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.severity).or_insert(0) += 1;
        }
        counts
    }
}

/// Caller-supplied analysis options. Only feeds the cache key and the prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Free-form hint about the field (e.g. "email reply").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl AnalysisOptions {
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
