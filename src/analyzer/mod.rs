//! Chunked, queued, rate-limited analysis of one text.
//!
//! The text is split into contiguous chunks, each chunk becomes one provider
//! request on the shared [`RequestQueue`], and the per-chunk issues are
//! rebased into whole-text offsets before being concatenated.
pub mod chunker;
pub mod prompt;
pub mod queue;
pub mod rate_limit;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::detector::IssueDetector;
use crate::models::{AnalysisMetadata, AnalysisOptions, AnalysisResult, Issue, IssueType, SummarySuggestion};
use crate::provider::{ProviderError, TextCompletionProvider};
use crate::text::char_len;
use chunker::{Chunk, split_into_chunks};
use queue::RequestQueue;
use rate_limit::RateLimiter;

/// Issues of one chunk, already in whole-text coordinates.
#[derive(Debug, Clone, Default)]
pub struct ChunkResult {
    pub position: usize,
    pub issues: Vec<Issue>,
    /// The provider answered but no JSON issue list could be read.
    pub parse_error: bool,
}

pub struct TextAnalyzer {
    queue: RequestQueue,
    detector: IssueDetector,
    max_chunk_size: AtomicUsize,
    clock: Arc<dyn Clock>,
}

impl TextAnalyzer {
    /// Spawns the queue worker; must be called inside a tokio runtime.
    pub fn new(provider: Arc<dyn TextCompletionProvider>, config: &Config, clock: Arc<dyn Clock>) -> Self {
        let limiter = RateLimiter::from_config(&config.rate_limit);
        Self {
            queue: RequestQueue::spawn(provider, limiter, Arc::clone(&clock)),
            detector: IssueDetector::new(),
            max_chunk_size: AtomicUsize::new(config.max_chunk_size.max(1)),
            clock,
        }
    }

    pub fn max_chunk_size(&self) -> usize {
        self.max_chunk_size.load(Ordering::Relaxed)
    }

    pub fn set_max_chunk_size(&self, size: usize) {
        self.max_chunk_size.store(size.max(1), Ordering::Relaxed);
    }

    pub fn set_rate_limit(&self, max_requests: u32, window: Duration) {
        self.queue.reconfigure(max_requests, window);
    }

    /// Requests waiting in or being served by the queue.
    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    pub fn reset(&self) {
        self.queue.reset_limiter();
    }

    pub fn shutdown(&self) {
        self.queue.shutdown();
    }

    /// Analyze `text` chunk by chunk.
    ///
    /// All chunks are queued up front so they run back to back. The first
    /// provider failure (in chunk order) is returned; later chunks are still
    /// processed by the queue but their results are discarded.
    pub async fn analyze_text(
        &self,
        text: &str,
        options: &AnalysisOptions,
    ) -> Result<AnalysisResult, ProviderError> {
        let started = Instant::now();
        let chunks = split_into_chunks(text, self.max_chunk_size());
        let chunk_count = chunks.len();
        debug!("analyzing {} chars in {chunk_count} chunk(s)", char_len(text));

        let tickets: Vec<_> = chunks
            .iter()
            .map(|chunk| {
                let prompt = prompt::build_prompt(&chunk.content, options);
                (chunk, self.queue.submit(prompt, chunk_label(chunk, chunk_count)))
            })
            .collect();

        let mut results = Vec::with_capacity(chunk_count);
        for (chunk, ticket) in tickets {
            let response = ticket.wait().await?;
            results.push(self.process_chunk(chunk, &response, text, chunk_count));
        }

        let issues = combine(results);
        let suggestions = summarize(&issues);
        let processing_time_ms = started.elapsed().as_millis() as u64;

        info!(
            "analysis finished: {} issue(s) in {chunk_count} chunk(s), {processing_time_ms}ms",
            issues.len()
        );

        Ok(AnalysisResult {
            issues,
            suggestions,
            metadata: AnalysisMetadata {
                text_length: char_len(text),
                chunk_count,
                from_cache: false,
                processing_time_ms,
                timestamp: self.clock.now_ms(),
            },
            original_text: text.to_string(),
        })
    }

    fn process_chunk(&self, chunk: &Chunk, response: &str, full_text: &str, total: usize) -> ChunkResult {
        let label = chunk_label(chunk, total);
        let outcome = self.detector.parse_response(response, &chunk.content, &label);
        let mut issues = outcome.issues;
        for issue in &mut issues {
            issue.rebase(chunk.offset, full_text);
        }
        ChunkResult {
            position: chunk.position,
            issues,
            parse_error: outcome.parse_error,
        }
    }
}

fn chunk_label(chunk: &Chunk, total: usize) -> String {
    format!("chunk {}/{total}", chunk.position + 1)
}

/// Concatenate chunk issues in chunk order. Parse errors end here.
fn combine(results: Vec<ChunkResult>) -> Vec<Issue> {
    let mut issues = Vec::new();
    for result in results {
        if result.parse_error {
            warn!(
                "chunk {}: provider response was not structured, {} issue(s) recovered",
                result.position + 1,
                result.issues.len()
            );
        }
        issues.extend(result.issues);
    }
    issues
}

/// One count-based advisory per issue type present.
pub fn summarize(issues: &[Issue]) -> Vec<SummarySuggestion> {
    let mut counts: BTreeMap<IssueType, usize> = BTreeMap::new();
    for issue in issues {
        *counts.entry(issue.issue_type).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|(issue_type, count)| SummarySuggestion {
            issue_type,
            count,
            message: format!(
                "Found {count} {} issue{}.",
                issue_type.label(),
                if count == 1 { "" } else { "s" }
            ),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::provider::mock::MockProvider;
    use crate::text::char_slice;

    fn analyzer(provider: Arc<MockProvider>, chunk_size: usize) -> TextAnalyzer {
        let config = Config {
            max_chunk_size: chunk_size,
            ..Config::default()
        };
        TextAnalyzer::new(provider, &config, TokioClock::new(0))
    }

    #[tokio::test]
    async fn test_single_chunk() {
        let provider = Arc::new(MockProvider::default());
        let analyzer = analyzer(Arc::clone(&provider), 1000);
        let result = analyzer
            .analyze_text("This are a test.", &AnalysisOptions::default())
            .await
            .unwrap();
        assert_eq!(result.metadata.chunk_count, 1);
        assert_eq!(result.issues.len(), 1);
        assert_eq!(result.issues[0].original_text, "are");
        assert_eq!(result.suggestions.len(), 1);
        assert_eq!(result.suggestions[0].message, "Found 1 grammar issue.");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebasing_across_chunks() {
        let provider = Arc::new(MockProvider::default().with_latency(Duration::from_millis(10)));
        let analyzer = analyzer(Arc::clone(&provider), 100);
        let sentence = "This are wrong and teh cat sat on the mat quietly today. ";
        let text = sentence.repeat(8);
        let len = char_len(&text);

        let result = analyzer
            .analyze_text(&text, &AnalysisOptions::default())
            .await
            .unwrap();

        assert!(result.metadata.chunk_count > 1);
        assert_eq!(provider.calls(), result.metadata.chunk_count);
        assert_eq!(provider.max_in_flight(), 1);
        assert_eq!(result.issues.len(), 16);
        for issue in &result.issues {
            assert!(issue.start_index < issue.end_index && issue.end_index <= len);
            assert_eq!(char_slice(&text, issue.start_index, issue.end_index), issue.original_text);
        }
        let spelling = result
            .suggestions
            .iter()
            .find(|s| s.issue_type == IssueType::Spelling)
            .unwrap();
        assert_eq!(spelling.count, 8);
    }

    #[tokio::test]
    async fn test_malformed_response_is_empty() {
        let provider = Arc::new(MockProvider::fixed("not json at all"));
        let analyzer = analyzer(provider, 1000);
        let result = analyzer
            .analyze_text("This are a test.", &AnalysisOptions::default())
            .await
            .unwrap();
        assert!(result.issues.is_empty());
        assert!(result.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let error = ProviderError::Status {
            code: 503,
            body: "unavailable".into(),
        };
        let provider = Arc::new(MockProvider::failing(error.clone()));
        let analyzer = analyzer(provider, 1000);
        let result = analyzer.analyze_text("text", &AnalysisOptions::default()).await;
        assert_eq!(result.unwrap_err(), error);
    }

    #[test]
    fn test_summarize_groups_by_type() {
        let text = "aa bb cc";
        let issues = vec![
            Issue::new(IssueType::Spelling, crate::models::Severity::Error, 0, 2, text, "a."),
            Issue::new(IssueType::Style, crate::models::Severity::Warning, 3, 5, text, "b."),
            Issue::new(IssueType::Spelling, crate::models::Severity::Error, 6, 8, text, "c."),
        ];
        let summary = summarize(&issues);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].issue_type, IssueType::Spelling);
        assert_eq!(summary[0].count, 2);
        assert_eq!(summary[0].message, "Found 2 spelling issues.");
        assert_eq!(summary[1].message, "Found 1 style issue.");
    }
}
