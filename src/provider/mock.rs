/// Mock provider for tests and offline runs.
///
/// By default it answers with a deterministic JSON issue list produced from a
/// handful of surface patterns, so the whole pipeline can run without a model.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;

use super::{ProviderError, TextCompletionProvider};
use crate::analyzer::prompt::TEXT_MARKER;
use crate::text::char_len;

type Responder = dyn Fn(&str) -> Result<String, ProviderError> + Send + Sync;

pub struct MockProvider {
    responder: Arc<Responder>,
    latency: Option<Duration>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockProvider {
    fn with_responder(responder: Arc<Responder>) -> Self {
        Self {
            responder,
            latency: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always answer with `response`.
    #[must_use]
    pub fn fixed(response: impl Into<String>) -> Self {
        let response = response.into();
        Self::with_responder(Arc::new(move |_| Ok(response.clone())))
    }

    /// Always fail with `error`.
    #[must_use]
    pub fn failing(error: ProviderError) -> Self {
        Self::with_responder(Arc::new(move |_| Err(error.clone())))
    }

    /// Answer with a closure over the text being analyzed (not the full prompt).
    #[must_use]
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        Self::with_responder(Arc::new(move |prompt| f(analyzed_text(prompt))))
    }

    /// Delay every completion, to exercise queueing.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping `complete` calls observed.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::from_fn(|text| Ok(pattern_response(text)))
    }
}

#[async_trait]
impl TextCompletionProvider for MockProvider {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let result = (self.responder)(prompt);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// The text after the prompt's trailing marker, or the whole prompt.
fn analyzed_text(prompt: &str) -> &str {
    prompt
        .rsplit_once(TEXT_MARKER)
        .map(|(_, text)| text)
        .unwrap_or(prompt)
}

static THIS_ARE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(?:This|this|It|it) (are)\b").unwrap());
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());
static TEH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(teh|recieve|definately)\b").unwrap());

/// Deterministic canned analysis: agreement, doubled words, common misspellings.
#[must_use]
pub fn pattern_response(text: &str) -> String {
    let char_at = |byte: usize| char_len(&text[..byte]);
    let mut issues = Vec::new();

    for caps in THIS_ARE.captures_iter(text) {
        if let Some(m) = caps.get(1) {
            issues.push(json!({
                "type": "grammar",
                "severity": "error",
                "startIndex": char_at(m.start()),
                "endIndex": char_at(m.end()),
                "originalText": m.as_str(),
                "message": "Subject and verb do not agree",
                "suggestions": ["is"],
            }));
        }
    }

    let words: Vec<_> = WORD.find_iter(text).collect();
    for pair in words.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if &text[a.end()..b.start()] == " " && a.as_str().eq_ignore_ascii_case(b.as_str()) {
            issues.push(json!({
                "type": "style",
                "severity": "warning",
                "startIndex": char_at(a.start()),
                "endIndex": char_at(b.end()),
                "message": "Repeated word",
                "suggestions": [a.as_str()],
            }));
        }
    }

    for m in TEH.find_iter(text) {
        let fixed = match m.as_str() {
            "teh" => "the",
            "recieve" => "receive",
            _ => "definitely",
        };
        issues.push(json!({
            "type": "spelling",
            "severity": "error",
            "startIndex": char_at(m.start()),
            "endIndex": char_at(m.end()),
            "message": format!("Possible misspelling of \"{fixed}\""),
            "suggestions": [fixed],
        }));
    }

    json!({ "issues": issues }).to_string()
}
