use crate::models::AnalysisOptions;

/// Separates the instructions from the text under analysis. The text always
/// follows the last occurrence of this marker.
pub const TEXT_MARKER: &str = "\nText to analyze:\n";

const INSTRUCTIONS: &str = r#"You are a proofreading assistant. Find grammar, spelling, style, clarity, punctuation, word choice and sentence structure problems in the text below.

Respond with JSON only, in exactly this shape:
{"issues": [{"type": "grammar|spelling|style|clarity|punctuation|word_choice|sentence_structure", "severity": "error|warning|suggestion", "startIndex": 0, "endIndex": 0, "originalText": "", "message": "", "suggestions": [""]}]}

startIndex and endIndex are character offsets into the text (end exclusive). Return {"issues": []} when the text has no problems."#;

/// Full prompt for one chunk. The chunk is appended verbatim after
/// [`TEXT_MARKER`].
#[must_use]
pub fn build_prompt(chunk: &str, options: &AnalysisOptions) -> String {
    let mut prompt = String::from(INSTRUCTIONS);

    if let Some(language) = options.language.as_deref().filter(|l| !l.is_empty()) {
        prompt.push_str(&format!("\n\nThe text is written in {language}."));
    }
    if let Some(context) = options.context.as_deref().filter(|c| !c.is_empty()) {
        prompt.push_str(&format!("\nWriting context: {context}."));
    }

    prompt.push('\n');
    prompt.push_str(TEXT_MARKER);
    prompt.push_str(chunk);
    prompt
}
