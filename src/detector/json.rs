//! Structured response path: locate JSON inside arbitrary provider prose.
use serde_json::Value;

/// End (exclusive byte index) of the balanced `open`..`close` group starting
/// at `start`, skipping brackets inside JSON strings.
fn balanced_end(s: &str, start: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in s.as_bytes()[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        if b == b'"' {
            in_string = true;
        } else if b == open {
            depth += 1;
        } else if b == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(start + i + 1);
            }
        }
    }
    None
}

/// First balanced group delimited by `open`/`close` that parses as JSON.
fn first_balanced(s: &str, open: u8, close: u8) -> Option<Value> {
    s.bytes()
        .enumerate()
        .filter(|&(_, b)| b == open)
        .find_map(|(start, _)| {
            let end = balanced_end(s, start, open, close)?;
            serde_json::from_str::<Value>(&s[start..end]).ok()
        })
}

/// First balanced JSON object embedded in `response`.
#[must_use]
pub fn extract_json_object(response: &str) -> Option<Value> {
    first_balanced(response, b'{', b'}').filter(Value::is_object)
}

/// The raw issue array from a response: `{"issues": [...]}` wrapped in any
/// prose, or a bare top-level array.
#[must_use]
pub fn extract_issue_array(response: &str) -> Option<Vec<Value>> {
    if let Some(Value::Array(items)) =
        extract_json_object(response).and_then(|mut obj| obj.get_mut("issues").map(Value::take))
    {
        return Some(items);
    }
    match first_balanced(response, b'[', b']') {
        Some(Value::Array(items)) if items.iter().all(Value::is_object) && !items.is_empty() => {
            Some(items)
        }
        _ => None,
    }
}

/// Provider issue with every field optional; field names vary by model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawIssue {
    pub issue_type: Option<String>,
    pub severity: Option<String>,
    pub start: Option<usize>,
    pub end: Option<usize>,
    pub message: Option<String>,
    pub suggestions: Vec<String>,
    pub text: Option<String>,
}

fn first_str(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_index(obj: &Value, keys: &[&str]) -> Option<usize> {
    keys.iter().find_map(|k| match obj.get(*k)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn suggestion_list(obj: &Value) -> Vec<String> {
    let mut out = Vec::new();
    let mut push = |v: &Value| {
        let text = match v {
            Value::String(s) => Some(s.as_str()),
            Value::Object(_) => ["text", "replacement", "value"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str)),
            _ => None,
        };
        if let Some(t) = text {
            out.push(t.to_string());
        }
    };

    for key in ["suggestions", "replacements"] {
        if let Some(Value::Array(items)) = obj.get(key) {
            items.iter().for_each(&mut push);
        }
    }
    for key in ["suggestion", "replacement", "correction"] {
        if let Some(v) = obj.get(key) {
            push(v);
        }
    }
    out
}

impl RawIssue {
    #[must_use]
    pub fn from_value(obj: &Value) -> Self {
        let start = first_index(obj, &["startIndex", "start", "start_index", "offset"]);
        let end = first_index(obj, &["endIndex", "end", "end_index"]).or_else(|| {
            let length = first_index(obj, &["length", "len"])?;
            start.map(|s| s.saturating_add(length))
        });

        Self {
            issue_type: first_str(obj, &["type", "category", "issueType", "issue_type"]),
            severity: first_str(obj, &["severity", "level", "priority"]),
            start,
            end,
            message: first_str(obj, &["message", "description", "explanation", "reason"]),
            suggestions: suggestion_list(obj),
            text: first_str(obj, &["originalText", "original_text", "original", "text"]),
        }
    }
}
