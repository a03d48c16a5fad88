//! Char-indexed string helpers.
//!
//! Every offset in proofmark (issue spans, chunk bases, DOM mapping) counts
//! Unicode scalar values, never UTF-8 bytes.

/// Number of chars in `s`.
#[must_use]
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte index of the `char_idx`-th char, or `s.len()` when past the end.
#[must_use]
pub fn byte_offset(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(b, _)| b)
        .unwrap_or(s.len())
}

/// Substring over the half-open char range `[start, end)`, clamped to `s`.
#[must_use]
pub fn char_slice(s: &str, start: usize, end: usize) -> &str {
    if start >= end {
        return "";
    }
    let from = byte_offset(s, start);
    let to = byte_offset(s, end);
    &s[from..to.max(from)]
}

/// Char index of the first occurrence of `needle` at or after char `from`.
#[must_use]
pub fn find_chars(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    let start = byte_offset(haystack, from);
    haystack[start..]
        .find(needle)
        .map(|b| from + char_len(&haystack[start..start + b]))
}

/// Case-insensitive variant of [`find_chars`]; compares char-by-char so
/// offsets stay valid for text whose lowercase form changes length.
#[must_use]
pub fn find_chars_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let hay: Vec<char> = haystack.chars().collect();
    let pat: Vec<char> = needle.chars().collect();
    if pat.is_empty() || pat.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - pat.len()).find(|&i| {
        hay[i..i + pat.len()]
            .iter()
            .zip(&pat)
            .all(|(a, b)| a.to_lowercase().eq(b.to_lowercase()))
    })
}

/// Char offsets for ascending byte offsets into `s`, computed in one pass.
#[must_use]
pub fn char_offsets(s: &str, bytes: &[usize]) -> Vec<usize> {
    let mut boundaries = s
        .char_indices()
        .map(|(b, _)| b)
        .chain(std::iter::once(s.len()))
        .enumerate()
        .peekable();
    let mut out = Vec::with_capacity(bytes.len());
    for &target in bytes {
        while boundaries.next_if(|&(_, b)| b < target).is_some() {}
        out.push(boundaries.peek().map_or_else(|| char_len(s), |&(i, _)| i));
    }
    out
}

/// Lowercased alphanumeric words of `s`.
pub fn words(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_offsets() {
        let s = "héllo wörld";
        let bytes: Vec<usize> = s.match_indices('w').map(|(b, _)| b).chain([s.len()]).collect();
        assert_eq!(char_offsets(s, &[0, 1, 3]), vec![0, 1, 2]);
        assert_eq!(char_offsets(s, &bytes), vec![6, 11]);
        assert!(char_offsets(s, &[]).is_empty());
    }

    #[test]
    fn test_char_slice_ascii() {
        assert_eq!(char_slice("This are a test.", 5, 8), "are");
        assert_eq!(char_slice("abc", 2, 10), "c");
        assert_eq!(char_slice("abc", 3, 1), "");
    }

    #[test]
    fn test_char_slice_multibyte() {
        let s = "naïve café";
        assert_eq!(char_len(s), 10);
        assert_eq!(char_slice(s, 6, 10), "café");
    }

    #[test]
    fn test_find_chars() {
        assert_eq!(find_chars("résumé résumé", "résumé", 1), Some(7));
        assert_eq!(find_chars("abc", "", 0), None);
        assert_eq!(find_chars("abc", "d", 0), None);
    }

    #[test]
    fn test_find_ignore_case() {
        assert_eq!(find_chars_ignore_case("Hello World", "world"), Some(6));
        assert_eq!(find_chars_ignore_case("hi", "hello"), None);
    }

    #[test]
    fn test_words() {
        let w: Vec<String> = words("Don't stop, Believin'!").collect();
        assert_eq!(w, vec!["don't", "stop", "believin'"]);
    }
}
