use super::{Document, NodeId};
use crate::geometry::{Point, Rect};
use crate::text::char_len;

/// Where text ends up on screen.
///
/// The host page's layout engine is outside this crate; renderers and the
/// position tracker only need line boxes for a node's text.
pub trait TextLayout {
    /// One rect per visual line the text of `node` occupies.
    fn client_rects(&self, doc: &Document, node: NodeId) -> Vec<Rect>;

    fn bounding_rect(&self, doc: &Document, node: NodeId) -> Option<Rect> {
        self.client_rects(doc, node)
            .into_iter()
            .reduce(|acc, r| acc.union(&r))
    }
}

/// Fixed-pitch layout of the whole document text: `columns` chars per line,
/// hard breaks on `\n`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonospaceLayout {
    pub origin: Point,
    pub char_width: f64,
    pub line_height: f64,
    pub columns: usize,
}

impl Default for MonospaceLayout {
    fn default() -> Self {
        Self {
            origin: Point::default(),
            char_width: 8.0,
            line_height: 20.0,
            columns: 80,
        }
    }
}

impl MonospaceLayout {
    pub fn new(columns: usize) -> Self {
        Self {
            columns: columns.max(1),
            ..Self::default()
        }
    }

    /// Char range of `node`'s text within the whole document.
    fn span_of(doc: &Document, node: NodeId) -> Option<(usize, usize)> {
        let targets: Vec<NodeId> = if doc.is_text(node) {
            vec![node]
        } else {
            doc.text_nodes(node)
        };
        let first = *targets.first()?;
        let last = *targets.last()?;

        let mut offset = 0;
        let mut start = None;
        for text_node in doc.text_nodes(doc.root()) {
            let len = doc.text(text_node).map(char_len).unwrap_or(0);
            if text_node == first {
                start = Some(offset);
            }
            if text_node == last {
                return start.map(|s| (s, offset + len));
            }
            offset += len;
        }
        None
    }

    /// `(line, column)` of every char in the document text.
    fn positions(&self, text: &str) -> Vec<(usize, usize)> {
        let mut out = Vec::with_capacity(text.len());
        let (mut line, mut col) = (0, 0);
        for c in text.chars() {
            if col >= self.columns {
                line += 1;
                col = 0;
            }
            out.push((line, col));
            if c == '\n' {
                line += 1;
                col = 0;
            } else {
                col += 1;
            }
        }
        out
    }

    fn line_rect(&self, line: usize, from_col: usize, to_col: usize) -> Rect {
        Rect::new(
            self.origin.x + from_col as f64 * self.char_width,
            self.origin.y + line as f64 * self.line_height,
            (to_col - from_col) as f64 * self.char_width,
            self.line_height,
        )
    }
}

impl TextLayout for MonospaceLayout {
    fn client_rects(&self, doc: &Document, node: NodeId) -> Vec<Rect> {
        let Some((start, end)) = Self::span_of(doc, node) else {
            return Vec::new();
        };
        let text = doc.text_content(doc.root());
        let positions = self.positions(&text);

        let mut rects = Vec::new();
        let mut current: Option<(usize, usize, usize)> = None;
        for &(line, col) in positions.iter().take(end).skip(start) {
            current = match current {
                Some((l, from, to)) if l == line => Some((l, from, to.max(col + 1))),
                Some((l, from, to)) => {
                    rects.push(self.line_rect(l, from, to));
                    Some((line, col, col + 1))
                }
                None => Some((line, col, col + 1)),
            };
        }
        if let Some((l, from, to)) = current {
            rects.push(self.line_rect(l, from, to));
        }
        rects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line() {
        let mut doc = Document::new();
        let root = doc.root();
        doc.append_text(root, "Hello ").unwrap();
        let word = doc.append_text(root, "world").unwrap();
        let layout = MonospaceLayout::new(80);
        let rects = layout.client_rects(&doc, word);
        assert_eq!(rects, vec![Rect::new(48.0, 0.0, 40.0, 20.0)]);
    }

    #[test]
    fn test_wraps_across_lines() {
        let mut doc = Document::new();
        let root = doc.root();
        doc.append_text(root, "0123456").unwrap();
        let span = doc.append_element(root, "span").unwrap();
        doc.append_text(span, "789abc").unwrap();
        let layout = MonospaceLayout::new(10);
        let rects = layout.client_rects(&doc, span);
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0], Rect::new(56.0, 0.0, 24.0, 20.0));
        assert_eq!(rects[1], Rect::new(0.0, 20.0, 24.0, 20.0));
        assert_eq!(
            layout.bounding_rect(&doc, span),
            Some(Rect::new(0.0, 0.0, 80.0, 40.0))
        );
    }

    #[test]
    fn test_empty_node_has_no_rects() {
        let mut doc = Document::new();
        let root = doc.root();
        let span = doc.append_element(root, "span").unwrap();
        assert!(MonospaceLayout::default().client_rects(&doc, span).is_empty());
        assert_eq!(MonospaceLayout::default().bounding_rect(&doc, span), None);
    }
}
