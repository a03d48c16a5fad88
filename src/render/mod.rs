//! Non-destructive underline markers over document text.
//!
//! Char offsets are counted over the non-empty text nodes under the target,
//! in document order, which is exactly what [`UnderlineRenderer::extract_text`]
//! returns. Text already inside a marker still counts toward offsets but is
//! never wrapped again, so markers never nest.
//!
//! Rendering splits at most two text nodes per issue and records each split
//! on the marker. Clearing unwraps every marker and re-joins text only at
//! those recorded points, so render followed by clear restores the original
//! text and node structure.
pub mod events;

use std::collections::{BTreeSet, HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, warn};

use crate::dom::layout::TextLayout;
use crate::dom::{Document, DomError, NodeId};
use crate::geometry::Rect;
use crate::models::{Issue, IssueType};
use crate::text::{char_len, char_slice};
pub use events::{EventBus, OverlayEvent, OverlayEventKind};

pub const MARKER_TAG: &str = "span";
pub const MARKER_CLASS: &str = "proofmark-underline";
pub const MULTILINE_CLASS: &str = "proofmark-underline--multiline";

pub const ATTR_ISSUE_ID: &str = "data-issue-id";
pub const ATTR_ISSUE_TYPE: &str = "data-issue-type";
pub const ATTR_SEVERITY: &str = "data-severity";
pub const ATTR_MULTILINE: &str = "data-multiline";
const ATTR_SPLIT_START: &str = "data-split-start";
const ATTR_SPLIT_END: &str = "data-split-end";

/// Why one issue could not be mapped onto the document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("range {start}..{end} is outside the {len}-char text")]
    OutOfRange { start: usize, end: usize, len: usize },

    #[error("text at {start}..{end} is {found:?}, expected {expected:?}")]
    StaleText {
        start: usize,
        end: usize,
        expected: String,
        found: String,
    },

    #[error("range {start}..{end} overlaps an existing marker")]
    CrossesMarker { start: usize, end: usize },

    #[error("range {start}..{end} only partially covers an element")]
    CrossesElement { start: usize, end: usize },

    #[error(transparent)]
    Dom(#[from] DomError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActionError {
    #[error("node {0} is not an underline marker")]
    NotAMarker(NodeId),

    #[error("no rendered issue with id {0}")]
    UnknownIssue(String),

    #[error("issue {issue_id} has no suggestion #{index}")]
    NoSuggestion { issue_id: String, index: usize },

    #[error(transparent)]
    Dom(#[from] DomError),
}

#[derive(Debug, Default)]
pub struct RenderReport {
    /// Ids of issues that got a marker.
    pub rendered: Vec<String>,
    pub skipped: Vec<(String, MappingError)>,
    /// Issues suppressed by an earlier `ignore_issue`.
    pub ignored: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerPosition {
    pub issue_id: String,
    pub marker: NodeId,
    pub rects: Vec<Rect>,
    pub bounds: Rect,
    pub multiline: bool,
}

/// A non-empty text node and its char range within the target.
#[derive(Debug, Clone, Copy)]
struct Segment {
    node: NodeId,
    start: usize,
    end: usize,
    in_marker: bool,
}

fn is_marker(doc: &Document, node: NodeId) -> bool {
    doc.has_class(node, MARKER_CLASS)
}

fn flag(doc: &Document, node: NodeId, name: &str) -> bool {
    doc.attribute(node, name) == Some("true")
}

fn segments(doc: &Document, target: NodeId) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut offset = 0;
    for node in doc.text_nodes(target) {
        let len = doc.text(node).map(char_len).unwrap_or(0);
        if len == 0 {
            continue;
        }
        let in_marker = doc
            .ancestors(node)
            .into_iter()
            .take_while(|&a| a != target)
            .any(|a| is_marker(doc, a));
        out.push(Segment {
            node,
            start: offset,
            end: offset + len,
            in_marker,
        });
        offset += len;
    }
    out
}

/// Char range covered by the text under `node`, if it has any.
fn span_of(doc: &Document, segs: &[Segment], node: NodeId) -> Option<(usize, usize)> {
    let mut inside = segs.iter().filter(|s| doc.contains(node, s.node));
    let first = inside.next()?;
    let last = inside.last().unwrap_or(first);
    Some((first.start, last.end))
}

/// Child of `ancestor` on the path down to `node`.
fn child_toward(doc: &Document, ancestor: NodeId, node: NodeId) -> Option<NodeId> {
    if doc.parent(node) == Some(ancestor) {
        return Some(node);
    }
    doc.ancestors(node)
        .into_iter()
        .find(|&a| doc.parent(a) == Some(ancestor))
}

fn common_ancestor(doc: &Document, a: NodeId, b: NodeId) -> Option<NodeId> {
    let of_a = doc.ancestors(a);
    doc.ancestors(b).into_iter().find(|x| of_a.contains(x))
}

/// Append `right`'s text to `left` and drop `right`.
fn join_text(doc: &mut Document, left: NodeId, right: NodeId) -> Result<(), DomError> {
    let joined = match (doc.text(left), doc.text(right)) {
        (Some(l), Some(r)) => format!("{l}{r}"),
        (None, _) => return Err(DomError::NotAText(left)),
        (_, None) => return Err(DomError::NotAText(right)),
    };
    doc.set_text(left, &joined)?;
    doc.remove(right)
}

/// Move the marker's children into its place and drop the marker.
fn unwrap(doc: &mut Document, marker: NodeId) -> Result<Vec<NodeId>, DomError> {
    let parent = doc.parent(marker).ok_or(DomError::Detached(marker))?;
    let children = doc.children(marker).to_vec();
    for &child in &children {
        doc.insert_before(parent, child, Some(marker))?;
    }
    doc.remove(marker)?;
    Ok(children)
}

#[derive(Default)]
pub struct UnderlineRenderer {
    bus: EventBus,
    issues: HashMap<String, Issue>,
    ignored: HashSet<(IssueType, String)>,
}

impl UnderlineRenderer {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            issues: HashMap::new(),
            ignored: HashSet::new(),
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Text as the renderer indexes it; analysis must run on this string.
    pub fn extract_text(doc: &Document, target: NodeId) -> String {
        segments(doc, target)
            .iter()
            .filter_map(|s| doc.text(s.node))
            .collect()
    }

    pub fn markers(doc: &Document, target: NodeId) -> Vec<NodeId> {
        doc.elements_with_class(target, MARKER_CLASS)
    }

    pub fn issue(&self, id: &str) -> Option<&Issue> {
        self.issues.get(id)
    }

    pub fn ignored_count(&self) -> usize {
        self.ignored.len()
    }

    pub fn clear_ignored(&mut self) {
        self.ignored.clear();
    }

    /// Wrap each issue's range in a marker, in ascending start order.
    ///
    /// An issue that cannot be mapped is skipped with a warning; the rest of
    /// the batch still renders.
    pub fn render_underlines(
        &mut self,
        doc: &mut Document,
        target: NodeId,
        issues: &[Issue],
        layout: &dyn TextLayout,
    ) -> Result<RenderReport, DomError> {
        if !doc.is_element(target) {
            return Err(DomError::NotAnElement(target));
        }

        let mut ordered: Vec<&Issue> = issues.iter().collect();
        ordered.sort_by_key(|i| i.start_index);

        let mut report = RenderReport::default();
        for issue in ordered {
            if self
                .ignored
                .contains(&(issue.issue_type, issue.original_text.clone()))
            {
                report.ignored += 1;
                continue;
            }
            match self.wrap(doc, target, issue, layout) {
                Ok(_) => {
                    self.issues.insert(issue.id.clone(), issue.clone());
                    report.rendered.push(issue.id.clone());
                }
                Err(e) => {
                    warn!("skipping underline for issue {}: {e}", issue.id);
                    report.skipped.push((issue.id.clone(), e));
                }
            }
        }

        debug!(
            "rendered {} underline(s), skipped {}, ignored {}",
            report.rendered.len(),
            report.skipped.len(),
            report.ignored
        );
        Ok(report)
    }

    fn wrap(
        &self,
        doc: &mut Document,
        target: NodeId,
        issue: &Issue,
        layout: &dyn TextLayout,
    ) -> Result<NodeId, MappingError> {
        let (start, end) = (issue.start_index, issue.end_index);
        let segs = segments(doc, target);
        let len = segs.last().map_or(0, |s| s.end);
        if start >= end || end > len {
            return Err(MappingError::OutOfRange { start, end, len });
        }

        let text = Self::extract_text(doc, target);
        let found = char_slice(&text, start, end);
        if found != issue.original_text {
            return Err(MappingError::StaleText {
                start,
                end,
                expected: issue.original_text.clone(),
                found: found.to_string(),
            });
        }

        let covered: Vec<Segment> = segs
            .iter()
            .filter(|s| s.start < end && s.end > start)
            .copied()
            .collect();
        if covered.iter().any(|s| s.in_marker) {
            return Err(MappingError::CrossesMarker { start, end });
        }
        let (Some(first), Some(last)) = (covered.first().copied(), covered.last().copied()) else {
            return Err(MappingError::OutOfRange { start, end, len });
        };

        // Siblings to wrap. Ranges spanning different parents are lifted to
        // the children of the common ancestor, which is only possible when
        // the range starts and ends exactly on their text boundaries.
        let (mut from, mut to) = if doc.parent(first.node) == doc.parent(last.node) {
            (first.node, last.node)
        } else {
            let crosses = MappingError::CrossesElement { start, end };
            let common = common_ancestor(doc, first.node, last.node).ok_or(crosses.clone())?;
            let a1 = child_toward(doc, common, first.node).ok_or(crosses.clone())?;
            let a2 = child_toward(doc, common, last.node).ok_or(crosses.clone())?;
            if a1 != first.node && span_of(doc, &segs, a1).map(|s| s.0) != Some(start) {
                return Err(crosses);
            }
            if a2 != last.node && span_of(doc, &segs, a2).map(|s| s.1) != Some(end) {
                return Err(crosses);
            }
            (a1, a2)
        };

        let end_local = end - last.start;
        let split_end = end_local < last.end - last.start;
        if split_end {
            doc.split_text(last.node, end_local)?;
        }

        let start_local = start - first.start;
        let split_start = start_local > 0;
        if split_start {
            let tail = doc.split_text(first.node, start_local)?;
            if from == first.node {
                from = tail;
            }
            if to == first.node {
                to = tail;
            }
        }

        let parent = doc.parent(from).ok_or(DomError::Detached(from))?;
        let siblings = doc.children(parent);
        let i = doc.index_in_parent(from).ok_or(DomError::Detached(from))?;
        let j = doc.index_in_parent(to).ok_or(DomError::Detached(to))?;
        let moving: Vec<NodeId> = siblings[i..=j].to_vec();

        let marker = doc.create_element(MARKER_TAG);
        doc.set_attribute(
            marker,
            "class",
            &format!("{MARKER_CLASS} {MARKER_CLASS}--{}", issue.severity.as_str()),
        )?;
        doc.set_attribute(marker, ATTR_ISSUE_ID, &issue.id)?;
        doc.set_attribute(marker, ATTR_ISSUE_TYPE, issue.issue_type.as_str())?;
        doc.set_attribute(marker, ATTR_SEVERITY, issue.severity.as_str())?;
        if split_start {
            doc.set_attribute(marker, ATTR_SPLIT_START, "true")?;
        }
        if split_end {
            doc.set_attribute(marker, ATTR_SPLIT_END, "true")?;
        }

        doc.insert_before(parent, marker, Some(from))?;
        for node in moving {
            doc.append_child(marker, node)?;
        }

        if layout.client_rects(doc, marker).len() > 1 {
            set_multiline(doc, marker, true)?;
        }
        Ok(marker)
    }

    /// Remove every marker under `target`, restoring the text nodes that
    /// rendering split. Returns the number of markers removed.
    pub fn clear_underlines(&mut self, doc: &mut Document, target: NodeId) -> Result<usize, DomError> {
        let markers = Self::markers(doc, target);
        if markers.is_empty() {
            return Ok(0);
        }

        let segs = segments(doc, target);
        let mut split_points = BTreeSet::new();
        for &marker in &markers {
            if let Some((start, end)) = span_of(doc, &segs, marker) {
                if flag(doc, marker, ATTR_SPLIT_START) {
                    split_points.insert(start);
                }
                if flag(doc, marker, ATTR_SPLIT_END) {
                    split_points.insert(end);
                }
            }
            if let Some(id) = doc.attribute(marker, ATTR_ISSUE_ID) {
                self.issues.remove(id);
            }
        }

        for &marker in &markers {
            unwrap(doc, marker)?;
        }

        for point in split_points {
            let segs = segments(doc, target);
            let Some(left) = segs.iter().find(|s| s.end == point) else {
                continue;
            };
            if let Some(right) = doc.next_sibling(left.node) {
                if doc.text(right).is_some_and(|t| !t.is_empty()) {
                    join_text(doc, left.node, right)?;
                }
            }
        }

        debug!("cleared {} underline(s)", markers.len());
        Ok(markers.len())
    }

    /// Unwrap one marker, re-joining split text with its neighbours. A
    /// neighbour that is itself a marker inherits the split flag instead, so
    /// a later clear still re-joins the text.
    fn unwrap_one(doc: &mut Document, marker: NodeId) -> Result<(), DomError> {
        let split_start = flag(doc, marker, ATTR_SPLIT_START);
        let split_end = flag(doc, marker, ATTR_SPLIT_END);
        let prev = doc.previous_sibling(marker);
        let next = doc.next_sibling(marker);
        let children = unwrap(doc, marker)?;

        if split_end {
            if let (Some(&last), Some(next)) = (children.last(), next) {
                if doc.is_text(last) && doc.is_text(next) {
                    join_text(doc, last, next)?;
                } else if is_marker(doc, next) {
                    doc.set_attribute(next, ATTR_SPLIT_START, "true")?;
                }
            }
        }
        if split_start {
            if let (Some(prev), Some(&first)) = (prev, children.first()) {
                if doc.is_text(prev) && doc.is_text(first) {
                    join_text(doc, prev, first)?;
                } else if is_marker(doc, prev) {
                    doc.set_attribute(prev, ATTR_SPLIT_END, "true")?;
                }
            }
        }
        Ok(())
    }

    /// Recompute line boxes for every marker under `target` and refresh
    /// their multiline flag.
    pub fn update_underline_positions(
        &self,
        doc: &mut Document,
        target: NodeId,
        layout: &dyn TextLayout,
    ) -> Result<Vec<MarkerPosition>, DomError> {
        let mut positions = Vec::new();
        for marker in Self::markers(doc, target) {
            let rects = layout.client_rects(doc, marker);
            let multiline = rects.len() > 1;
            set_multiline(doc, marker, multiline)?;

            let Some(bounds) = rects.iter().copied().reduce(|acc, r| acc.union(&r)) else {
                continue;
            };
            positions.push(MarkerPosition {
                issue_id: doc.attribute(marker, ATTR_ISSUE_ID).unwrap_or_default().to_string(),
                marker,
                rects,
                bounds,
                multiline,
            });
        }
        Ok(positions)
    }

    fn marker_issue(&self, doc: &Document, marker: NodeId) -> Result<&Issue, ActionError> {
        if !is_marker(doc, marker) {
            return Err(ActionError::NotAMarker(marker));
        }
        let id = doc
            .attribute(marker, ATTR_ISSUE_ID)
            .ok_or(ActionError::NotAMarker(marker))?;
        self.issues
            .get(id)
            .ok_or_else(|| ActionError::UnknownIssue(id.to_string()))
    }

    fn notify(&self, doc: &Document, marker: NodeId, kind: OverlayEventKind) -> Result<usize, ActionError> {
        let issue = self.marker_issue(doc, marker)?.clone();
        Ok(self.bus.publish(OverlayEvent {
            kind,
            issue,
            element: marker,
            suggestion: None,
        }))
    }

    /// Returns the number of subscribers notified.
    pub fn notify_hover(&self, doc: &Document, marker: NodeId) -> Result<usize, ActionError> {
        self.notify(doc, marker, OverlayEventKind::Hover)
    }

    pub fn notify_leave(&self, doc: &Document, marker: NodeId) -> Result<usize, ActionError> {
        self.notify(doc, marker, OverlayEventKind::Leave)
    }

    pub fn notify_click(&self, doc: &Document, marker: NodeId) -> Result<usize, ActionError> {
        self.notify(doc, marker, OverlayEventKind::Click)
    }

    /// Replace the marked text with suggestion `index` and drop the marker.
    ///
    /// Returns the target's new text, for the editor to take over.
    pub fn apply_suggestion(
        &mut self,
        doc: &mut Document,
        target: NodeId,
        marker: NodeId,
        index: usize,
    ) -> Result<String, ActionError> {
        let issue = self.marker_issue(doc, marker)?.clone();
        let suggestion = issue
            .suggestions
            .get(index)
            .cloned()
            .ok_or_else(|| ActionError::NoSuggestion {
                issue_id: issue.id.clone(),
                index,
            })?;

        for child in doc.children(marker).to_vec() {
            doc.detach(child)?;
        }
        doc.append_text(marker, &suggestion)?;
        Self::unwrap_one(doc, marker)?;
        self.issues.remove(&issue.id);

        debug!("applied suggestion {suggestion:?} for issue {}", issue.id);
        self.bus.publish(OverlayEvent {
            kind: OverlayEventKind::SuggestionApplied,
            issue,
            element: marker,
            suggestion: Some(suggestion),
        });
        Ok(Self::extract_text(doc, target))
    }

    /// Drop the marker and suppress the same `(type, text)` in later renders.
    pub fn ignore_issue(&mut self, doc: &mut Document, marker: NodeId) -> Result<(), ActionError> {
        let issue = self.marker_issue(doc, marker)?.clone();
        Self::unwrap_one(doc, marker)?;
        self.issues.remove(&issue.id);
        self.ignored
            .insert((issue.issue_type, issue.original_text.clone()));

        self.bus.publish(OverlayEvent {
            kind: OverlayEventKind::IssueIgnored,
            issue,
            element: marker,
            suggestion: None,
        });
        Ok(())
    }
}

fn set_multiline(doc: &mut Document, marker: NodeId, multiline: bool) -> Result<(), DomError> {
    let class = doc.attribute(marker, "class").unwrap_or(MARKER_CLASS).to_string();
    let mut classes: Vec<&str> = class
        .split_whitespace()
        .filter(|c| *c != MULTILINE_CLASS)
        .collect();
    if multiline {
        classes.push(MULTILINE_CLASS);
        doc.set_attribute(marker, ATTR_MULTILINE, "true")?;
    } else {
        doc.remove_attribute(marker, ATTR_MULTILINE)?;
    }
    doc.set_attribute(marker, "class", &classes.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::layout::MonospaceLayout;
    use crate::models::Severity;

    fn issue(text: &str, start: usize, end: usize) -> Issue {
        Issue::new(IssueType::Grammar, Severity::Error, start, end, text, "Check this.")
            .with_suggestions(vec!["is".into()])
    }

    fn field(parts: &[&str]) -> (Document, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let target = doc.append_element(root, "div").unwrap();
        for part in parts {
            doc.append_text(target, part).unwrap();
        }
        (doc, target)
    }

    fn snapshot(doc: &Document, target: NodeId) -> (String, usize, Vec<String>) {
        let texts = doc
            .text_nodes(target)
            .into_iter()
            .filter_map(|n| doc.text(n).map(str::to_string))
            .collect();
        (doc.to_html(target), doc.subtree_size(target), texts)
    }

    fn layout() -> MonospaceLayout {
        MonospaceLayout::new(80)
    }

    #[test]
    fn test_wraps_single_range() {
        let (mut doc, target) = field(&["This are a test."]);
        let text = UnderlineRenderer::extract_text(&doc, target);
        let mut renderer = UnderlineRenderer::default();
        let report = renderer
            .render_underlines(&mut doc, target, &[issue(&text, 5, 8)], &layout())
            .unwrap();
        assert_eq!(report.rendered.len(), 1);

        let markers = UnderlineRenderer::markers(&doc, target);
        assert_eq!(markers.len(), 1);
        let marker = markers[0];
        assert_eq!(doc.text_content(marker), "are");
        assert_eq!(doc.attribute(marker, ATTR_ISSUE_TYPE), Some("grammar"));
        assert_eq!(doc.attribute(marker, ATTR_SEVERITY), Some("error"));
        assert!(doc.attribute(marker, ATTR_ISSUE_ID).is_some());
        assert_eq!(UnderlineRenderer::extract_text(&doc, target), text);
    }

    #[test]
    fn test_clear_round_trip_structured() {
        let mut doc = Document::new();
        let root = doc.root();
        let target = doc.append_element(root, "div").unwrap();
        doc.append_text(target, "Hello ").unwrap();
        let b = doc.append_element(target, "b").unwrap();
        doc.append_text(b, "bold").unwrap();
        doc.append_text(target, "").unwrap();
        doc.append_text(target, " ").unwrap();
        doc.append_text(target, "world and more text").unwrap();

        let before = snapshot(&doc, target);
        let text = UnderlineRenderer::extract_text(&doc, target);
        assert_eq!(text, "Hello bold world and more text");

        let issues = vec![
            issue(&text, 3, 10),  // "lo bold": lifts over <b>
            issue(&text, 12, 16), // "orld"
            issue(&text, 17, 20), // "and"
            issue(&text, 20, 25), // " more": adjacent to the previous one
        ];
        let mut renderer = UnderlineRenderer::default();
        let report = renderer
            .render_underlines(&mut doc, target, &issues, &layout())
            .unwrap();
        assert_eq!(report.rendered.len(), 4, "{:?}", report.skipped);
        assert_eq!(UnderlineRenderer::extract_text(&doc, target), text);

        assert_eq!(renderer.clear_underlines(&mut doc, target).unwrap(), 4);
        assert_eq!(snapshot(&doc, target), before);
    }

    #[test]
    fn test_render_twice_skips_marked_text() {
        let (mut doc, target) = field(&["This are a test."]);
        let text = UnderlineRenderer::extract_text(&doc, target);
        let mut renderer = UnderlineRenderer::default();
        let before = snapshot(&doc, target);

        renderer
            .render_underlines(&mut doc, target, &[issue(&text, 5, 8)], &layout())
            .unwrap();
        let again = renderer
            .render_underlines(&mut doc, target, &[issue(&text, 5, 8), issue(&text, 0, 4)], &layout())
            .unwrap();
        assert!(matches!(again.skipped[0].1, MappingError::CrossesMarker { .. }));
        assert_eq!(again.rendered.len(), 1);
        assert_eq!(UnderlineRenderer::markers(&doc, target).len(), 2);

        renderer.clear_underlines(&mut doc, target).unwrap();
        assert_eq!(snapshot(&doc, target), before);
    }

    #[test]
    fn test_partial_element_is_skipped() {
        let mut doc = Document::new();
        let root = doc.root();
        let target = doc.append_element(root, "div").unwrap();
        doc.append_text(target, "Hello ").unwrap();
        let b = doc.append_element(target, "b").unwrap();
        doc.append_text(b, "bold").unwrap();
        let text = UnderlineRenderer::extract_text(&doc, target);
        let before = snapshot(&doc, target);

        let mut renderer = UnderlineRenderer::default();
        let report = renderer
            .render_underlines(&mut doc, target, &[issue(&text, 3, 8)], &layout())
            .unwrap();
        assert!(matches!(report.skipped[0].1, MappingError::CrossesElement { .. }));
        assert_eq!(snapshot(&doc, target), before, "a skipped issue leaves no splits");
    }

    #[test]
    fn test_stale_and_out_of_range_skip_only_that_issue() {
        let (mut doc, target) = field(&["This are a test."]);
        let text = UnderlineRenderer::extract_text(&doc, target);
        let mut stale = issue(&text, 0, 4);
        stale.original_text = "That".into();
        let mut beyond = issue(&text, 10, 12);
        beyond.start_index = 14;
        beyond.end_index = 40;

        let mut renderer = UnderlineRenderer::default();
        let report = renderer
            .render_underlines(&mut doc, target, &[stale, beyond, issue(&text, 5, 8)], &layout())
            .unwrap();
        assert_eq!(report.rendered.len(), 1);
        assert_eq!(report.skipped.len(), 2);
        assert!(matches!(report.skipped[0].1, MappingError::StaleText { .. }));
        assert!(matches!(report.skipped[1].1, MappingError::OutOfRange { len: 16, .. }));
    }

    #[test]
    fn test_offsets_count_whitespace_nodes() {
        let (mut doc, target) = field(&["Hi", " ", "there"]);
        let text = UnderlineRenderer::extract_text(&doc, target);
        let mut renderer = UnderlineRenderer::default();
        renderer
            .render_underlines(&mut doc, target, &[issue(&text, 3, 8)], &layout())
            .unwrap();
        let marker = UnderlineRenderer::markers(&doc, target)[0];
        assert_eq!(doc.text_content(marker), "there");
    }

    #[test]
    fn test_issues_applied_in_start_order() {
        let (mut doc, target) = field(&["one two three"]);
        let text = UnderlineRenderer::extract_text(&doc, target);
        let mut renderer = UnderlineRenderer::default();
        let report = renderer
            .render_underlines(
                &mut doc,
                target,
                &[issue(&text, 8, 13), issue(&text, 0, 3), issue(&text, 4, 7)],
                &layout(),
            )
            .unwrap();
        assert_eq!(report.rendered.len(), 3);
        let marked: Vec<String> = UnderlineRenderer::markers(&doc, target)
            .into_iter()
            .map(|m| doc.text_content(m))
            .collect();
        assert_eq!(marked, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_multiline_flag() {
        let (mut doc, target) = field(&["aaaaaaaa bbbbbbbb"]);
        let text = UnderlineRenderer::extract_text(&doc, target);
        let mut renderer = UnderlineRenderer::default();
        renderer
            .render_underlines(&mut doc, target, &[issue(&text, 6, 12)], &MonospaceLayout::new(10))
            .unwrap();
        let marker = UnderlineRenderer::markers(&doc, target)[0];
        assert_eq!(doc.attribute(marker, ATTR_MULTILINE), Some("true"));
        assert!(doc.has_class(marker, MULTILINE_CLASS));

        let positions = renderer
            .update_underline_positions(&mut doc, target, &MonospaceLayout::new(80))
            .unwrap();
        assert_eq!(positions.len(), 1);
        assert!(!positions[0].multiline);
        assert_eq!(doc.attribute(marker, ATTR_MULTILINE), None);
        assert!(!doc.has_class(marker, MULTILINE_CLASS));
    }

    #[tokio::test]
    async fn test_hover_and_click_events() {
        let (mut doc, target) = field(&["This are a test."]);
        let text = UnderlineRenderer::extract_text(&doc, target);
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let mut renderer = UnderlineRenderer::new(bus);
        let target_issue = issue(&text, 5, 8);
        renderer
            .render_underlines(&mut doc, target, std::slice::from_ref(&target_issue), &layout())
            .unwrap();
        let marker = UnderlineRenderer::markers(&doc, target)[0];

        assert_eq!(renderer.notify_hover(&doc, marker).unwrap(), 1);
        renderer.notify_click(&doc, marker).unwrap();
        let hover = rx.recv().await.unwrap();
        assert_eq!(hover.kind, OverlayEventKind::Hover);
        assert_eq!(hover.issue, target_issue);
        assert_eq!(hover.element, marker);
        assert_eq!(rx.recv().await.unwrap().kind, OverlayEventKind::Click);

        let not_marker = doc.children(target)[0];
        assert_eq!(
            renderer.notify_leave(&doc, not_marker),
            Err(ActionError::NotAMarker(not_marker))
        );
    }

    #[tokio::test]
    async fn test_apply_suggestion() {
        let (mut doc, target) = field(&["This are a test."]);
        let text = UnderlineRenderer::extract_text(&doc, target);
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let mut renderer = UnderlineRenderer::new(bus);
        renderer
            .render_underlines(&mut doc, target, &[issue(&text, 5, 8)], &layout())
            .unwrap();
        let marker = UnderlineRenderer::markers(&doc, target)[0];

        assert!(matches!(
            renderer.apply_suggestion(&mut doc, target, marker, 3),
            Err(ActionError::NoSuggestion { index: 3, .. })
        ));
        let new_text = renderer.apply_suggestion(&mut doc, target, marker, 0).unwrap();
        assert_eq!(new_text, "This is a test.");
        assert_eq!(doc.to_html(target), "<div>This is a test.</div>");

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind, OverlayEventKind::SuggestionApplied);
        assert_eq!(event.suggestion.as_deref(), Some("is"));
        assert!(renderer.issue(&event.issue.id).is_none());
    }

    #[test]
    fn test_ignore_suppresses_later_renders() {
        let (mut doc, target) = field(&["This are a test."]);
        let text = UnderlineRenderer::extract_text(&doc, target);
        let before = snapshot(&doc, target);
        let mut renderer = UnderlineRenderer::default();
        renderer
            .render_underlines(&mut doc, target, &[issue(&text, 5, 8)], &layout())
            .unwrap();
        let marker = UnderlineRenderer::markers(&doc, target)[0];

        renderer.ignore_issue(&mut doc, marker).unwrap();
        assert_eq!(snapshot(&doc, target), before);
        assert_eq!(renderer.ignored_count(), 1);

        // a fresh analysis of the same text produces a new id for the same span
        let report = renderer
            .render_underlines(&mut doc, target, &[issue(&text, 5, 8)], &layout())
            .unwrap();
        assert_eq!(report.ignored, 1);
        assert!(UnderlineRenderer::markers(&doc, target).is_empty());
    }

    #[test]
    fn test_ignore_next_to_marker_keeps_round_trip() {
        let (mut doc, target) = field(&["abcdefgh"]);
        let text = UnderlineRenderer::extract_text(&doc, target);
        let before = snapshot(&doc, target);
        let mut renderer = UnderlineRenderer::default();
        renderer
            .render_underlines(&mut doc, target, &[issue(&text, 2, 4), issue(&text, 4, 6)], &layout())
            .unwrap();
        let markers = UnderlineRenderer::markers(&doc, target);
        assert_eq!(markers.len(), 2);

        renderer.ignore_issue(&mut doc, markers[0]).unwrap();
        assert_eq!(UnderlineRenderer::markers(&doc, target).len(), 1);
        renderer.clear_underlines(&mut doc, target).unwrap();
        assert_eq!(snapshot(&doc, target), before);
    }
}
