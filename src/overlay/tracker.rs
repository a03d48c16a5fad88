//! Frame-coalesced re-positioning of tracked floating boxes.
//!
//! Scroll and resize events only request a frame. However many arrive, the
//! next [`PositionTracker::run_frame`] repositions every tracked box once.
use std::collections::BTreeMap;

use tracing::debug;

use super::{OverlayPositioner, Placement, Position, PositionOptions};
use crate::dom::layout::TextLayout;
use crate::dom::{Document, NodeId};
use crate::geometry::{Rect, Size};

/// Live geometry the tracker reads at frame time.
pub trait LayoutSource {
    fn reference_rect(&self, reference: NodeId) -> Option<Rect>;
    fn floating_size(&self, floating: NodeId) -> Option<Size>;
    fn viewport(&self) -> Rect;
}

/// [`LayoutSource`] over a document laid out by a [`TextLayout`], with fixed
/// floating sizes and a scrollable viewport.
pub struct DocumentLayout<'a, L: TextLayout> {
    pub doc: &'a Document,
    pub layout: &'a L,
    pub viewport: Rect,
    pub sizes: BTreeMap<NodeId, Size>,
}

impl<L: TextLayout> LayoutSource for DocumentLayout<'_, L> {
    fn reference_rect(&self, reference: NodeId) -> Option<Rect> {
        self.layout
            .bounding_rect(self.doc, reference)
            .map(|r| r.translate(-self.viewport.x, -self.viewport.y))
    }

    fn floating_size(&self, floating: NodeId) -> Option<Size> {
        self.sizes.get(&floating).copied()
    }

    fn viewport(&self) -> Rect {
        Rect::new(0.0, 0.0, self.viewport.width, self.viewport.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Tracked {
    reference: NodeId,
    placement: Placement,
}

#[derive(Debug, Default)]
pub struct PositionTracker {
    positioner: OverlayPositioner,
    tracked: BTreeMap<NodeId, Tracked>,
    frame_pending: bool,
    frames_run: u64,
    last: BTreeMap<NodeId, Position>,
}

impl PositionTracker {
    pub fn new(positioner: OverlayPositioner) -> Self {
        Self {
            positioner,
            ..Self::default()
        }
    }

    /// Keep `floating` positioned against `reference`. Schedules a frame.
    pub fn track(&mut self, floating: NodeId, reference: NodeId, placement: Placement) {
        self.tracked.insert(floating, Tracked { reference, placement });
        self.request_frame();
    }

    pub fn untrack(&mut self, floating: NodeId) -> bool {
        self.last.remove(&floating);
        self.tracked.remove(&floating).is_some()
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Ask for a frame. Returns false when one is already pending.
    pub fn request_frame(&mut self) -> bool {
        if self.frame_pending {
            return false;
        }
        self.frame_pending = true;
        true
    }

    pub fn on_scroll(&mut self) -> bool {
        self.request_frame()
    }

    pub fn on_resize(&mut self) -> bool {
        self.request_frame()
    }

    pub fn frame_pending(&self) -> bool {
        self.frame_pending
    }

    pub fn frames_run(&self) -> u64 {
        self.frames_run
    }

    pub fn position_of(&self, floating: NodeId) -> Option<Position> {
        self.last.get(&floating).copied()
    }

    /// Reposition every tracked box if a frame was requested. Boxes whose
    /// geometry is unavailable are left where they were.
    pub fn run_frame(&mut self, source: &dyn LayoutSource) -> Vec<(NodeId, Position)> {
        if !self.frame_pending {
            return Vec::new();
        }
        self.frame_pending = false;
        self.frames_run += 1;

        let viewport = source.viewport();
        let mut moved = Vec::with_capacity(self.tracked.len());
        for (&floating, tracked) in &self.tracked {
            let (Some(reference), Some(size)) = (
                source.reference_rect(tracked.reference),
                source.floating_size(floating),
            ) else {
                continue;
            };
            let options = PositionOptions::new(tracked.placement, viewport);
            let position = self.positioner.position(size, reference, &options);
            self.last.insert(floating, position);
            moved.push((floating, position));
        }

        debug!("frame {}: repositioned {} box(es)", self.frames_run, moved.len());
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OverlayConfig;
    use crate::dom::layout::MonospaceLayout;

    struct FixedSource {
        reference: Rect,
        viewport: Rect,
    }

    impl LayoutSource for FixedSource {
        fn reference_rect(&self, _reference: NodeId) -> Option<Rect> {
            Some(self.reference)
        }

        fn floating_size(&self, _floating: NodeId) -> Option<Size> {
            Some(Size::new(100.0, 40.0))
        }

        fn viewport(&self) -> Rect {
            self.viewport
        }
    }

    fn ids(n: usize) -> Vec<NodeId> {
        let mut doc = Document::new();
        (0..n).map(|_| doc.create_element("div")).collect()
    }

    #[test]
    fn test_events_coalesce_into_one_frame() {
        let nodes = ids(4);
        let mut tracker = PositionTracker::new(OverlayPositioner::new(OverlayConfig::default()));
        tracker.track(nodes[0], nodes[1], Placement::BOTTOM);
        tracker.track(nodes[2], nodes[3], Placement::TOP);

        let mut scheduled = 0;
        for i in 0..50 {
            let fresh = if i % 2 == 0 { tracker.on_scroll() } else { tracker.on_resize() };
            if fresh {
                scheduled += 1;
            }
        }
        assert_eq!(scheduled, 0, "tracking already requested the frame");

        let source = FixedSource {
            reference: Rect::new(300.0, 300.0, 50.0, 20.0),
            viewport: Rect::new(0.0, 0.0, 1280.0, 800.0),
        };
        let moved = tracker.run_frame(&source);
        assert_eq!(moved.len(), 2);
        assert_eq!(tracker.frames_run(), 1);
        assert!(tracker.run_frame(&source).is_empty());
        assert_eq!(tracker.frames_run(), 1);

        assert!(tracker.on_scroll());
        assert!(!tracker.on_scroll());
        tracker.run_frame(&source);
        assert_eq!(tracker.frames_run(), 2);
    }

    #[test]
    fn test_untrack() {
        let nodes = ids(2);
        let mut tracker = PositionTracker::default();
        tracker.track(nodes[0], nodes[1], Placement::BOTTOM);
        assert_eq!(tracker.len(), 1);
        assert!(tracker.untrack(nodes[0]));
        assert!(!tracker.untrack(nodes[0]));
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_scrolling_flips_tooltip() {
        let mut doc = Document::new();
        let root = doc.root();
        // 40 lines of 80 chars; the marked word sits on line 20 (y = 400)
        doc.append_text(root, &"x".repeat(80 * 20)).unwrap();
        let marker = doc.append_element(root, "span").unwrap();
        doc.append_text(marker, "word").unwrap();
        doc.append_text(root, &"y".repeat(80 * 20)).unwrap();
        let tooltip = doc.create_element("div");

        let layout = MonospaceLayout::new(80);
        let mut tracker = PositionTracker::new(OverlayPositioner::new(OverlayConfig::default()));
        tracker.track(tooltip, marker, Placement::TOP);

        let mut source = DocumentLayout {
            doc: &doc,
            layout: &layout,
            viewport: Rect::new(0.0, 0.0, 1280.0, 700.0),
            sizes: BTreeMap::from([(tooltip, Size::new(120.0, 60.0))]),
        };
        let moved = tracker.run_frame(&source);
        assert_eq!(moved[0].1.placement, Placement::TOP);
        assert_eq!(moved[0].1.y, 400.0 - 60.0 - 8.0);

        // scroll the marker to the top of the viewport
        source.viewport.y = 390.0;
        tracker.on_scroll();
        let moved = tracker.run_frame(&source);
        assert_eq!(moved[0].1.placement, Placement::BOTTOM);
        assert_eq!(tracker.position_of(tooltip), Some(moved[0].1));
    }
}
