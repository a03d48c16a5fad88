//! Floating box placement next to a reference box.
//!
//! Twelve placements (side × alignment). The initial position is adjusted in
//! two stages: flip to the opposite side when that strictly reduces the
//! number of overflowing edges, then shift along the cross axis to clear the
//! boundary padding. Narrow viewports collapse placements first.
pub mod tracker;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::OverlayConfig;
use crate::geometry::{Rect, Size};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Top => Side::Bottom,
            Side::Bottom => Side::Top,
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    fn is_vertical(&self) -> bool {
        matches!(self, Side::Top | Side::Bottom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Center,
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub side: Side,
    pub alignment: Alignment,
}

impl Placement {
    pub const TOP: Placement = Placement::new(Side::Top, Alignment::Center);
    pub const BOTTOM: Placement = Placement::new(Side::Bottom, Alignment::Center);
    pub const LEFT: Placement = Placement::new(Side::Left, Alignment::Center);
    pub const RIGHT: Placement = Placement::new(Side::Right, Alignment::Center);

    pub const fn new(side: Side, alignment: Alignment) -> Self {
        Self { side, alignment }
    }

    /// All twelve placements.
    pub fn all() -> Vec<Placement> {
        let mut out = Vec::with_capacity(12);
        for side in [Side::Top, Side::Bottom, Side::Left, Side::Right] {
            for alignment in [Alignment::Center, Alignment::Start, Alignment::End] {
                out.push(Placement::new(side, alignment));
            }
        }
        out
    }

    pub fn opposite(&self) -> Placement {
        Placement::new(self.side.opposite(), self.alignment)
    }

    pub fn base(&self) -> Placement {
        Placement::new(self.side, Alignment::Center)
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.side {
            Side::Top => "top",
            Side::Bottom => "bottom",
            Side::Left => "left",
            Side::Right => "right",
        };
        match self.alignment {
            Alignment::Center => write!(f, "{side}"),
            Alignment::Start => write!(f, "{side}-start"),
            Alignment::End => write!(f, "{side}-end"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown placement: {0}")]
pub struct ParsePlacementError(String);

impl FromStr for Placement {
    type Err = ParsePlacementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (side, alignment) = match s.trim().split_once('-') {
            Some((side, "start")) => (side, Alignment::Start),
            Some((side, "end")) => (side, Alignment::End),
            Some(_) => return Err(ParsePlacementError(s.to_string())),
            None => (s.trim(), Alignment::Center),
        };
        let side = match side {
            "top" => Side::Top,
            "bottom" => Side::Bottom,
            "left" => Side::Left,
            "right" => Side::Right,
            _ => return Err(ParsePlacementError(s.to_string())),
        };
        Ok(Placement::new(side, alignment))
    }
}

impl Serialize for Placement {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Placement {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub placement: Placement,
}

impl Position {
    pub fn rect(&self, size: Size) -> Rect {
        Rect::new(self.x, self.y, size.width, size.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionOptions {
    pub placement: Placement,
    /// Collision boundary, normally the viewport.
    pub boundary: Rect,
    pub flip: bool,
    pub shift: bool,
}

impl PositionOptions {
    pub fn new(placement: Placement, boundary: Rect) -> Self {
        Self {
            placement,
            boundary,
            flip: true,
            shift: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OverlayPositioner {
    config: OverlayConfig,
}

impl OverlayPositioner {
    pub fn new(config: OverlayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    /// Placement actually used at `viewport_width`: mobile widths collapse
    /// top/left/right to bottom, tablet widths drop start/end alignment.
    pub fn responsive_placement(&self, requested: Placement, viewport_width: f64) -> Placement {
        if viewport_width < self.config.mobile_breakpoint {
            if requested.side == Side::Bottom {
                requested
            } else {
                Placement::BOTTOM
            }
        } else if viewport_width < self.config.tablet_breakpoint {
            requested.base()
        } else {
            requested
        }
    }

    /// Initial coordinates for `placement`, before collision handling.
    pub fn compute(&self, floating: Size, reference: Rect, placement: Placement) -> (f64, f64) {
        let gap = self.config.offset;
        let cross_x = match placement.alignment {
            Alignment::Center => reference.x + reference.width / 2.0 - floating.width / 2.0,
            Alignment::Start => reference.x,
            Alignment::End => reference.right() - floating.width,
        };
        let cross_y = match placement.alignment {
            Alignment::Center => reference.y + reference.height / 2.0 - floating.height / 2.0,
            Alignment::Start => reference.y,
            Alignment::End => reference.bottom() - floating.height,
        };

        match placement.side {
            Side::Top => (cross_x, reference.y - floating.height - gap),
            Side::Bottom => (cross_x, reference.bottom() + gap),
            Side::Left => (reference.x - floating.width - gap, cross_y),
            Side::Right => (reference.right() + gap, cross_y),
        }
    }

    /// Edges of the box at `(x, y)` that cross the padded boundary.
    pub fn overflow_count(&self, x: f64, y: f64, floating: Size, boundary: Rect) -> usize {
        let pad = self.config.padding;
        [
            y < boundary.y + pad,
            y + floating.height > boundary.bottom() - pad,
            x < boundary.x + pad,
            x + floating.width > boundary.right() - pad,
        ]
        .into_iter()
        .filter(|&over| over)
        .count()
    }

    pub fn position(&self, floating: Size, reference: Rect, options: &PositionOptions) -> Position {
        let boundary = options.boundary;
        let mut placement = self.responsive_placement(options.placement, boundary.width);
        let (mut x, mut y) = self.compute(floating, reference, placement);

        if options.flip {
            let overflow = self.overflow_count(x, y, floating, boundary);
            if overflow > 0 {
                let flipped = placement.opposite();
                let (fx, fy) = self.compute(floating, reference, flipped);
                if self.overflow_count(fx, fy, floating, boundary) < overflow {
                    placement = flipped;
                    (x, y) = (fx, fy);
                }
            }
        }

        if options.shift {
            let pad = self.config.padding;
            if placement.side.is_vertical() {
                x = shift_axis(x, floating.width, boundary.x + pad, boundary.right() - pad);
            } else {
                y = shift_axis(y, floating.height, boundary.y + pad, boundary.bottom() - pad);
            }
        }

        Position { x, y, placement }
    }
}

/// Move `start` so `[start, start + len]` fits in `[min, max]`; the leading
/// edge wins when it cannot fit.
fn shift_axis(start: f64, len: f64, min: f64, max: f64) -> f64 {
    let mut start = start;
    if start + len > max {
        start = max - len;
    }
    if start < min {
        start = min;
    }
    start
}
