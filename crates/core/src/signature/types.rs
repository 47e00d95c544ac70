//! Signature and screen geometry types.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// What a signature looks for on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pattern {
    /// Recognized text. Each entry is a regular expression; any of them matching is a hit.
    Text { any_of: Vec<String> },
    /// A named visual feature known to the recognition host.
    Feature { name: String },
}

/// A recognizable on-screen condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signature {
    /// Stable identifier used in logs, events and failure reasons.
    pub id: String,
    #[serde(flatten)]
    pub pattern: Pattern,
    /// Restricts the search to part of the screen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
}

impl Signature {
    /// Text signature matching any of the given patterns.
    pub fn text<I, S>(id: impl Into<String>, any_of: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            pattern: Pattern::Text {
                any_of: any_of.into_iter().map(Into::into).collect(),
            },
            region: None,
        }
    }

    /// Visual feature signature.
    pub fn feature(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pattern: Pattern::Feature { name: name.into() },
            region: None,
        }
    }

    /// Returns a copy restricted to `region`.
    pub fn within(mut self, region: Region) -> Self {
        self.region = Some(region);
        self
    }

    /// Compiles the text alternatives. Feature signatures yield an empty list.
    pub fn compile_text(&self) -> Result<Vec<Regex>, regex_lite::Error> {
        match &self.pattern {
            Pattern::Text { any_of } => any_of.iter().map(|p| Regex::new(p)).collect(),
            Pattern::Feature { .. } => Ok(Vec::new()),
        }
    }
}

/// A search region expressed as fractions of the screen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn full() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    pub fn bottom_right() -> Self {
        Self::new(0.5, 0.5, 0.5, 0.5)
    }

    pub fn top_right() -> Self {
        Self::new(0.5, 0.0, 0.5, 0.5)
    }

    /// Whether every edge lies inside the unit square.
    pub fn is_normalized(&self) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.width > 0.0
            && self.height > 0.0
            && self.x + self.width <= 1.0 + f32::EPSILON
            && self.y + self.height <= 1.0 + f32::EPSILON
    }

    /// Whether an absolute point falls inside this region on a screen of the given size.
    pub fn contains(&self, point: (i32, i32), screen: (u32, u32)) -> bool {
        let (w, h) = (screen.0 as f32, screen.1 as f32);
        let (px, py) = (point.0 as f32, point.1 as f32);
        px >= self.x * w
            && px <= (self.x + self.width) * w
            && py >= self.y * h
            && py <= (self.y + self.height) * h
    }
}

/// Absolute pixel box where a signature was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Location {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Click point.
    pub fn center(&self) -> (i32, i32) {
        (
            self.x + (self.width / 2) as i32,
            self.y + (self.height / 2) as i32,
        )
    }

    /// Click point shifted by an optional offset.
    pub fn target(&self, offset: Option<Offset>) -> (i32, i32) {
        let (cx, cy) = self.center();
        match offset {
            Some(o) => (cx + o.dx, cy + o.dy),
            None => (cx, cy),
        }
    }
}

/// Pixel offset applied to a click.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offset {
    pub dx: i32,
    pub dy: i32,
}
