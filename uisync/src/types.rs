//! Common geometry, pixel and input types shared by the engine and its ports

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::AutomationError;

/// A point in absolute screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned screen rectangle. `x`/`y` is the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Edges are inclusive on the top/left and exclusive on the bottom/right.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Sub-rectangle expressed as fractions of this rectangle's size.
    pub fn fraction(&self, left: f64, top: f64, width: f64, height: f64) -> Rect {
        Rect::new(
            self.x + (f64::from(self.width) * left) as i32,
            self.y + (f64::from(self.height) * top) as i32,
            (f64::from(self.width) * width) as i32,
            (f64::from(self.height) * height) as i32,
        )
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}) {}x{}",
            self.x, self.y, self.width, self.height
        )
    }
}

/// A single template-match result. Produced fresh by every locate call and
/// never reused across polls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub score: f64,
}

impl Match {
    pub fn new(x: i32, y: i32, width: i32, height: i32, score: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score,
        }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.width, self.height)
    }

    pub fn center(&self) -> Point {
        self.bounds().center()
    }

    /// Two matches are at the same place when their top-left corners agree.
    pub fn same_position(&self, other: &Match) -> bool {
        self.x == other.x && self.y == other.y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Component-wise comparison: every channel within `tolerance`.
    pub fn matches(&self, target: &Rgb, tolerance: u8) -> bool {
        self.r.abs_diff(target.r) <= tolerance
            && self.g.abs_diff(target.g) <= tolerance
            && self.b.abs_diff(target.b) <= tolerance
    }
}

/// Row-major grid of sampled screen pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    width: u32,
    height: u32,
    pixels: Vec<Rgb>,
}

impl PixelGrid {
    pub fn new(width: u32, height: u32, pixels: Vec<Rgb>) -> Result<Self, AutomationError> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(AutomationError::InvalidArgument(format!(
                "pixel grid {width}x{height} needs {expected} pixels, got {}",
                pixels.len()
            )));
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Builds a grid by evaluating `f(x, y)` for every cell.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> Rgb) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Top-to-bottom pixels of one column; empty if `x` is out of range.
    pub fn column(&self, x: u32) -> Vec<Rgb> {
        (0..self.height).filter_map(|y| self.pixel(x, y)).collect()
    }
}

/// Identifier of a stored reference image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternId(String);

impl PatternId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PatternId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Enter,
    Escape,
    Down,
    Up,
    Tab,
    F5,
    Char(char),
}

/// A key press with an optional Ctrl modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyStroke {
    pub key: Key,
    pub ctrl: bool,
}

impl KeyStroke {
    pub const ENTER: KeyStroke = KeyStroke::plain(Key::Enter);
    pub const ESCAPE: KeyStroke = KeyStroke::plain(Key::Escape);
    pub const DOWN: KeyStroke = KeyStroke::plain(Key::Down);

    pub const fn plain(key: Key) -> Self {
        Self { key, ctrl: false }
    }

    pub const fn ctrl(c: char) -> Self {
        Self {
            key: Key::Char(c),
            ctrl: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
}

/// Opaque reference to a top-level window owned by the window host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowHandle {
    pub id: u64,
    pub title: String,
}

impl WindowHandle {
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
        }
    }
}
