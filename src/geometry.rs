//! Geometry primitives for incision annotations.
//!
//! Two coordinate spaces exist: *pixel space* (bounds are the current
//! frozen-frame raster dimensions, which change per clip) and *normalized
//! space* (`[0,1] x [0,1]`, independent of raster size, used for the wire
//! payload so consumers are resolution-agnostic). A [`Line`] is always in
//! one declared space; [`Line::normalized`] and [`Line::denormalized`]
//! convert between them.

use serde::{Deserialize, Serialize};

// ============================================================================
// Rounding
// ============================================================================

/// Round to 2 decimal places (pixel values and lengths on the wire).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Round to 3 decimal places (time values on the wire).
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

// ============================================================================
// Point
// ============================================================================

/// A point with floating-point coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Round both coordinates to wire precision for pixel values.
    pub fn rounded2(&self) -> Self {
        Self {
            x: round2(self.x),
            y: round2(self.y),
        }
    }
}

// ============================================================================
// Line
// ============================================================================

/// A straight line segment between two points.
///
/// Immutable once appended to an annotation's completed set; only the
/// single in-progress line may mutate (its `end`) while a pointer gesture
/// is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub start: Point,
    pub end: Point,
}

impl Line {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    /// Euclidean length in the line's own coordinate space.
    pub fn length(&self) -> f64 {
        let dx = self.end.x - self.start.x;
        let dy = self.end.y - self.start.y;
        dx.hypot(dy)
    }

    /// Scale a pixel-space line into normalized `[0,1]` space.
    ///
    /// Inputs are in-bounds by construction of the annotation surface, so
    /// no clamping is performed. Normalized coordinates keep full
    /// precision.
    pub fn normalized(&self, box_width: f64, box_height: f64) -> Self {
        Self {
            start: Point::new(self.start.x / box_width, self.start.y / box_height),
            end: Point::new(self.end.x / box_width, self.end.y / box_height),
        }
    }

    /// Scale a normalized line back into pixel space.
    pub fn denormalized(&self, box_width: f64, box_height: f64) -> Self {
        Self {
            start: Point::new(self.start.x * box_width, self.start.y * box_height),
            end: Point::new(self.end.x * box_width, self.end.y * box_height),
        }
    }
}
