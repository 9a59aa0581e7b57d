//! Numeric ranges used by the x-axis and the time conductor.

use serde::{Deserialize, Serialize};

/// Axis range `{min, max}`. `min <= max` is the caller's responsibility.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// Inclusive on both ends.
    #[inline]
    pub fn contains(&self, x: f64) -> bool {
        x >= self.min && x <= self.max
    }

    /// Range extended backwards by `windows` times its own width.
    ///
    /// With `windows = 1.0` this keeps one extra window of history before `min`.
    pub fn retention_window(&self, windows: f64) -> Self {
        Self {
            min: self.min - windows * self.width(),
            max: self.max,
        }
    }
}

impl From<Bounds> for Range {
    fn from(b: Bounds) -> Self {
        Self {
            min: b.start,
            max: b.end,
        }
    }
}

impl From<Range> for [f64; 2] {
    fn from(r: Range) -> Self {
        [r.min, r.max]
    }
}

impl From<[f64; 2]> for Range {
    fn from(a: [f64; 2]) -> Self {
        Self { min: a[0], max: a[1] }
    }
}

/// Time conductor bounds `{start, end}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub start: f64,
    pub end: f64,
}

impl Bounds {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start <= self.end
    }
}
