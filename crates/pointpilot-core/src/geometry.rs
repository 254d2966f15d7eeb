//! Screen coordinates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A pixel position in screen space.
///
/// The cursor sensor and the screen matcher must report points in the same
/// coordinate space. Negative values are allowed (multi-monitor layouts).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Per-axis offset from `self` to `other`.
    pub fn delta_to(self, other: Point) -> (i32, i32) {
        (other.x - self.x, other.y - self.y)
    }

    /// Chebyshev distance, the larger of the two axis offsets.
    pub fn chebyshev(self, other: Point) -> i32 {
        let (dx, dy) = self.delta_to(other);
        dx.abs().max(dy.abs())
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_and_distance() {
        let a = Point::new(100, 100);
        let b = Point::new(90, 130);
        assert_eq!(a.delta_to(b), (-10, 30));
        assert_eq!(a.chebyshev(b), 30);
        assert_eq!(a.chebyshev(a), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Point::new(-3, 7).to_string(), "(-3,7)");
    }
}
