//! Integer point coordinates in global image space.

use serde::{Deserialize, Serialize};

/// A pixel coordinate annotated by the user.
///
/// Identity is structural: two points are the same iff both coordinates
/// are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Key for raster order (top to bottom, then left to right).
    pub fn raster_key(&self) -> (i32, i32) {
        (self.y, self.x)
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_structural_identity() {
        let mut set = HashSet::new();
        assert!(set.insert(Point::new(10, 20)));
        assert!(!set.insert(Point::from((10, 20))));
        assert!(set.insert(Point::new(20, 10)));
    }

    #[test]
    fn test_raster_order() {
        let mut points = vec![Point::new(5, 2), Point::new(1, 3), Point::new(9, 1)];
        points.sort_by_key(Point::raster_key);
        assert_eq!(
            points,
            vec![Point::new(9, 1), Point::new(5, 2), Point::new(1, 3)]
        );
    }
}
