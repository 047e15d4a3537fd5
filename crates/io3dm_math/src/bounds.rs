use glam::Vec3;

/// Axis-aligned bounds of target geometry.
///
/// An empty box has `min > max` on every axis, so extending it with the
/// first point yields a degenerate box around that point.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::empty()
    }
}

impl Bounds {
    /// Create an empty box (contains nothing).
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    /// Create the tightest box around a set of points.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Self {
        let mut bounds = Self::empty();
        for p in points {
            bounds.extend(*p);
        }
        bounds
    }

    /// Grow the box to contain `point`.
    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_from_points() {
        let points = [
            Vec3::new(-1.0, -2.0, -3.0),
            Vec3::new(4.0, 5.0, 6.0),
            Vec3::ZERO,
        ];
        let bounds = Bounds::from_points(&points);

        assert_eq!(bounds.min, Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(bounds.max, Vec3::new(4.0, 5.0, 6.0));
        assert!(!bounds.is_empty());
    }

    #[test]
    fn test_empty_bounds() {
        let bounds = Bounds::empty();
        assert!(bounds.is_empty());

        let mut grown = bounds;
        grown.extend(Vec3::ONE);
        assert!(!grown.is_empty());
        assert_eq!(grown.min, grown.max);
    }
}
