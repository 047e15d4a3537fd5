//! Target curve representation: a container of poly and NURBS splines.

use io3dm_math::Vec4;

use crate::scene::MaterialId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SplineKind {
    Poly,
    Nurbs,
}

/// One spline segment. Points are (x, y, z, weight) in target units.
#[derive(Clone, Debug, PartialEq)]
pub struct Spline {
    pub kind: SplineKind,
    pub points: Vec<Vec4>,
    pub cyclic: bool,
    /// NURBS order (degree + 1); unused for poly splines
    pub order: u32,
    /// Clamp the spline to its end points
    pub use_endpoint: bool,
}

impl Spline {
    pub fn poly(points: Vec<Vec4>, cyclic: bool) -> Self {
        Self {
            kind: SplineKind::Poly,
            points,
            cyclic,
            order: 2,
            use_endpoint: false,
        }
    }

    pub fn nurbs(points: Vec<Vec4>, order: u32, cyclic: bool) -> Self {
        Self {
            kind: SplineKind::Nurbs,
            points,
            cyclic,
            order,
            use_endpoint: true,
        }
    }
}

/// Curve data shared by curve objects.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Curve {
    pub splines: Vec<Spline>,
    pub materials: Vec<MaterialId>,
}

impl Curve {
    pub fn is_empty(&self) -> bool {
        self.splines.is_empty()
    }

    pub fn point_count(&self) -> usize {
        self.splines.iter().map(|s| s.points.len()).sum()
    }
}
