//! Curve conversion.
//!
//! Each source curve appends one spline per segment to a shared target
//! curve; poly-curves recurse over their segments. Arcs are approximated
//! by a clamped 4-point NURBS of order 3 whose inner points sit along the
//! end tangents.

use glam::{DVec3, DVec4};
use io3dm_math::Vec4;

use crate::curve::{Curve, Spline};
use crate::source::SourceCurve;

/// Convert a source curve. Returns `None` when no spline could be built.
pub fn convert_curve(curve: &SourceCurve, unit_scale: f64, arc_tangent_factor: f64) -> Option<Curve> {
    let mut target = Curve::default();
    append_curve(curve, unit_scale, arc_tangent_factor, &mut target);
    (!target.is_empty()).then_some(target)
}

fn append_curve(curve: &SourceCurve, scale: f64, arc_factor: f64, out: &mut Curve) {
    match curve {
        SourceCurve::Line { from, to } => {
            out.splines
                .push(Spline::poly(vec![point(*from, scale), point(*to, scale)], false));
        }
        SourceCurve::Polyline { points, closed } => {
            // Closed polylines repeat the first point; the spline is cyclic instead
            let count = if *closed {
                points.len().saturating_sub(1)
            } else {
                points.len()
            };
            if count < 2 {
                log::debug!("Skipping polyline with {} points", count);
                return;
            }
            let points = points[..count].iter().map(|p| point(*p, scale)).collect();
            out.splines.push(Spline::poly(points, *closed));
        }
        SourceCurve::Nurbs {
            points,
            order,
            closed,
        } => {
            if points.len() < 2 {
                log::debug!("Skipping NURBS curve with {} points", points.len());
                return;
            }
            let points = points.iter().map(|p| weighted_point(*p, scale)).collect();
            out.splines.push(Spline::nurbs(points, *order, *closed));
        }
        SourceCurve::Arc { .. } => {
            if let Some(spline) = arc_spline(curve, scale, arc_factor) {
                out.splines.push(spline);
            }
        }
        SourceCurve::PolyCurve { segments } => {
            for segment in segments {
                append_curve(segment, scale, arc_factor, out);
            }
        }
    }
}

fn point(p: DVec3, scale: f64) -> Vec4 {
    (p * scale).extend(1.0).as_vec4()
}

/// Scale the position; the weight stays as is.
fn weighted_point(p: DVec4, scale: f64) -> Vec4 {
    (p.truncate() * scale).extend(p.w).as_vec4()
}

fn arc_spline(curve: &SourceCurve, scale: f64, factor: f64) -> Option<Spline> {
    let SourceCurve::Arc {
        center,
        start,
        end,
        normal,
        ..
    } = curve
    else {
        return None;
    };

    let (cpt, spt, ept) = (*center * scale, *start * scale, *end * scale);
    let r1 = (spt - cpt).normalize_or_zero();
    let r2 = (ept - cpt).normalize_or_zero();
    if r1 == DVec3::ZERO || r2 == DVec3::ZERO {
        log::debug!("Skipping zero-radius arc");
        return None;
    }

    let mut axis = normal.normalize_or_zero();
    if axis == DVec3::ZERO {
        axis = r1.cross(r2).normalize_or_zero();
    }
    if axis == DVec3::ZERO {
        axis = DVec3::Z;
    }

    let t1 = axis.cross(r1);
    let t2 = axis.cross(r2);
    let d = curve.length() * scale * factor;

    let points = [spt, spt + t1 * d, ept - t2 * d, ept]
        .iter()
        .map(|p| p.extend(1.0).as_vec4())
        .collect();
    Some(Spline::nurbs(points, 3, false))
}
