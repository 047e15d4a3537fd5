//! Geometry converter.
//!
//! Pure functions from one source geometry payload to target mesh or curve
//! data in target units. Instance references are resolved upstream, and
//! unsupported kinds yield `None` for the caller to skip.

mod camera;
mod curve;
mod mesh;

pub use camera::convert_view;
pub use curve::convert_curve;
pub use mesh::convert_meshes;

use crate::curve::Curve;
use crate::mesh::Mesh;
use crate::options::ImportOptions;
use crate::source::{Geometry, SourceMesh};

/// Result of converting one geometry payload.
#[derive(Clone, Debug)]
pub enum Converted {
    Mesh(Mesh),
    Curve(Curve),
}

/// Convert a geometry payload, scaling every coordinate by `unit_scale`.
pub fn convert(geometry: &Geometry, unit_scale: f64, options: &ImportOptions) -> Option<Converted> {
    let mesh = |parts: Vec<&SourceMesh>| {
        let mut mesh = convert_meshes(
            parts,
            unit_scale,
            options.mesh_face_mode,
            &options.quad_merge,
        );
        mesh.set_smooth(options.mesh_shading.is_smooth());
        (!mesh.is_empty()).then_some(Converted::Mesh(mesh))
    };

    match geometry {
        Geometry::Mesh(source) => mesh(vec![source]),
        Geometry::Extrusion { mesh: source } => mesh(source.iter().collect()),
        Geometry::Brep { faces } => mesh(faces.iter().flatten().collect()),
        Geometry::SubD { control_net } => mesh(vec![control_net]),
        Geometry::Curve { curve } => {
            convert_curve(curve, unit_scale, options.arc_tangent_factor).map(Converted::Curve)
        }
        Geometry::InstanceReference { .. } | Geometry::Unsupported { .. } => None,
    }
}
