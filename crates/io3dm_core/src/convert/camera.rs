//! Named view to camera conversion.

use io3dm_math::{track_quat, Mat4};

use crate::scene::Camera;
use crate::source::NamedView;

/// Camera data and world transform for a named view.
///
/// The camera sits at the scaled view location and looks down its local
/// -Z axis along the view direction, with +Y kept upright.
pub fn convert_view(view: &NamedView, unit_scale: f64) -> (Camera, Mat4) {
    let location = (view.location * unit_scale).as_vec3();
    let rotation = track_quat(view.direction.as_vec3());
    let camera = Camera {
        lens: view.lens_length as f32,
    };
    (camera, Mat4::from_rotation_translation(rotation, location))
}
