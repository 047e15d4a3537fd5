use glam::{Mat3, Quat, Vec3};

/// Rotation that points the local -Z axis along `direction` while keeping the
/// local +Y axis as close to world +Z as possible.
///
/// This is the camera convention of the target scene (look down -Z, up +Y).
/// When `direction` is parallel to world Z the world +Y axis is used as the
/// up reference instead. A zero direction yields the identity.
pub fn track_quat(direction: Vec3) -> Quat {
    let forward = direction.normalize_or_zero();
    if forward == Vec3::ZERO {
        return Quat::IDENTITY;
    }

    let z_axis = -forward;
    let reference = if z_axis.cross(Vec3::Z).length_squared() < 1e-8 {
        Vec3::Y
    } else {
        Vec3::Z
    };

    // Project the up reference onto the plane orthogonal to the track axis
    let y_axis = (reference - z_axis * reference.dot(z_axis)).normalize();
    let x_axis = y_axis.cross(z_axis);

    Quat::from_mat3(&Mat3::from_cols(x_axis, y_axis, z_axis)).normalize()
}
