// Transform utilities for source (row-major, double precision) transforms.
//
// Source files store a 4x4 affine transform as 16 doubles, row by row, with
// the translation in the last column. glam matrices are column-major, so the
// rows are transposed on the way in.

use glam::{Mat4, Vec4};

/// Number of values in a flattened 4x4 source transform.
pub const XFORM_LEN: usize = 16;

/// Decode a flat row-major source transform into a target world matrix.
///
/// Only the translation column is multiplied by `unit_scale`; the rotation and
/// scale basis vectors are taken as-is.
pub fn xform_to_mat4(xform: &[f64; XFORM_LEN], unit_scale: f64) -> Mat4 {
    let mut rows = [[0.0f32; 4]; 4];
    for (r, row) in rows.iter_mut().enumerate() {
        for (c, value) in row.iter_mut().enumerate() {
            let mut v = xform[r * 4 + c];
            if c == 3 && r < 3 {
                v *= unit_scale;
            }
            *value = v as f32;
        }
    }
    Mat4::from_cols(
        Vec4::from_array(rows[0]),
        Vec4::from_array(rows[1]),
        Vec4::from_array(rows[2]),
        Vec4::from_array(rows[3]),
    )
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    const IDENTITY: [f64; XFORM_LEN] = [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ];

    #[test]
    fn test_identity_xform() {
        assert_eq!(xform_to_mat4(&IDENTITY, 1.0), Mat4::IDENTITY);
    }

    #[test]
    fn test_row_major_translation() {
        let mut xform = IDENTITY;
        xform[3] = 10.0;
        xform[7] = 20.0;
        xform[11] = 30.0;

        let m = xform_to_mat4(&xform, 1.0);
        let origin = m.transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(10.0, 20.0, 30.0)).length() < 0.001);
    }

    #[test]
    fn test_only_translation_is_scaled() {
        let mut xform = IDENTITY;
        xform[0] = 2.0; // x scale
        xform[3] = 1000.0;

        let m = xform_to_mat4(&xform, 0.001);
        assert!((m.w_axis.x - 1.0).abs() < 0.0001);
        assert!((m.x_axis.x - 2.0).abs() < 0.0001);
    }

    #[test]
    fn test_rotation_rows() {
        // 90 degrees around Z: row-major [[0,-1,0],[1,0,0],[0,0,1]]
        let xform = [
            0.0, -1.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        let m = xform_to_mat4(&xform, 1.0);
        let v = m.transform_vector3(Vec3::X);
        assert!((v - Vec3::Y).length() < 0.001);
    }
}
