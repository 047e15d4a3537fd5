// Re-export glam for convenience
pub use glam::*;

// io3dm math types
mod bounds;
mod orient;
mod transform;

pub use bounds::Bounds;
pub use orient::track_quat;
pub use transform::{xform_to_mat4, XFORM_LEN};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dvec3_to_vec3() {
        let v = DVec3::new(1.0, 2.0, 3.0).as_vec3();
        assert_eq!(v, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
    }
}
