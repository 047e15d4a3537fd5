//! Import configuration.
//!
//! Every field has a default, so a partial JSON document (or `{}`) is a
//! valid configuration.

use serde::{Deserialize, Serialize};

/// How sub-meshes are stitched together.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeshFaceMode {
    /// Weld identical vertices before culling and quad merging
    #[default]
    Join,
    /// Leave vertices untouched
    Split,
}

/// Shading flag written on every created face.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeshShading {
    Flat,
    #[default]
    Smooth,
}

impl MeshShading {
    pub fn is_smooth(self) -> bool {
        self == MeshShading::Smooth
    }
}

/// Strategy for block placements.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockInstancing {
    /// Each definition becomes one merged mesh shared by its placements
    #[default]
    SingleMesh,
    /// Each definition becomes a container placed by lightweight instances
    CollectionInstance,
}

/// Displacement method recorded on created materials.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisplacementMethod {
    #[default]
    Bump,
    Displacement,
    Both,
}

/// Tolerances for merging triangle pairs into quads.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuadMergeTolerance {
    /// Largest angle between the two triangle normals, in radians
    pub max_angle: f64,
    /// Smallest ratio between the shorter and the longer quad diagonal
    pub min_diagonal_ratio: f64,
}

impl Default for QuadMergeTolerance {
    fn default() -> Self {
        Self {
            max_angle: std::f64::consts::PI / 90.0,
            min_diagonal_ratio: 0.875,
        }
    }
}

/// Options recognized by an import pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Import named views as cameras
    pub filter_cameras: bool,
    /// Import materials; when off, objects get no material slot
    pub filter_materials: bool,
    /// Import plain geometry objects
    pub filter_objects: bool,
    /// Import block placements
    pub filter_blocks: bool,
    /// Import curve objects
    pub filter_curves: bool,

    pub mesh_face_mode: MeshFaceMode,
    pub mesh_shading: MeshShading,
    /// Weld distance used when merging baked block members
    pub mesh_join_threshold: f64,
    pub block_instancing: BlockInstancing,
    pub material_displacement: DisplacementMethod,

    /// Recreate every object even when its fingerprint matches
    pub force_reload: bool,

    pub quad_merge: QuadMergeTolerance,
    /// Tangent offset factor of the arc approximation
    pub arc_tangent_factor: f64,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            filter_cameras: false,
            filter_materials: true,
            filter_objects: true,
            filter_blocks: true,
            filter_curves: false,
            mesh_face_mode: MeshFaceMode::Join,
            mesh_shading: MeshShading::Smooth,
            mesh_join_threshold: 0.001,
            block_instancing: BlockInstancing::SingleMesh,
            material_displacement: DisplacementMethod::Bump,
            force_reload: false,
            quad_merge: QuadMergeTolerance::default(),
            arc_tangent_factor: 0.33,
        }
    }
}
