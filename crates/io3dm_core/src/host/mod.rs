//! Capability interface to the host scene graph.
//!
//! The import core never touches host state directly. Everything it creates,
//! finds, links or protects from garbage collection goes through
//! [`SceneHost`], which keeps the pipeline testable against [`MemoryHost`].

mod memory;

pub use memory::MemoryHost;

use std::fmt;

use crate::curve::Curve;
use crate::mesh::Mesh;
use crate::scene::{
    Camera, CameraId, Container, ContainerId, CurveId, Material, MaterialId, MeshId, Object,
    ObjectData, ObjectId, ProjectState, Resource,
};

/// What get-or-create does when a resource with the name already exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Overwrite {
    /// Return the existing resource
    #[default]
    Keep,
    /// Rename the existing resource to `<name>.old` and create a new one
    Rename,
    /// Delete the existing resource and create a new one
    Replace,
}

/// Severity of a message reported to the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Scene-graph primitives the import pipeline needs from its host.
///
/// Names are unique per resource kind. Link and unlink calls are
/// idempotent: linking an already linked child or unlinking a missing one
/// is a no-op.
pub trait SceneHost {
    /// Meters per host scene unit.
    fn scene_unit_scale(&self) -> f64;

    /// Surface a message to the user.
    fn report(&mut self, severity: Severity, message: &str);

    // Get-or-create by name

    fn get_or_create_container(&mut self, name: &str, overwrite: Overwrite) -> ContainerId;
    fn get_or_create_material(&mut self, name: &str, overwrite: Overwrite) -> MaterialId;
    fn get_or_create_mesh(&mut self, name: &str, overwrite: Overwrite) -> MeshId;
    fn get_or_create_curve(&mut self, name: &str, overwrite: Overwrite) -> CurveId;
    fn get_or_create_camera(&mut self, name: &str, overwrite: Overwrite) -> CameraId;
    /// A kept object keeps its data; a new one is created with `data`.
    fn get_or_create_object(
        &mut self,
        name: &str,
        data: ObjectData,
        overwrite: Overwrite,
    ) -> ObjectId;

    // Lookups

    fn find_container(&self, name: &str) -> Option<ContainerId>;
    fn find_material(&self, name: &str) -> Option<MaterialId>;
    fn find_mesh(&self, name: &str) -> Option<MeshId>;
    fn find_object(&self, name: &str) -> Option<ObjectId>;

    /// Current name of a resource.
    fn name_of(&self, resource: Resource) -> Option<&str>;

    // Data access

    fn container(&self, id: ContainerId) -> Option<&Container>;
    fn material(&self, id: MaterialId) -> Option<&Material>;
    fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material>;
    fn mesh(&self, id: MeshId) -> Option<&Mesh>;
    fn mesh_mut(&mut self, id: MeshId) -> Option<&mut Mesh>;
    fn curve(&self, id: CurveId) -> Option<&Curve>;
    fn curve_mut(&mut self, id: CurveId) -> Option<&mut Curve>;
    fn camera(&self, id: CameraId) -> Option<&Camera>;
    fn camera_mut(&mut self, id: CameraId) -> Option<&mut Camera>;
    fn object(&self, id: ObjectId) -> Option<&Object>;
    fn object_mut(&mut self, id: ObjectId) -> Option<&mut Object>;

    // Hierarchy

    fn link_container(&mut self, parent: ContainerId, child: ContainerId);
    fn link_object(&mut self, container: ContainerId, object: ObjectId);
    fn unlink_object(&mut self, container: ContainerId, object: ObjectId);

    /// Unlink every object and child container. With `recursive`, child
    /// containers are emptied first.
    fn empty_container(&mut self, container: ContainerId, recursive: bool);

    fn link_to_scene(&mut self, container: ContainerId);
    fn unlink_from_scene(&mut self, container: ContainerId);
    fn is_in_scene(&self, container: ContainerId) -> bool;

    // Garbage collection

    /// Protect a resource from `purge_orphans` while it has no users.
    fn set_keep_alive(&mut self, resource: Resource, keep_alive: bool);

    /// Delete every resource without users, repeating until nothing else is
    /// freed. Returns the number of deleted resources.
    fn purge_orphans(&mut self) -> usize;

    // Project state

    fn project_state(&self, project: ContainerId) -> Option<&ProjectState>;
    /// State of a project, created empty on first access.
    fn project_state_mut(&mut self, project: ContainerId) -> &mut ProjectState;
}
