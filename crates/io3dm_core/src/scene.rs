//! Target scene types.
//!
//! These are the host-side entities an import produces. The host owns them
//! and their names; the core refers to them through typed handles.

use std::collections::BTreeMap;

use io3dm_math::{Mat4, Vec4};
use uuid::Uuid;

use crate::fingerprint::FingerprintTable;
use crate::options::DisplacementMethod;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);
    };
}

handle!(
    /// Handle to a container (project, layer, block definition).
    ContainerId
);
handle!(
    /// Handle to a scene object.
    ObjectId
);
handle!(
    /// Handle to a material.
    MaterialId
);
handle!(
    /// Handle to mesh data.
    MeshId
);
handle!(
    /// Handle to curve data.
    CurveId
);
handle!(
    /// Handle to camera data.
    CameraId
);

/// Any host resource, used for keep-alive flags and diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    Container(ContainerId),
    Object(ObjectId),
    Material(MaterialId),
    Mesh(MeshId),
    Curve(CurveId),
    Camera(CameraId),
}

/// A surface shader with a single base color.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    /// Base color (RGB, 0-1) with alpha = 1 - transparency
    pub base_color: Vec4,

    /// Displacement method of the shader output
    pub displacement: DisplacementMethod,

    /// Identifier of the source material (nil for the default material)
    pub source_id: Uuid,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            displacement: DisplacementMethod::Bump,
            source_id: Uuid::nil(),
        }
    }
}

/// Camera data.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    /// Focal length in millimeters (35mm equivalent)
    pub lens: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self { lens: 50.0 }
    }
}

/// What an object displays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ObjectData {
    #[default]
    Empty,
    Mesh(MeshId),
    Curve(CurveId),
    Camera(CameraId),
    /// Instance of a container (native block placement)
    Instance(ContainerId),
}

/// Source identifier property key.
pub const PROP_SOURCE_ID: &str = "io3dm_id";
/// Source name property key.
pub const PROP_SOURCE_NAME: &str = "io3dm_name";
/// Fingerprint property key.
pub const PROP_FINGERPRINT: &str = "io3dm_fingerprint";

/// A placed scene object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Object {
    pub data: ObjectData,

    /// World transform
    pub matrix_world: Mat4,

    /// Custom string properties
    pub properties: BTreeMap<String, String>,
}

impl Object {
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// A container of objects and child containers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Container {
    pub children: Vec<ContainerId>,
    pub objects: Vec<ObjectId>,
}

/// Per-project state persisted by the host between imports.
///
/// The fingerprint tables are double-buffered: `current()` holds the
/// objects of the previous import, `next()` collects the objects of the
/// pass in progress, and `swap()` promotes the latter.
#[derive(Clone, Debug, Default)]
pub struct ProjectState {
    tables: [FingerprintTable; 2],
    active: usize,

    /// Synthetic top layer container
    pub layers: Option<ContainerId>,
    /// Camera container
    pub cameras: Option<ContainerId>,
    /// Block definition container
    pub blocks: Option<ContainerId>,
}

impl ProjectState {
    /// Table written by the previous import.
    pub fn current(&self) -> &FingerprintTable {
        &self.tables[self.active]
    }

    pub fn current_mut(&mut self) -> &mut FingerprintTable {
        &mut self.tables[self.active]
    }

    /// Table collecting the pass in progress.
    pub fn next(&self) -> &FingerprintTable {
        &self.tables[1 - self.active]
    }

    pub fn next_mut(&mut self) -> &mut FingerprintTable {
        &mut self.tables[1 - self.active]
    }

    /// Promote `next()` to `current()` and clear the old table.
    pub fn swap(&mut self) {
        self.tables[self.active].clear();
        self.active = 1 - self.active;
    }

    /// Fold the pass in progress back into `current()` after a failed pass.
    ///
    /// Objects recorded by the failed pass come first, followed by the
    /// previous objects it did not restore, so the next reload can still
    /// restore both.
    pub fn merge_next(&mut self) {
        let mut merged = std::mem::take(self.next_mut());
        for (fingerprint, object) in self.current().iter() {
            merged.insert(fingerprint, object);
        }
        *self.current_mut() = merged;
    }

    /// Every object any table refers to.
    pub fn referenced_objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.tables.iter().flat_map(|t| t.objects())
    }

    /// Every container the state refers to.
    pub fn referenced_containers(&self) -> impl Iterator<Item = ContainerId> + '_ {
        [self.layers, self.cameras, self.blocks].into_iter().flatten()
    }
}
