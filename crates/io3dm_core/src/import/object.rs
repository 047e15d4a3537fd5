//! Per-pass build context and target object creation.

use uuid::Uuid;

use crate::convert::{convert, Converted};
use crate::fingerprint::Fingerprint;
use crate::host::{Overwrite, SceneHost};
use crate::material::{MaterialTable, ResolvedMaterial};
use crate::options::ImportOptions;
use crate::scene::{
    ObjectData, ObjectId, PROP_FINGERPRINT, PROP_SOURCE_ID, PROP_SOURCE_NAME,
};
use crate::source::{Geometry, SourceFile, SourceObject};

use super::ImportReport;

/// State shared by every stage of one import pass.
pub struct BuildContext<'a> {
    pub file: &'a SourceFile,
    pub options: &'a ImportOptions,
    /// Project name, used as the prefix of every created resource
    pub project: String,
    /// Source units to target units
    pub unit_scale: f64,
    pub materials: MaterialTable,
    pub report: ImportReport,
}

impl<'a> BuildContext<'a> {
    pub fn new(file: &'a SourceFile, options: &'a ImportOptions, project: &str) -> Self {
        Self {
            file,
            options,
            project: project.to_string(),
            unit_scale: 1.0,
            materials: MaterialTable::new(options),
            report: ImportReport::default(),
        }
    }

    /// `<project>:<name>`
    pub fn name(&self, name: &str) -> String {
        format!("{}:{}", self.project, name)
    }

    /// `<project>:<uuid>`
    pub fn object_name(&self, id: Uuid) -> String {
        self.name(&id.to_string())
    }

    /// `<project>#<suffix>` for the project's child containers.
    pub fn container_name(&self, suffix: &str) -> String {
        format!("{}#{}", self.project, suffix)
    }

    /// Whether the options import this kind of (non-instance) geometry.
    pub fn accepts(&self, geometry: &Geometry) -> bool {
        match geometry {
            Geometry::Curve { .. } => self.options.filter_curves,
            Geometry::InstanceReference { .. } => self.options.filter_blocks,
            Geometry::Unsupported { .. } => false,
            _ => self.options.filter_objects,
        }
    }
}

/// Convert `object` and create a target object named `name` for it.
///
/// Returns `None` when the geometry yields nothing (unsupported kinds,
/// empty meshes). The existing object and data of the same name are kept
/// aside under a `.old` name.
pub fn create_object(
    host: &mut dyn SceneHost,
    ctx: &BuildContext<'_>,
    object: &SourceObject,
    material: Option<&ResolvedMaterial>,
    name: &str,
) -> Option<ObjectId> {
    let converted = match convert(&object.geometry, ctx.unit_scale, ctx.options) {
        Some(converted) => converted,
        None => {
            log::debug!(
                "Skipping {:?} object {}",
                object.geometry.object_type(),
                object.id()
            );
            return None;
        }
    };

    let data = match converted {
        Converted::Mesh(mut mesh) => {
            if let Some(material) = material {
                mesh.material_slot(material.id);
            }
            let id = host.get_or_create_mesh(name, Overwrite::Rename);
            if let Some(target) = host.mesh_mut(id) {
                *target = mesh;
            }
            ObjectData::Mesh(id)
        }
        Converted::Curve(mut curve) => {
            if let Some(material) = material {
                curve.materials.push(material.id);
            }
            let id = host.get_or_create_curve(name, Overwrite::Rename);
            if let Some(target) = host.curve_mut(id) {
                *target = curve;
            }
            ObjectData::Curve(id)
        }
    };

    let id = host.get_or_create_object(name, data, Overwrite::Rename);
    tag_object(host, id, object, None);
    Some(id)
}

/// Record the source identity (and fingerprint) on a target object.
pub fn tag_object(
    host: &mut dyn SceneHost,
    id: ObjectId,
    object: &SourceObject,
    fingerprint: Option<Fingerprint>,
) {
    if let Some(target) = host.object_mut(id) {
        let properties = &mut target.properties;
        properties.insert(PROP_SOURCE_ID.to_string(), object.id().to_string());
        properties.insert(
            PROP_SOURCE_NAME.to_string(),
            object.attributes.name.clone(),
        );
        if let Some(fingerprint) = fingerprint {
            properties.insert(PROP_FINGERPRINT.to_string(), fingerprint.to_string());
        }
    }
}
