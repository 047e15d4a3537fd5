//! Source object model for decoded 3DM files.
//!
//! These types mirror what the binary decoder yields: layers, materials,
//! objects with typed geometry, instance definitions, named views and the
//! model settings. They are read-only for the duration of an import pass.

use std::collections::HashMap;

use glam::{DVec3, DVec4};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use io3dm_math::XFORM_LEN;

/// RGBA color with 8 bits per channel.
pub type Rgba = [u8; 4];

/// Opaque black, the "unset" diffuse color of source materials.
pub const BLACK: Rgba = [0, 0, 0, 255];

/// Linear unit system of a model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum UnitSystem {
    None,
    Microns,
    Millimeters,
    Centimeters,
    #[default]
    Meters,
    Kilometers,
    Inches,
    Feet,
    Yards,
    Miles,
    Custom { meters_per_unit: f64 },
}

impl UnitSystem {
    /// Length of one model unit in meters.
    pub fn meters_per_unit(&self) -> f64 {
        match self {
            UnitSystem::None => 1.0,
            UnitSystem::Microns => 1.0e-6,
            UnitSystem::Millimeters => 1.0e-3,
            UnitSystem::Centimeters => 1.0e-2,
            UnitSystem::Meters => 1.0,
            UnitSystem::Kilometers => 1.0e3,
            UnitSystem::Inches => 0.0254,
            UnitSystem::Feet => 0.3048,
            UnitSystem::Yards => 0.9144,
            UnitSystem::Miles => 1609.344,
            UnitSystem::Custom { meters_per_unit } => *meters_per_unit,
        }
    }
}

/// Model-wide settings block.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model_unit_system: UnitSystem,
}

/// Where an object takes its material from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaterialSource {
    #[default]
    FromLayer,
    FromObject,
    FromParent,
}

/// Per-object attributes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectAttributes {
    pub id: Uuid,
    pub name: String,
    pub layer_index: i32,
    pub material_source: MaterialSource,
    pub material_index: i32,
    pub visible: bool,
    /// Set on objects that only exist as members of an instance definition
    pub is_instance_definition_object: bool,
}

impl Default for ObjectAttributes {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            name: String::new(),
            layer_index: 0,
            material_source: MaterialSource::FromLayer,
            material_index: -1,
            visible: true,
            is_instance_definition_object: false,
        }
    }
}

/// A polygon mesh as stored in the source file.
///
/// Every face has four indices; a triangle repeats its third index.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceMesh {
    pub vertices: Vec<DVec3>,
    pub faces: Vec<[u32; 4]>,
}

impl SourceMesh {
    pub fn new(vertices: Vec<DVec3>, faces: Vec<[u32; 4]>) -> Self {
        Self { vertices, faces }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }
}

/// Curve kinds the converter understands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SourceCurve {
    Line {
        from: DVec3,
        to: DVec3,
    },
    Polyline {
        points: Vec<DVec3>,
        /// Closed polylines repeat the first point at the end
        #[serde(default)]
        closed: bool,
    },
    Nurbs {
        /// Control points as (x, y, z, weight)
        points: Vec<DVec4>,
        order: u32,
        #[serde(default)]
        closed: bool,
    },
    Arc {
        center: DVec3,
        start: DVec3,
        end: DVec3,
        /// Plane normal. Zero means "derive from the end points".
        #[serde(default)]
        normal: DVec3,
        /// Sweep angle in radians
        angle: f64,
    },
    PolyCurve {
        segments: Vec<SourceCurve>,
    },
}

impl SourceCurve {
    /// Radius times sweep angle for arcs, chord lengths for everything else.
    pub fn length(&self) -> f64 {
        match self {
            SourceCurve::Line { from, to } => from.distance(*to),
            SourceCurve::Polyline { points, .. } => {
                points.windows(2).map(|w| w[0].distance(w[1])).sum()
            }
            SourceCurve::Nurbs { points, .. } => points
                .windows(2)
                .map(|w| w[0].truncate().distance(w[1].truncate()))
                .sum(),
            SourceCurve::Arc {
                center,
                start,
                angle,
                ..
            } => center.distance(*start) * angle.abs(),
            SourceCurve::PolyCurve { segments } => segments.iter().map(|s| s.length()).sum(),
        }
    }
}

/// Typed geometry payload of a source object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Mesh(SourceMesh),
    /// Boundary representation; one render mesh per face when present
    Brep { faces: Vec<Option<SourceMesh>> },
    Extrusion { mesh: Option<SourceMesh> },
    /// Subdivision surface, converted through its control net
    SubD { control_net: SourceMesh },
    Curve { curve: SourceCurve },
    InstanceReference {
        definition_id: Uuid,
        /// Row-major 4x4 placement transform
        xform: [f64; XFORM_LEN],
    },
    /// Lights, annotations, text and anything else the decoder yields
    Unsupported { kind: String },
}

/// Coarse geometry type tag, used for filtering and diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Mesh,
    Brep,
    Extrusion,
    SubD,
    Curve,
    InstanceReference,
    Unsupported,
}

impl Geometry {
    pub fn object_type(&self) -> ObjectType {
        match self {
            Geometry::Mesh(_) => ObjectType::Mesh,
            Geometry::Brep { .. } => ObjectType::Brep,
            Geometry::Extrusion { .. } => ObjectType::Extrusion,
            Geometry::SubD { .. } => ObjectType::SubD,
            Geometry::Curve { .. } => ObjectType::Curve,
            Geometry::InstanceReference { .. } => ObjectType::InstanceReference,
            Geometry::Unsupported { .. } => ObjectType::Unsupported,
        }
    }

    /// True for every kind that converts to mesh data.
    pub fn is_mesh_bearing(&self) -> bool {
        matches!(
            self,
            Geometry::Mesh(_) | Geometry::Brep { .. } | Geometry::Extrusion { .. } | Geometry::SubD { .. }
        )
    }
}

/// One scene entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceObject {
    pub geometry: Geometry,
    #[serde(default)]
    pub attributes: ObjectAttributes,
}

impl SourceObject {
    pub fn new(geometry: Geometry, attributes: ObjectAttributes) -> Self {
        Self {
            geometry,
            attributes,
        }
    }

    pub fn id(&self) -> Uuid {
        self.attributes.id
    }
}

/// A layer; layers form a tree through `parent_id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceLayer {
    pub id: Uuid,
    /// Nil for top-level layers
    pub parent_id: Uuid,
    pub name: String,
    pub visible: bool,
    pub render_material_index: i32,
}

impl Default for SourceLayer {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            parent_id: Uuid::nil(),
            name: String::new(),
            visible: true,
            render_material_index: -1,
        }
    }
}

/// A render material record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceMaterial {
    pub id: Uuid,
    pub name: String,
    pub diffuse_color: Rgba,
    pub reflection_color: Rgba,
    pub transparent_color: Rgba,
    pub reflectivity: f64,
    pub transparency: f64,
}

impl Default for SourceMaterial {
    fn default() -> Self {
        Self {
            id: Uuid::nil(),
            name: String::new(),
            diffuse_color: [255, 255, 255, 255],
            reflection_color: [255, 255, 255, 255],
            transparent_color: [255, 255, 255, 255],
            reflectivity: 0.0,
            transparency: 0.0,
        }
    }
}

/// A block definition: a named, ordered list of member objects.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceInstanceDefinition {
    pub id: Uuid,
    pub name: String,
    pub object_ids: Vec<Uuid>,
}

/// A saved viewport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamedView {
    pub name: String,
    pub location: DVec3,
    pub direction: DVec3,
    /// 35mm-equivalent lens length
    pub lens_length: f64,
}

impl Default for NamedView {
    fn default() -> Self {
        Self {
            name: String::new(),
            location: DVec3::ZERO,
            direction: DVec3::NEG_Z,
            lens_length: 50.0,
        }
    }
}

/// Serialized layout of a source file, before indexing.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceFileData {
    pub settings: Settings,
    pub layers: Vec<SourceLayer>,
    pub materials: Vec<SourceMaterial>,
    pub objects: Vec<SourceObject>,
    pub instance_definitions: Vec<SourceInstanceDefinition>,
    pub named_views: Vec<NamedView>,
}

/// A fully decoded source file with id lookups.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(from = "SourceFileData")]
pub struct SourceFile {
    data: SourceFileData,
    layers_by_id: HashMap<Uuid, usize>,
    objects_by_id: HashMap<Uuid, usize>,
    definitions_by_id: HashMap<Uuid, usize>,
}

impl From<SourceFileData> for SourceFile {
    fn from(data: SourceFileData) -> Self {
        let mut file = SourceFile {
            data,
            ..Default::default()
        };
        file.reindex();
        file
    }
}

impl SourceFile {
    /// Create an empty file with the given settings.
    pub fn new(settings: Settings) -> Self {
        SourceFileData {
            settings,
            ..Default::default()
        }
        .into()
    }

    fn reindex(&mut self) {
        self.layers_by_id = index_by(&self.data.layers, |l| l.id);
        self.objects_by_id = index_by(&self.data.objects, |o| o.id());
        self.definitions_by_id = index_by(&self.data.instance_definitions, |d| d.id);
    }

    /// Append a layer and return its index.
    pub fn add_layer(&mut self, layer: SourceLayer) -> i32 {
        let index = self.data.layers.len();
        self.layers_by_id.insert(layer.id, index);
        self.data.layers.push(layer);
        index as i32
    }

    /// Append a material and return its index.
    pub fn add_material(&mut self, material: SourceMaterial) -> i32 {
        self.data.materials.push(material);
        (self.data.materials.len() - 1) as i32
    }

    pub fn add_object(&mut self, object: SourceObject) {
        self.objects_by_id.insert(object.id(), self.data.objects.len());
        self.data.objects.push(object);
    }

    pub fn add_instance_definition(&mut self, definition: SourceInstanceDefinition) {
        self.definitions_by_id
            .insert(definition.id, self.data.instance_definitions.len());
        self.data.instance_definitions.push(definition);
    }

    pub fn add_named_view(&mut self, view: NamedView) {
        self.data.named_views.push(view);
    }

    pub fn settings(&self) -> &Settings {
        &self.data.settings
    }

    pub fn layers(&self) -> &[SourceLayer] {
        &self.data.layers
    }

    pub fn materials(&self) -> &[SourceMaterial] {
        &self.data.materials
    }

    pub fn objects(&self) -> &[SourceObject] {
        &self.data.objects
    }

    pub fn instance_definitions(&self) -> &[SourceInstanceDefinition] {
        &self.data.instance_definitions
    }

    pub fn named_views(&self) -> &[NamedView] {
        &self.data.named_views
    }

    /// Layer at a table index. Negative or out-of-range indices yield `None`.
    pub fn layer(&self, index: i32) -> Option<&SourceLayer> {
        usize::try_from(index).ok().and_then(|i| self.data.layers.get(i))
    }

    /// Material at a table index. Negative or out-of-range indices yield `None`.
    pub fn material(&self, index: i32) -> Option<&SourceMaterial> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.data.materials.get(i))
    }

    pub fn find_layer(&self, id: Uuid) -> Option<&SourceLayer> {
        self.layers_by_id.get(&id).map(|&i| &self.data.layers[i])
    }

    pub fn find_object(&self, id: Uuid) -> Option<&SourceObject> {
        self.objects_by_id.get(&id).map(|&i| &self.data.objects[i])
    }

    pub fn find_definition(&self, id: Uuid) -> Option<&SourceInstanceDefinition> {
        self.definitions_by_id
            .get(&id)
            .map(|&i| &self.data.instance_definitions[i])
    }
}

fn index_by<T>(items: &[T], key: impl Fn(&T) -> Uuid) -> HashMap<Uuid, usize> {
    items.iter().enumerate().map(|(i, item)| (key(item), i)).collect()
}
