//! Shared fixtures for the pipeline tests.
#![allow(dead_code)]

use std::path::Path;

use glam::DVec3;
use io3dm_core::host::MemoryHost;
use io3dm_core::scene::{ContainerId, ObjectId};
use io3dm_core::source::{
    DecodeError, DecodeResult, Decoder, Geometry, MaterialSource, NamedView, ObjectAttributes,
    SourceCurve, SourceFile, SourceFileData, SourceInstanceDefinition, SourceLayer,
    SourceMaterial, SourceMesh, SourceObject,
};
use io3dm_core::SceneHost;
use uuid::Uuid;

pub const WALLS: u128 = 1;
pub const HIDDEN: u128 = 2;
pub const DOORS: u128 = 3;

pub const QUAD: u128 = 10;
pub const TRIANGLE: u128 = 11;
pub const ON_HIDDEN: u128 = 12;
pub const LINE: u128 = 13;
pub const RED_CHAIR: u128 = 20;
pub const BLUE_CHAIR: u128 = 21;

pub const CHAIR: u128 = 100;
pub const LEG: u128 = 200;

/// Hands out a copy of a prepared file for any path.
pub struct FixedDecoder(pub SourceFile);

impl Decoder for FixedDecoder {
    fn decode(&self, _path: &Path) -> DecodeResult<SourceFile> {
        Ok(self.0.clone())
    }
}

/// Fails every decode.
pub struct BrokenDecoder;

impl Decoder for BrokenDecoder {
    fn decode(&self, path: &Path) -> DecodeResult<SourceFile> {
        Err(DecodeError::UnsupportedFormat(path.display().to_string()))
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn translation(x: f64) -> [f64; 16] {
    [
        1.0, 0.0, 0.0, x, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]
}

pub fn square(offset: f64) -> Geometry {
    Geometry::Mesh(SourceMesh::new(
        vec![
            DVec3::new(offset, 0.0, 0.0),
            DVec3::new(offset + 1.0, 0.0, 0.0),
            DVec3::new(offset + 1.0, 1.0, 0.0),
            DVec3::new(offset, 1.0, 0.0),
        ],
        vec![[0, 1, 2, 3]],
    ))
}

pub fn triangle() -> Geometry {
    Geometry::Mesh(SourceMesh::new(
        vec![DVec3::ZERO, DVec3::X, DVec3::Y],
        vec![[0, 1, 2, 2]],
    ))
}

pub fn attributes(id: u128, layer_index: i32, source: MaterialSource, material: i32) -> ObjectAttributes {
    ObjectAttributes {
        id: Uuid::from_u128(id),
        name: format!("object {id}"),
        layer_index,
        material_source: source,
        material_index: material,
        ..Default::default()
    }
}

pub fn member(id: u128, geometry: Geometry) -> SourceObject {
    SourceObject::new(
        geometry,
        ObjectAttributes {
            is_instance_definition_object: true,
            ..attributes(id, 0, MaterialSource::FromParent, -1)
        },
    )
}

pub fn placement(id: u128, definition: u128, x: f64, material: i32) -> SourceObject {
    SourceObject::new(
        Geometry::InstanceReference {
            definition_id: Uuid::from_u128(definition),
            xform: translation(x),
        },
        attributes(id, 0, MaterialSource::FromObject, material),
    )
}

/// A small site:
///
/// - layers `Walls` (red), `Hidden` (hidden) and `Doors` under `Walls`
/// - a quad and a triangle on visible layers, a quad on the hidden layer
///   and a line
/// - block `Chair` = a seat square plus a placement of block `Leg`, placed
///   once in red and once in blue; every member takes its parent's material
pub fn site_data() -> SourceFileData {
    let layer = |id: u128, parent: u128, name: &str, visible: bool, material: i32| SourceLayer {
        id: Uuid::from_u128(id),
        parent_id: Uuid::from_u128(parent),
        name: name.into(),
        visible,
        render_material_index: material,
    };

    let mut nested = placement(102, LEG, 0.0, -1);
    nested.attributes.is_instance_definition_object = true;
    nested.attributes.material_source = MaterialSource::FromParent;

    SourceFileData {
        layers: vec![
            layer(WALLS, 0, "Walls", true, 0),
            layer(HIDDEN, 0, "Hidden", false, -1),
            layer(DOORS, WALLS, "Doors", true, -1),
        ],
        materials: vec![
            SourceMaterial {
                id: Uuid::from_u128(1000),
                name: "Red".into(),
                diffuse_color: [255, 0, 0, 255],
                ..Default::default()
            },
            SourceMaterial {
                id: Uuid::from_u128(1001),
                name: "Blue".into(),
                diffuse_color: [0, 0, 255, 255],
                ..Default::default()
            },
        ],
        objects: vec![
            SourceObject::new(square(0.0), attributes(QUAD, 0, MaterialSource::FromLayer, -1)),
            SourceObject::new(triangle(), attributes(TRIANGLE, 2, MaterialSource::FromObject, 1)),
            SourceObject::new(square(3.0), attributes(ON_HIDDEN, 1, MaterialSource::FromLayer, -1)),
            SourceObject::new(
                Geometry::Curve {
                    curve: SourceCurve::Line {
                        from: DVec3::ZERO,
                        to: DVec3::new(5.0, 0.0, 0.0),
                    },
                },
                attributes(LINE, 0, MaterialSource::FromLayer, -1),
            ),
            member(101, square(0.0)),
            nested,
            member(201, square(5.0)),
            placement(RED_CHAIR, CHAIR, 10.0, 0),
            placement(BLUE_CHAIR, CHAIR, 20.0, 1),
        ],
        instance_definitions: vec![
            SourceInstanceDefinition {
                id: Uuid::from_u128(CHAIR),
                name: "Chair".into(),
                object_ids: vec![Uuid::from_u128(102), Uuid::from_u128(101)],
            },
            SourceInstanceDefinition {
                id: Uuid::from_u128(LEG),
                name: "Leg".into(),
                object_ids: vec![Uuid::from_u128(201)],
            },
        ],
        named_views: vec![NamedView {
            name: "Front".into(),
            location: DVec3::new(0.0, -10.0, 2.0),
            direction: DVec3::Y,
            lens_length: 35.0,
        }],
        ..Default::default()
    }
}

pub fn site() -> SourceFile {
    site_data().into()
}

/// Target object created for a source object id.
pub fn object_for(host: &MemoryHost, project: &str, id: u128) -> Option<ObjectId> {
    host.find_object(&format!("{}:{}", project, Uuid::from_u128(id)))
}

pub fn container(host: &MemoryHost, name: &str) -> ContainerId {
    match host.find_container(name) {
        Some(id) => id,
        None => panic!("no container named {name}"),
    }
}

/// Objects under the project, sorted.
pub fn project_objects(host: &MemoryHost, project: &str) -> Vec<ObjectId> {
    let mut objects = host.objects_recursive(container(host, project));
    objects.sort();
    objects
}
