//! Content fingerprints and the fingerprint to object tables used by
//! reloads.
//!
//! A fingerprint hashes the raw geometry encoding of an object followed by
//! the name of its resolved material. Instance references also encode the
//! members of their definition, so editing a block changes the fingerprint
//! of every placement. Collisions are possible and not handled.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use uuid::Uuid;
use xxhash_rust::xxh3::xxh3_64;

use crate::scene::ObjectId;
use crate::source::{Geometry, SourceCurve, SourceFile, SourceMesh};

/// 64-bit content hash, displayed as 16 hex digits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub u64);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl Fingerprint {
    /// Fingerprint of a geometry payload with its resolved material name.
    pub fn compute(geometry: &Geometry, file: &SourceFile, material_name: &str) -> Self {
        let mut bytes = Vec::new();
        let mut visiting = HashSet::new();
        encode_geometry(geometry, file, &mut visiting, &mut bytes);
        bytes.extend_from_slice(material_name.as_bytes());
        Fingerprint(xxh3_64(&bytes))
    }
}

// Tags keep different geometry kinds with equal buffers apart
const TAG_MESH: u8 = 1;
const TAG_BREP: u8 = 2;
const TAG_EXTRUSION: u8 = 3;
const TAG_SUBD: u8 = 4;
const TAG_CURVE: u8 = 5;
const TAG_INSTANCE: u8 = 6;
const TAG_UNSUPPORTED: u8 = 7;
const TAG_NONE: u8 = 0xfe;
const TAG_CYCLE: u8 = 0xff;

fn encode_geometry(
    geometry: &Geometry,
    file: &SourceFile,
    visiting: &mut HashSet<Uuid>,
    out: &mut Vec<u8>,
) {
    match geometry {
        Geometry::Mesh(mesh) => {
            out.push(TAG_MESH);
            encode_mesh(mesh, out);
        }
        Geometry::Brep { faces } => {
            out.push(TAG_BREP);
            out.extend_from_slice(&(faces.len() as u64).to_le_bytes());
            for face in faces {
                match face {
                    Some(mesh) => encode_mesh(mesh, out),
                    None => out.push(TAG_NONE),
                }
            }
        }
        Geometry::Extrusion { mesh } => {
            out.push(TAG_EXTRUSION);
            match mesh {
                Some(mesh) => encode_mesh(mesh, out),
                None => out.push(TAG_NONE),
            }
        }
        Geometry::SubD { control_net } => {
            out.push(TAG_SUBD);
            encode_mesh(control_net, out);
        }
        Geometry::Curve { curve } => {
            out.push(TAG_CURVE);
            encode_curve(curve, out);
        }
        Geometry::InstanceReference {
            definition_id,
            xform,
        } => {
            out.push(TAG_INSTANCE);
            out.extend_from_slice(definition_id.as_bytes());
            out.extend_from_slice(bytemuck::cast_slice(xform.as_slice()));

            if !visiting.insert(*definition_id) {
                out.push(TAG_CYCLE);
                return;
            }
            if let Some(definition) = file.find_definition(*definition_id) {
                for member in definition.object_ids.iter().filter_map(|id| file.find_object(*id)) {
                    let attributes = &member.attributes;
                    out.extend_from_slice(&attributes.material_index.to_le_bytes());
                    out.push(attributes.material_source as u8);
                    encode_geometry(&member.geometry, file, visiting, out);
                }
            }
            visiting.remove(definition_id);
        }
        Geometry::Unsupported { kind } => {
            out.push(TAG_UNSUPPORTED);
            out.extend_from_slice(kind.as_bytes());
        }
    }
}

fn encode_mesh(mesh: &SourceMesh, out: &mut Vec<u8>) {
    out.extend_from_slice(&(mesh.vertices.len() as u64).to_le_bytes());
    out.extend_from_slice(bytemuck::cast_slice(&mesh.vertices));
    out.extend_from_slice(&(mesh.faces.len() as u64).to_le_bytes());
    out.extend_from_slice(bytemuck::cast_slice(&mesh.faces));
}

fn encode_curve(curve: &SourceCurve, out: &mut Vec<u8>) {
    match curve {
        SourceCurve::Line { from, to } => {
            out.push(1);
            out.extend_from_slice(bytemuck::cast_slice(&[*from, *to]));
        }
        SourceCurve::Polyline { points, closed } => {
            out.push(2);
            out.push(*closed as u8);
            out.extend_from_slice(&(points.len() as u64).to_le_bytes());
            out.extend_from_slice(bytemuck::cast_slice(points));
        }
        SourceCurve::Nurbs {
            points,
            order,
            closed,
        } => {
            out.push(3);
            out.push(*closed as u8);
            out.extend_from_slice(&order.to_le_bytes());
            out.extend_from_slice(&(points.len() as u64).to_le_bytes());
            out.extend_from_slice(bytemuck::cast_slice(points));
        }
        SourceCurve::Arc {
            center,
            start,
            end,
            normal,
            angle,
        } => {
            out.push(4);
            out.extend_from_slice(bytemuck::cast_slice(&[*center, *start, *end, *normal]));
            out.extend_from_slice(&angle.to_le_bytes());
        }
        SourceCurve::PolyCurve { segments } => {
            out.push(5);
            out.extend_from_slice(&(segments.len() as u64).to_le_bytes());
            for segment in segments {
                encode_curve(segment, out);
            }
        }
    }
}

/// Ordered fingerprint to object pairs.
///
/// Duplicate fingerprints are allowed; `take` hands them out in insertion
/// order so each stored object is restored at most once.
#[derive(Clone, Debug, Default)]
pub struct FingerprintTable {
    entries: Vec<(Fingerprint, Option<ObjectId>)>,
    index: HashMap<Fingerprint, VecDeque<usize>>,
    live: usize,
}

impl FingerprintTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, fingerprint: Fingerprint, object: ObjectId) {
        self.index
            .entry(fingerprint)
            .or_default()
            .push_back(self.entries.len());
        self.entries.push((fingerprint, Some(object)));
        self.live += 1;
    }

    /// Remove and return the oldest object stored under `fingerprint`.
    pub fn take(&mut self, fingerprint: Fingerprint) -> Option<ObjectId> {
        let queue = self.index.get_mut(&fingerprint)?;
        let slot = queue.pop_front()?;
        if queue.is_empty() {
            self.index.remove(&fingerprint);
        }
        let object = self.entries[slot].1.take();
        if object.is_some() {
            self.live -= 1;
        }
        object
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
        self.live = 0;
    }

    /// Live pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Fingerprint, ObjectId)> + '_ {
        self.entries
            .iter()
            .filter_map(|(fp, object)| object.map(|o| (*fp, o)))
    }

    pub fn objects(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.iter().map(|(_, object)| object)
    }
}
