//! Target mesh representation.
//!
//! Meshes hold triangles and quads over a shared vertex buffer, a material
//! slot per face and the list of slots. They are produced by the geometry
//! converter and merged by the block resolver; the host owns them once
//! created.

use std::collections::HashMap;

use io3dm_math::{Bounds, Mat4, Vec3};

use crate::scene::MaterialId;

/// A polygon face. Triangles and quads are the only face sizes the target
/// scene receives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Face {
    Tri([u32; 3]),
    Quad([u32; 4]),
}

impl Face {
    /// Build a face from a vertex loop, dropping repeated neighbours.
    ///
    /// Returns `None` when fewer than three distinct corners remain.
    pub fn from_loop(indices: &[u32]) -> Option<Face> {
        let mut corners: Vec<u32> = Vec::with_capacity(4);
        for &i in indices {
            if corners.last() != Some(&i) {
                corners.push(i);
            }
        }
        while corners.len() > 1 && corners.first() == corners.last() {
            corners.pop();
        }
        match corners.as_slice() {
            [a, b, c] if a != c => Some(Face::Tri([*a, *b, *c])),
            [a, b, c, d] if a != c && b != d => Some(Face::Quad([*a, *b, *c, *d])),
            _ => None,
        }
    }

    pub fn indices(&self) -> &[u32] {
        match self {
            Face::Tri(v) => v,
            Face::Quad(v) => v,
        }
    }

    /// Copy of the face with every index shifted by `offset`.
    pub fn offset(&self, offset: u32) -> Face {
        match *self {
            Face::Tri([a, b, c]) => Face::Tri([a + offset, b + offset, c + offset]),
            Face::Quad([a, b, c, d]) => {
                Face::Quad([a + offset, b + offset, c + offset, d + offset])
            }
        }
    }
}

/// A polygon mesh in target units.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    /// Vertex positions
    pub positions: Vec<Vec3>,

    /// Triangles and quads
    pub faces: Vec<Face>,

    /// Material slot index per face
    pub face_materials: Vec<u32>,

    /// Smooth shading flag per face
    pub smooth: Vec<bool>,

    /// Material slots
    pub materials: Vec<MaterialId>,

    /// Axis-aligned bounding box
    pub bounds: Bounds,
}

impl Mesh {
    /// Create a new mesh. Every face uses slot 0 and is flat shaded.
    pub fn new(positions: Vec<Vec3>, faces: Vec<Face>) -> Self {
        let bounds = Bounds::from_points(&positions);
        let face_materials = vec![0; faces.len()];
        let smooth = vec![false; faces.len()];
        Self {
            positions,
            faces,
            face_materials,
            smooth,
            materials: Vec::new(),
            bounds,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn quad_count(&self) -> usize {
        self.faces
            .iter()
            .filter(|f| matches!(f, Face::Quad(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Set the shading flag of every face.
    pub fn set_smooth(&mut self, smooth: bool) {
        self.smooth = vec![smooth; self.faces.len()];
    }

    /// Slot index of `material`, appending a new slot when needed.
    pub fn material_slot(&mut self, material: MaterialId) -> u32 {
        match self.materials.iter().position(|m| *m == material) {
            Some(slot) => slot as u32,
            None => {
                self.materials.push(material);
                (self.materials.len() - 1) as u32
            }
        }
    }

    /// Normal of a face (unnormalized Newell normal for quads).
    pub fn face_normal(&self, face: usize) -> Vec3 {
        let idx = self.faces[face].indices();
        let mut normal = Vec3::ZERO;
        for (k, &i) in idx.iter().enumerate() {
            let a = self.positions[i as usize];
            let b = self.positions[idx[(k + 1) % idx.len()] as usize];
            normal += Vec3::new(
                (a.y - b.y) * (a.z + b.z),
                (a.z - b.z) * (a.x + b.x),
                (a.x - b.x) * (a.y + b.y),
            );
        }
        normal
    }

    /// Append `other`, transformed by `matrix`, to this mesh.
    ///
    /// Material slots of `other` are mapped onto this mesh's slots, adding
    /// the ones it does not have yet.
    pub fn append(&mut self, other: &Mesh, matrix: &Mat4) {
        let offset = self.positions.len() as u32;
        let slot_map: Vec<u32> = other
            .materials
            .iter()
            .map(|m| self.material_slot(*m))
            .collect();

        for p in &other.positions {
            let world = matrix.transform_point3(*p);
            self.bounds.extend(world);
            self.positions.push(world);
        }
        for (i, face) in other.faces.iter().enumerate() {
            self.faces.push(face.offset(offset));
            let slot = other.face_materials.get(i).copied().unwrap_or(0);
            self.face_materials
                .push(slot_map.get(slot as usize).copied().unwrap_or(0));
            self.smooth
                .push(other.smooth.get(i).copied().unwrap_or(false));
        }
    }

    /// Merge vertices closer than `distance` and drop faces that collapse.
    ///
    /// A distance of zero merges only bit-identical positions. Returns the
    /// number of vertices removed.
    pub fn weld(&mut self, distance: f32) -> usize {
        let before = self.positions.len();
        let remap = if distance > 0.0 {
            weld_within(&self.positions, distance)
        } else {
            weld_identical(&self.positions)
        };

        // Compact the vertex buffer, keeping first occurrences
        let mut new_index = vec![u32::MAX; before];
        let mut positions = Vec::with_capacity(before);
        for (i, &target) in remap.iter().enumerate() {
            if target as usize == i {
                new_index[i] = positions.len() as u32;
                positions.push(self.positions[i]);
            }
        }

        let mut faces = Vec::with_capacity(self.faces.len());
        let mut face_materials = Vec::with_capacity(self.faces.len());
        let mut smooth = Vec::with_capacity(self.faces.len());
        for (i, face) in self.faces.iter().enumerate() {
            let corners: Vec<u32> = face
                .indices()
                .iter()
                .map(|&i| new_index[remap[i as usize] as usize])
                .collect();
            if let Some(face) = Face::from_loop(&corners) {
                faces.push(face);
                face_materials.push(self.face_materials.get(i).copied().unwrap_or(0));
                smooth.push(self.smooth.get(i).copied().unwrap_or(false));
            }
        }

        self.positions = positions;
        self.faces = faces;
        self.face_materials = face_materials;
        self.smooth = smooth;
        self.bounds = Bounds::from_points(&self.positions);
        before - self.positions.len()
    }
}

/// Map every vertex to the first bit-identical vertex.
fn weld_identical(positions: &[Vec3]) -> Vec<u32> {
    let mut seen: HashMap<[u32; 3], u32> = HashMap::with_capacity(positions.len());
    positions
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let key = [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()];
            *seen.entry(key).or_insert(i as u32)
        })
        .collect()
}

/// Map every vertex to the first earlier vertex within `distance`.
///
/// Uses a uniform grid with `distance`-sized cells so only the 27
/// neighbouring cells are searched.
fn weld_within(positions: &[Vec3], distance: f32) -> Vec<u32> {
    let cell = |p: Vec3| -> (i64, i64, i64) {
        (
            (p.x / distance).floor() as i64,
            (p.y / distance).floor() as i64,
            (p.z / distance).floor() as i64,
        )
    };
    let dist_sq = distance * distance;
    let mut grid: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
    let mut remap = Vec::with_capacity(positions.len());

    for (i, &p) in positions.iter().enumerate() {
        let (cx, cy, cz) = cell(p);
        let mut found = None;
        'search: for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    if let Some(bucket) = grid.get(&(cx + dx, cy + dy, cz + dz)) {
                        for &j in bucket {
                            if positions[j as usize].distance_squared(p) <= dist_sq {
                                found = Some(j);
                                break 'search;
                            }
                        }
                    }
                }
            }
        }
        match found {
            Some(j) => remap.push(j),
            None => {
                grid.entry((cx, cy, cz)).or_default().push(i as u32);
                remap.push(i as u32);
            }
        }
    }
    remap
}
