//! Mesh conversion: sub-mesh cleanup, triangle pairing and concatenation.
//!
//! Cleanup runs in source precision on every sub-mesh: optional welding of
//! identical vertices, degenerate-face culling, then greedy merging of
//! triangle pairs into quads. The cleaned sub-meshes are concatenated with
//! per-sub-mesh index offsets and scaled to target units.

use std::collections::HashMap;

use glam::DVec3;

use crate::mesh::{Face, Mesh};
use crate::options::{MeshFaceMode, QuadMergeTolerance};
use crate::source::SourceMesh;

/// Faces with a smaller doubled area are degenerate.
const MIN_DOUBLE_AREA: f64 = 1e-12;

/// Convert and concatenate a set of source sub-meshes.
pub fn convert_meshes<'a>(
    parts: impl IntoIterator<Item = &'a SourceMesh>,
    unit_scale: f64,
    mode: MeshFaceMode,
    tolerance: &QuadMergeTolerance,
) -> Mesh {
    let mut positions = Vec::new();
    let mut faces = Vec::new();

    for part in parts {
        let (vertices, part_faces) = prepare(part, mode, tolerance);
        let offset = positions.len() as u32;
        faces.extend(part_faces.iter().map(|f| f.offset(offset)));
        positions.extend(vertices.iter().map(|v| (*v * unit_scale).as_vec3()));
    }

    Mesh::new(positions, faces)
}

/// Clean one sub-mesh. Returns its compacted vertices and faces.
fn prepare(
    mesh: &SourceMesh,
    mode: MeshFaceMode,
    tolerance: &QuadMergeTolerance,
) -> (Vec<DVec3>, Vec<Face>) {
    let count = mesh.vertices.len();
    let remap: Vec<u32> = match mode {
        MeshFaceMode::Join => combine_identical(&mesh.vertices),
        MeshFaceMode::Split => (0..count as u32).collect(),
    };

    let mut faces = Vec::with_capacity(mesh.faces.len());
    let mut culled = 0;
    for raw in &mesh.faces {
        if raw.iter().any(|&i| i as usize >= count) {
            culled += 1;
            continue;
        }
        // The 4th index repeats the 3rd on triangles
        let corners: &[u32] = if raw[3] == raw[2] { &raw[..3] } else { raw };
        let corners: Vec<u32> = corners.iter().map(|&i| remap[i as usize]).collect();
        match Face::from_loop(&corners) {
            Some(face) if double_area(&mesh.vertices, &face) > MIN_DOUBLE_AREA => faces.push(face),
            _ => culled += 1,
        }
    }
    if culled > 0 {
        log::debug!("Culled {} degenerate faces", culled);
    }

    let faces = merge_triangles(&mesh.vertices, &faces, tolerance);
    compact(&mesh.vertices, faces)
}

/// Map every vertex to the first vertex at the same position.
fn combine_identical(vertices: &[DVec3]) -> Vec<u32> {
    let mut seen: HashMap<[u64; 3], u32> = HashMap::with_capacity(vertices.len());
    vertices
        .iter()
        .enumerate()
        .map(|(i, v)| {
            // + 0.0 folds -0.0 into 0.0
            let key = [
                (v.x + 0.0).to_bits(),
                (v.y + 0.0).to_bits(),
                (v.z + 0.0).to_bits(),
            ];
            *seen.entry(key).or_insert(i as u32)
        })
        .collect()
}

fn newell_normal(vertices: &[DVec3], face: &Face) -> DVec3 {
    let idx = face.indices();
    let mut normal = DVec3::ZERO;
    for (k, &i) in idx.iter().enumerate() {
        let a = vertices[i as usize];
        let b = vertices[idx[(k + 1) % idx.len()] as usize];
        normal += DVec3::new(
            (a.y - b.y) * (a.z + b.z),
            (a.z - b.z) * (a.x + b.x),
            (a.x - b.x) * (a.y + b.y),
        );
    }
    normal
}

fn double_area(vertices: &[DVec3], face: &Face) -> f64 {
    newell_normal(vertices, face).length()
}

/// Greedily pair triangles across shared edges into quads.
///
/// Triangle `(p, q, r)` and its neighbour `(q, p, s)` become the quad
/// `(p, s, q, r)` when their normals are within `max_angle`, the quad
/// diagonals are within `min_diagonal_ratio` of each other and the quad is
/// convex. Faces keep their order; a quad takes the slot of its first
/// triangle.
fn merge_triangles(vertices: &[DVec3], faces: &[Face], tolerance: &QuadMergeTolerance) -> Vec<Face> {
    let mut edges: HashMap<(u32, u32), usize> = HashMap::new();
    for (index, face) in faces.iter().enumerate() {
        if let Face::Tri(t) = face {
            for k in 0..3 {
                edges.entry((t[k], t[(k + 1) % 3])).or_insert(index);
            }
        }
    }

    let mut out: Vec<Option<Face>> = faces.iter().copied().map(Some).collect();
    let mut consumed = vec![false; faces.len()];

    for i in 0..faces.len() {
        let Face::Tri(t) = faces[i] else { continue };
        if consumed[i] {
            continue;
        }
        for k in 0..3 {
            let (p, q, r) = (t[k], t[(k + 1) % 3], t[(k + 2) % 3]);
            let Some(&j) = edges.get(&(q, p)) else { continue };
            if j == i || consumed[j] {
                continue;
            }
            let Face::Tri(u) = faces[j] else { continue };
            let Some(&s) = u.iter().find(|&&v| v != p && v != q) else {
                continue;
            };
            if s == r {
                continue;
            }

            let quad = [p, s, q, r];
            if can_merge(vertices, quad, tolerance) {
                out[i] = Some(Face::Quad(quad));
                out[j] = None;
                consumed[i] = true;
                consumed[j] = true;
                break;
            }
        }
    }

    out.into_iter().flatten().collect()
}

fn can_merge(vertices: &[DVec3], quad: [u32; 4], tolerance: &QuadMergeTolerance) -> bool {
    let [p, s, q, r] = quad.map(|i| vertices[i as usize]);

    let n1 = (q - p).cross(r - p);
    let n2 = (p - q).cross(s - q);
    if n1.angle_between(n2) > tolerance.max_angle {
        return false;
    }

    let (d1, d2) = (p.distance(q), r.distance(s));
    if d1.min(d2) < d1.max(d2) * tolerance.min_diagonal_ratio {
        return false;
    }

    // Every corner turns the same way around the averaged normal
    let normal = n1 + n2;
    let corners = [p, s, q, r];
    (0..4).all(|k| {
        let a = corners[k];
        let b = corners[(k + 1) % 4];
        let c = corners[(k + 2) % 4];
        (b - a).cross(c - b).dot(normal) > 0.0
    })
}

/// Drop unreferenced vertices, keeping the order of the rest.
fn compact(vertices: &[DVec3], faces: Vec<Face>) -> (Vec<DVec3>, Vec<Face>) {
    let mut used = vec![false; vertices.len()];
    for face in &faces {
        for &i in face.indices() {
            used[i as usize] = true;
        }
    }

    let mut new_index = vec![0u32; vertices.len()];
    let mut kept = Vec::with_capacity(vertices.len());
    for (i, vertex) in vertices.iter().enumerate() {
        if used[i] {
            new_index[i] = kept.len() as u32;
            kept.push(*vertex);
        }
    }

    let faces = faces
        .into_iter()
        .map(|face| match face {
            Face::Tri(t) => Face::Tri(t.map(|i| new_index[i as usize])),
            Face::Quad(q) => Face::Quad(q.map(|i| new_index[i as usize])),
        })
        .collect();
    (kept, faces)
}
