//! Mesh and texture loading.

use std::collections::HashMap;
use std::path::Path;

use image::RgbImage;
use nalgebra as na;
use na::{vector, Vector3};
use obj::raw::object::Polygon;
use obj::raw::{parse_obj as parse_raw_obj, RawObj};
use obj::{load_obj, Obj, Position, TexturedVertex, Vertex};
use tracing::{debug, trace};

use crate::error::Result;
use crate::scene::object::Mesh;

/// Loads a Wavefront OBJ file into a mesh.
pub fn load_mesh<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let source = std::fs::read_to_string(path.as_ref())?;
    let mesh = parse_obj(&source)?;
    debug!(
        path = %path.as_ref().display(),
        vertices = mesh.vertex_count(),
        triangles = mesh.triangle_count(),
        "mesh loaded"
    );
    return Ok(mesh);
}

/// Parses OBJ text, taking as many attributes as the faces reference.
/// Faces without normals get smooth normals averaged from the surrounding faces.
pub fn parse_obj(source: &str) -> Result<Mesh> {
    if let Ok(model) = load_obj::<TexturedVertex, _, u32>(source.as_bytes()) {
        let positions = model.vertices.iter().map(|v| Vector3::from(v.position)).collect();
        let normals = model.vertices.iter().map(|v| Vector3::from(v.normal)).collect();
        let tex_coords = model.vertices.iter().map(|v| vector![v.texture[0], v.texture[1]]).collect();
        return Ok(Mesh::new(positions, normals, tex_coords, model.indices));
    }
    if let Ok(model) = load_obj::<Vertex, _, u32>(source.as_bytes()) {
        let positions = model.vertices.iter().map(|v| Vector3::from(v.position)).collect();
        let normals = model.vertices.iter().map(|v| Vector3::from(v.normal)).collect();
        return Ok(Mesh::new(positions, normals, Vec::new(), model.indices));
    }
    let raw = parse_raw_obj(source.as_bytes())?;
    if !raw.polygons.is_empty() && raw.polygons.iter().all(|p| matches!(p, Polygon::PT(_))) {
        return Ok(textured_without_normals(&raw));
    }
    let model: Obj<Position, u32> = load_obj(source.as_bytes())?;
    let positions: Vec<Vector3<f32>> = model.vertices.iter().map(|v| Vector3::from(v.position)).collect();
    let normals = smooth_normals(&positions, &model.indices);
    return Ok(Mesh::new(positions, normals, Vec::new(), model.indices));
}

/// Builds a mesh from `v/vt` faces: one vertex per distinct position and uv pair, polygons split
/// into fans.
fn textured_without_normals(raw: &RawObj) -> Mesh {
    let mut positions = Vec::new();
    let mut tex_coords = Vec::new();
    let mut indices = Vec::new();
    let mut vertex_ids: HashMap<(usize, usize), u32> = HashMap::new();
    for polygon in raw.polygons.iter() {
        let Polygon::PT(corners) = polygon else {
            continue;
        };
        let mut ids = Vec::with_capacity(corners.len());
        for &(p, t) in corners.iter() {
            let id = match vertex_ids.get(&(p, t)) {
                Some(&id) => id,
                None => {
                    let (Some(&(x, y, z, _)), Some(&(u, v, _))) = (raw.positions.get(p), raw.tex_coords.get(t)) else {
                        break;
                    };
                    positions.push(vector![x, y, z]);
                    tex_coords.push(vector![u, v]);
                    let id = (positions.len() - 1) as u32;
                    vertex_ids.insert((p, t), id);
                    id
                }
            };
            ids.push(id);
        }
        if ids.len() != corners.len() {
            trace!(?corners, "polygon references a missing position or uv");
            continue;
        }
        for i in 1..ids.len().saturating_sub(1) {
            indices.extend_from_slice(&[ids[0], ids[i], ids[i + 1]]);
        }
    }
    let normals = smooth_normals(&positions, &indices);
    return Mesh::new(positions, normals, tex_coords, indices);
}

/// Area weighted average of the normals of every face touching a vertex.
fn smooth_normals(positions: &[Vector3<f32>], indices: &[u32]) -> Vec<Vector3<f32>> {
    let mut normals = vec![Vector3::zeros(); positions.len()];
    for face in indices.chunks_exact(3) {
        let ids = [face[0] as usize, face[1] as usize, face[2] as usize];
        if ids.iter().any(|&i| i >= positions.len()) {
            continue;
        }
        // Cross product length is twice the face area.
        let face_normal = (positions[ids[1]] - positions[ids[0]]).cross(&(positions[ids[2]] - positions[ids[0]]));
        for i in ids {
            normals[i] += face_normal;
        }
    }
    for n in normals.iter_mut() {
        *n = n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros);
    }
    return normals;
}

/// Loads any image format the `image` crate understands as rgb8.
pub fn load_texture<P: AsRef<Path>>(path: P) -> Result<RgbImage> {
    let texture = image::open(path.as_ref())?.to_rgb8();
    debug!(path = %path.as_ref().display(), width = texture.width(), height = texture.height(), "texture loaded");
    return Ok(texture);
}
