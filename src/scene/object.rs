//! Drawable objects: mesh data, per-object transform and the texture used by
//! sampled shading.

use image::RgbImage;
use nalgebra as na;
use na::{vector, Matrix4, Point3, Vector2, Vector3};

use super::util::Rgba;

/// Axis aligned bounding box in object space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    /// Smallest box containing all positions. An empty slice gives a degenerate box at the origin.
    pub fn from_points(positions: &[Vector3<f32>]) -> Self {
        if positions.is_empty() {
            return Self { min: Point3::origin(), max: Point3::origin() };
        }
        let mut min = positions[0];
        let mut max = positions[0];
        for p in &positions[1..] {
            min = min.inf(p);
            max = max.sup(p);
        }
        return Self { min: Point3::from(min), max: Point3::from(max) };
    }

    /// The 8 corners, in no particular winding.
    pub fn corners(&self) -> [Point3<f32>; 8] {
        let (a, b) = (self.min, self.max);
        return [
            Point3::new(a.x, a.y, a.z),
            Point3::new(b.x, a.y, a.z),
            Point3::new(a.x, b.y, a.z),
            Point3::new(b.x, b.y, a.z),
            Point3::new(a.x, a.y, b.z),
            Point3::new(b.x, a.y, b.z),
            Point3::new(a.x, b.y, b.z),
            Point3::new(b.x, b.y, b.z),
        ];
    }
}

/// Indexed triangle mesh in object space.
///
/// `normals`, `tex_coords` and `colors` are either empty or parallel to `positions`.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub positions: Vec<Vector3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub tex_coords: Vec<Vector2<f32>>,
    pub colors: Vec<Rgba>,
    pub indices: Vec<u32>,
    bounds: Aabb,
}

impl Mesh {
    pub fn new(
        positions: Vec<Vector3<f32>>,
        normals: Vec<Vector3<f32>>,
        tex_coords: Vec<Vector2<f32>>,
        indices: Vec<u32>,
    ) -> Self {
        let bounds = Aabb::from_points(&positions);
        return Self {
            positions,
            normals,
            tex_coords,
            colors: Vec::new(),
            indices,
            bounds,
        };
    }

    /// Attaches per-vertex colors, used when no palette is configured.
    pub fn with_colors(mut self, colors: Vec<Rgba>) -> Self {
        self.colors = colors;
        return self;
    }

    pub fn bounds(&self) -> Aabb {
        return self.bounds;
    }

    pub fn vertex_count(&self) -> usize {
        return self.positions.len();
    }

    pub fn triangle_count(&self) -> usize {
        return self.indices.len() / 3;
    }

    /// Cube spanning [-1, 1] on every axis with per-face normals and uvs, counter-clockwise
    /// when seen from outside.
    pub fn cube() -> Self {
        let positions = [
            // Front
            vector![-1.0, -1.0, 1.0], vector![1.0, -1.0, 1.0], vector![1.0, 1.0, 1.0], vector![-1.0, 1.0, 1.0],
            // Back
            vector![1.0, -1.0, -1.0], vector![-1.0, -1.0, -1.0], vector![-1.0, 1.0, -1.0], vector![1.0, 1.0, -1.0],
            // Top
            vector![-1.0, 1.0, 1.0], vector![1.0, 1.0, 1.0], vector![1.0, 1.0, -1.0], vector![-1.0, 1.0, -1.0],
            // Bottom
            vector![-1.0, -1.0, -1.0], vector![1.0, -1.0, -1.0], vector![1.0, -1.0, 1.0], vector![-1.0, -1.0, 1.0],
            // Right
            vector![1.0, -1.0, 1.0], vector![1.0, -1.0, -1.0], vector![1.0, 1.0, -1.0], vector![1.0, 1.0, 1.0],
            // Left
            vector![-1.0, -1.0, -1.0], vector![-1.0, -1.0, 1.0], vector![-1.0, 1.0, 1.0], vector![-1.0, 1.0, -1.0],
        ];
        let face_normals = [
            vector![0.0, 0.0, 1.0],
            vector![0.0, 0.0, -1.0],
            vector![0.0, 1.0, 0.0],
            vector![0.0, -1.0, 0.0],
            vector![1.0, 0.0, 0.0],
            vector![-1.0, 0.0, 0.0],
        ];
        let uvs = [vector![0.0, 0.0], vector![1.0, 0.0], vector![1.0, 1.0], vector![0.0, 1.0]];

        let mut normals = Vec::with_capacity(24);
        let mut tex_coords = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for face in 0..6 {
            for i in 0..4 {
                normals.push(face_normals[face]);
                tex_coords.push(uvs[i]);
            }
            let base = (face * 4) as u32;
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        return Self::new(positions.to_vec(), normals, tex_coords, indices);
    }
}

/// Everything the pipeline needs to draw one object.
#[derive(Debug, Clone)]
pub struct RenderingObject {
    pub mesh: Mesh,
    pub model_matrix: Matrix4<f32>,
    /// Skips backface culling for this object.
    pub double_sided: bool,
    pub texture: Option<RgbImage>,
}

impl RenderingObject {
    pub fn new(mesh: Mesh) -> Self {
        return Self {
            mesh,
            model_matrix: Matrix4::identity(),
            double_sided: false,
            texture: None,
        };
    }

    pub fn with_model_matrix(mut self, model_matrix: Matrix4<f32>) -> Self {
        self.model_matrix = model_matrix;
        return self;
    }

    pub fn with_texture(mut self, texture: RgbImage) -> Self {
        self.texture = Some(texture);
        return self;
    }

    pub fn double_sided(mut self, double_sided: bool) -> Self {
        self.double_sided = double_sided;
        return self;
    }
}
