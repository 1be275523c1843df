//! Vertex transformation and the per-triangle steps between clip space and screen space.

use nalgebra as na;
use na::{Matrix4, Vector2, Vector3, Vector4};

use super::object::{Aabb, Mesh};
use super::util::{from_hom_vector, to_hom_point, to_hom_vector, Rgba};

/// Matrices applied to one object for one frame.
#[derive(Debug, Clone, Copy)]
pub struct ObjectTransforms {
    pub model: Matrix4<f32>,
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    /// projection * view * model
    pub mvp: Matrix4<f32>,
    /// Inverse transpose of the model matrix, keeps normals perpendicular under non-uniform scale.
    pub normal: Matrix4<f32>,
}

impl ObjectTransforms {
    pub fn new(model: Matrix4<f32>, view: Matrix4<f32>, projection: Matrix4<f32>) -> Self {
        // A singular model matrix flattens the object, its normals collapse to zero.
        let normal = model.try_inverse().unwrap_or_else(Matrix4::zeros).transpose();
        return Self {
            model,
            view,
            projection,
            mvp: projection * view * model,
            normal,
        };
    }
}

/// Output of the vertex stage for one mesh vertex.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformedVertex {
    pub clip_position: Vector4<f32>,
    pub world_position: Vector3<f32>,
    pub object_normal: Vector3<f32>,
    pub world_normal: Vector3<f32>,
}

/// Runs the vertex stage over every mesh vertex, reusing `out`'s allocation.
pub fn transform_vertices(mesh: &Mesh, transforms: &ObjectTransforms, out: &mut Vec<TransformedVertex>) {
    out.clear();
    out.reserve(mesh.vertex_count());
    for (i, position) in mesh.positions.iter().enumerate() {
        let object_position = to_hom_point(*position);
        let object_normal = mesh.normals.get(i).copied().unwrap_or_else(Vector3::zeros);
        out.push(TransformedVertex {
            clip_position: transforms.mvp * object_position,
            world_position: from_hom_vector(transforms.model * object_position),
            object_normal,
            world_normal: from_hom_vector(transforms.normal * to_hom_vector(object_normal)),
        });
    }
}

/// True when every point lies strictly outside the same one of the six clip half-spaces.
///
/// For w < 0 the inside range of a coordinate is [w, -w], so the comparison uses |w|.
pub fn outside_clip_volume(points: &[Vector4<f32>]) -> bool {
    fn all(points: &[Vector4<f32>], outside: impl Fn(&Vector4<f32>, f32) -> bool) -> bool {
        return points.iter().all(|p| outside(p, p.w.abs()));
    }

    if points.is_empty() {
        return false;
    }
    return all(points, |p, w| p.x < -w)    // left
        || all(points, |p, w| p.x > w)     // right
        || all(points, |p, w| p.y < -w)    // bottom
        || all(points, |p, w| p.y > w)     // top
        || all(points, |p, w| p.z < -w)    // near
        || all(points, |p, w| p.z > w);    // far
}

/// Object level frustum test: the transformed bounding box corners are all outside one plane.
/// Conservative, a box straddling a frustum edge outside the volume is kept.
pub fn frustum_rejects(bounds: &Aabb, mvp: &Matrix4<f32>) -> bool {
    let corners = bounds.corners().map(|corner| mvp * corner.to_homogeneous());
    return outside_clip_volume(&corners);
}

/// Clip space to normalized device coordinates. w is kept for perspective-correct interpolation.
pub fn perspective_divide(v: &mut [Vector4<f32>; 3]) {
    for p in v.iter_mut() {
        p.x /= p.w;
        p.y /= p.w;
        p.z /= p.w;
    }
}

/// Counter-clockwise triangles in normalized device x, y face the viewer.
pub fn is_backface(ndc: &[Vector4<f32>; 3]) -> bool {
    let e01 = (ndc[1] - ndc[0]).xyz();
    let e02 = (ndc[2] - ndc[0]).xyz();
    return e01.cross(&e02).z < 0.0;
}

/// Normalized device coordinates to screen space: x, y from [-1, 1] to [0, size - 1],
/// z to reversed depth `1 - z` so nearer is larger.
pub fn viewport_transform(v: &mut [Vector4<f32>; 3], width: usize, height: usize) {
    for p in v.iter_mut() {
        p.x = 0.5 * (width - 1) as f32 * (p.x + 1.0);
        p.y = 0.5 * (height - 1) as f32 * (p.y + 1.0);
        p.z = 1.0 - p.z;
    }
}

/// Takes a clip space triangle to screen space in place.
/// Returns false when the triangle is culled, leaving `v` in an unspecified state.
pub fn clip_to_screen(v: &mut [Vector4<f32>; 3], cull_backfaces: bool, width: usize, height: usize) -> bool {
    if outside_clip_volume(&v[..]) {
        return false;
    }
    perspective_divide(v);
    if cull_backfaces && is_backface(v) {
        return false;
    }
    viewport_transform(v, width, height);
    return true;
}

/// Interpolation-ready vertex. `position` is screen x, y, reversed depth and clip w.
#[derive(Debug, Clone, Copy)]
pub struct ScreenVertex {
    pub position: Vector4<f32>,
    pub color: Rgba,
    pub uv: Vector2<f32>,
    pub normal: Vector3<f32>,
    pub world_position: Vector3<f32>,
    pub world_normal: Vector3<f32>,
}

impl ScreenVertex {
    /// Vertex at a screen position with only a color, other attributes zeroed.
    pub fn colored(position: Vector4<f32>, color: Rgba) -> Self {
        return Self {
            position,
            color,
            uv: Vector2::zeros(),
            normal: Vector3::zeros(),
            world_position: Vector3::zeros(),
            world_normal: Vector3::zeros(),
        };
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub vertices: [ScreenVertex; 3],
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{vector, Point3, Rotation3};

    #[test]
    fn clip_culling_drops_triangles_fully_outside_any_plane() {
        let outside = [
            [vector![-2.0, 0.0, 0.0, 1.0], vector![-3.0, 0.5, 0.0, 1.0], vector![-1.5, -0.5, 0.0, 1.0]],
            [vector![2.0, 0.0, 0.0, 1.0], vector![3.0, 0.5, 0.0, 1.0], vector![1.5, -0.5, 0.0, 1.0]],
            [vector![0.0, -2.0, 0.0, 1.0], vector![0.5, -3.0, 0.0, 1.0], vector![-0.5, -1.5, 0.0, 1.0]],
            [vector![0.0, 2.0, 0.0, 1.0], vector![0.5, 3.0, 0.0, 1.0], vector![-0.5, 1.5, 0.0, 1.0]],
            [vector![0.0, 0.0, -2.0, 1.0], vector![0.5, 0.0, -3.0, 1.0], vector![-0.5, 0.0, -1.5, 1.0]],
            [vector![0.0, 0.0, 2.0, 1.0], vector![0.5, 0.0, 3.0, 1.0], vector![-0.5, 0.0, 1.5, 1.0]],
        ];
        for triangle in outside.iter() {
            assert!(outside_clip_volume(triangle), "{triangle:?}");
        }
    }

    #[test]
    fn clip_culling_keeps_straddling_and_inside_triangles() {
        // Each vertex is outside a different plane.
        let straddling = [vector![-2.0, 0.0, 0.0, 1.0], vector![2.0, 0.0, 0.0, 1.0], vector![0.0, 2.0, 0.0, 1.0]];
        assert!(!outside_clip_volume(&straddling));
        let inside = [vector![0.0, 0.0, 0.0, 1.0], vector![0.5, 0.0, 0.0, 1.0], vector![0.0, 0.5, 0.0, 1.0]];
        assert!(!outside_clip_volume(&inside));
    }

    #[test]
    fn clip_culling_uses_absolute_w() {
        // With negative w the inside range is [w, -w]: x = 0.5 at w = -1 is inside.
        let v = [vector![0.5, 0.0, 0.0, -1.0], vector![0.5, 0.1, 0.0, -1.0], vector![0.4, 0.0, 0.0, -1.0]];
        assert!(!outside_clip_volume(&v));
    }

    #[test]
    fn backface_depends_on_winding() {
        let ccw = [vector![0.0, 0.0, 0.0, 1.0], vector![1.0, 0.0, 0.0, 1.0], vector![0.0, 1.0, 0.0, 1.0]];
        let cw = [ccw[0], ccw[2], ccw[1]];
        assert!(!is_backface(&ccw));
        assert!(is_backface(&cw));
    }

    #[test]
    fn viewport_maps_corners_and_reverses_depth() {
        let mut v = [vector![-1.0, -1.0, -1.0, 2.0], vector![1.0, 1.0, 1.0, 2.0], vector![0.0, 0.0, 0.0, 2.0]];
        viewport_transform(&mut v, 65, 33);
        assert_eq!(v[0], vector![0.0, 0.0, 2.0, 2.0]);
        assert_eq!(v[1], vector![64.0, 32.0, 0.0, 2.0]);
        assert_eq!(v[2], vector![32.0, 16.0, 1.0, 2.0]);
    }

    #[test]
    fn perspective_divide_keeps_w() {
        let mut v = [vector![2.0, 4.0, 6.0, 2.0]; 3];
        perspective_divide(&mut v);
        assert_eq!(v[0], vector![1.0, 2.0, 3.0, 2.0]);
    }

    #[test]
    fn clip_to_screen_culls_triangle_behind_near_plane() {
        let mut v = [vector![0.0, 0.0, -3.0, 1.0], vector![0.5, 0.0, -2.0, 1.0], vector![0.0, 0.5, -4.0, 1.0]];
        assert!(!clip_to_screen(&mut v, false, 64, 64));
    }

    #[test]
    fn normal_matrix_keeps_normals_perpendicular_under_non_uniform_scale() {
        let model = Matrix4::new_nonuniform_scaling(&vector![4.0, 1.0, 1.0]);
        let transforms = ObjectTransforms::new(model, Matrix4::identity(), Matrix4::identity());
        // Plane x + y = 1, normal (1, 1, 0).
        let a = vector![1.0, 0.0, 0.0];
        let b = vector![0.0, 1.0, 0.0];
        let normal = vector![1.0, 1.0, 0.0];
        let mesh = Mesh::new(vec![a, b], vec![normal, normal], vec![], vec![]);
        let mut out = Vec::new();
        transform_vertices(&mesh, &transforms, &mut out);
        let edge = out[1].world_position - out[0].world_position;
        assert!(edge.dot(&out[0].world_normal).abs() < 1e-6);
        assert_eq!(out[0].object_normal, normal);
    }

    #[test]
    fn vertex_stage_projects_and_keeps_world_position() {
        let model = Matrix4::new_translation(&vector![1.0, 2.0, 3.0]);
        let view = Rotation3::from_axis_angle(&Vector3::y_axis(), 0.3).to_homogeneous();
        let transforms = ObjectTransforms::new(model, view, Matrix4::identity());
        let mesh = Mesh::new(vec![vector![1.0, 1.0, 1.0]], vec![], vec![], vec![]);
        let mut out = vec![TransformedVertex::default(); 5];
        transform_vertices(&mesh, &transforms, &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].world_position, vector![2.0, 3.0, 4.0]);
        assert!((out[0].clip_position - view * vector![2.0, 3.0, 4.0, 1.0]).norm() < 1e-5);
        assert_eq!(out[0].world_normal, Vector3::zeros());
    }

    #[test]
    fn frustum_rejects_box_behind_camera_only() {
        let bounds = Aabb { min: Point3::new(-1.0, -1.0, -1.0), max: Point3::new(1.0, 1.0, 1.0) };
        assert!(!frustum_rejects(&bounds, &Matrix4::identity()));
        let far_left = Matrix4::new_translation(&vector![-5.0, 0.0, 0.0]);
        assert!(frustum_rejects(&bounds, &far_left));
        let straddling = Matrix4::new_translation(&vector![-1.5, 0.0, 0.0]);
        assert!(!frustum_rejects(&bounds, &straddling));
    }
}
