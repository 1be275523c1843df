//! Filled triangle rasterization: bounding box scan, barycentric inside test,
//! perspective-correct interpolation and the reversed depth test.

use image::RgbImage;
use nalgebra as na;
use na::{vector, SVector, Vector3, Vector4};

use super::buffer::FramebufferSet;
use super::geometry::Triangle;
use super::shader::{shade, FragmentInput, ShaderKind, ShadingUniforms};

/// Inclusive pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
}

/// Pixel bounds of a screen space triangle clamped to the framebuffer, None when they do not overlap.
pub fn bounding_box(v: &[Vector4<f32>; 3], width: usize, height: usize) -> Option<BoundingBox> {
    let min_x = v[0].x.min(v[1].x).min(v[2].x);
    let max_x = v[0].x.max(v[1].x).max(v[2].x);
    let min_y = v[0].y.min(v[1].y).min(v[2].y);
    let max_y = v[0].y.max(v[1].y).max(v[2].y);

    // Float to int casts saturate and map NaN to 0.
    let min_px = (min_x.floor() as i64).max(0);
    let max_px = (max_x.ceil() as i64).min(width as i64 - 1);
    let min_py = (min_y.floor() as i64).max(0);
    let max_py = (max_y.ceil() as i64).min(height as i64 - 1);
    if min_px > max_px || min_py > max_py {
        return None;
    }
    return Some(BoundingBox {
        min_x: min_px as usize,
        min_y: min_py as usize,
        max_x: max_px as usize,
        max_y: max_py as usize,
    });
}

/// Barycentric coordinates of (x, y) against the screen x, y of `v`, as ratios of signed areas.
///
/// A degenerate triangle divides by zero; the resulting NaN or infinities are left to fail
/// the inside and depth tests.
pub fn barycentric(x: f32, y: f32, v: &[Vector4<f32>; 3]) -> Vector3<f32> {
    let (a, b, c) = (v[0], v[1], v[2]);
    let c1 = (x * (b.y - c.y) + (c.x - b.x) * y + b.x * c.y - c.x * b.y)
        / (a.x * (b.y - c.y) + (c.x - b.x) * a.y + b.x * c.y - c.x * b.y);
    let c2 = (x * (c.y - a.y) + (a.x - c.x) * y + c.x * a.y - a.x * c.y)
        / (b.x * (c.y - a.y) + (a.x - c.x) * b.y + c.x * a.y - a.x * c.y);
    let c3 = (x * (a.y - b.y) + (b.x - a.x) * y + a.x * b.y - b.x * a.y)
        / (c.x * (a.y - b.y) + (b.x - a.x) * c.y + a.x * b.y - b.x * a.y);
    return vector![c1, c2, c3];
}

/// Negative components mean outside. NaN components compare false and count as inside here,
/// they are rejected later by the depth test.
#[inline]
pub fn is_inside(bar: &Vector3<f32>) -> bool {
    return !(bar.x < 0.0 || bar.y < 0.0 || bar.z < 0.0);
}

/// Screen space barycentrics corrected for perspective through the vertices' clip w.
#[derive(Debug, Clone, Copy)]
pub struct PerspectiveWeights {
    /// alpha / w0, beta / w1, gamma / w2
    over_w: Vector3<f32>,
    /// 1 / (alpha / w0 + beta / w1 + gamma / w2)
    inv_z: f32,
}

impl PerspectiveWeights {
    pub fn new(bar: &Vector3<f32>, v: &[Vector4<f32>; 3]) -> Self {
        let over_w = vector![bar.x / v[0].w, bar.y / v[1].w, bar.z / v[2].w];
        return Self { over_w, inv_z: 1.0 / over_w.sum() };
    }

    /// (alpha * a0 / w0 + beta * a1 / w1 + gamma * a2 / w2) * inv_z
    #[inline]
    pub fn interpolate<const D: usize>(&self, a: [&SVector<f32, D>; 3]) -> SVector<f32, D> {
        return (a[0] * self.over_w.x + a[1] * self.over_w.y + a[2] * self.over_w.z) * self.inv_z;
    }

    pub fn interpolate_scalar(&self, a: [f32; 3]) -> f32 {
        return (a[0] * self.over_w.x + a[1] * self.over_w.y + a[2] * self.over_w.z) * self.inv_z;
    }
}

fn screen_positions(t: &Triangle) -> [Vector4<f32>; 3] {
    return [t.vertices[0].position, t.vertices[1].position, t.vertices[2].position];
}

/// What the single-sample path needs to shade a fragment.
#[derive(Debug, Clone, Copy)]
pub struct ShadingContext<'a> {
    pub kind: ShaderKind,
    pub uniforms: &'a ShadingUniforms,
    pub texture: Option<&'a RgbImage>,
    pub bilinear: bool,
}

/// Single-sample rasterization: samples at integer pixel coordinates, passes the depth test on
/// `depth >= stored`, shades and writes. Returns the number of fragments written.
pub fn rasterize_triangle(fb: &mut FramebufferSet, t: &Triangle, shading: &ShadingContext) -> usize {
    let v = screen_positions(t);
    let Some(bbox) = bounding_box(&v, fb.width(), fb.height()) else {
        return 0;
    };
    let [v0, v1, v2] = &t.vertices;

    let mut written = 0;
    for y in bbox.min_y..=bbox.max_y {
        for x in bbox.min_x..=bbox.max_x {
            let bar = barycentric(x as f32, y as f32, &v);
            if !is_inside(&bar) {
                continue;
            }
            let weights = PerspectiveWeights::new(&bar, &v);
            let depth = weights.interpolate_scalar([v[0].z, v[1].z, v[2].z]);

            let index = fb.index(x, y);
            if !(depth >= fb.depth[index]) {
                continue;
            }
            fb.depth[index] = depth;

            let input = FragmentInput {
                color: weights.interpolate([&v0.color, &v1.color, &v2.color]),
                uv: weights.interpolate([&v0.uv, &v1.uv, &v2.uv]),
                local_normal: weights.interpolate([&v0.normal, &v1.normal, &v2.normal]),
                world_position: weights.interpolate([&v0.world_position, &v1.world_position, &v2.world_position]),
                world_normal: weights.interpolate([&v0.world_normal, &v1.world_normal, &v2.world_normal]),
                texture: shading.texture,
                bilinear: shading.bilinear,
            };
            fb.color[index] = shade(shading.kind, &input, shading.uniforms);
            written += 1;
        }
    }
    return written;
}

/// Multisample rasterization into the sample planes. Each covered sample passing
/// `depth > stored` takes the interpolated vertex color; no shading function runs here.
/// Returns the number of samples written, 0 when no sample planes are allocated.
pub fn rasterize_triangle_msaa(fb: &mut FramebufferSet, t: &Triangle) -> usize {
    let v = screen_positions(t);
    let Some(bbox) = bounding_box(&v, fb.width(), fb.height()) else {
        return 0;
    };
    let row_stride = fb.width();
    let Some(samples) = fb.samples_mut() else {
        return 0;
    };
    let level = samples.level;
    let row_stride = row_stride * level;
    let spacing = 1.0 / level as f32;
    let [v0, v1, v2] = &t.vertices;

    let mut written = 0;
    for y in bbox.min_y..=bbox.max_y {
        for x in bbox.min_x..=bbox.max_x {
            for si in 0..level {
                for sj in 0..level {
                    let offset_x = spacing * (si as f32 + 0.5);
                    let offset_y = spacing * (sj as f32 + 0.5);
                    let bar = barycentric(x as f32 + offset_x, y as f32 + offset_y, &v);
                    if !is_inside(&bar) {
                        continue;
                    }
                    let weights = PerspectiveWeights::new(&bar, &v);
                    let depth = weights.interpolate_scalar([v[0].z, v[1].z, v[2].z]);

                    let index = (y * level + sj) * row_stride + x * level + si;
                    if !(depth > samples.depth[index]) {
                        continue;
                    }
                    samples.depth[index] = depth;
                    samples.covered[index] = true;
                    samples.color[index] = weights.interpolate([&v0.color, &v1.color, &v2.color]);
                    written += 1;
                }
            }
        }
    }
    return written;
}
