use nalgebra as na;
use na::{vector, Vector3, Vector4};

/// RGBA color with float channels, nominally in [0.0, 1.0].
pub type Rgba = Vector4<f32>;

pub const WHITE: Rgba = vector![1.0, 1.0, 1.0, 1.0];
pub const BLACK: Rgba = vector![0.0, 0.0, 0.0, 1.0];

/// Transformation of a point to homogenous coordinates.
pub fn to_hom_point(v: Vector3<f32>) -> Vector4<f32> {
    return vector![v.x, v.y, v.z, 1.0];
}

/// Transformation of a vector to homogenous coordinates.
pub fn to_hom_vector(v: Vector3<f32>) -> Vector4<f32> {
    return vector![v.x, v.y, v.z, 0.0];
}

/// Drops the w component without dividing by it.
pub fn from_hom_vector(v: Vector4<f32>) -> Vector3<f32> {
    return vector![v.x, v.y, v.z];
}

/// Builds a color from a plain array, as stored in configuration files.
pub fn rgba(c: [f32; 4]) -> Rgba {
    return vector![c[0], c[1], c[2], c[3]];
}

/// Linear interpolation between two colors: (1 - t) * color_1 + t * color_2.
/// t is unrestricted.
pub fn color_lerp(color_1: Rgba, color_2: Rgba, t: f32) -> Rgba {
    return color_1 * (1.0 - t) + color_2 * t;
}

/// Quantizes a float color to rgba8, clamping every channel to [0.0, 1.0].
pub fn to_rgba8(color: Rgba) -> [u8; 4] {
    fn channel(c: f32) -> u8 {
        // NaN clamps to NaN, which `as` turns into 0.
        return (c.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
    return [channel(color.x), channel(color.y), channel(color.z), channel(color.w)];
}
