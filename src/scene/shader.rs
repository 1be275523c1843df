//! Per-pixel shading functions and their dispatch.
//!
//! Shading functions are pure: everything they read arrives through [`FragmentInput`] and
//! [`ShadingUniforms`], nothing is taken from ambient state.

use std::fmt;
use std::str::FromStr;

use image::RgbImage;
use nalgebra as na;
use na::{vector, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::Error;

use super::util::{color_lerp, Rgba, WHITE};

/// The closed set of shading functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShaderKind {
    /// Ambient, diffuse and Blinn-Phong specular response to the primary light.
    #[default]
    BlinnPhong,
    /// Object space normal mapped from [-1, 1] to [0, 1].
    NormalVisual,
    /// Interpolated vertex color, unlit.
    VertexColor,
}

impl ShaderKind {
    pub const ALL: [ShaderKind; 3] = [ShaderKind::BlinnPhong, ShaderKind::NormalVisual, ShaderKind::VertexColor];

    pub fn name(self) -> &'static str {
        return match self {
            ShaderKind::BlinnPhong => "blinn-phong",
            ShaderKind::NormalVisual => "normal",
            ShaderKind::VertexColor => "vertex-color",
        };
    }
}

impl FromStr for ShaderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        return ShaderKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| Error::UnknownShader(s.to_string()));
    }
}

impl fmt::Display for ShaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str(self.name());
    }
}

/// Frame constants read by the shading functions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadingUniforms {
    pub camera_position: Vector3<f32>,
    /// Direction from the surface towards the light, world space.
    pub light_direction: Vector3<f32>,
    /// Light color already multiplied by intensity.
    pub light_color: Rgba,
    pub ambient_color: Rgba,
    pub specular_gloss: f32,
    pub specular_strength: f32,
}

/// Interpolated attributes of one fragment.
#[derive(Debug, Clone, Copy)]
pub struct FragmentInput<'a> {
    pub color: Rgba,
    pub uv: Vector2<f32>,
    pub local_normal: Vector3<f32>,
    pub world_position: Vector3<f32>,
    pub world_normal: Vector3<f32>,
    pub texture: Option<&'a RgbImage>,
    pub bilinear: bool,
}

/// Runs the shading function selected by `kind`.
pub fn shade(kind: ShaderKind, input: &FragmentInput, uniforms: &ShadingUniforms) -> Rgba {
    return match kind {
        ShaderKind::BlinnPhong => blinn_phong(input, uniforms),
        ShaderKind::NormalVisual => normal_visual(input),
        ShaderKind::VertexColor => input.color,
    };
}

fn blinn_phong(input: &FragmentInput, uniforms: &ShadingUniforms) -> Rgba {
    let albedo = match input.texture {
        Some(texture) => input.color.component_mul(&sample_texture(texture, input.uv, input.bilinear)),
        None => input.color,
    };
    let normal = input.world_normal.normalize();
    let light_direction = uniforms.light_direction.normalize();
    let view_direction = (uniforms.camera_position - input.world_position).normalize();
    let half_direction = (light_direction + view_direction).normalize();

    let diffuse_coef = normal.dot(&light_direction).max(0.0);
    let specular_coef = uniforms.specular_strength * normal.dot(&half_direction).max(0.0).powf(uniforms.specular_gloss);

    let ambient = uniforms.ambient_color.component_mul(&albedo);
    let diffuse = uniforms.light_color.component_mul(&albedo) * diffuse_coef;
    let specular = uniforms.light_color * specular_coef;
    let lit = ambient + diffuse + specular;
    return vector![lit.x, lit.y, lit.z, albedo.w];
}

fn normal_visual(input: &FragmentInput) -> Rgba {
    let n = input.local_normal.normalize() * 0.5 + Vector3::repeat(0.5);
    return vector![n.x, n.y, n.z, 1.0];
}

/// Samples an rgb8 image with repeat wrapping. v = 0 is the bottom row of the image.
pub fn sample_texture(texture: &RgbImage, uv: Vector2<f32>, bilinear: bool) -> Rgba {
    let (width, height) = texture.dimensions();
    if width == 0 || height == 0 {
        return WHITE;
    }
    let texel = |x: i64, y: i64| -> Rgba {
        let p = texture.get_pixel(x.rem_euclid(width as i64) as u32, y.rem_euclid(height as i64) as u32);
        return vector![p[0] as f32 / 255.0, p[1] as f32 / 255.0, p[2] as f32 / 255.0, 1.0];
    };

    let u = uv.x - uv.x.floor();
    let v = uv.y - uv.y.floor();
    let fx = u * width as f32;
    let fy = (1.0 - v) * height as f32;
    if !bilinear {
        return texel(fx as i64, fy as i64);
    }

    // Texel centers sit at half-integer coordinates.
    let fx = fx - 0.5;
    let fy = fy - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);
    let top = color_lerp(texel(x0, y0), texel(x0 + 1, y0), tx);
    let bottom = color_lerp(texel(x0, y0 + 1), texel(x0 + 1, y0 + 1), tx);
    return color_lerp(top, bottom, ty);
}
