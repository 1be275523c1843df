//! Rendering configuration, deserializable from RON.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::scene::shader::ShaderKind;

/// Which planes `Rasterizer::clear` resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferMask {
    pub color: bool,
    pub depth: bool,
}

impl BufferMask {
    pub const ALL: BufferMask = BufferMask { color: true, depth: true };
    pub const COLOR: BufferMask = BufferMask { color: true, depth: false };
    pub const DEPTH: BufferMask = BufferMask { color: false, depth: true };
}

impl Default for BufferMask {
    fn default() -> Self {
        return Self::ALL;
    }
}

/// Multisample factor per axis, `X4` means 4x4 = 16 samples per pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MsaaLevel {
    #[default]
    Disabled,
    X2,
    X4,
}

impl MsaaLevel {
    /// Samples along one axis of a pixel, 1 when disabled.
    pub fn level(self) -> usize {
        return match self {
            MsaaLevel::Disabled => 1,
            MsaaLevel::X2 => 2,
            MsaaLevel::X4 => 4,
        };
    }

    pub fn from_level(level: usize) -> Option<Self> {
        return match level {
            0 | 1 => Some(MsaaLevel::Disabled),
            2 => Some(MsaaLevel::X2),
            4 => Some(MsaaLevel::X4),
            _ => None,
        };
    }
}

/// What `Rasterizer::to_image` shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DisplayBuffer {
    #[default]
    Color,
    DepthRed,
    DepthGray,
}

impl FromStr for DisplayBuffer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        return match s {
            "color" => Ok(DisplayBuffer::Color),
            "depth-red" => Ok(DisplayBuffer::DepthRed),
            "depth-gray" => Ok(DisplayBuffer::DepthGray),
            _ => Err(Error::UnknownDisplayBuffer(s.to_string())),
        };
    }
}

impl fmt::Display for DisplayBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DisplayBuffer::Color => "color",
            DisplayBuffer::DepthRed => "depth-red",
            DisplayBuffer::DepthGray => "depth-gray",
        };
        return f.write_str(name);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderingConfig {
    pub clear_color: [f32; 4],
    pub clear_mask: BufferMask,
    pub msaa: MsaaLevel,
    /// Replaces filled rasterization with edge lines. Disables multisampling.
    pub wireframe: bool,
    pub backface_culling: bool,
    pub frustum_culling: bool,
    pub bilinear_sampling: bool,
    pub display_buffer: DisplayBuffer,
    pub shader: ShaderKind,
    /// Cyclically indexed by vertex index when present.
    pub vertex_colors: Option<Vec<[f32; 4]>>,
    pub ambient_color: [f32; 4],
    pub specular_gloss: f32,
    pub specular_strength: f32,
}

impl Default for RenderingConfig {
    fn default() -> Self {
        return Self {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            clear_mask: BufferMask::ALL,
            msaa: MsaaLevel::Disabled,
            wireframe: false,
            backface_culling: true,
            frustum_culling: true,
            bilinear_sampling: false,
            display_buffer: DisplayBuffer::Color,
            shader: ShaderKind::BlinnPhong,
            vertex_colors: None,
            ambient_color: [0.1, 0.1, 0.1, 1.0],
            specular_gloss: 32.0,
            specular_strength: 0.5,
        };
    }
}

impl RenderingConfig {
    pub fn from_ron_str(source: &str) -> Result<Self> {
        return Ok(ron::from_str(source)?);
    }

    pub fn from_ron_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = std::fs::read_to_string(path)?;
        return Self::from_ron_str(&source);
    }

    /// True when the sample buffers take part in the frame.
    pub fn msaa_active(&self) -> bool {
        return self.msaa != MsaaLevel::Disabled && !self.wireframe;
    }
}
