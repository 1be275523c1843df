pub mod assets;
pub mod config;
pub mod error;
pub mod scene;

pub use config::{BufferMask, DisplayBuffer, MsaaLevel, RenderingConfig};
pub use error::{Error, Result};
pub use scene::object::{Mesh, RenderingObject};
pub use scene::shader::ShaderKind;
pub use scene::{FrameStats, FrameUniforms, Rasterizer};
