mod app;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tiny_rasterizer::{DisplayBuffer, MsaaLevel, RenderingConfig, ShaderKind};

const WIDTH: usize = 800;
const HEIGHT: usize = 800;

/// Renders a mesh with the CPU rasterizer, in a window or into a png.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Wavefront OBJ to render, a cube when absent.
    #[arg(short, long)]
    model: Option<PathBuf>,
    /// Image sampled by the lit shader.
    #[arg(short, long)]
    texture: Option<PathBuf>,
    /// RON rendering config, flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long, default_value_t = WIDTH)]
    width: usize,
    #[arg(long, default_value_t = HEIGHT)]
    height: usize,
    /// blinn-phong, normal or vertex-color.
    #[arg(short, long)]
    shader: Option<ShaderKind>,
    #[arg(long)]
    wireframe: bool,
    /// Samples per pixel axis: 1, 2 or 4.
    #[arg(long, value_parser = parse_msaa)]
    msaa: Option<MsaaLevel>,
    /// color, depth-red or depth-gray.
    #[arg(long)]
    display: Option<DisplayBuffer>,
    /// Render a single frame into this png instead of opening a window.
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(long)]
    print_fps: bool,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long)]
    verbose: bool,
}

fn parse_msaa(s: &str) -> Result<MsaaLevel, String> {
    let level: usize = s.parse().map_err(|_| format!("{s:?} is not a number"))?;
    return MsaaLevel::from_level(level).ok_or_else(|| format!("unsupported msaa level {level}, expected 1, 2 or 4"));
}

impl Cli {
    fn rendering_config(&self) -> anyhow::Result<RenderingConfig> {
        let mut config = match &self.config {
            Some(path) => RenderingConfig::from_ron_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => RenderingConfig::default(),
        };
        if let Some(shader) = self.shader {
            config.shader = shader;
        }
        if self.wireframe {
            config.wireframe = true;
        }
        if let Some(msaa) = self.msaa {
            config.msaa = msaa;
        }
        if let Some(display) = self.display {
            config.display_buffer = display;
        }
        return Ok(config);
    }
}

#[show_image::main]
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    let params = app::Params {
        width: cli.width,
        height: cli.height,
        print_fps: cli.print_fps,
        config: cli.rendering_config()?,
        model: cli.model,
        texture: cli.texture,
        output: cli.output,
    };

    app::run(params)?;

    return Ok(());
}
