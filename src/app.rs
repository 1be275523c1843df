use std::cell::Cell;
use std::f32::consts::FRAC_PI_4;
use std::path::PathBuf;
use std::rc::Rc;
use std::time;

use anyhow::Context;
use nalgebra as na;
use na::{vector, Matrix4, Perspective3, Point3, Rotation3, Vector3};
use show_image::{create_window, event, ImageInfo, ImageView, WindowOptions};
use tracing::info;

use tiny_rasterizer::assets::{load_mesh, load_texture};
use tiny_rasterizer::{FrameStats, FrameUniforms, Mesh, Rasterizer, RenderingConfig, RenderingObject};

/// Radians per second.
const ROTATION_SPEED: f32 = 0.5;
/// Angle of the single frame written with `--output`.
const STILL_ANGLE: f32 = 0.6;

pub struct Params {
    pub width: usize,
    pub height: usize,
    pub print_fps: bool,
    pub config: RenderingConfig,
    pub model: Option<PathBuf>,
    pub texture: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

/// Helper, defining exit event to be an Escape key press.
fn is_exit_event(window_event: event::WindowEvent) -> bool {
    if let event::WindowEvent::KeyboardInput(event) = window_event {
        if event.input.key_code == Some(event::VirtualKeyCode::Escape) && event.input.state.is_released() {
            return true;
        }
    }

    return false;
}

/// Loads the object to show together with the matrix that centers it and scales it to fit the view.
fn load_object(params: &Params) -> anyhow::Result<(RenderingObject, Matrix4<f32>)> {
    let mesh = match &params.model {
        Some(path) => load_mesh(path).with_context(|| format!("failed to load model {}", path.display()))?,
        None => Mesh::cube(),
    };
    info!(vertices = mesh.vertex_count(), triangles = mesh.triangle_count(), "model ready");

    let bounds = mesh.bounds();
    let center = na::center(&bounds.min, &bounds.max);
    let radius = na::distance(&bounds.min, &bounds.max) / 2.0;
    let scale = if radius > 0.0 { 1.5 / radius } else { 1.0 };
    let fit = Matrix4::new_scaling(scale) * Matrix4::new_translation(&-center.coords);

    let mut object = RenderingObject::new(mesh);
    if let Some(path) = &params.texture {
        let texture = load_texture(path).with_context(|| format!("failed to load texture {}", path.display()))?;
        object = object.with_texture(texture);
    }
    return Ok((object, fit));
}

fn frame_uniforms(width: usize, height: usize) -> FrameUniforms {
    let eye = Point3::new(0.0, 1.5, 4.0);
    let aspect = width as f32 / height as f32;
    return FrameUniforms {
        camera_position: eye.coords,
        view: Matrix4::look_at_rh(&eye, &Point3::origin(), &Vector3::y()),
        projection: Perspective3::new(aspect, FRAC_PI_4, 0.1, 100.0).to_homogeneous(),
        light_direction: vector![1.0, 1.0, 1.0].normalize(),
        light_color: vector![1.0, 1.0, 1.0, 1.0],
    };
}

fn render_frame(rasterizer: &mut Rasterizer, object: &RenderingObject, uniforms: &FrameUniforms) {
    let mask = rasterizer.config().clear_mask;
    rasterizer.clear(mask);
    rasterizer.setup_uniforms(uniforms);
    rasterizer.draw_object(object);
    rasterizer.end_frame();
}

fn spin(angle: f32) -> Matrix4<f32> {
    return Rotation3::from_axis_angle(&Vector3::y_axis(), angle).to_homogeneous();
}

/// Actualy launches the window, showing rendered frames until Escape.
/// With an output path renders one frame into it instead.
pub fn run(params: Params) -> anyhow::Result<()> {
    let (mut object, fit) = load_object(&params)?;
    let uniforms = frame_uniforms(params.width, params.height);
    let mut rasterizer = Rasterizer::new(params.width, params.height, params.config);

    if let Some(path) = &params.output {
        object.model_matrix = spin(STILL_ANGLE) * fit;
        render_frame(&mut rasterizer, &object, &uniforms);
        rasterizer.to_image().save(path).with_context(|| format!("failed to save {}", path.display()))?;
        info!(path = %path.display(), stats = ?rasterizer.stats(), "frame saved");
        return Ok(());
    }

    let last_stats = Rc::new(Cell::new(FrameStats::default()));
    let sink = Rc::clone(&last_stats);
    rasterizer.set_stats_observer(move |stats| sink.set(*stats));

    let window_options: WindowOptions = WindowOptions {
        size: Some([params.width as u32, params.height as u32]),
        ..Default::default()
    };
    let window = create_window("output", window_options)?;
    let event_channel = window.event_channel()?;

    let mut exit = false;
    let time_begin = time::Instant::now();
    let mut frame_counter_time_begin = time::Instant::now();
    let mut frame_counter: u32 = 0;
    while !exit {
        let passed_time = time::Instant::now()
        .duration_since(time_begin)
        .as_secs_f32();
        object.model_matrix = spin(ROTATION_SPEED * passed_time) * fit;
        render_frame(&mut rasterizer, &object, &uniforms);

        let image = rasterizer.to_image();
        let image_data = ImageView::new(ImageInfo::rgba8(params.width as u32, params.height as u32), image.as_raw());
        window.set_image("image", image_data)?;

        // Unloading all the events that have piled up, looking for exit event.
        exit = event_channel.try_iter().fold(false, |was_exit, window_event| is_exit_event(window_event) || was_exit);

        if params.print_fps {
            // Counting frames to printout stats every second.
            frame_counter += 1;
            if time::Instant::now()
            .duration_since(frame_counter_time_begin)
            .as_secs_f32() > 1.0 {
                let stats = last_stats.get();
                info!(
                    fps = frame_counter,
                    triangles = stats.triangles,
                    triangles_rendered = stats.triangles_rendered,
                    "frame rate"
                );
                frame_counter_time_begin = time::Instant::now();
                frame_counter = 0;
            }
        }
    }

    return Ok(());
}
