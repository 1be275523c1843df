pub mod buffer;
pub mod geometry;
pub mod object;
pub mod raster;
pub mod shader;
pub mod util;
pub mod wireframe;

use image::RgbaImage;
use nalgebra as na;
use na::{vector, Matrix4, Vector2, Vector3, Vector4};
use tracing::{debug, trace};

use crate::config::{BufferMask, DisplayBuffer, RenderingConfig};

use buffer::FramebufferSet;
use geometry::{clip_to_screen, frustum_rejects, transform_vertices, ObjectTransforms, ScreenVertex, TransformedVertex, Triangle};
use object::{Mesh, RenderingObject};
use raster::{rasterize_triangle, rasterize_triangle_msaa, ShadingContext};
use shader::ShadingUniforms;
use util::{rgba, to_rgba8, Rgba, WHITE};

/// Camera and light values for one frame, supplied by the caller.
#[derive(Debug, Clone, Copy)]
pub struct FrameUniforms {
    pub camera_position: Vector3<f32>,
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    /// Direction from the surface towards the light, world space.
    pub light_direction: Vector3<f32>,
    /// Light color already multiplied by intensity.
    pub light_color: Rgba,
}

/// Per-frame counters, reset at clear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub vertices: usize,
    pub triangles: usize,
    /// Triangles that survived clip-space and backface culling.
    pub triangles_rendered: usize,
}

pub type StatsObserver = Box<dyn FnMut(&FrameStats)>;

struct FrameState {
    view: Matrix4<f32>,
    projection: Matrix4<f32>,
    shading: ShadingUniforms,
}

/// Rasterizer, owning the framebuffer set and everything needed to draw into it frame over frame.
///
/// A frame is `clear` -> `setup_uniforms` -> any number of `draw_object` -> `end_frame`,
/// then `to_image` for presentation.
pub struct Rasterizer {
    fb: FramebufferSet,
    config: RenderingConfig,
    frame: Option<FrameState>,
    stats: FrameStats,
    stats_observer: Option<StatsObserver>,
    // Reused between objects to avoid reallocating per draw.
    transformed: Vec<TransformedVertex>,
}

impl Rasterizer {
    /// Panics on a zero dimension.
    pub fn new(width: usize, height: usize, config: RenderingConfig) -> Rasterizer {
        let mut fb = FramebufferSet::new(width, height);
        if config.msaa_active() {
            fb.resize_if_needed(config.msaa.level());
        }
        return Rasterizer {
            fb,
            config,
            frame: None,
            stats: FrameStats::default(),
            stats_observer: None,
            transformed: Vec::new(),
        };
    }

    pub fn width(&self) -> usize {
        return self.fb.width();
    }

    pub fn height(&self) -> usize {
        return self.fb.height();
    }

    pub fn config(&self) -> &RenderingConfig {
        return &self.config;
    }

    /// Changes take effect at the next `clear`.
    pub fn config_mut(&mut self) -> &mut RenderingConfig {
        return &mut self.config;
    }

    pub fn stats(&self) -> FrameStats {
        return self.stats;
    }

    pub fn set_stats_observer<F: FnMut(&FrameStats) + 'static>(&mut self, observer: F) {
        self.stats_observer = Some(Box::new(observer));
    }

    /// Color plane, row-major with row 0 at the bottom.
    pub fn color_buffer(&self) -> &[Rgba] {
        return &self.fb.color[..];
    }

    /// Reversed depth plane, larger is nearer.
    pub fn depth_buffer(&self) -> &[f32] {
        return &self.fb.depth[..];
    }

    /// Starts a frame: fits the sample planes to the configured level, resets the planes selected
    /// by `mask` and the frame counters.
    pub fn clear(&mut self, mask: BufferMask) {
        let msaa_active = self.config.msaa_active();
        let level = match msaa_active {
            true => self.config.msaa.level(),
            false => 1,
        };
        self.fb.resize_if_needed(level);
        self.stats = FrameStats::default();
        self.fb.clear(mask, rgba(self.config.clear_color), msaa_active);
    }

    /// Sets camera and light for every following draw until the next call.
    pub fn setup_uniforms(&mut self, uniforms: &FrameUniforms) {
        self.frame = Some(FrameState {
            view: uniforms.view,
            projection: uniforms.projection,
            shading: ShadingUniforms {
                camera_position: uniforms.camera_position,
                light_direction: uniforms.light_direction,
                light_color: uniforms.light_color,
                ambient_color: rgba(self.config.ambient_color),
                specular_gloss: self.config.specular_gloss,
                specular_strength: self.config.specular_strength,
            },
        });
    }

    /// Runs the geometry stage over one object and rasterizes every surviving triangle.
    ///
    /// Panics when called before `setup_uniforms`.
    pub fn draw_object(&mut self, object: &RenderingObject) {
        let Some(frame) = self.frame.as_ref() else {
            panic!("draw_object called before setup_uniforms");
        };
        let mesh = &object.mesh;
        let transforms = ObjectTransforms::new(object.model_matrix, frame.view, frame.projection);
        if self.config.frustum_culling && frustum_rejects(&mesh.bounds(), &transforms.mvp) {
            trace!("object outside the view volume");
            return;
        }
        self.stats.vertices += mesh.vertex_count();
        self.stats.triangles += mesh.triangle_count();

        transform_vertices(mesh, &transforms, &mut self.transformed);

        let cull_backfaces = self.config.backface_culling && !object.double_sided;
        let msaa_active = self.config.msaa_active();
        let palette = self.config.vertex_colors.as_deref().unwrap_or(&[]);
        let shading = ShadingContext {
            kind: self.config.shader,
            uniforms: &frame.shading,
            texture: object.texture.as_ref(),
            bilinear: self.config.bilinear_sampling,
        };
        let (width, height) = (self.fb.width(), self.fb.height());

        for (triangle_index, ids) in mesh.indices.chunks_exact(3).enumerate() {
            let ids = [ids[0] as usize, ids[1] as usize, ids[2] as usize];
            let (Some(a), Some(b), Some(c)) = (self.transformed.get(ids[0]), self.transformed.get(ids[1]), self.transformed.get(ids[2])) else {
                trace!(triangle_index, ?ids, "triangle references a vertex out of range");
                continue;
            };
            let transformed = [a, b, c];

            let mut v = [a.clip_position, b.clip_position, c.clip_position];
            if !clip_to_screen(&mut v, cull_backfaces, width, height) {
                continue;
            }
            self.stats.triangles_rendered += 1;

            let triangle = Triangle {
                vertices: [0, 1, 2].map(|k| screen_vertex(mesh, palette, ids[k], transformed[k], v[k])),
            };
            if self.config.wireframe {
                wireframe::rasterize_wireframe(&mut self.fb, &triangle);
            } else if msaa_active {
                rasterize_triangle_msaa(&mut self.fb, &triangle);
            } else {
                rasterize_triangle(&mut self.fb, &triangle, &shading);
            }
        }
    }

    /// Folds the sample planes into the color plane. Does nothing without multisampling.
    pub fn resolve(&mut self) {
        if self.config.msaa_active() {
            self.fb.resolve();
        }
    }

    /// Resolves and reports the frame counters.
    pub fn end_frame(&mut self) {
        self.resolve();
        let stats = self.stats;
        debug!(
            vertices = stats.vertices,
            triangles = stats.triangles,
            triangles_rendered = stats.triangles_rendered,
            "frame done"
        );
        if let Some(observer) = self.stats_observer.as_mut() {
            observer(&stats);
        }
    }

    /// Materializes the configured display buffer as rgba8, row 0 at the top.
    pub fn to_image(&self) -> RgbaImage {
        let (width, height) = (self.fb.width(), self.fb.height());
        let mut image = RgbaImage::new(width as u32, height as u32);
        for y in 0..height {
            for x in 0..width {
                let index = self.fb.index(x, y);
                let d = self.fb.depth[index];
                let color: Vector4<f32> = match self.config.display_buffer {
                    DisplayBuffer::Color => self.fb.color[index],
                    DisplayBuffer::DepthRed => vector![d, 0.0, 0.0, 1.0],
                    DisplayBuffer::DepthGray => vector![d, d, d, 1.0],
                };
                image.put_pixel(x as u32, (height - 1 - y) as u32, image::Rgba(to_rgba8(color)));
            }
        }
        return image;
    }
}

/// Palette color cycled by vertex index when configured, otherwise the mesh's own color, otherwise white.
fn vertex_color(mesh: &Mesh, palette: &[[f32; 4]], index: usize) -> Rgba {
    if !palette.is_empty() {
        return rgba(palette[index % palette.len()]);
    }
    return mesh.colors.get(index).copied().unwrap_or(WHITE);
}

fn screen_vertex(mesh: &Mesh, palette: &[[f32; 4]], index: usize, transformed: &TransformedVertex, position: Vector4<f32>) -> ScreenVertex {
    return ScreenVertex {
        position,
        color: vertex_color(mesh, palette, index),
        uv: mesh.tex_coords.get(index).copied().unwrap_or_else(Vector2::zeros),
        normal: transformed.object_normal,
        world_position: transformed.world_position,
        world_normal: transformed.world_normal,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MsaaLevel;
    use crate::scene::shader::ShaderKind;
    use crate::scene::util::BLACK;
    use std::cell::RefCell;
    use std::rc::Rc;

    const SIZE: usize = 64;

    fn assert_color(actual: Rgba, expected: Rgba) {
        assert!((actual - expected).norm() < 1e-5, "{actual:?} != {expected:?}");
    }

    fn uniforms() -> FrameUniforms {
        return FrameUniforms {
            camera_position: vector![0.0, 0.0, 5.0],
            view: Matrix4::identity(),
            projection: Matrix4::identity(),
            light_direction: vector![0.0, 0.0, 1.0],
            light_color: WHITE,
        };
    }

    fn vertex_color_config() -> RenderingConfig {
        return RenderingConfig { shader: ShaderKind::VertexColor, ..Default::default() };
    }

    /// Triangle given directly in normalized device coordinates, identity transforms keep it there.
    fn triangle(points: [[f32; 3]; 3]) -> RenderingObject {
        let positions = points.iter().map(|p| vector![p[0], p[1], p[2]]).collect();
        let mesh = Mesh::new(positions, vec![vector![0.0, 0.0, 1.0]; 3], vec![], vec![0, 1, 2]);
        return RenderingObject::new(mesh);
    }

    fn front_facing() -> RenderingObject {
        return triangle([[-0.5, -0.5, 0.0], [0.5, -0.5, 0.0], [-0.5, 0.5, 0.0]]);
    }

    fn begin_frame(config: RenderingConfig) -> Rasterizer {
        let mut rasterizer = Rasterizer::new(SIZE, SIZE, config);
        rasterizer.clear(BufferMask::ALL);
        rasterizer.setup_uniforms(&uniforms());
        return rasterizer;
    }

    fn pixel(rasterizer: &Rasterizer, x: usize, y: usize) -> Rgba {
        return rasterizer.color_buffer()[y * rasterizer.width() + x];
    }

    #[test]
    fn draws_front_facing_triangle() {
        let mut rasterizer = begin_frame(vertex_color_config());
        rasterizer.draw_object(&front_facing());
        rasterizer.end_frame();

        assert_color(pixel(&rasterizer, 20, 20), WHITE);
        assert_eq!(pixel(&rasterizer, 60, 60), BLACK);
        assert_eq!(rasterizer.stats(), FrameStats { vertices: 3, triangles: 1, triangles_rendered: 1 });
        // z = 0 maps to reversed depth 1.
        assert!((rasterizer.depth_buffer()[20 * SIZE + 20] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn triangle_behind_near_plane_writes_nothing() {
        let config = RenderingConfig { frustum_culling: false, ..vertex_color_config() };
        let mut rasterizer = begin_frame(config);
        rasterizer.draw_object(&triangle([[-0.5, -0.5, -2.0], [0.5, -0.5, -3.0], [-0.5, 0.5, -1.5]]));

        assert!(rasterizer.color_buffer().iter().all(|c| *c == BLACK));
        assert!(rasterizer.depth_buffer().iter().all(|d| *d == 0.0));
        assert_eq!(rasterizer.stats(), FrameStats { vertices: 3, triangles: 1, triangles_rendered: 0 });
    }

    #[test]
    fn backfaces_are_culled_unless_double_sided() {
        let back = || triangle([[-0.5, -0.5, 0.0], [-0.5, 0.5, 0.0], [0.5, -0.5, 0.0]]);

        let mut rasterizer = begin_frame(vertex_color_config());
        rasterizer.draw_object(&back());
        assert_eq!(rasterizer.stats().triangles_rendered, 0);
        assert_eq!(pixel(&rasterizer, 20, 20), BLACK);

        rasterizer.draw_object(&back().double_sided(true));
        assert_eq!(rasterizer.stats().triangles_rendered, 1);
        assert_color(pixel(&rasterizer, 20, 20), WHITE);

        let config = RenderingConfig { backface_culling: false, ..vertex_color_config() };
        let mut rasterizer = begin_frame(config);
        rasterizer.draw_object(&back());
        assert_eq!(rasterizer.stats().triangles_rendered, 1);
    }

    #[test]
    fn frustum_rejected_object_is_not_counted() {
        let mut rasterizer = begin_frame(vertex_color_config());
        let object = front_facing().with_model_matrix(Matrix4::new_translation(&vector![5.0, 0.0, 0.0]));
        rasterizer.draw_object(&object);
        assert_eq!(rasterizer.stats(), FrameStats::default());
        assert!(rasterizer.color_buffer().iter().all(|c| *c == BLACK));
    }

    #[test]
    fn out_of_range_indices_are_skipped() {
        let mut rasterizer = begin_frame(vertex_color_config());
        let mut object = front_facing();
        object.mesh.indices = vec![0, 1, 7, 0, 1, 2];
        rasterizer.draw_object(&object);
        assert_eq!(rasterizer.stats(), FrameStats { vertices: 3, triangles: 2, triangles_rendered: 1 });
    }

    #[test]
    #[should_panic(expected = "before setup_uniforms")]
    fn drawing_before_uniforms_panics() {
        let mut rasterizer = Rasterizer::new(SIZE, SIZE, RenderingConfig::default());
        rasterizer.clear(BufferMask::ALL);
        rasterizer.draw_object(&front_facing());
    }

    #[test]
    #[should_panic]
    fn zero_sized_rasterizer_panics() {
        Rasterizer::new(0, 16, RenderingConfig::default());
    }

    #[test]
    fn palette_cycles_by_vertex_index() {
        let red = vector![1.0, 0.0, 0.0, 1.0];
        let green = vector![0.0, 1.0, 0.0, 1.0];
        let mesh = Mesh::cube();
        let palette = [[1.0, 0.0, 0.0, 1.0], [0.0, 1.0, 0.0, 1.0]];
        assert_eq!(vertex_color(&mesh, &palette, 0), red);
        assert_eq!(vertex_color(&mesh, &palette, 1), green);
        assert_eq!(vertex_color(&mesh, &palette, 2), red);
        assert_eq!(vertex_color(&mesh, &[], 2), WHITE);

        let colored = Mesh::cube().with_colors(vec![green; 24]);
        assert_eq!(vertex_color(&colored, &[], 5), green);
        assert_eq!(vertex_color(&colored, &palette, 5), green);
        assert_eq!(vertex_color(&colored, &palette, 4), red);
    }

    #[test]
    fn single_color_palette_fills_triangle() {
        let blue = vector![0.0, 0.0, 1.0, 1.0];
        let config = RenderingConfig { vertex_colors: Some(vec![[0.0, 0.0, 1.0, 1.0]]), ..vertex_color_config() };
        let mut rasterizer = begin_frame(config);
        rasterizer.draw_object(&front_facing());
        assert_color(pixel(&rasterizer, 20, 20), blue);
    }

    #[test]
    fn wireframe_draws_edges_without_depth() {
        let config = RenderingConfig { wireframe: true, msaa: MsaaLevel::X2, ..vertex_color_config() };
        let mut rasterizer = begin_frame(config);
        rasterizer.draw_object(&front_facing());
        rasterizer.end_frame();

        // Screen corners land on (15.75, 15.75), (47.25, 15.75), (15.75, 47.25), floored.
        assert_color(pixel(&rasterizer, 30, 15), WHITE);
        assert_color(pixel(&rasterizer, 15, 30), WHITE);
        assert_eq!(pixel(&rasterizer, 20, 20), BLACK);
        assert!(rasterizer.depth_buffer().iter().all(|d| *d == 0.0));
        assert_eq!(rasterizer.stats().triangles_rendered, 1);
    }

    #[test]
    fn wireframe_survives_vertices_near_w_zero() {
        let config = RenderingConfig { wireframe: true, ..vertex_color_config() };
        let mut rasterizer = begin_frame(config);
        // Copies z into w, so two vertices land about 1e9 viewport widths away after the divide.
        let z_to_w = Matrix4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 1.0, 0.0,
        );
        let object = triangle([[0.0, 0.0, 1.0], [1.0, 0.0, 1e-9], [-1.0, 0.5, 1e-9]])
            .with_model_matrix(z_to_w)
            .double_sided(true);
        rasterizer.draw_object(&object);

        assert_eq!(rasterizer.stats().triangles_rendered, 1);
        // The edge towards the far right vertex runs along row 31 to the framebuffer border.
        assert_color(pixel(&rasterizer, 50, 31), WHITE);
        assert_color(pixel(&rasterizer, 63, 31), WHITE);
        assert!(rasterizer.depth_buffer().iter().all(|d| *d == 0.0));
    }

    #[test]
    fn msaa_stores_vertex_color_and_resolves() {
        // The lit shader would push a white surface facing the light past 1.0.
        let config = RenderingConfig { msaa: MsaaLevel::X2, ..Default::default() };
        let mut rasterizer = begin_frame(config);
        rasterizer.draw_object(&front_facing());
        assert_eq!(pixel(&rasterizer, 20, 20), BLACK);
        rasterizer.end_frame();

        assert_color(pixel(&rasterizer, 20, 20), WHITE);
        assert_eq!(pixel(&rasterizer, 60, 60), BLACK);
        assert!((rasterizer.depth_buffer()[20 * SIZE + 20] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn clear_uses_configured_color_and_resets_stats() {
        let config = RenderingConfig { clear_color: [0.2, 0.4, 0.6, 1.0], ..vertex_color_config() };
        let mut rasterizer = begin_frame(config);
        rasterizer.draw_object(&front_facing());
        rasterizer.clear(BufferMask::ALL);
        assert_eq!(rasterizer.stats(), FrameStats::default());
        assert!(rasterizer.color_buffer().iter().all(|c| *c == vector![0.2, 0.4, 0.6, 1.0]));
    }

    #[test]
    fn observer_receives_stats_at_frame_end() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut rasterizer = begin_frame(vertex_color_config());
        let sink = Rc::clone(&seen);
        rasterizer.set_stats_observer(move |stats| sink.borrow_mut().push(*stats));

        rasterizer.draw_object(&front_facing());
        rasterizer.draw_object(&front_facing());
        assert!(seen.borrow().is_empty());
        rasterizer.end_frame();
        assert_eq!(*seen.borrow(), vec![FrameStats { vertices: 6, triangles: 2, triangles_rendered: 2 }]);
    }

    #[test]
    fn image_is_flipped_and_follows_display_buffer() {
        let mut rasterizer = begin_frame(vertex_color_config());
        // Covers the bottom left pixel only.
        rasterizer.draw_object(&triangle([[-1.0, -1.0, 0.0], [0.0, -1.0, 0.0], [-1.0, 0.0, 0.0]]));
        rasterizer.end_frame();

        let image = rasterizer.to_image();
        assert_eq!(image.dimensions(), (SIZE as u32, SIZE as u32));
        assert_eq!(image.get_pixel(0, SIZE as u32 - 1).0, [255, 255, 255, 255]);
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0, 255]);

        rasterizer.config_mut().display_buffer = DisplayBuffer::DepthRed;
        assert_eq!(rasterizer.to_image().get_pixel(0, SIZE as u32 - 1).0, [255, 0, 0, 255]);
        rasterizer.config_mut().display_buffer = DisplayBuffer::DepthGray;
        assert_eq!(rasterizer.to_image().get_pixel(0, SIZE as u32 - 1).0, [255, 255, 255, 255]);
        assert_eq!(rasterizer.to_image().get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn blinn_phong_lights_surface_facing_the_light() {
        let mut rasterizer = begin_frame(RenderingConfig::default());
        rasterizer.draw_object(&front_facing());
        let lit = pixel(&rasterizer, 20, 20);
        // ambient + diffuse + specular on white: 0.1 + 1.0 + 0.5 * spec.
        assert!(lit.x > 1.0 && lit.x == lit.y && lit.y == lit.z);
    }
}
