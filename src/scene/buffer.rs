use tracing::debug;

use crate::config::BufferMask;

use super::util::Rgba;

/// Sample planes for multisampling, each sized width * height * level^2.
///
/// A cell is addressed as `(y * level + sj) * width * level + (x * level + si)`,
/// so the sample grid is a `level` times larger image.
#[derive(Debug, Default)]
pub struct SampleBuffers {
    pub level: usize,
    pub color: Vec<Rgba>,
    pub depth: Vec<f32>,
    pub covered: Vec<bool>,
}

impl SampleBuffers {
    fn new(size: usize, level: usize) -> Self {
        return Self {
            level,
            color: vec![Rgba::zeros(); size],
            depth: vec![0.0; size],
            covered: vec![false; size],
        };
    }
}

/// Color and depth planes of one rasterizer plus optional sample planes.
///
/// Depth is reversed: larger is nearer and the depth plane clears to 0.
/// (0, 0) is the bottom left pixel, rows are stored bottom to top.
pub struct FramebufferSet {
    width: usize,
    height: usize,
    pub color: Vec<Rgba>,
    pub depth: Vec<f32>,
    samples: Option<SampleBuffers>,
}

impl FramebufferSet {
    pub fn new(width: usize, height: usize) -> Self {
        assert!(width > 0 && height > 0, "framebuffer must be at least 1x1, got {width}x{height}");
        let n_pixels = width * height;
        return Self {
            width,
            height,
            color: vec![Rgba::zeros(); n_pixels],
            depth: vec![0.0; n_pixels],
            samples: None,
        };
    }

    pub fn width(&self) -> usize {
        return self.width;
    }

    pub fn height(&self) -> usize {
        return self.height;
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize) -> usize {
        return y * self.width + x;
    }

    /// Makes sure the sample planes fit `level`, reallocating only when the size changed.
    /// A level of 1 or less drops them.
    pub fn resize_if_needed(&mut self, level: usize) {
        if level <= 1 {
            self.samples = None;
            return;
        }
        let size = self.width * self.height * level * level;
        if matches!(&self.samples, Some(s) if s.color.len() == size) {
            return;
        }
        debug!(width = self.width, height = self.height, level, "allocating sample buffers");
        self.samples = Some(SampleBuffers::new(size, level));
    }

    pub fn samples(&self) -> Option<&SampleBuffers> {
        return self.samples.as_ref();
    }

    pub fn samples_mut(&mut self) -> Option<&mut SampleBuffers> {
        return self.samples.as_mut();
    }

    /// Resets the planes selected by `mask`. Sample planes are reset only when `with_samples`
    /// is set, so stale ones left over from a disabled multisample mode are not touched.
    pub fn clear(&mut self, mask: BufferMask, clear_color: Rgba, with_samples: bool) {
        if mask.color {
            self.color.fill(clear_color);
        }
        if mask.depth {
            self.depth.fill(0.0);
        }
        if !with_samples {
            return;
        }
        if let Some(samples) = self.samples.as_mut() {
            if mask.color {
                samples.color.fill(clear_color);
                samples.covered.fill(false);
            }
            if mask.depth {
                samples.depth.fill(0.0);
            }
        }
    }

    /// Writes a color, dropping coordinates outside the buffer.
    #[inline]
    pub fn set_pixel(&mut self, x: i32, y: i32, color: Rgba) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let index = self.index(x as usize, y as usize);
        self.color[index] = color;
    }

    /// Folds the sample planes into the color plane.
    ///
    /// A pixel with k of n samples covered gets (sum of covered colors) / n, which is their
    /// mean scaled by k / n. Its depth becomes the nearest covered sample depth. Pixels with no
    /// covered sample keep whatever the color plane already holds.
    pub fn resolve(&mut self) {
        let Some(samples) = self.samples.as_ref() else {
            return;
        };
        let level = samples.level;
        let samples_per_pixel = (level * level) as f32;
        let row_stride = self.width * level;
        for y in 0..self.height {
            for x in 0..self.width {
                let mut color = Rgba::zeros();
                let mut depth = f32::MIN;
                let mut covered = 0;
                for sj in 0..level {
                    for si in 0..level {
                        let sample_index = (y * level + sj) * row_stride + x * level + si;
                        if samples.covered[sample_index] {
                            color += samples.color[sample_index];
                            depth = depth.max(samples.depth[sample_index]);
                            covered += 1;
                        }
                    }
                }
                if covered > 0 {
                    let index = y * self.width + x;
                    self.color[index] = color / samples_per_pixel;
                    self.depth[index] = depth;
                }
            }
        }
    }
}
