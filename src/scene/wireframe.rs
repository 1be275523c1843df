use nalgebra::Vector4;

use super::buffer::FramebufferSet;
use super::geometry::Triangle;
use super::util::{color_lerp, Rgba};

/// Endpoints of a segment cut to the framebuffer, with the colors found at the cut points.
struct ClippedSegment {
    begin: [f64; 2],
    end: [f64; 2],
    color_begin: Rgba,
    color_end: Rgba,
}

/// Liang-Barsky clip against [0, width] x [0, height], in f64 so that endpoints pushed far out by
/// a near-zero w still cut precisely. None when nothing of the segment lies inside or an endpoint
/// is not finite.
fn clip_segment(fb: &FramebufferSet, begin: Vector4<f32>, end: Vector4<f32>, color_begin: Rgba, color_end: Rgba) -> Option<ClippedSegment> {
    if !(begin.x.is_finite() && begin.y.is_finite() && end.x.is_finite() && end.y.is_finite()) {
        return None;
    }
    let (x0, y0) = (begin.x as f64, begin.y as f64);
    let (dx, dy) = (end.x as f64 - x0, end.y as f64 - y0);
    let (max_x, max_y) = (fb.width() as f64, fb.height() as f64);

    let mut t0 = 0.0_f64;
    let mut t1 = 1.0_f64;
    // Each boundary as p * t <= q.
    for (p, q) in [(-dx, x0), (dx, max_x - x0), (-dy, y0), (dy, max_y - y0)] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
    }
    if t0 > t1 {
        return None;
    }

    let at = |t: f64| [(x0 + t * dx).clamp(0.0, max_x), (y0 + t * dy).clamp(0.0, max_y)];
    // Uncut ends keep their colors bit for bit.
    return Some(ClippedSegment {
        begin: at(t0),
        end: at(t1),
        color_begin: if t0 > 0.0 { color_lerp(color_begin, color_end, t0 as f32) } else { color_begin },
        color_end: if t1 < 1.0 { color_lerp(color_begin, color_end, t1 as f32) } else { color_end },
    });
}

/// Draws a line with integer incremental stepping along the dominant axis.
///
/// The segment is first cut to the framebuffer, so the sweep never leaves it by more than one
/// pixel however far out the endpoints are. Endpoints are then floored to pixels. The sweep always
/// runs from the endpoint with the smaller dominant coordinate to the larger one, swapping the
/// colors along with the endpoints. Color is interpolated linearly in screen space by progress
/// along the dominant axis. Depth is neither tested nor written.
pub fn draw_line(fb: &mut FramebufferSet, begin: Vector4<f32>, end: Vector4<f32>, color_begin: Rgba, color_end: Rgba) {
    let Some(segment) = clip_segment(fb, begin, end, color_begin, color_end) else {
        return;
    };
    let (color_begin, color_end) = (segment.color_begin, segment.color_end);
    // Clipped coordinates lie in [0, size], the casts cannot saturate.
    let x1 = segment.begin[0].floor() as i32;
    let y1 = segment.begin[1].floor() as i32;
    let x2 = segment.end[0].floor() as i32;
    let y2 = segment.end[1].floor() as i32;

    let dx = x2 - x1;
    let dy = y2 - y1;
    let dx1 = dx.abs();
    let dy1 = dy.abs();
    // Minor axis moves up when both deltas share a sign.
    let same_sign = (dx < 0 && dy < 0) || (dx > 0 && dy > 0);
    let minor_step = if same_sign { 1 } else { -1 };

    if dy1 <= dx1 {
        let (mut x, mut y, x_end, c1, c2) = match dx >= 0 {
            true => (x1, y1, x2, color_begin, color_end),
            false => (x2, y2, x1, color_end, color_begin),
        };
        let mut error = 2 * dy1 - dx1;
        fb.set_pixel(x, y, c1);
        while x < x_end {
            x += 1;
            if error < 0 {
                error += 2 * dy1;
            } else {
                y += minor_step;
                error += 2 * (dy1 - dx1);
            }
            let t = 1.0 - (x_end - x) as f32 / dx1 as f32;
            fb.set_pixel(x, y, color_lerp(c1, c2, t));
        }
    } else {
        let (mut x, mut y, y_end, c1, c2) = match dy >= 0 {
            true => (x1, y1, y2, color_begin, color_end),
            false => (x2, y2, y1, color_end, color_begin),
        };
        let mut error = 2 * dx1 - dy1;
        fb.set_pixel(x, y, c1);
        while y < y_end {
            y += 1;
            if error <= 0 {
                error += 2 * dx1;
            } else {
                x += minor_step;
                error += 2 * (dx1 - dy1);
            }
            let t = 1.0 - (y_end - y) as f32 / dy1 as f32;
            fb.set_pixel(x, y, color_lerp(c1, c2, t));
        }
    }
}

/// Draws the three edges of a triangle independently, shared edges get drawn twice.
pub fn rasterize_wireframe(fb: &mut FramebufferSet, t: &Triangle) {
    let [v0, v1, v2] = &t.vertices;
    draw_line(fb, v0.position, v1.position, v0.color, v1.color);
    draw_line(fb, v1.position, v2.position, v1.color, v2.color);
    draw_line(fb, v2.position, v0.position, v2.color, v0.color);
}
