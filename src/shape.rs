//! Filled-circle span generation for brush dabs.
//!
//! A midpoint circle walk emits horizontal spans relative to the circle
//! center; span writers clip to the surface and pick a copy or over fill
//! based on the color's alpha. This is deliberately a simple filled-circle
//! rasterizer, not a general antialiased primitive renderer.

use crate::{
    blend::{span_col_copy_rgba8, span_col_copy_rgba16, span_col_over_rgba8, span_col_over_rgba16},
    color::{Rgba8, Rgba16},
    error::RasterpadResult,
    surface::{PixelFormat, Surface},
};

/// Walk a filled circle of the given radius, emitting `(dx, dy, len)` spans
/// relative to the center. Radius 0 emits a single pixel.
fn circle_spans(radius: i32, mut span: impl FnMut(i32, i32, i32)) {
    let mut f = 1 - radius;
    let mut x = radius;
    let mut y = 0;

    span(-radius, 0, radius + radius + 1);

    while x > y {
        if f >= 0 {
            if x - 1 != y {
                // avoid overlap with the final x == y spans.
                span(-y, -x, y + y + 1);
                span(-y, x, y + y + 1);
            }
            x -= 1;
            f -= x + x;
        }
        y += 1;
        f += y + y + 1;
        span(-x, -y, x + x + 1);
        span(-x, y, x + x + 1);
    }
}

// Clip one span against the surface and return the byte range plus length.
fn clip_span(sd: &Surface, cx: i32, cy: i32, dx: i32, dy: i32, len: i32) -> Option<(i32, i32, i32)> {
    let y = cy + dy;
    if y < 0 || y >= sd.height() {
        return None;
    }
    let mut x0 = cx + dx;
    let mut x1 = x0 + len;
    if x0 < 0 {
        x0 = 0;
    }
    if x1 > sd.width() {
        x1 = sd.width();
    }
    if x0 >= x1 {
        return None;
    }
    Some((x0, y, x1 - x0))
}

/// Fill a circle into an RGBA8 surface, clipped to its bounds.
pub fn circle_fill_rgba8(sd: &mut Surface, cx: i32, cy: i32, radius: i32, col: Rgba8) {
    debug_assert_eq!(sd.format(), PixelFormat::Rgba8);
    let over = col.a < 255;
    circle_spans(radius, |dx, dy, len| {
        if let Some((x, y, n)) = clip_span(sd, cx, cy, dx, dy, len) {
            let row = &mut sd.row_mut(y)[x as usize * 4..];
            if over {
                span_col_over_rgba8(row, n as usize, col);
            } else {
                span_col_copy_rgba8(row, n as usize, col);
            }
        }
    });
}

/// Fill a circle of premultiplied 16-bit color into an RGBA16 surface.
/// This is the dab accumulation fast path.
pub fn circle_fill_rgba16(sd: &mut Surface, cx: i32, cy: i32, radius: i32, col: Rgba16) {
    debug_assert_eq!(sd.format(), PixelFormat::Rgba16);
    let over = col.a < 65535;
    circle_spans(radius, |dx, dy, len| {
        if let Some((x, y, n)) = clip_span(sd, cx, cy, dx, dy, len) {
            let row = &mut sd.row_mut(y)[x as usize * 8..];
            if over {
                span_col_over_rgba16(row, n as usize, col);
            } else {
                span_col_copy_rgba16(row, n as usize, col);
            }
        }
    });
}

/// Build a round A8 brush mask of the given diameter, fully opaque inside
/// the disc. Stands in for an externally loaded brush image.
pub fn brush_disc_a8(diameter: i32) -> RasterpadResult<Surface> {
    let diameter = diameter.max(1);
    let mut sd = Surface::create(PixelFormat::A8, diameter, diameter)?;
    let radius = (diameter - 1) / 2;
    let c = radius;
    let width = sd.width();
    let height = sd.height();
    circle_spans(radius, |dx, dy, len| {
        let y = c + dy;
        if y < 0 || y >= height {
            return;
        }
        let x0 = (c + dx).max(0);
        let x1 = (c + dx + len).min(width);
        if x0 < x1 {
            let off = y as usize * width as usize;
            sd.data_mut()[off + x0 as usize..off + x1 as usize].fill(255);
        }
    });
    Ok(sd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::TRANSPARENT;

    fn painted_rgba16(sd: &Surface) -> Vec<(i32, i32)> {
        let mut out = Vec::new();
        for y in 0..sd.height() {
            for x in 0..sd.width() {
                if sd.pixel_rgba16(x, y).a != 0 {
                    out.push((x, y));
                }
            }
        }
        out
    }

    #[test]
    fn radius_zero_paints_one_pixel() {
        let mut sd = Surface::create(PixelFormat::Rgba16, 5, 5).unwrap();
        sd.fill(TRANSPARENT);
        circle_fill_rgba16(&mut sd, 2, 2, 0, Rgba16::new(256, 0, 0, 256));
        assert_eq!(painted_rgba16(&sd), vec![(2, 2)]);
    }

    #[test]
    fn radius_one_paints_a_plus_shape() {
        let mut sd = Surface::create(PixelFormat::Rgba16, 5, 5).unwrap();
        sd.fill(TRANSPARENT);
        circle_fill_rgba16(&mut sd, 2, 2, 1, Rgba16::new(256, 0, 0, 256));
        let px = painted_rgba16(&sd);
        assert_eq!(px, vec![(2, 1), (1, 2), (2, 2), (3, 2), (2, 3)]);
    }

    #[test]
    fn circle_is_symmetric() {
        let mut sd = Surface::create(PixelFormat::Rgba16, 16, 16).unwrap();
        sd.fill(TRANSPARENT);
        circle_fill_rgba16(&mut sd, 8, 8, 5, Rgba16::new(0, 0, 0, 1000));
        for (x, y) in painted_rgba16(&sd) {
            let (mx, my) = (16 - x, 16 - y);
            assert_ne!(sd.pixel_rgba16(mx, my).a, 0, "mirror of ({x},{y})");
        }
    }

    #[test]
    fn clipped_circle_stays_in_bounds() {
        // A circle hanging off every edge must not panic and must only
        // touch in-bounds pixels.
        let mut sd = Surface::create(PixelFormat::Rgba16, 8, 8).unwrap();
        sd.fill(TRANSPARENT);
        circle_fill_rgba16(&mut sd, 0, 0, 6, Rgba16::new(0, 0, 0, 500));
        circle_fill_rgba16(&mut sd, 7, 7, 6, Rgba16::new(0, 0, 0, 500));
        assert!(!painted_rgba16(&sd).is_empty());
    }

    #[test]
    fn overlapping_dabs_accumulate_alpha() {
        let mut sd = Surface::create(PixelFormat::Rgba16, 9, 9).unwrap();
        sd.fill(TRANSPARENT);
        let col = Rgba16::new(0, 0, 0, 10000);
        circle_fill_rgba16(&mut sd, 4, 4, 2, col);
        let once = sd.pixel_rgba16(4, 4).a;
        circle_fill_rgba16(&mut sd, 4, 4, 2, col);
        assert!(sd.pixel_rgba16(4, 4).a > once);
    }

    #[test]
    fn rgba8_circle_full_alpha_copies() {
        let mut sd = Surface::create(PixelFormat::Rgba8, 5, 5).unwrap();
        circle_fill_rgba8(&mut sd, 2, 2, 1, Rgba8::new(9, 8, 7, 255));
        assert_eq!(sd.pixel_rgba8(2, 2), Rgba8::new(9, 8, 7, 255));
        assert_eq!(sd.pixel_rgba8(0, 0), Rgba8::new(0, 0, 0, 0));
    }

    #[test]
    fn brush_disc_is_round_and_opaque() {
        let disc = brush_disc_a8(9).unwrap();
        assert_eq!(disc.format(), PixelFormat::A8);
        assert_eq!(disc.width(), 9);
        let data = disc.data();
        // center opaque, corners clear.
        assert_eq!(data[4 * 9 + 4], 255);
        assert_eq!(data[0], 0);
        assert_eq!(data[9 * 9 - 1], 0);
    }
}
