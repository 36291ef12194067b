//! Flat rectangular pixel buffers.
//!
//! A [`Surface`] owns `stride * height` bytes in one of a small set of
//! channel formats. All mutation goes through fill/blend operations that clip
//! to the surface bounds internally; an empty result after clipping is a
//! silent no-op, never an error. Out-of-scope writes are impossible.

use tracing::trace;

use crate::{
    blend::{BlendMode, BlendSource, SpanOp, blend_span_rgba8, read_px16, span_col_copy_rgba8,
            span_col_copy_rgba16, span_col_over_rgba8},
    color::{Rgba8, Rgba16, mul8},
    error::{RasterpadError, RasterpadResult},
};

/// Channel count (1-4) and bytes per channel (1 or 2), as a closed set.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PixelFormat {
    A8,
    La8,
    Rgb8,
    Rgba8,
    A16,
    La16,
    Rgb16,
    Rgba16,
}

impl PixelFormat {
    pub const fn channels(self) -> usize {
        match self {
            PixelFormat::A8 | PixelFormat::A16 => 1,
            PixelFormat::La8 | PixelFormat::La16 => 2,
            PixelFormat::Rgb8 | PixelFormat::Rgb16 => 3,
            PixelFormat::Rgba8 | PixelFormat::Rgba16 => 4,
        }
    }

    pub const fn bytes_per_channel(self) -> usize {
        match self {
            PixelFormat::A8 | PixelFormat::La8 | PixelFormat::Rgb8 | PixelFormat::Rgba8 => 1,
            PixelFormat::A16 | PixelFormat::La16 | PixelFormat::Rgb16 | PixelFormat::Rgba16 => 2,
        }
    }

    pub const fn bytes_per_pixel(self) -> usize {
        self.channels() * self.bytes_per_channel()
    }
}

// Sanity cap on backing storage, so absurd dimensions fail cleanly instead of
// attempting a multi-gigabyte allocation.
const MAX_SURFACE_BYTES: usize = 1 << 31;

/// A flat pixel buffer: format, dimensions, row stride and owned bytes.
#[derive(Clone, Debug)]
pub struct Surface {
    format: PixelFormat,
    width: i32,
    height: i32,
    stride: usize,
    data: Vec<u8>,
}

impl Surface {
    /// Allocate a zeroed surface. Negative dimensions clamp to zero.
    pub fn create(format: PixelFormat, width: i32, height: i32) -> RasterpadResult<Surface> {
        let width = width.max(0);
        let height = height.max(0);
        let stride = width as usize * format.bytes_per_pixel();
        let size = stride * height as usize;
        if size > MAX_SURFACE_BYTES {
            return Err(RasterpadError::resource(format!(
                "surface {width}x{height} exceeds storage cap"
            )));
        }
        Ok(Surface { format, width, height, stride, data: vec![0; size] })
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub(crate) fn row(&self, y: i32) -> &[u8] {
        let off = y as usize * self.stride;
        &self.data[off..off + self.stride]
    }

    pub(crate) fn row_mut(&mut self, y: i32) -> &mut [u8] {
        let off = y as usize * self.stride;
        &mut self.data[off..off + self.stride]
    }

    /// Read one RGBA8 pixel (bounds are the caller's concern; debug-asserted).
    pub fn pixel_rgba8(&self, x: i32, y: i32) -> Rgba8 {
        debug_assert_eq!(self.format, PixelFormat::Rgba8);
        debug_assert!(x >= 0 && x < self.width && y >= 0 && y < self.height);
        let off = y as usize * self.stride + x as usize * 4;
        let px = &self.data[off..off + 4];
        Rgba8::new(px[0], px[1], px[2], px[3])
    }

    /// Read one RGBA16 pixel.
    pub fn pixel_rgba16(&self, x: i32, y: i32) -> Rgba16 {
        debug_assert_eq!(self.format, PixelFormat::Rgba16);
        debug_assert!(x >= 0 && x < self.width && y >= 0 && y < self.height);
        let off = y as usize * self.stride + x as usize * 8;
        read_px16(&self.data[off..off + 8])
    }

    /// Fill the whole surface with a (non-premultiplied) color.
    pub fn fill(&mut self, col: Rgba8) {
        self.fill_rect_nc(col, 0, 0, self.width, self.height);
    }

    /// Fill a rect, clipping it to the surface first.
    pub fn fill_rect(&mut self, col: Rgba8, x: i32, y: i32, mut width: i32, mut height: i32) {
        let (x, y) = {
            let (mut x, mut y) = (x, y);
            if x < 0 {
                width += x;
                x = 0;
            }
            if y < 0 {
                height += y;
                y = 0;
            }
            (x, y)
        };
        if width > 0 && height > 0 {
            width = width.min(self.width - x);
            height = height.min(self.height - y);
            if width > 0 && height > 0 {
                self.fill_rect_nc(col, x, y, width, height);
            }
        }
    }

    // No clip: the rect must lie within the surface.
    fn fill_rect_nc(&mut self, col: Rgba8, x: i32, y: i32, width: i32, height: i32) {
        debug_assert!(x >= 0 && y >= 0 && width >= 0 && height >= 0);
        debug_assert!(x + width <= self.width && y + height <= self.height);
        let bpp = self.format.bytes_per_pixel();
        match self.format {
            PixelFormat::Rgba8 => {
                for yy in y..y + height {
                    let off = x as usize * bpp;
                    let row = &mut self.row_mut(yy)[off..];
                    span_col_copy_rgba8(row, width as usize, col);
                }
            }
            PixelFormat::Rgba16 => {
                let col = col.widen();
                for yy in y..y + height {
                    let off = x as usize * bpp;
                    let row = &mut self.row_mut(yy)[off..];
                    span_col_copy_rgba16(row, width as usize, col);
                }
            }
            _ => debug_assert!(false, "fill unsupported for {:?}", self.format),
        }
    }

    /// Blend a straight-alpha color over a rect, clipping to the surface.
    pub fn blend_rect(&mut self, col: Rgba8, x: i32, y: i32, mut width: i32, mut height: i32) {
        debug_assert_eq!(self.format, PixelFormat::Rgba8);
        let (mut x, mut y) = (x, y);
        if x < 0 {
            width += x;
            x = 0;
        }
        if y < 0 {
            height += y;
            y = 0;
        }
        if width > 0 && height > 0 {
            width = width.min(self.width - x);
            height = height.min(self.height - y);
            if width > 0 && height > 0 {
                for yy in y..y + height {
                    let off = x as usize * 4;
                    let row = &mut self.row_mut(yy)[off..];
                    span_col_over_rgba8(row, width as usize, col);
                }
            }
        }
    }

    /// Copy `src` at offset `(x, y)` into this surface, with clipping.
    pub fn copy_from(&mut self, x: i32, y: i32, src: &Surface) {
        self.blend(x, y, src, SpanOp::Copy, 0);
    }

    /// Composite `src` at offset `(x, y)`, clipping source and destination
    /// symmetrically: negative offsets consume the source origin; overflow
    /// past the far edge shrinks the span. Empty after clipping is a no-op.
    pub fn blend(&mut self, x: i32, y: i32, src: &Surface, op: SpanOp, alpha: i32) {
        debug_assert_eq!(self.format, PixelFormat::Rgba8);
        debug_assert_eq!(src.format, PixelFormat::Rgba8);
        let (mut ox, mut oy) = (0i32, 0i32);
        let (mut x, mut y) = (x, y);
        let mut width = src.width;
        let mut height = src.height;
        if x < 0 {
            ox -= x;
            width += x;
            x = 0;
        }
        if y < 0 {
            oy -= y;
            height += y;
            y = 0;
        }
        if width > 0 && height > 0 {
            width = width.min(self.width - x);
            height = height.min(self.height - y);
            if width > 0 && height > 0 {
                let alpha = alpha.clamp(0, 255) as u8;
                for row_i in 0..height {
                    let doff = x as usize * 4;
                    let soff = ox as usize * 4;
                    let srow = &src.row(oy + row_i)[soff..];
                    let drow = &mut self.row_mut(y + row_i)[doff..];
                    op.apply(drow, srow, width as usize, alpha);
                }
            }
        }
    }

    /// Same clipping discipline as [`Surface::blend`], but pulls pixels from
    /// an abstract per-scanline 16-bit source.
    pub fn blend_source(&mut self, x: i32, y: i32, src: &mut dyn BlendSource, mode: BlendMode) {
        debug_assert_eq!(self.format, PixelFormat::Rgba8);
        let (mut ox, mut oy) = (0i32, 0i32);
        let (mut x, mut y) = (x, y);
        let mut width = src.width();
        let mut height = src.height();
        if x < 0 {
            ox -= x;
            width += x;
            x = 0;
        }
        if y < 0 {
            oy -= y;
            height += y;
            y = 0;
        }
        if width > 0 && height > 0 {
            width = width.min(self.width - x);
            height = height.min(self.height - y);
            if width > 0 && height > 0 {
                trace!(x, y, width, height, ?mode, "blend_source");
                src.begin(ox, oy, width, height);
                for row_i in 0..height {
                    let doff = x as usize * 4;
                    let drow = &mut self.row_mut(y + row_i)[doff..];
                    blend_span_rgba8(mode, drow, width as usize, src);
                    src.next_row();
                }
            }
        }
    }

    /// Convert straight-alpha contents to premultiplied in place.
    pub fn premultiply(&mut self) {
        match self.format {
            PixelFormat::Rgba8 => {
                for y in 0..self.height {
                    for px in self.row_mut(y).chunks_exact_mut(4) {
                        let a = px[3];
                        px[0] = mul8(a, px[0]);
                        px[1] = mul8(a, px[1]);
                        px[2] = mul8(a, px[2]);
                    }
                }
            }
            PixelFormat::La8 => {
                for y in 0..self.height {
                    for px in self.row_mut(y).chunks_exact_mut(2) {
                        px[0] = mul8(px[1], px[0]);
                    }
                }
            }
            _ => debug_assert!(false, "premultiply unsupported for {:?}", self.format),
        }
    }
}

/// A [`BlendSource`] yielding one constant 16-bit color, unbounded in extent.
pub struct ColorSource16 {
    pub col: Rgba16,
}

impl BlendSource for ColorSource16 {
    fn begin(&mut self, _x: i32, _y: i32, _width: i32, _height: i32) {}

    fn next_row(&mut self) {}

    fn read1(&mut self) -> Rgba16 {
        self.col
    }

    fn width(&self) -> i32 {
        i32::MAX
    }

    fn height(&self) -> i32 {
        i32::MAX
    }
}

/// A [`BlendSource`] reading an RGBA16 surface row by row, modulating each
/// pixel by a blend alpha (`(c * (alpha+1)) >> 8`, idempotent at 255).
pub struct SurfaceReader16<'a> {
    sd: &'a Surface,
    alpha: u32, // [0,255]
    org_x: i32, // source-rect origin within the surface.
    org_y: i32,
    row: usize, // byte offset of the current row origin.
    pos: usize, // byte offset of the read cursor.
}

impl<'a> SurfaceReader16<'a> {
    pub fn new(sd: &'a Surface, alpha: i32) -> Self {
        Self::with_origin(sd, alpha, 0, 0)
    }

    /// Read starting from `(x, y)` of the surface instead of its corner.
    pub fn with_origin(sd: &'a Surface, alpha: i32, x: i32, y: i32) -> Self {
        debug_assert_eq!(sd.format, PixelFormat::Rgba16);
        debug_assert!(x >= 0 && y >= 0);
        Self {
            sd,
            alpha: alpha.clamp(0, 255) as u32,
            org_x: x.max(0),
            org_y: y.max(0),
            row: 0,
            pos: 0,
        }
    }
}

impl BlendSource for SurfaceReader16<'_> {
    fn begin(&mut self, x: i32, y: i32, _width: i32, _height: i32) {
        self.row =
            (self.org_y + y) as usize * self.sd.stride + (self.org_x + x) as usize * 8;
        self.pos = self.row;
    }

    fn next_row(&mut self) {
        self.row += self.sd.stride;
        self.pos = self.row;
    }

    fn read1(&mut self) -> Rgba16 {
        let c = read_px16(&self.sd.data[self.pos..self.pos + 8]);
        self.pos += 8;
        if self.alpha == 255 {
            c
        } else {
            let a1 = self.alpha + 1;
            Rgba16 {
                r: ((c.r as u32 * a1) >> 8) as u16,
                g: ((c.g as u32 * a1) >> 8) as u16,
                b: ((c.b as u32 * a1) >> 8) as u16,
                a: ((c.a as u32 * a1) >> 8) as u16,
            }
        }
    }

    fn width(&self) -> i32 {
        self.sd.width - self.org_x
    }

    fn height(&self) -> i32 {
        self.sd.height - self.org_y
    }
}
