//! Pressure-driven dab painting with deferred compositing.
//!
//! The painter consumes begin/draw/end streams of input samples and stamps
//! circular dabs into a small 16-bit accumulation surface. When the stroke
//! travels far enough that further dabs could leave the accum extent, the
//! buffer is flushed through the output sink and re-centered on the current
//! position. All document-space coordinate math is Q23.8 fixed point so
//! spacing rounds identically regardless of stroke history.

use tracing::{debug, trace};

use crate::{
    blend::{BlendMode, premul_working_color},
    color::{Rgba8, TRANSPARENT},
    error::RasterpadResult,
    fixed::{Q8, Q8_BITS},
    geom::{IPair, IRect},
    shape::circle_fill_rgba16,
    surface::{PixelFormat, Surface},
};

/// One input-device sample in document-space coordinates.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct InputSample {
    pub x: f32,
    pub y: f32,
    /// Pen pressure in [0,1].
    pub pressure: f32,
    /// Button bitmask; zero means pen up.
    #[serde(default)]
    pub buttons: u32,
}

/// Sink for flushed accumulation content.
///
/// `commit` receives the whole 16-bit accum surface, the source origin
/// (always the accum's top-left) and the destination rect in document space;
/// the receiver is expected to run a tile-grid blend and schedule a redraw.
pub trait DabOutput {
    fn commit(&mut self, accum: &Surface, origin: IPair, dest: IRect);
}

// Minimum accumulation extent in pixels.
const ACCUM_MIN_SIZE: i32 = 128;

// Minimum deferred-travel distance in pixels before a forced flush.
const DEFER_MIN_PIXELS: i32 = 10;

/// Accumulating dab painter. One instance per painting session; reset (not
/// recreated) between strokes by `begin`.
pub struct DabPainter {
    accum: Option<Surface>,
    accum_size: i32, // width & height of accum in pixels.
    brush: Option<Surface>,
    dirty: IRect,   // Q8 in accum space.
    remain: i32,    // remaining dabs before a forced flush.
    accum_left: Q8, // doc space.
    accum_top: Q8,  // doc space.
    size_min: Q8,
    size_range: Q8,
    spacing: Q8,
    alpha_min: i32,   // [0,255]
    alpha_range: i32, // [0,255]
    prev_x: Q8,       // document coords of the previous dab.
    prev_y: Q8,
    col: Rgba8,
    mode: BlendMode,
}

impl Default for DabPainter {
    fn default() -> Self {
        Self::new()
    }
}

impl DabPainter {
    pub fn new() -> DabPainter {
        DabPainter {
            accum: None,
            accum_size: 0,
            brush: None,
            dirty: IRect::inverted(),
            remain: 0,
            accum_left: Q8::ZERO,
            accum_top: Q8::ZERO,
            size_min: Q8::ONE,        // one pixel.
            size_range: Q8::ZERO,     // no scaling.
            spacing: Q8(Q8::ONE.0 / 10), // ~10% of size.
            alpha_min: 0,             // no bias.
            alpha_range: 255,         // full range.
            prev_x: Q8::ZERO,
            prev_y: Q8::ZERO,
            col: Rgba8::new(0, 0, 0, 255),
            mode: BlendMode::Normal,
        }
    }

    /// The brush alpha mask. Painting is a no-op until a brush is set.
    pub fn set_brush(&mut self, brush: Surface) {
        debug_assert_eq!(brush.format(), PixelFormat::A8);
        if brush.format() == PixelFormat::A8 {
            self.brush = Some(brush);
        }
    }

    pub fn set_color(&mut self, col: Rgba8) {
        self.col = col;
    }

    pub fn set_blend_mode(&mut self, mode: BlendMode) {
        self.mode = mode;
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.mode
    }

    /// Pressure-to-opacity range, both ends in [0,255].
    pub fn set_alpha_range(&mut self, min: i32, max: i32) {
        let min = min.clamp(0, 255);
        let max = max.clamp(min, 255);
        self.alpha_min = min;
        self.alpha_range = max - min;
    }

    /// Pressure-to-diameter range in Q8 pixels. Grows the accumulation
    /// buffer if needed; on allocation failure the painter is unchanged.
    pub fn set_size_range(&mut self, min: Q8, max: Q8) -> RasterpadResult<()> {
        let min = Q8(min.0.max(0));
        let max = Q8(max.0.max(min.0));
        self.size_min = min;
        self.size_range = max - min;
        self.upsize()
    }

    /// Dab spacing in Q8 pixels; clamped to a minimum of one Q8 unit.
    pub fn set_spacing(&mut self, spacing: Q8) {
        self.spacing = Q8(spacing.0.max(1));
    }

    // Ensure the accum buffer is at least 1.5x the maximum brush diameter,
    // so a stroke can accumulate for at least 1/4 of the brush size before
    // flushing.
    fn upsize(&mut self) -> RasterpadResult<()> {
        let mut required = self.size_min + self.size_range;
        required = Q8(required.0 + (required.0 >> 1));
        let required = required.iceil().max(ACCUM_MIN_SIZE);
        if self.accum.is_none() || required > self.accum_size {
            let mut accum = Surface::create(PixelFormat::Rgba16, required, required)?;
            accum.fill(TRANSPARENT);
            debug!(size = required, "accum buffer sized");
            self.accum = Some(accum);
            self.accum_size = required;
        }
        Ok(())
    }

    fn map_pressure(&self, pressure: f32) -> (i32, Q8) {
        let alpha = self.alpha_min + (pressure * self.alpha_range as f32) as i32;
        let size = Q8(self.size_min.0 + (pressure * self.size_range.0 as f32) as i32);
        (alpha, size)
    }

    /// Begin a stroke: clear the accum, center it on the first sample and
    /// place the first dab. A painter without a sized accum silently
    /// ignores the stroke.
    pub fn begin(&mut self, e: &InputSample, out: &mut dyn DabOutput) {
        let (alpha, size) = self.map_pressure(e.pressure);
        let qx = Q8::from_f32(e.x);
        let qy = Q8::from_f32(e.y);

        self.prev_x = qx;
        self.prev_y = qy;

        if self.accum.is_some() {
            self.start_painting(true);
            self.set_bounds(qx, qy);
            // The first dab cannot overflow: it sits at the recenter point.
            self.paint_dab(qx, qy, alpha, size, out);
        }
    }

    /// Continue a stroke: walk from the previous dab toward the sample in
    /// exact spacing increments, placing one dab per step. Alpha and size
    /// stay constant across all dabs generated from one sample pair.
    pub fn draw(&mut self, e: &InputSample, out: &mut dyn DabOutput) {
        let (alpha, size) = self.map_pressure(e.pressure);

        if self.accum.is_none() {
            return;
        }

        let qx = Q8::from_f32(e.x);
        let qy = Q8::from_f32(e.y);

        let mut x = self.prev_x.0;
        let mut y = self.prev_y.0;
        let dx = qx.0 - x;
        let dy = qy.0 - y;
        let mut dist = ((dx as f64 * dx as f64) + (dy as f64 * dy as f64)).sqrt();
        let spacing = self.spacing.0 as f64;
        if dist >= spacing {
            // Normalize [dx,dy], scale by spacing; all quantities in Q8.
            let inc_x = dx as f64 * spacing / dist;
            let inc_y = dy as f64 * spacing / dist;

            while dist >= spacing {
                dist -= spacing;
                x = (x as f64 + inc_x) as i32;
                y = (y as f64 + inc_y) as i32;

                self.paint_dab(Q8(x), Q8(y), alpha, size, out);
            }

            // Continue from the last placed dab, not the raw sample, so
            // rounding error does not compound across short segments.
            self.prev_x = Q8(x);
            self.prev_y = Q8(y);
        }
    }

    /// End the stroke, committing any remaining deferred paint.
    pub fn end(&mut self, out: &mut dyn DabOutput) {
        if self.accum.is_some() {
            self.flush(out);
        }
    }

    /// Batch markers delimiting a burst of input samples; accum writes
    /// between them need no intermediate redraw.
    pub fn begin_batch(&mut self) {
        self.start_painting(false);
    }

    pub fn end_batch(&mut self) {}

    /// True while dabs have accumulated since the last flush.
    pub fn has_deferred_paint(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Flush deferred paint through the output sink. A no-op when nothing
    /// was painted since the last flush.
    pub fn flush(&mut self, out: &mut dyn DabOutput) {
        // Round the dirty rect out from Q8 to whole pixels.
        let dirty = IRect::new(
            Q8(self.dirty.left).ifloor(),
            Q8(self.dirty.top).ifloor(),
            Q8(self.dirty.right).iceil(),
            Q8(self.dirty.bottom).iceil(),
        );

        if !dirty.is_empty() {
            // The destination is always the entire accum extent in document
            // space; the tile blend does its own overlap clipping.
            let left = self.accum_left.ifloor();
            let top = self.accum_top.ifloor();
            let dest = IRect::new(left, top, left + self.accum_size, top + self.accum_size);

            trace!(?dest, "painter flush");
            if let Some(accum) = self.accum.as_ref() {
                out.commit(accum, IPair::new(0, 0), dest);
            }

            self.dirty = IRect::inverted();
        }
    }

    fn start_painting(&mut self, clear: bool) {
        if clear && let Some(accum) = self.accum.as_mut() {
            accum.fill(TRANSPARENT);
        }
    }

    // Center the accum bounds on (x, y), snapped to a whole-pixel boundary,
    // and recompute how many dabs fit before a forced flush.
    fn set_bounds(&mut self, x: Q8, y: Q8) {
        let half = Q8(self.accum_size << (Q8_BITS - 1));
        self.accum_left = (x - half).ceil();
        self.accum_top = (y - half).ceil();

        let brush_size = (self.size_min + self.size_range).iceil();
        let max_dist = (self.accum_size >> 1) - ((brush_size + 1) >> 1);

        let dist = brush_size.max(DEFER_MIN_PIXELS).min(max_dist);
        self.remain = ((dist << Q8_BITS) / self.spacing.0).max(1);
    }

    // Slow path: the accum extent is exhausted. Flush, clear and recenter
    // on the triggering dab before it is placed.
    fn dab_overflow(&mut self, x: Q8, y: Q8, out: &mut dyn DabOutput) {
        debug!(x = x.0, y = y.0, "accum overflow, recentering");
        self.flush(out);
        self.start_painting(true);
        self.set_bounds(x, y);
    }

    fn paint_dab(&mut self, x: Q8, y: Q8, alpha: i32, size: Q8, out: &mut dyn DabOutput) {
        if self.brush.is_none() {
            return;
        }
        self.remain -= 1;
        if self.remain == 0 {
            self.dab_overflow(x, y, out);
        }

        // The dab's top-left corner in accum space (Q8); the dirty rect
        // covers its full diameter box.
        let half_size = Q8(size.0 >> 1);
        let left = (x - half_size - self.accum_left).0;
        let top = (y - half_size - self.accum_top).0;

        // The dab fits within the accum bounds unless upsize failed, in
        // which case the circle fill clips it.
        if let Some(accum) = self.accum.as_mut() {
            let cx = (x - self.accum_left).ifloor();
            let cy = (y - self.accum_top).ifloor();
            let radius = size.ifloor() >> 1;
            let col = premul_working_color(self.col, alpha);
            circle_fill_rgba16(accum, cx, cy, radius, col);
        }

        self.dirty.include(left, top, left + size.0, top + size.0);
    }

    #[cfg(test)]
    fn accum_origin(&self) -> (Q8, Q8) {
        (self.accum_left, self.accum_top)
    }
}
