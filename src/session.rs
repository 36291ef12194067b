//! Painting session: one open document, one active layer, one brush.
//!
//! The session owns the frame tree and the dab painter and wires them
//! together: pen input drives the painter, painter flushes land in the active
//! layer's tile grid, and a coalescing timer tells the host when a redraw is
//! worth doing. This is the seam a windowing shell or script runner talks to.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument};

use crate::{
    blend::BlendMode,
    color::Rgba8,
    error::{RasterpadError, RasterpadResult},
    fixed::Q8,
    frame::{Frame, FrameKind, FrameMessage},
    geom::{IPair, IRect},
    grid::{BlendRequest, TileGrid},
    painter::{DabOutput, DabPainter, InputSample},
    surface::{PixelFormat, Surface},
};

// Redraws are coalesced: paint must sit deferred this long before
// `poll_commit` reports it.
const COMMIT_INTERVAL: Duration = Duration::from_millis(100);

/// An interactive painting session.
pub struct Session {
    root: Option<Frame>,
    painter: DabPainter,
    /// 1-based layer handle; 0 means no layer is active.
    active_layer: usize,
    pen_down: bool,
    commit_due: Option<Instant>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Session {
        Session {
            root: None,
            painter: DabPainter::new(),
            active_layer: 0,
            pen_down: false,
            commit_due: None,
        }
    }

    // Document lifecycle.

    /// Open a fresh document with the given paper color, replacing any open
    /// one. The document starts with no layers.
    #[instrument(skip(self))]
    pub fn new_doc(&mut self, width: i32, height: i32, paper: Rgba8) -> RasterpadResult<()> {
        if width <= 0 || height <= 0 {
            return Err(RasterpadError::validation(format!(
                "document size {width}x{height} is not positive"
            )));
        }
        info!(width, height, "new document");
        self.root = Some(Frame::canvas(width, height, paper));
        self.active_layer = 0;
        self.pen_down = false;
        self.commit_due = None;
        Ok(())
    }

    pub fn close_doc(&mut self) {
        self.root = None;
        self.active_layer = 0;
        self.pen_down = false;
        self.commit_due = None;
    }

    pub fn has_doc(&self) -> bool {
        self.root.is_some()
    }

    pub fn doc_size(&self) -> Option<(i32, i32)> {
        match self.root.as_ref()?.kind() {
            FrameKind::Canvas(c) => Some((c.width, c.height)),
            _ => None,
        }
    }

    // Layer management. Handles are 1-based bottom-up; 0 is "none".

    pub fn layer_count(&self) -> usize {
        self.root.as_ref().map_or(0, Frame::child_count)
    }

    /// Insert a new transparent layer above layer `above` (0 inserts at the
    /// bottom). Returns the new layer's handle.
    pub fn new_layer(&mut self, above: usize) -> RasterpadResult<usize> {
        let (width, height) = self
            .doc_size()
            .ok_or_else(|| RasterpadError::validation("no open document"))?;
        let root = match self.root.as_mut() {
            Some(root) => root,
            None => return Err(RasterpadError::validation("no open document")),
        };
        let index = above.min(root.child_count());
        root.insert_child(index, Frame::layer(width, height)?);
        if self.active_layer > index {
            self.active_layer += 1;
        }
        debug!(handle = index + 1, "layer added");
        Ok(index + 1)
    }

    pub fn delete_layer(&mut self, handle: usize) -> RasterpadResult<()> {
        let root = self
            .root
            .as_mut()
            .ok_or_else(|| RasterpadError::validation("no open document"))?;
        if handle == 0 || root.remove_child(handle - 1).is_none() {
            return Err(RasterpadError::validation(format!("no layer {handle}")));
        }
        if self.active_layer == handle {
            self.active_layer = 0;
        } else if self.active_layer > handle {
            self.active_layer -= 1;
        }
        Ok(())
    }

    /// Select the layer receiving paint; 0 deselects.
    pub fn set_active_layer(&mut self, handle: usize) -> RasterpadResult<()> {
        if handle > self.layer_count() {
            return Err(RasterpadError::validation(format!("no layer {handle}")));
        }
        self.active_layer = handle;
        Ok(())
    }

    pub fn active_layer(&self) -> usize {
        self.active_layer
    }

    /// Replace a layer's content from a flat decoded image.
    pub fn load_into_layer(&mut self, handle: usize, sd: &Surface) -> RasterpadResult<()> {
        let root = self
            .root
            .as_mut()
            .ok_or_else(|| RasterpadError::validation("no open document"))?;
        let layer = handle
            .checked_sub(1)
            .and_then(|i| root.child_mut(i))
            .ok_or_else(|| RasterpadError::validation(format!("no layer {handle}")))?;
        layer.handle(FrameMessage::LoadSurface(sd))
    }

    // Brush configuration. Pixel quantities arrive as floats from UI
    // sliders or scripts and are quantized here.

    pub fn set_brush(&mut self, mask: Surface) {
        self.painter.set_brush(mask);
    }

    pub fn set_brush_color(&mut self, col: Rgba8) {
        self.painter.set_color(col);
    }

    pub fn set_brush_mode(&mut self, mode: BlendMode) {
        self.painter.set_blend_mode(mode);
    }

    /// Pressure-to-diameter range in pixels.
    pub fn set_brush_size(&mut self, min_px: f32, max_px: f32) -> RasterpadResult<()> {
        self.painter
            .set_size_range(Q8::from_f32(min_px), Q8::from_f32(max_px))
    }

    /// Pressure-to-opacity range, both ends in [0,1].
    pub fn set_brush_alpha(&mut self, min: f32, max: f32) {
        self.painter
            .set_alpha_range((min * 255.0) as i32, (max * 255.0) as i32);
    }

    /// Dab spacing in pixels.
    pub fn set_brush_spacing(&mut self, px: f32) {
        self.painter.set_spacing(Q8::from_f32(px));
    }

    // Input routing.

    /// Feed one pen sample. Button transitions open and close strokes;
    /// samples without a document or active layer are dropped.
    pub fn pen_input(&mut self, e: &InputSample) {
        let was_down = self.pen_down;
        self.pen_down = e.buttons != 0;

        let active = self.active_layer;
        let mode = self.painter.blend_mode();
        let Some(root) = self.root.as_mut() else {
            return;
        };
        let Some(layer) = active
            .checked_sub(1)
            .and_then(|i| root.child_mut(i))
            .and_then(Frame::as_layer_mut)
        else {
            return;
        };

        let mut out = LayerOutput {
            grid: layer.grid_mut(),
            mode,
            commit_due: &mut self.commit_due,
        };
        match (was_down, e.buttons != 0) {
            (false, true) => self.painter.begin(e, &mut out),
            (true, true) => self.painter.draw(e, &mut out),
            (true, false) => self.painter.end(&mut out),
            (false, false) => {}
        }
    }

    /// Bracket a burst of queued input samples; the painter skips redundant
    /// work between the markers.
    pub fn begin_batch(&mut self) {
        self.painter.begin_batch();
    }

    pub fn end_batch(&mut self) {
        self.painter.end_batch();
        // Paint still deferred in the accum needs a redraw even though no
        // flush has happened yet; batch end is where that gets signalled.
        if self.painter.has_deferred_paint() && self.commit_due.is_none() {
            self.commit_due = Some(Instant::now());
        }
    }

    /// True once deferred paint has been waiting a full commit interval;
    /// the caller should redraw and the timer resets.
    pub fn poll_commit(&mut self) -> bool {
        match self.commit_due {
            Some(since) if since.elapsed() >= COMMIT_INTERVAL => {
                self.commit_due = None;
                true
            }
            _ => false,
        }
    }

    /// True while paint is deferred, whether or not the interval elapsed.
    pub fn commit_pending(&self) -> bool {
        self.commit_due.is_some()
    }

    // Output.

    /// Composite the document into a fresh RGBA8 surface.
    pub fn render(&self) -> RasterpadResult<Surface> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| RasterpadError::validation("no open document"))?;
        let (width, height) = self
            .doc_size()
            .ok_or_else(|| RasterpadError::validation("no open document"))?;
        let mut out = Surface::create(PixelFormat::Rgba8, width, height)?;
        root.render(&mut out, 0, 0);
        Ok(out)
    }

    /// Composite the document into an existing RGBA8 target at an offset.
    pub fn render_to(&self, target: &mut Surface, ox: i32, oy: i32) -> RasterpadResult<()> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| RasterpadError::validation("no open document"))?;
        root.render(target, ox, oy);
        Ok(())
    }
}

// Adapter delivering painter flushes into a layer's tile grid.
struct LayerOutput<'a> {
    grid: &'a mut TileGrid,
    mode: BlendMode,
    commit_due: &'a mut Option<Instant>,
}

impl DabOutput for LayerOutput<'_> {
    fn commit(&mut self, accum: &Surface, origin: IPair, dest: IRect) {
        let req = BlendRequest {
            mode: self.mode,
            alpha: 255,
            image: accum,
            source: IRect::new(
                origin.x,
                origin.y,
                origin.x + dest.width(),
                origin.y + dest.height(),
            ),
            dest,
        };
        if let Err(err) = self.grid.blend_image(&req) {
            error!(%err, "deferred paint blend failed");
            return;
        }
        if self.commit_due.is_none() {
            *self.commit_due = Some(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::WHITE;
    use crate::shape::brush_disc_a8;

    fn painting_session() -> Session {
        let mut s = Session::new();
        s.new_doc(512, 512, WHITE).unwrap();
        s.new_layer(0).unwrap();
        s.set_active_layer(1).unwrap();
        s.set_brush(brush_disc_a8(8).unwrap());
        s.set_brush_color(Rgba8::new(0, 0, 0, 255));
        s.set_brush_size(8.0, 8.0).unwrap();
        s.set_brush_alpha(1.0, 1.0);
        s.set_brush_spacing(2.0);
        s
    }

    fn pen(x: f32, y: f32, buttons: u32) -> InputSample {
        InputSample { x, y, pressure: 1.0, buttons }
    }

    #[test]
    fn new_doc_requires_positive_size() {
        let mut s = Session::new();
        assert!(s.new_doc(0, 100, WHITE).is_err());
        assert!(s.new_doc(100, -1, WHITE).is_err());
        assert!(s.new_doc(100, 100, WHITE).is_ok());
    }

    #[test]
    fn layer_handles_are_one_based() {
        let mut s = Session::new();
        s.new_doc(100, 100, WHITE).unwrap();
        assert_eq!(s.layer_count(), 0);
        assert_eq!(s.new_layer(0).unwrap(), 1);
        assert_eq!(s.new_layer(1).unwrap(), 2);
        assert_eq!(s.layer_count(), 2);
        assert!(s.set_active_layer(3).is_err());
        assert!(s.set_active_layer(0).is_ok());
    }

    #[test]
    fn delete_layer_adjusts_active_handle() {
        let mut s = Session::new();
        s.new_doc(100, 100, WHITE).unwrap();
        s.new_layer(0).unwrap();
        s.new_layer(1).unwrap();
        s.set_active_layer(2).unwrap();
        s.delete_layer(1).unwrap();
        assert_eq!(s.active_layer(), 1);
        s.delete_layer(1).unwrap();
        assert_eq!(s.active_layer(), 0);
        assert!(s.delete_layer(1).is_err());
    }

    #[test]
    fn pen_without_active_layer_is_dropped() {
        let mut s = Session::new();
        s.new_doc(100, 100, WHITE).unwrap();
        s.new_layer(0).unwrap();
        // active layer never selected.
        s.pen_input(&pen(10.0, 10.0, 1));
        s.pen_input(&pen(20.0, 10.0, 1));
        s.pen_input(&pen(20.0, 10.0, 0));
        assert!(!s.commit_pending());
        let out = s.render().unwrap();
        assert_eq!(out.pixel_rgba8(10, 10), WHITE);
    }

    #[test]
    fn stroke_marks_the_document() {
        let mut s = painting_session();
        s.pen_input(&pen(50.0, 50.0, 1));
        s.pen_input(&pen(80.0, 50.0, 1));
        s.pen_input(&pen(80.0, 50.0, 0));
        assert!(s.commit_pending());
        let out = s.render().unwrap();
        assert_eq!(out.pixel_rgba8(50, 50), Rgba8::new(0, 0, 0, 255));
        assert_eq!(out.pixel_rgba8(65, 50), Rgba8::new(0, 0, 0, 255));
        // well away from the stroke the paper shows through.
        assert_eq!(out.pixel_rgba8(200, 200), WHITE);
    }

    #[test]
    fn batch_end_marks_commit_pending() {
        let mut s = painting_session();
        s.begin_batch();
        // One dab: no overflow, so nothing has flushed yet.
        s.pen_input(&pen(50.0, 50.0, 1));
        assert!(!s.commit_pending());
        s.end_batch();
        assert!(s.commit_pending());
    }

    #[test]
    fn batch_end_without_paint_stays_quiet() {
        let mut s = painting_session();
        s.begin_batch();
        s.end_batch();
        assert!(!s.commit_pending());
    }

    #[test]
    fn render_without_doc_is_an_error() {
        let s = Session::new();
        assert!(s.render().is_err());
    }

    #[test]
    fn close_doc_resets_state() {
        let mut s = painting_session();
        s.pen_input(&pen(10.0, 10.0, 1));
        s.close_doc();
        assert!(!s.has_doc());
        assert_eq!(s.active_layer(), 0);
        assert!(!s.commit_pending());
    }

    #[test]
    fn load_into_layer_shows_in_render() {
        let mut s = Session::new();
        s.new_doc(64, 64, Rgba8::new(0, 0, 0, 255)).unwrap();
        let handle = s.new_layer(0).unwrap();
        let mut flat = Surface::create(PixelFormat::Rgba8, 64, 64).unwrap();
        flat.fill_rect(WHITE, 10, 10, 4, 4);
        s.load_into_layer(handle, &flat).unwrap();
        let out = s.render().unwrap();
        assert_eq!(out.pixel_rgba8(11, 11), WHITE);
        assert_eq!(out.pixel_rgba8(30, 30), Rgba8::new(0, 0, 0, 255));
    }
}
