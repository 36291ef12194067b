//! Scene composition: a tree of frames rendered back to front.
//!
//! A document is a canvas frame whose children are paint layers and simple
//! box decorations. Frames are manipulated through [`FrameMessage`], a closed
//! command set dispatched exhaustively, so adding a message is a compile
//! error everywhere it is not handled.

use tracing::debug;

use crate::{
    blend::{BlendMode, SpanOp},
    color::Rgba8,
    error::{RasterpadError, RasterpadResult},
    geom::IRect,
    grid::{BlendRequest, TILE_SIZE, TileGrid},
    surface::Surface,
};

/// A flat colored rectangle, blended over whatever is below it.
#[derive(Debug)]
pub struct BoxFrame {
    pub rect: IRect,
    pub col: Rgba8,
}

/// A paintable layer backed by a tile grid.
#[derive(Debug)]
pub struct LayerFrame {
    grid: TileGrid,
    pub mode: BlendMode,
    /// Layer opacity in [0,255].
    pub alpha: i32,
}

impl LayerFrame {
    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut TileGrid {
        &mut self.grid
    }
}

/// The document root: fixed dimensions and an opaque paper color.
#[derive(Debug)]
pub struct CanvasFrame {
    pub width: i32,
    pub height: i32,
    pub paper: Rgba8,
}

#[derive(Debug)]
pub enum FrameKind {
    Canvas(CanvasFrame),
    Layer(LayerFrame),
    Box(BoxFrame),
}

/// Commands accepted by [`Frame::handle`].
///
/// The set is closed on purpose; handlers match it exhaustively rather than
/// ignoring unknown messages.
pub enum FrameMessage<'a> {
    SetSize { width: i32, height: i32 },
    SetVisible(bool),
    SetColor(Rgba8),
    /// Frame opacity in [0,255]; layers only.
    SetAlpha(i32),
    /// Replace layer content from a flat decoded surface.
    LoadSurface(&'a Surface),
    /// Blend a 16-bit working image into a layer.
    BlendImage(BlendRequest<'a>),
    /// Drop backing storage; content is lost.
    ReleaseResources,
}

/// One node of the composition tree. Children render after (on top of) the
/// node's own content, in insertion order.
#[derive(Debug)]
pub struct Frame {
    kind: FrameKind,
    visible: bool,
    children: Vec<Frame>,
}

impl Frame {
    pub fn new(kind: FrameKind) -> Frame {
        Frame { kind, visible: true, children: Vec::new() }
    }

    pub fn canvas(width: i32, height: i32, paper: Rgba8) -> Frame {
        Frame::new(FrameKind::Canvas(CanvasFrame { width, height, paper }))
    }

    /// A new layer sized to the given extent, with all tiles allocated.
    pub fn layer(width: i32, height: i32) -> RasterpadResult<Frame> {
        let mut grid = TileGrid::new();
        grid.resize(width, height)?;
        Ok(Frame::new(FrameKind::Layer(LayerFrame {
            grid,
            mode: BlendMode::Normal,
            alpha: 255,
        })))
    }

    pub fn kind(&self) -> &FrameKind {
        &self.kind
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn as_layer_mut(&mut self) -> Option<&mut LayerFrame> {
        match &mut self.kind {
            FrameKind::Layer(layer) => Some(layer),
            _ => None,
        }
    }

    pub fn as_layer(&self) -> Option<&LayerFrame> {
        match &self.kind {
            FrameKind::Layer(layer) => Some(layer),
            _ => None,
        }
    }

    // Child management. Indices are insertion order, bottom first.

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn child(&self, index: usize) -> Option<&Frame> {
        self.children.get(index)
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut Frame> {
        self.children.get_mut(index)
    }

    pub fn insert_child(&mut self, index: usize, child: Frame) {
        let index = index.min(self.children.len());
        self.children.insert(index, child);
    }

    pub fn push_child(&mut self, child: Frame) {
        self.children.push(child);
    }

    pub fn remove_child(&mut self, index: usize) -> Option<Frame> {
        if index < self.children.len() {
            Some(self.children.remove(index))
        } else {
            None
        }
    }

    /// Apply one command to this frame.
    pub fn handle(&mut self, msg: FrameMessage<'_>) -> RasterpadResult<()> {
        match msg {
            FrameMessage::SetVisible(v) => {
                self.visible = v;
                Ok(())
            }
            FrameMessage::SetSize { width, height } => match &mut self.kind {
                FrameKind::Canvas(canvas) => {
                    canvas.width = width;
                    canvas.height = height;
                    Ok(())
                }
                FrameKind::Layer(layer) => layer.grid.resize(width, height),
                FrameKind::Box(b) => {
                    b.rect.right = b.rect.left + width;
                    b.rect.bottom = b.rect.top + height;
                    Ok(())
                }
            },
            FrameMessage::SetColor(col) => match &mut self.kind {
                FrameKind::Canvas(canvas) => {
                    canvas.paper = col;
                    Ok(())
                }
                FrameKind::Box(b) => {
                    b.col = col;
                    Ok(())
                }
                FrameKind::Layer(_) => {
                    Err(RasterpadError::validation("layer frames have no color"))
                }
            },
            FrameMessage::SetAlpha(alpha) => match &mut self.kind {
                FrameKind::Layer(layer) => {
                    layer.alpha = alpha.clamp(0, 255);
                    Ok(())
                }
                _ => Err(RasterpadError::validation("alpha applies to layer frames")),
            },
            FrameMessage::LoadSurface(sd) => match &mut self.kind {
                FrameKind::Layer(layer) => {
                    layer.grid.load_surface(sd);
                    Ok(())
                }
                _ => Err(RasterpadError::validation("only layer frames hold pixels")),
            },
            FrameMessage::BlendImage(req) => match &mut self.kind {
                FrameKind::Layer(layer) => layer.grid.blend_image(&req),
                _ => Err(RasterpadError::validation("only layer frames hold pixels")),
            },
            FrameMessage::ReleaseResources => {
                if let FrameKind::Layer(layer) = &mut self.kind {
                    debug!("layer resources released");
                    layer.grid = TileGrid::new();
                }
                Ok(())
            }
        }
    }

    /// Render this frame and its children into an RGBA8 target, back to
    /// front, at the given offset. Invisible frames (and their subtrees)
    /// draw nothing.
    pub fn render(&self, target: &mut Surface, ox: i32, oy: i32) {
        if !self.visible {
            return;
        }
        match &self.kind {
            FrameKind::Canvas(canvas) => {
                target.fill_rect(canvas.paper, ox, oy, canvas.width, canvas.height);
            }
            FrameKind::Layer(layer) => render_layer(layer, target, ox, oy),
            FrameKind::Box(b) => {
                target.blend_rect(
                    b.col,
                    ox + b.rect.left,
                    oy + b.rect.top,
                    b.rect.width(),
                    b.rect.height(),
                );
            }
        }
        for child in &self.children {
            child.render(target, ox, oy);
        }
    }
}

fn render_layer(layer: &LayerFrame, target: &mut Surface, ox: i32, oy: i32) {
    let (op, alpha) = if layer.alpha < 255 {
        (SpanOp::OverPreAlpha, layer.alpha)
    } else {
        (SpanOp::OverPre, 255)
    };
    let grid = &layer.grid;
    for iy in 0..grid.tiles_y() {
        for ix in 0..grid.tiles_x() {
            if let Some(tile) = grid.tile(ix, iy) {
                target.blend(
                    ox + ix * TILE_SIZE,
                    oy + iy * TILE_SIZE,
                    tile.surface(),
                    op,
                    alpha,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::WHITE;
    use crate::surface::PixelFormat;

    fn doc(width: i32, height: i32) -> Frame {
        let mut root = Frame::canvas(width, height, WHITE);
        root.push_child(Frame::layer(width, height).unwrap());
        root
    }

    fn render(root: &Frame, width: i32, height: i32) -> Surface {
        let mut target = Surface::create(PixelFormat::Rgba8, width, height).unwrap();
        root.render(&mut target, 0, 0);
        target
    }

    fn layer_with_white_dot(width: i32, height: i32, x: i32, y: i32) -> Frame {
        let mut frame = Frame::layer(width, height).unwrap();
        let mut flat = Surface::create(PixelFormat::Rgba8, width, height).unwrap();
        flat.fill_rect(WHITE, x, y, 1, 1);
        frame
            .handle(FrameMessage::LoadSurface(&flat))
            .unwrap();
        frame
    }

    #[test]
    fn canvas_renders_paper_color() {
        let root = doc(64, 32);
        let out = render(&root, 64, 32);
        assert_eq!(out.pixel_rgba8(0, 0), WHITE);
        assert_eq!(out.pixel_rgba8(63, 31), WHITE);
    }

    #[test]
    fn empty_layer_changes_nothing() {
        let plain = render(&Frame::canvas(32, 32, WHITE), 32, 32);
        let layered = render(&doc(32, 32), 32, 32);
        for y in 0..32 {
            for x in 0..32 {
                assert_eq!(plain.pixel_rgba8(x, y), layered.pixel_rgba8(x, y));
            }
        }
    }

    #[test]
    fn layer_content_lands_at_tile_offsets() {
        // A dot at (300, 10) lives in tile (1, 0); rendering must place it
        // back at document coordinates.
        let mut root = Frame::canvas(400, 64, Rgba8::new(0, 0, 0, 255));
        root.push_child(layer_with_white_dot(400, 64, 300, 10));
        let out = render(&root, 400, 64);
        assert_eq!(out.pixel_rgba8(300, 10), WHITE);
        assert_eq!(out.pixel_rgba8(299, 10), Rgba8::new(0, 0, 0, 255));
    }

    #[test]
    fn invisible_frame_subtree_is_skipped() {
        let mut root = Frame::canvas(32, 32, WHITE);
        root.push_child(layer_with_white_dot(32, 32, 5, 5));
        root.child_mut(0)
            .unwrap()
            .handle(FrameMessage::SetVisible(false))
            .unwrap();
        let out = render(&root, 32, 32);
        assert_eq!(out.pixel_rgba8(5, 5), WHITE); // paper, not the dot.
    }

    #[test]
    fn box_frame_blends_over_paper() {
        let mut root = Frame::canvas(32, 32, WHITE);
        root.push_child(Frame::new(FrameKind::Box(BoxFrame {
            rect: IRect::new(4, 4, 12, 12),
            col: Rgba8::new(0, 0, 0, 255),
        })));
        let out = render(&root, 32, 32);
        assert_eq!(out.pixel_rgba8(5, 5), Rgba8::new(0, 0, 0, 255));
        assert_eq!(out.pixel_rgba8(0, 0), WHITE);
        assert_eq!(out.pixel_rgba8(12, 12), WHITE); // rect is half-open.
    }

    #[test]
    fn layer_alpha_modulates_composite() {
        let mut root = Frame::canvas(16, 16, Rgba8::new(0, 0, 0, 255));
        let mut layer = layer_with_white_dot(16, 16, 3, 3);
        layer.handle(FrameMessage::SetAlpha(128)).unwrap();
        root.push_child(layer);
        let out = render(&root, 16, 16);
        let px = out.pixel_rgba8(3, 3);
        assert!(px.r > 100 && px.r < 150, "half-alpha white over black: {px:?}");
    }

    #[test]
    fn color_message_rejected_by_layers() {
        let mut layer = Frame::layer(16, 16).unwrap();
        assert!(layer.handle(FrameMessage::SetColor(WHITE)).is_err());
    }

    #[test]
    fn set_size_resizes_layer_grid() {
        let mut layer = Frame::layer(16, 16).unwrap();
        layer
            .handle(FrameMessage::SetSize { width: 600, height: 300 })
            .unwrap();
        let grid = layer.as_layer().unwrap().grid();
        assert_eq!((grid.tiles_x(), grid.tiles_y()), (3, 2));
    }

    #[test]
    fn release_resources_drops_layer_tiles() {
        let mut layer = layer_with_white_dot(16, 16, 1, 1);
        layer.handle(FrameMessage::ReleaseResources).unwrap();
        assert!(layer.as_layer().unwrap().grid().tile(0, 0).is_none());
    }

    #[test]
    fn children_render_in_insertion_order() {
        let mut root = Frame::canvas(8, 8, WHITE);
        root.push_child(Frame::new(FrameKind::Box(BoxFrame {
            rect: IRect::new(0, 0, 8, 8),
            col: Rgba8::new(10, 10, 10, 255),
        })));
        root.push_child(Frame::new(FrameKind::Box(BoxFrame {
            rect: IRect::new(0, 0, 8, 8),
            col: Rgba8::new(200, 200, 200, 255),
        })));
        let out = render(&root, 8, 8);
        // later child wins.
        assert_eq!(out.pixel_rgba8(4, 4).r, 200);
    }

    #[test]
    fn remove_child_shifts_indices() {
        let mut root = Frame::canvas(8, 8, WHITE);
        root.push_child(Frame::layer(8, 8).unwrap());
        root.push_child(Frame::layer(8, 8).unwrap());
        assert_eq!(root.child_count(), 2);
        assert!(root.remove_child(0).is_some());
        assert_eq!(root.child_count(), 1);
        assert!(root.remove_child(5).is_none());
    }
}
