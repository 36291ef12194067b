//! Stroke scripts: a JSON document describing a canvas, a brush and a list
//! of strokes, replayed through a [`Session`] to produce a rendered image.
//! This is the headless counterpart of interactive pen input and doubles as
//! the end-to-end test vehicle.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    blend::BlendMode,
    color::Rgba8,
    error::{RasterpadError, RasterpadResult},
    painter::InputSample,
    session::Session,
    shape::brush_disc_a8,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct StrokeScript {
    pub canvas: CanvasSpec,
    pub brush: BrushSpec,
    pub strokes: Vec<Stroke>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CanvasSpec {
    pub width: i32,
    pub height: i32,
    /// Paper color as `[r, g, b, a]`; defaults to opaque white.
    #[serde(default = "default_paper")]
    pub paper: [u8; 4],
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BrushSpec {
    /// Brush color as `[r, g, b, a]`.
    pub color: [u8; 4],
    /// Pressure-to-diameter range in pixels, `[min, max]`.
    pub size: [f32; 2],
    /// Pressure-to-opacity range, `[min, max]` in [0,1].
    #[serde(default = "default_alpha")]
    pub alpha: [f32; 2],
    /// Dab spacing in pixels.
    #[serde(default = "default_spacing")]
    pub spacing: f32,
    #[serde(default = "default_mode")]
    pub mode: BlendMode,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Stroke {
    pub samples: Vec<Sample>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Sample {
    pub x: f32,
    pub y: f32,
    #[serde(default = "default_pressure")]
    pub pressure: f32,
}

fn default_paper() -> [u8; 4] {
    [255, 255, 255, 255]
}

fn default_alpha() -> [f32; 2] {
    [1.0, 1.0]
}

fn default_spacing() -> f32 {
    1.0
}

fn default_mode() -> BlendMode {
    BlendMode::Normal
}

fn default_pressure() -> f32 {
    1.0
}

impl StrokeScript {
    pub fn from_json(json: &str) -> RasterpadResult<StrokeScript> {
        serde_json::from_str(json).map_err(|e| RasterpadError::serde(e.to_string()))
    }
}

fn rgba(c: [u8; 4]) -> Rgba8 {
    Rgba8::new(c[0], c[1], c[2], c[3])
}

/// Replay a script into a fresh session: one document, one layer, the
/// scripted brush, each stroke fed as pen-down samples followed by a pen-up.
pub fn replay(script: &StrokeScript) -> RasterpadResult<Session> {
    let mut session = Session::new();
    session.new_doc(script.canvas.width, script.canvas.height, rgba(script.canvas.paper))?;
    let layer = session.new_layer(0)?;
    session.set_active_layer(layer)?;

    let brush = &script.brush;
    let mask_px = brush.size[1].max(brush.size[0]).ceil().max(1.0) as i32;
    session.set_brush(brush_disc_a8(mask_px)?);
    session.set_brush_color(rgba(brush.color));
    session.set_brush_mode(brush.mode);
    session.set_brush_size(brush.size[0], brush.size[1])?;
    session.set_brush_alpha(brush.alpha[0], brush.alpha[1]);
    session.set_brush_spacing(brush.spacing);

    info!(strokes = script.strokes.len(), "replaying stroke script");
    for stroke in &script.strokes {
        session.begin_batch();
        let mut last = None;
        for s in &stroke.samples {
            session.pen_input(&InputSample {
                x: s.x,
                y: s.y,
                pressure: s.pressure.clamp(0.0, 1.0),
                buttons: 1,
            });
            last = Some((s.x, s.y));
        }
        if let Some((x, y)) = last {
            session.pen_input(&InputSample { x, y, pressure: 0.0, buttons: 0 });
        }
        session.end_batch();
    }
    Ok(session)
}
