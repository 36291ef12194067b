#![forbid(unsafe_code)]

pub mod blend;
pub mod color;
pub mod error;
pub mod fixed;
pub mod frame;
pub mod geom;
pub mod grid;
pub mod painter;
pub mod session;
pub mod shape;
pub mod stroke;
pub mod surface;

pub use blend::{BlendMode, BlendSource, SpanOp};
pub use color::{Rgba8, Rgba16};
pub use error::{RasterpadError, RasterpadResult};
pub use fixed::Q8;
pub use frame::{Frame, FrameKind, FrameMessage};
pub use geom::{IPair, IRect};
pub use grid::{BlendRequest, TILE_SIZE, Tile, TileGrid};
pub use painter::{DabOutput, DabPainter, InputSample};
pub use session::Session;
pub use shape::brush_disc_a8;
pub use stroke::{StrokeScript, replay};
pub use surface::{PixelFormat, Surface};
