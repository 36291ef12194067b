//! Tile-backed layer storage.
//!
//! A [`TileGrid`] partitions a logical `width x height` raster into 256x256
//! RGBA8 tiles, with the rightmost column and bottom row sized exactly to the
//! remainder. A cell holding `None` means "fully transparent, no storage";
//! every operation skips such cells silently.
//!
//! Blending into the grid goes through a per-tile read-blend-write round
//! trip: the tile is copied into an 8-bit scratch surface, the 16-bit source
//! is blended in through a [`SurfaceReader16`], and the scratch is written
//! back. This keeps the tile storage representation separate from the blend
//! math, which is where a GPU-texture or compressed backing store would
//! plug in.

use tracing::debug;

use crate::{
    blend::BlendMode,
    error::RasterpadResult,
    geom::IRect,
    surface::{PixelFormat, Surface, SurfaceReader16},
};

/// Square tile edge length in pixels.
pub const TILE_SIZE: i32 = 256;

/// A request to blend a 16-bit working image into a destination rect of a
/// tiled layer.
pub struct BlendRequest<'a> {
    pub mode: BlendMode,
    /// Blend alpha in [0,255].
    pub alpha: i32,
    /// The source image (RGBA16 working precision).
    pub image: &'a Surface,
    /// Area of the source image, in pixels.
    pub source: IRect,
    /// Area of the destination layer, in pixels.
    pub dest: IRect,
}

/// One cell of a tile grid: an owned RGBA8 image.
#[derive(Debug)]
pub struct Tile {
    surface: Surface,
}

impl Tile {
    fn new(width: i32, height: i32) -> RasterpadResult<Tile> {
        // Zero-filled storage is fully transparent.
        Ok(Tile { surface: Surface::create(PixelFormat::Rgba8, width, height)? })
    }

    pub fn width(&self) -> i32 {
        self.surface.width()
    }

    pub fn height(&self) -> i32 {
        self.surface.height()
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Copy the tile's pixels into a scratch surface of the same size.
    fn read_to(&self, scratch: &mut Surface) {
        scratch.copy_from(0, 0, &self.surface);
    }

    /// Write a scratch surface back over the tile.
    fn update(&mut self, scratch: &Surface) {
        self.surface.copy_from(0, 0, scratch);
    }

    /// Upload a sub-region of a source surface to the tile's origin.
    /// The region is clamped to both surfaces; formats must match.
    fn update_region(&mut self, src: &Surface, sx: i32, sy: i32, width: i32, height: i32) {
        debug_assert_eq!(src.format(), self.surface.format());
        let width = width.min(self.surface.width());
        let height = height.min(self.surface.height()).min(src.height() - sy);
        let bpp = self.surface.format().bytes_per_pixel();
        for row_i in 0..height {
            let soff = sx as usize * bpp;
            let srow = src.row(sy + row_i);
            let n = (width as usize * bpp)
                .min(self.surface.stride())
                .min(srow.len().saturating_sub(soff));
            self.surface.row_mut(row_i)[..n].copy_from_slice(&srow[soff..soff + n]);
        }
    }
}

/// A paintable layer backing store: a lazily-null grid of RGBA8 tiles.
#[derive(Debug, Default)]
pub struct TileGrid {
    width: i32,
    height: i32,
    tiles_x: i32,
    tiles_y: i32,
    tiles: Vec<Option<Tile>>,
}

impl TileGrid {
    pub fn new() -> TileGrid {
        TileGrid::default()
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn tiles_x(&self) -> i32 {
        self.tiles_x
    }

    pub fn tiles_y(&self) -> i32 {
        self.tiles_y
    }

    pub fn tile(&self, ix: i32, iy: i32) -> Option<&Tile> {
        if ix < 0 || ix >= self.tiles_x || iy < 0 || iy >= self.tiles_y {
            return None;
        }
        self.tiles[(iy * self.tiles_x + ix) as usize].as_ref()
    }

    /// Discard all tiles and reallocate the grid for new dimensions.
    ///
    /// Every cell is allocated eagerly; edge cells are sized exactly to the
    /// remainder (the original GPU-backed store rounded them up to powers of
    /// two for texture friendliness; exact sizing is a deliberate deviation).
    pub fn resize(&mut self, width: i32, height: i32) -> RasterpadResult<()> {
        self.tiles.clear();
        self.width = width;
        self.height = height;
        let tiles_x = (width + (TILE_SIZE - 1)) / TILE_SIZE;
        let tiles_y = (height + (TILE_SIZE - 1)) / TILE_SIZE;
        self.tiles_x = tiles_x;
        self.tiles_y = tiles_y;
        debug!(width, height, tiles_x, tiles_y, "grid resize");
        if tiles_x > 0 && tiles_y > 0 {
            self.tiles.reserve((tiles_x * tiles_y) as usize);
            for iy in 0..tiles_y {
                let tile_h = (height - iy * TILE_SIZE).min(TILE_SIZE);
                for ix in 0..tiles_x {
                    let tile_w = (width - ix * TILE_SIZE).min(TILE_SIZE);
                    self.tiles.push(Some(Tile::new(tile_w, tile_h)?));
                }
            }
        }
        Ok(())
    }

    /// Populate tiles from a flat decoded surface (e.g. a loaded image).
    /// Copies at most the tile range covered by both the source and the
    /// grid; null cells are skipped.
    pub fn load_surface(&mut self, sd: &Surface) {
        let copy_x = ((sd.width() + (TILE_SIZE - 1)) / TILE_SIZE).min(self.tiles_x);
        let copy_y = ((sd.height() + (TILE_SIZE - 1)) / TILE_SIZE).min(self.tiles_y);
        for iy in 0..copy_y {
            for ix in 0..copy_x {
                let idx = (iy * self.tiles_x + ix) as usize;
                if let Some(tile) = self.tiles[idx].as_mut() {
                    let left = ix * TILE_SIZE;
                    let top = iy * TILE_SIZE;
                    let w = (sd.width() - left).min(TILE_SIZE);
                    let h = (sd.height() - top).min(TILE_SIZE);
                    tile.update_region(sd, left, top, w, h);
                }
            }
        }
    }

    /// Blend a 16-bit source image into every tile overlapping the request's
    /// destination rect. Null tiles never receive paint.
    pub fn blend_image(&mut self, req: &BlendRequest<'_>) -> RasterpadResult<()> {
        // Tile index range overlapping the dest rect (round out), clamped to
        // the grid.
        let left = (req.dest.left / TILE_SIZE).max(0);
        let top = (req.dest.top / TILE_SIZE).max(0);
        let right = ((req.dest.right + (TILE_SIZE - 1)) / TILE_SIZE).min(self.tiles_x);
        let bottom = ((req.dest.bottom + (TILE_SIZE - 1)) / TILE_SIZE).min(self.tiles_y);

        for iy in top..bottom {
            for ix in left..right {
                let idx = (iy * self.tiles_x + ix) as usize;
                let Some(tile) = self.tiles[idx].as_mut() else {
                    continue;
                };
                // Translate the dest rect into tile-local space.
                let local = IRect::new(
                    req.dest.left - ix * TILE_SIZE,
                    req.dest.top - iy * TILE_SIZE,
                    req.dest.right - ix * TILE_SIZE,
                    req.dest.bottom - iy * TILE_SIZE,
                );
                blend_to_tile(tile, local, req)?;
            }
        }
        Ok(())
    }
}

// Read the tile into 8-bit scratch, blend the 16-bit source in, write back.
fn blend_to_tile(tile: &mut Tile, dest: IRect, req: &BlendRequest<'_>) -> RasterpadResult<()> {
    let mut scratch = Surface::create(PixelFormat::Rgba8, tile.width(), tile.height())?;
    tile.read_to(&mut scratch);
    let mut reader =
        SurfaceReader16::with_origin(req.image, req.alpha, req.source.left, req.source.top);
    scratch.blend_source(dest.left, dest.top, &mut reader, req.mode);
    tile.update(&scratch);
    Ok(())
}
