//! Tile-based work partitioning.
//!
//! Divides the data window into square tiles that can be rendered
//! independently and in parallel using rayon. Tiles never overlap and
//! together cover the window exactly once.

use std::fmt;

/// Default tile size in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 64;

/// Rectangle of the render buffers being rendered, in pixels, y down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl DataWindow {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Window covering a whole `width` x `height` buffer.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True if the window lies inside a `width` x `height` buffer.
    pub fn is_contained_in(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for DataWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}] {}x{}",
            self.x, self.y, self.width, self.height
        )
    }
}

/// A rectangular block of pixels, in buffer coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// X coordinate of the tile's top-left corner
    pub x: u32,
    /// Y coordinate of the tile's top-left corner
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Position of this tile in the render order
    pub index: usize,
}

impl Tile {
    pub fn new(x: u32, y: u32, width: u32, height: u32, index: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            index,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Pixel coordinates in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32)> {
        let Tile {
            x, y, width, height, ..
        } = *self;
        (y..y + height).flat_map(move |py| (x..x + width).map(move |px| (px, py)))
    }
}

/// Split `window` into tiles, sorted in spiral order from its centre.
///
/// Tiles closer to the centre come first, so the middle of the image
/// refines before the edges. A `tile_size` of zero is treated as one.
pub fn generate_tiles(window: &DataWindow, tile_size: u32) -> Vec<Tile> {
    let tile_size = tile_size.max(1);
    let mut tiles = Vec::new();

    let mut y = 0;
    while y < window.height {
        let mut x = 0;
        while x < window.width {
            let tw = tile_size.min(window.width - x);
            let th = tile_size.min(window.height - y);
            tiles.push(Tile::new(window.x + x, window.y + y, tw, th, tiles.len()));
            x += tile_size;
        }
        y += tile_size;
    }

    sort_spiral(&mut tiles, window);

    for (i, tile) in tiles.iter_mut().enumerate() {
        tile.index = i;
    }

    tiles
}

/// Sort tiles by distance from the window centre.
fn sort_spiral(tiles: &mut [Tile], window: &DataWindow) {
    let center_x = window.x as f32 + window.width as f32 / 2.0;
    let center_y = window.y as f32 + window.height as f32 / 2.0;

    let distance = |t: &Tile| {
        let cx = t.x as f32 + t.width as f32 / 2.0;
        let cy = t.y as f32 + t.height as f32 / 2.0;
        (cx - center_x).powi(2) + (cy - center_y).powi(2)
    };

    tiles.sort_by(|a, b| distance(a).total_cmp(&distance(b)));
}
