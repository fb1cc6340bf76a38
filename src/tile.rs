//! Rebuild printed images from the 2bpp tile buffer.
//!
//! The printer receives 8x8 tiles laid out 20 per row. Each tile row is two
//! bytes (low bit plane, then high bit plane) and bit 7 is the leftmost pixel.

use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};

use crate::{error::Error, BYTES_PER_TILE, IMAGE_WIDTH, TILES_PER_ROW, TILE_SIZE};

/// Shades for color indices 0 to 3, lightest to darkest.
pub const PALETTE: [[u8; 3]; 4] = [[255, 255, 255], [170, 170, 170], [85, 85, 85], [0, 0, 0]];

/// One finished print. Area of a partial last tile row stays white.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    raster: RgbImage,
    tiles: usize,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    /// Number of complete tiles that were decoded.
    pub fn tiles(&self) -> usize {
        self.tiles
    }

    pub fn is_empty(&self) -> bool {
        self.tiles == 0
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x < self.width() && y < self.height() {
            Some(self.raster.get_pixel(x, y).0)
        } else {
            None
        }
    }

    pub fn as_rgb_image(&self) -> &RgbImage {
        &self.raster
    }

    pub fn into_rgb_image(self) -> RgbImage {
        self.raster
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        self.raster.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}

/// Decode a print buffer into an image 160 pixels wide.
///
/// Trailing bytes that do not make up a whole tile are ignored.
pub fn render(buffer: &[u8]) -> DecodedImage {
    let tiles = buffer.len() / BYTES_PER_TILE;
    let rows = (tiles as u32 + TILES_PER_ROW - 1) / TILES_PER_ROW;
    let mut raster = RgbImage::from_pixel(IMAGE_WIDTH, rows * TILE_SIZE, Rgb(PALETTE[0]));

    for (index, tile) in buffer.chunks_exact(BYTES_PER_TILE).enumerate() {
        let origin_x = (index as u32 % TILES_PER_ROW) * TILE_SIZE;
        let origin_y = (index as u32 / TILES_PER_ROW) * TILE_SIZE;

        for (row, planes) in tile.chunks_exact(2).enumerate() {
            let (lo, hi) = (planes[0], planes[1]);
            for col in 0..TILE_SIZE {
                let bit = 7 - col;
                let color = ((lo >> bit) & 1) | (((hi >> bit) & 1) << 1);
                raster.put_pixel(
                    origin_x + col,
                    origin_y + row as u32,
                    Rgb(PALETTE[color as usize]),
                );
            }
        }
    }

    DecodedImage { raster, tiles }
}
