//! Packed 1-bit frame buffer handed from the transform to the display.
//!
//! Rows are packed MSB-first, each row padded to a whole byte, which is the
//! layout Waveshare panels expect. A set bit is a white pixel, so a freshly
//! cleared buffer is all `0xFF`.
//!
//! For drawing, `BinaryColor::On` means black ink and `BinaryColor::Off`
//! means white paper.

use crate::DisplayGeometry;
use embedded_graphics::Pixel;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::{DrawTarget, OriginDimensions, Size};
use image::{GrayImage, Luma};
use std::convert::Infallible;

/// Luma values at or above this count as white when packing a grayscale image.
const WHITE_THRESHOLD: u8 = 128;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Bitmap {
    /// An all-white bitmap of the given size.
    pub fn white(geometry: DisplayGeometry) -> Self {
        let stride = Self::stride_for(geometry.width);
        Self {
            width: geometry.width,
            height: geometry.height,
            data: vec![0xFF; stride * geometry.height as usize],
        }
    }

    fn stride_for(width: u32) -> usize {
        width.div_ceil(8) as usize
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn geometry(&self) -> DisplayGeometry {
        DisplayGeometry::new(self.width, self.height)
    }

    /// Number of bytes per packed row.
    pub fn stride(&self) -> usize {
        Self::stride_for(self.width)
    }

    /// Raw packed buffer, `stride() * height()` bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn locate(&self, x: u32, y: u32) -> (usize, u8) {
        let index = y as usize * self.stride() + (x / 8) as usize;
        let mask = 0x80 >> (x % 8);
        (index, mask)
    }

    /// Whether the pixel at (x, y) is white. Out-of-range reads are white.
    pub fn is_white(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return true;
        }
        let (index, mask) = self.locate(x, y);
        self.data[index] & mask != 0
    }

    /// Set one pixel. Out-of-range writes are ignored.
    pub fn set(&mut self, x: u32, y: u32, white: bool) {
        if x >= self.width || y >= self.height {
            return;
        }
        let (index, mask) = self.locate(x, y);
        if white {
            self.data[index] |= mask;
        } else {
            self.data[index] &= !mask;
        }
    }

    /// Fill every pixel with one color.
    pub fn fill(&mut self, white: bool) {
        self.data.fill(if white { 0xFF } else { 0x00 });
    }

    /// Copy a grayscale image onto this bitmap with its top-left corner at
    /// (x_offset, y_offset), clipping whatever falls outside.
    pub fn paste_luma(&mut self, img: &GrayImage, x_offset: u32, y_offset: u32) {
        for (x, y, pixel) in img.enumerate_pixels() {
            self.set(x + x_offset, y + y_offset, pixel[0] >= WHITE_THRESHOLD);
        }
    }

    /// Number of black pixels.
    pub fn black_count(&self) -> usize {
        (0..self.height)
            .flat_map(|y| (0..self.width).map(move |x| (x, y)))
            .filter(|&(x, y)| !self.is_white(x, y))
            .count()
    }

    /// Expand to an 8-bit grayscale image (0 or 255) for saving as PNG.
    pub fn to_luma_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.is_white(x, y) { 255 } else { 0 }])
        })
    }

    /// Rotate 90 degrees counter-clockwise.
    ///
    /// Landscape frames are turned this way to fit a portrait-native panel.
    pub fn rotated_ccw(&self) -> Self {
        let mut rotated = Self::white(self.geometry().transposed());
        for y in 0..self.height {
            for x in 0..self.width {
                rotated.set(y, self.width - 1 - x, self.is_white(x, y));
            }
        }
        rotated
    }
}

impl OriginDimensions for Bitmap {
    fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

impl DrawTarget for Bitmap {
    type Color = BinaryColor;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 {
                continue;
            }
            self.set(point.x as u32, point.y as u32, color.is_off());
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(color.is_off());
        Ok(())
    }
}
