//! BGRA pixel storage shared by capture backends and color extraction.

use super::CaptureZone;
use crate::{Result, SyncError};

/// One 32-bit pixel in the desktop's native byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Bgra {
    pub b: u8,
    pub g: u8,
    pub r: u8,
    pub a: u8,
}

impl Bgra {
    /// Opaque pixel from red, green and blue components.
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { b, g, r, a: 255 }
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        Self { b: bytes[0], g: bytes[1], r: bytes[2], a: bytes[3] }
    }
}

fn required_len(width: u32, height: u32, stride: usize) -> usize {
    if width == 0 || height == 0 {
        return 0;
    }
    stride * (height as usize - 1) + width as usize * PixelBuffer::BYTES_PER_PIXEL
}

fn check_layout(width: u32, height: u32, stride: usize, len: usize) -> Result<()> {
    let row_bytes = width as usize * PixelBuffer::BYTES_PER_PIXEL;
    if stride < row_bytes {
        return Err(SyncError::capture_failed(format!(
            "Row stride {stride} is shorter than {width} pixels"
        )));
    }
    let needed = required_len(width, height, stride);
    if len < needed {
        return Err(SyncError::capture_failed(format!(
            "{width}x{height} image needs {needed} bytes, got {len}"
        )));
    }
    Ok(())
}

/// Borrowed, possibly strided view into a backend's frame.
#[derive(Debug, Clone, Copy)]
pub struct PixelView<'a> {
    width: u32,
    height: u32,
    stride: usize,
    data: &'a [u8],
}

impl<'a> PixelView<'a> {
    pub fn new(width: u32, height: u32, stride: usize, data: &'a [u8]) -> Result<Self> {
        check_layout(width, height, stride, data.len())?;
        Ok(Self { width, height, stride, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sub-view covering `zone`, sharing this view's stride.
    pub fn crop(&self, zone: &CaptureZone) -> Result<PixelView<'a>> {
        if !zone.fits_within(self.width, self.height) {
            return Err(SyncError::invalid_state(format!(
                "Zone {zone} exceeds the {}x{} frame",
                self.width, self.height
            )));
        }
        if zone.is_empty() {
            return Ok(PixelView { width: 0, height: 0, stride: self.stride, data: &[] });
        }

        let start = zone.y as usize * self.stride + zone.x as usize * PixelBuffer::BYTES_PER_PIXEL;
        let len = required_len(zone.width, zone.height, self.stride);
        Ok(PixelView {
            width: zone.width,
            height: zone.height,
            stride: self.stride,
            data: &self.data[start..start + len],
        })
    }

    /// Copy the view into a tightly packed buffer.
    pub fn to_buffer(&self) -> PixelBuffer {
        let row_bytes = self.width as usize * PixelBuffer::BYTES_PER_PIXEL;
        let mut data = Vec::with_capacity(row_bytes * self.height as usize);
        for y in 0..self.height as usize {
            let start = y * self.stride;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        PixelBuffer { width: self.width, height: self.height, stride: row_bytes, data }
    }
}

/// Owned BGRA image produced by one capture.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub const BYTES_PER_PIXEL: usize = 4;

    /// Wrap raw BGRA bytes laid out in rows of `stride` bytes.
    pub fn new(width: u32, height: u32, stride: usize, data: Vec<u8>) -> Result<Self> {
        check_layout(width, height, stride, data.len())?;
        Ok(Self { width, height, stride, data })
    }

    /// Build a packed buffer from pixels in row-major order.
    pub fn from_pixels(width: u32, height: u32, pixels: &[Bgra]) -> Result<Self> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(SyncError::capture_failed(format!(
                "{width}x{height} image needs {expected} pixels, got {}",
                pixels.len()
            )));
        }
        let data = pixels.iter().flat_map(|p| [p.b, p.g, p.r, p.a]).collect();
        Ok(Self { width, height, stride: width as usize * Self::BYTES_PER_PIXEL, data })
    }

    /// Packed buffer where every pixel is `pixel`.
    pub fn filled(width: u32, height: u32, pixel: Bgra) -> Self {
        let count = width as usize * height as usize;
        let data = std::iter::repeat_n([pixel.b, pixel.g, pixel.r, pixel.a], count)
            .flatten()
            .collect();
        Self { width, height, stride: width as usize * Self::BYTES_PER_PIXEL, data }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn view(&self) -> PixelView<'_> {
        PixelView { width: self.width, height: self.height, stride: self.stride, data: &self.data }
    }

    /// Pixel at column `x`, row `y`.
    ///
    /// # Panics
    ///
    /// Panics if the coordinate lies outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Bgra {
        assert!(x < self.width && y < self.height, "pixel ({x}, {y}) out of bounds");
        let offset = y as usize * self.stride + x as usize * Self::BYTES_PER_PIXEL;
        Bgra::from_bytes(&self.data[offset..offset + Self::BYTES_PER_PIXEL])
    }

    /// Pixels of row `y`, left to right.
    pub fn row(&self, y: u32) -> impl Iterator<Item = Bgra> + '_ {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * Self::BYTES_PER_PIXEL;
        self.data[start..end].chunks_exact(Self::BYTES_PER_PIXEL).map(Bgra::from_bytes)
    }

    /// Every pixel in row-major scan order.
    pub fn pixels(&self) -> impl Iterator<Item = Bgra> + '_ {
        (0..self.height).flat_map(move |y| self.row(y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strided_rows_skip_padding() {
        // 2x2 image with 4 padding bytes per row
        let data = vec![
            1, 2, 3, 4, 5, 6, 7, 8, 0xEE, 0xEE, 0xEE, 0xEE, //
            9, 10, 11, 12, 13, 14, 15, 16, 0xEE, 0xEE, 0xEE, 0xEE,
        ];
        let buffer = PixelBuffer::new(2, 2, 12, data).unwrap();

        assert_eq!(buffer.pixel(1, 0), Bgra { b: 5, g: 6, r: 7, a: 8 });
        assert_eq!(buffer.pixel(0, 1), Bgra { b: 9, g: 10, r: 11, a: 12 });

        let packed = buffer.view().to_buffer();
        assert_eq!(packed.stride(), 8);
        assert_eq!(packed.pixels().collect::<Vec<_>>(), buffer.pixels().collect::<Vec<_>>());
    }

    #[test]
    fn rejects_short_storage() {
        assert!(PixelBuffer::new(4, 4, 16, vec![0; 63]).is_err());
        assert!(PixelBuffer::new(4, 1, 8, vec![0; 64]).is_err());
        assert!(PixelBuffer::from_pixels(2, 2, &[Bgra::default(); 3]).is_err());
    }

    #[test]
    fn crop_reads_the_requested_window() {
        let pixels: Vec<Bgra> = (0..16u8).map(|i| Bgra::opaque(i, 0, 0)).collect();
        let buffer = PixelBuffer::from_pixels(4, 4, &pixels).unwrap();

        let zone = CaptureZone { x: 1, y: 2, width: 2, height: 2 };
        let cropped = buffer.view().crop(&zone).unwrap().to_buffer();

        let reds: Vec<u8> = cropped.pixels().map(|p| p.r).collect();
        assert_eq!(reds, vec![9, 10, 13, 14]);
    }

    #[test]
    fn crop_outside_frame_is_invalid_state() {
        let buffer = PixelBuffer::filled(4, 4, Bgra::opaque(1, 2, 3));
        let zone = CaptureZone { x: 3, y: 0, width: 2, height: 1 };
        assert!(matches!(buffer.view().crop(&zone), Err(SyncError::InvalidState { .. })));
    }
}
