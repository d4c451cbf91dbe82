//! A compact framebuffer for composing display content with
//! `embedded-graphics`.

use alloc::boxed::Box;
use alloc::vec;
use core::convert::Infallible;

use embedded_graphics::{
    prelude::{Dimensions, DrawTarget, OriginDimensions, Size},
    primitives::Rectangle,
    Pixel,
};

use crate::color::Color;

/// A buffer storing one 4-bit palette code per pixel, two pixels per byte.
///
/// The first pixel of each horizontal pair occupies the high nibble, so the
/// buffer's [`data`](PackedBuffer::data) is already in the wire format the
/// controller expects. A fresh buffer is filled with [`Color::White`].
pub struct PackedBuffer {
    size: Size,
    bytes_per_row: usize,
    data: Box<[u8]>,
}

impl PackedBuffer {
    /// Creates a new white [`PackedBuffer`]. The width must be even so rows
    /// pack into whole bytes.
    pub fn new(dimensions: Size) -> Self {
        debug_assert_eq!(
            dimensions.width % 2,
            0,
            "Width must be even for nibble packing."
        );
        let white = (Color::White.code() << 4) | Color::White.code();
        let length = (dimensions.width as usize / 2) * dimensions.height as usize;
        Self {
            bytes_per_row: dimensions.width as usize / 2,
            size: dimensions,
            data: vec![white; length].into_boxed_slice(),
        }
    }

    /// Access the packed buffer data.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Sets one pixel. Out-of-bounds coordinates are ignored.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if x >= self.size.width || y >= self.size.height {
            return;
        }

        let index = y as usize * self.bytes_per_row + x as usize / 2;
        let byte = self.data[index];
        self.data[index] = if x % 2 == 0 {
            (byte & 0x0f) | (color.code() << 4)
        } else {
            (byte & 0xf0) | color.code()
        };
    }

    /// Fills the whole buffer with one ink.
    pub fn fill(&mut self, color: Color) {
        let packed = (color.code() << 4) | color.code();
        self.data.fill(packed);
    }
}

impl OriginDimensions for PackedBuffer {
    fn size(&self) -> Size {
        self.size
    }
}

impl DrawTarget for PackedBuffer {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if let Ok((x, y)) = point.try_into() {
                self.set_pixel(x, y, color);
            }
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let area = area.intersection(&self.bounding_box());
        if area.is_zero_sized() {
            return Ok(());
        }

        let x_start = area.top_left.x as u32;
        let y_start = area.top_left.y as u32;
        let x_end = x_start + area.size.width;
        let y_end = y_start + area.size.height;
        for y in y_start..y_end {
            for x in x_start..x_end {
                self.set_pixel(x, y, color);
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.fill(color);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_graphics::prelude::{Dimensions, Point};

    #[test]
    fn new_buffer_is_white() {
        let buffer = PackedBuffer::new(Size::new(16, 4));
        assert_eq!(buffer.data().len(), 32);
        assert!(buffer.data().iter().all(|&b| b == 0x11));
    }

    #[test]
    fn set_pixel_packs_high_nibble_first() {
        let mut buffer = PackedBuffer::new(Size::new(16, 4));

        buffer.set_pixel(0, 0, Color::Black);
        assert_eq!(buffer.data()[0], 0x01);

        buffer.set_pixel(1, 0, Color::Red);
        assert_eq!(buffer.data()[0], 0x03);

        buffer.set_pixel(15, 3, Color::Green);
        assert_eq!(buffer.data()[31], 0x16);
    }

    #[test]
    fn out_of_bounds_pixels_are_ignored() {
        let mut buffer = PackedBuffer::new(Size::new(16, 4));
        buffer.set_pixel(16, 0, Color::Black);
        buffer.set_pixel(0, 4, Color::Black);
        buffer
            .draw_iter([Pixel(Point::new(-1, 0), Color::Black)])
            .unwrap();
        assert!(buffer.data().iter().all(|&b| b == 0x11));
    }

    #[test]
    fn fill_solid_clips_to_the_buffer() {
        let mut buffer = PackedBuffer::new(Size::new(8, 4));
        buffer
            .fill_solid(
                &Rectangle::new(Point::new(6, 2), Size::new(8, 8)),
                Color::Blue,
            )
            .unwrap();

        #[rustfmt::skip]
        let expected: [u8; 16] = [
            0x11, 0x11, 0x11, 0x11,
            0x11, 0x11, 0x11, 0x11,
            0x11, 0x11, 0x11, 0x55,
            0x11, 0x11, 0x11, 0x55,
        ];
        assert_eq!(buffer.data(), &expected);
    }

    #[test]
    fn clear_fills_both_nibbles() {
        let mut buffer = PackedBuffer::new(Size::new(8, 2));
        buffer.clear(Color::Yellow).unwrap();
        assert!(buffer.data().iter().all(|&b| b == 0x22));
    }

    #[test]
    fn bounding_box_matches_dimensions() {
        let buffer = PackedBuffer::new(Size::new(16, 4));
        assert_eq!(
            buffer.bounding_box(),
            Rectangle::new(Point::zero(), Size::new(16, 4))
        );
    }
}
