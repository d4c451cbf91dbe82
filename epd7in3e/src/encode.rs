//! Pure bitmap-to-wire transformation.
//!
//! Turns an arbitrary RGB bitmap into the exact byte sequence the controller
//! expects: orientation is normalized to the panel's landscape layout, every
//! pixel is quantized to the nearest palette ink, and the resulting 4-bit
//! codes are packed two per byte in row-major order. Nothing in this module
//! touches hardware, and the output is deterministic for a given input.

use alloc::vec;
use alloc::vec::Vec;

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::RgbColor;
use thiserror::Error as ThisError;

use crate::color::Color;
use crate::epd7in3e::{FRAME_LENGTH, HEIGHT, WIDTH};

/// Errors from the bitmap-to-wire transformation. These are detected before
/// any hardware write, so a rejected bitmap never results in a partial
/// transmission.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum EncodeError {
    /// The bitmap is neither the panel size nor its transpose.
    #[error("invalid bitmap dimensions {width}x{height}, expected 800x480 or 480x800")]
    Dimensions { width: u32, height: u32 },

    /// The pixel count is odd, so the last byte cannot be filled. This is
    /// unreachable for the fixed panel geometry but checked so the packing
    /// step is total.
    #[error("odd pixel count, cannot pack two pixels per byte")]
    OddPixelCount,
}

/// An owned RGB pixel grid in row-major order.
///
/// This is the boundary with the rendering collaborator: the content may use
/// arbitrary colors, and [`encode`] is responsible for reducing it to the
/// panel's palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<Rgb888>,
}

impl Bitmap {
    /// Creates a bitmap from row-major pixel data. `pixels` must hold exactly
    /// `width * height` entries.
    pub fn new(width: u32, height: u32, pixels: Vec<Rgb888>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            (width * height) as usize,
            "Pixel data must match the given dimensions"
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Creates a bitmap filled with a single color.
    pub fn filled(width: u32, height: u32, color: Rgb888) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The pixel at `(x, y)`. Panics if out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Rgb888 {
        self.pixels[(y * self.width + x) as usize]
    }
}

/// Encodes a bitmap into the panel's packed wire format.
///
/// The bitmap must be exactly 800x480, or 480x800 in which case it is rotated
/// 90 degrees clockwise first. The output is always exactly
/// [`FRAME_LENGTH`] (192,000) bytes: one 4-bit palette code per pixel, the
/// first pixel of each pair in the high nibble.
pub fn encode(bitmap: &Bitmap) -> Result<Vec<u8>, EncodeError> {
    let rotated;
    let oriented = if bitmap.width == WIDTH && bitmap.height == HEIGHT {
        bitmap
    } else if bitmap.width == HEIGHT && bitmap.height == WIDTH {
        rotated = rotate_90_cw(bitmap);
        &rotated
    } else {
        return Err(EncodeError::Dimensions {
            width: bitmap.width,
            height: bitmap.height,
        });
    };

    let frame = pack(&quantize(oriented))?;
    debug_assert_eq!(frame.len(), FRAME_LENGTH);
    Ok(frame)
}

/// Rotates a bitmap 90 degrees clockwise; a WxH bitmap becomes HxW.
fn rotate_90_cw(src: &Bitmap) -> Bitmap {
    let mut pixels = vec![Rgb888::BLACK; src.pixels.len()];
    let dst_width = src.height;
    for y in 0..src.height {
        for x in 0..src.width {
            let dst_x = src.height - 1 - y;
            let dst_y = x;
            pixels[(dst_y * dst_width + dst_x) as usize] = src.pixel(x, y);
        }
    }
    Bitmap {
        width: src.height,
        height: src.width,
        pixels,
    }
}

/// Quantizes every pixel to its nearest palette ink, row-major.
fn quantize(bitmap: &Bitmap) -> Vec<Color> {
    bitmap.pixels.iter().map(|&p| Color::nearest(p)).collect()
}

/// Packs palette inks two per byte: the first of each pair lands in the high
/// nibble, the second in the low nibble.
fn pack(colors: &[Color]) -> Result<Vec<u8>, EncodeError> {
    if colors.len() % 2 != 0 {
        return Err(EncodeError::OddPixelCount);
    }
    Ok(colors
        .chunks_exact(2)
        .map(|pair| (pair[0].code() << 4) | pair[1].code())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::PALETTE;

    fn bitmap_from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> Rgb888) -> Bitmap {
        let mut pixels = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Bitmap::new(width, height, pixels)
    }

    #[test]
    fn encoded_frame_is_half_the_pixel_count() {
        let direct = Bitmap::filled(WIDTH, HEIGHT, Rgb888::WHITE);
        let frame = encode(&direct).unwrap();
        assert_eq!(frame.len(), 192_000);
        assert!(frame.iter().all(|&b| b == 0x11));

        let transposed = Bitmap::filled(HEIGHT, WIDTH, Rgb888::WHITE);
        assert_eq!(encode(&transposed).unwrap().len(), 192_000);
    }

    #[test]
    fn wrong_dimensions_are_rejected() {
        let bitmap = Bitmap::filled(640, 480, Rgb888::WHITE);
        assert_eq!(
            encode(&bitmap),
            Err(EncodeError::Dimensions {
                width: 640,
                height: 480
            })
        );
    }

    #[test]
    fn transposed_bitmap_encodes_like_its_rotated_equivalent() {
        // A portrait bitmap with a position-dependent pattern...
        let portrait = bitmap_from_fn(HEIGHT, WIDTH, |x, y| PALETTE[((x + y) % 6) as usize].rgb());
        // ...and the landscape bitmap a 90-degree clockwise rotation yields:
        // landscape (x, y) comes from portrait (y, HEIGHT_PORTRAIT - 1 - x).
        let landscape = bitmap_from_fn(WIDTH, HEIGHT, |x, y| portrait.pixel(y, WIDTH - 1 - x));
        assert_eq!(encode(&portrait).unwrap(), encode(&landscape).unwrap());
    }

    #[test]
    fn packing_pairs_high_nibble_first() {
        assert_eq!(
            pack(&[Color::Black, Color::White, Color::Yellow, Color::Red]).unwrap(),
            [0x01, 0x23]
        );
        assert_eq!(pack(&[Color::Blue, Color::Green]).unwrap(), [0x56]);
    }

    #[test]
    fn packing_is_reversible_by_nibble_split() {
        let inks = [
            Color::Green,
            Color::Black,
            Color::Red,
            Color::Blue,
            Color::White,
            Color::Yellow,
        ];
        let packed = pack(&inks).unwrap();
        let unpacked: Vec<u8> = packed
            .iter()
            .flat_map(|&b| [b >> 4, b & 0x0f])
            .collect();
        let codes: Vec<u8> = inks.iter().map(|c| c.code()).collect();
        assert_eq!(unpacked, codes);
    }

    #[test]
    fn odd_pixel_counts_are_rejected() {
        assert_eq!(pack(&[Color::Black]), Err(EncodeError::OddPixelCount));
    }

    #[test]
    fn quantization_is_total_over_arbitrary_content() {
        let bitmap = bitmap_from_fn(WIDTH, HEIGHT, |x, y| {
            Rgb888::new((x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8)
        });
        let frame = encode(&bitmap).unwrap();
        assert_eq!(frame.len(), FRAME_LENGTH);
        // Every nibble must be a valid wire code.
        let valid = |code: u8| PALETTE.iter().any(|c| c.code() == code);
        assert!(frame.iter().all(|&b| valid(b >> 4) && valid(b & 0x0f)));
    }
}
