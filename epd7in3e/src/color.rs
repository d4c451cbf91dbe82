//! The fixed six-color palette of the panel.

use embedded_graphics::pixelcolor::raw::RawU4;
use embedded_graphics::pixelcolor::{PixelColor, Rgb888};
use embedded_graphics::prelude::RgbColor;

/// One of the six inks the panel can produce.
///
/// Declaration order is the palette order used for tie-breaking during
/// quantization, and the discriminant is the 4-bit code the controller
/// expects on the wire. Keeping both in one table means the palette and the
/// wire codes cannot drift out of alignment. Note the gap at `0x4`: the
/// controller reserves that code for a seventh ink this panel variant does
/// not have.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0x00,
    #[default]
    White = 0x01,
    Yellow = 0x02,
    Red = 0x03,
    Blue = 0x05,
    Green = 0x06,
}

/// All supported inks, in palette (declaration) order.
pub const PALETTE: [Color; 6] = [
    Color::Black,
    Color::White,
    Color::Yellow,
    Color::Red,
    Color::Blue,
    Color::Green,
];

impl Color {
    /// The 4-bit code sent to the controller for this ink.
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// The nominal RGB value of this ink.
    pub fn rgb(self) -> Rgb888 {
        match self {
            Color::Black => Rgb888::new(0x00, 0x00, 0x00),
            Color::White => Rgb888::new(0xff, 0xff, 0xff),
            Color::Yellow => Rgb888::new(0xff, 0xff, 0x00),
            Color::Red => Rgb888::new(0xff, 0x00, 0x00),
            Color::Blue => Rgb888::new(0x00, 0x00, 0xff),
            Color::Green => Rgb888::new(0x00, 0xff, 0x00),
        }
    }

    /// Maps an arbitrary RGB value to the nearest ink by squared Euclidean
    /// distance in RGB space. Ties resolve to the earliest entry in
    /// [`PALETTE`]. Every input maps to exactly one ink; an exact palette
    /// match always returns that ink.
    pub fn nearest(rgb: Rgb888) -> Color {
        let mut best = PALETTE[0];
        let mut best_distance = u32::MAX;
        for candidate in PALETTE {
            let distance = distance_squared(rgb, candidate.rgb());
            if distance < best_distance {
                best = candidate;
                best_distance = distance;
            }
        }
        best
    }
}

impl PixelColor for Color {
    type Raw = RawU4;
}

fn distance_squared(a: Rgb888, b: Rgb888) -> u32 {
    let dr = a.r() as i32 - b.r() as i32;
    let dg = a.g() as i32 - b.g() as i32;
    let db = a.b() as i32 - b.b() as i32;
    (dr * dr + dg * dg + db * db) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_palette_colors_map_to_themselves() {
        for color in PALETTE {
            assert_eq!(Color::nearest(color.rgb()), color);
        }
    }

    #[test]
    fn off_palette_colors_map_to_nearest_ink() {
        // Orange sits between yellow and red, but closer to yellow.
        assert_eq!(Color::nearest(Rgb888::new(0xff, 0x80, 0x00)), Color::Yellow);
        // Mid grey is marginally closer to white than to black.
        assert_eq!(Color::nearest(Rgb888::new(0x80, 0x80, 0x80)), Color::White);
        assert_eq!(Color::nearest(Rgb888::new(0x10, 0x10, 0x10)), Color::Black);
    }

    #[test]
    fn ties_resolve_in_palette_order() {
        // (0, 200, 200) is equidistant from blue and green; blue is declared
        // first.
        assert_eq!(Color::nearest(Rgb888::new(0x00, 200, 200)), Color::Blue);
    }

    #[test]
    fn wire_codes_skip_the_reserved_nibble() {
        let codes: alloc::vec::Vec<u8> = PALETTE.iter().map(|c| c.code()).collect();
        assert_eq!(codes, [0x00, 0x01, 0x02, 0x03, 0x05, 0x06]);
    }
}
