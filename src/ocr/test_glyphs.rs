//! Synthetic glyphs for tests.
//!
//! Each character gets a deterministic pseudo-random 8x10 bit pattern. Such
//! patterns correlate strongly only with themselves at zero offset, which
//! gives the recognizer tests real template-matching work without binary
//! fixtures.

use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

use super::templates::GlyphSet;

pub const GLYPH_W: u32 = 8;
pub const GLYPH_H: u32 = 10;
/// Horizontal distance between glyph origins (1px gap).
pub const ADVANCE: u32 = GLYPH_W + 1;
pub const FOREGROUND: u8 = 230;
pub const BACKGROUND: u8 = 30;

pub fn glyph_bitmap(c: char) -> GrayImage {
    let mut state = (c as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ 0xD1B5_4A32_D192_ED03;
    ImageBuffer::from_fn(GLYPH_W, GLYPH_H, |_, _| {
        // xorshift64*
        state ^= state >> 12;
        state ^= state << 25;
        state ^= state >> 27;
        let bit = state.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 63;
        Luma([if bit == 1 { FOREGROUND } else { BACKGROUND }])
    })
}

pub fn glyph_set(chars: &str) -> GlyphSet {
    chars.chars().map(|c| (c, glyph_bitmap(c))).collect()
}

/// Draws `text` with its top-left glyph origin at `(x, y)`.
pub fn draw_text(img: &mut RgbImage, text: &str, x: u32, y: u32) {
    for (i, c) in text.chars().enumerate() {
        let glyph = glyph_bitmap(c);
        let origin_x = x + i as u32 * ADVANCE;
        for (gx, gy, p) in glyph.enumerate_pixels() {
            let v = p[0];
            img.put_pixel(origin_x + gx, y + gy, Rgb([v, v, v]));
        }
    }
}

/// Renders `text` into its own cell with the given padding on each side.
pub fn render_text(text: &str, pad_x: u32, pad_y: u32) -> RgbImage {
    let len = text.chars().count() as u32;
    let width = pad_x * 2 + len * ADVANCE;
    let height = pad_y * 2 + GLYPH_H;
    let mut img = RgbImage::from_pixel(width, height, Rgb([BACKGROUND; 3]));
    draw_text(&mut img, text, pad_x, pad_y);
    img
}
