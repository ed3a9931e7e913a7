use image::{GrayImage, ImageBuffer, Luma, RgbImage};

use crate::batch::config::{ColumnBand, RowBand};

/// Converts an RGB image to single-channel intensity.
///
/// Uses the ITU-R BT.601 luma formula: Y = 0.299*R + 0.587*G + 0.114*B,
/// the same weighting the glyph templates were captured with.
pub fn to_intensity(img: &RgbImage) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut output = ImageBuffer::new(width, height);

    for (x, y, pixel) in img.enumerate_pixels() {
        let r = pixel[0] as f32;
        let g = pixel[1] as f32;
        let b = pixel[2] as f32;
        let luma = 0.299 * r + 0.587 * g + 0.114 * b;
        output.put_pixel(x, y, Luma([luma.round().clamp(0.0, 255.0) as u8]));
    }

    output
}

/// Crops one table cell from a screenshot using absolute pixel bands.
///
/// Bands are clamped to the image bounds. A band that is degenerate or lies
/// outside the image yields an empty (0-sized) crop instead of panicking.
pub fn crop_cell(img: &RgbImage, column: &ColumnBand, row: &RowBand) -> RgbImage {
    let (w, h) = img.dimensions();

    let x0 = column.x_start.min(w);
    let x1 = column.x_end.min(w).max(x0);
    let y0 = row.y_start.min(h);
    let y1 = row.y_end.min(h).max(y0);

    image::imageops::crop_imm(img, x0, y0, x1 - x0, y1 - y0).to_image()
}
