//! OCR for the ratio and stock columns of the exchange tables.
//!
//! Template matching against a fixed glyph alphabet, followed by parsing of
//! the recognized text into numbers.

pub mod extract;
pub mod matcher;
pub mod preprocess;
pub mod templates;

#[cfg(test)]
pub mod test_glyphs;

pub use extract::{parse_ratio, parse_stock};
pub use matcher::GlyphRecognizer;
pub use preprocess::crop_cell;
pub use templates::{GlyphDomain, TemplateSet};

use image::RgbImage;

/// Parsed values of one table row. Either may be missing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowValues {
    pub ratio: Option<f64>,
    pub stock: Option<i64>,
}

impl RowValues {
    /// A row is worth recording if at least one field parsed.
    pub fn has_data(&self) -> bool {
        self.ratio.is_some() || self.stock.is_some()
    }
}

/// High-level function: ratio + stock cell crops → parsed row values.
pub fn read_row(
    recognizer: &GlyphRecognizer,
    templates: &TemplateSet,
    ratio_cell: &RgbImage,
    stock_cell: &RgbImage,
) -> RowValues {
    let ratio_text = recognizer.recognize(ratio_cell, templates.glyphs(GlyphDomain::Ratio));
    let stock_text = recognizer.recognize(stock_cell, templates.glyphs(GlyphDomain::Stock));

    let values = RowValues {
        ratio: parse_ratio(&ratio_text),
        stock: parse_stock(&stock_text),
    };

    log::debug!(
        "Cell text ratio='{}' stock='{}' -> {:?}",
        ratio_text,
        stock_text,
        values
    );

    values
}
