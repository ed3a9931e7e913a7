//! Glyph recognizer.
//!
//! Reads a table cell by matching every glyph template against it with
//! zero-mean normalized cross-correlation, then reassembling the hits in
//! reading order. The alphabet and font are fixed, so this is far more
//! reliable on the game's small stylized digits than a general OCR engine.

use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::integral_image::{integral_image, integral_squared_image, sum_image_pixels};

use super::preprocess::to_intensity;
use super::templates::GlyphSet;

/// Minimum correlation score for a template hit to count as a glyph.
pub const CONFIDENCE_THRESHOLD: f32 = 0.70;

/// Hits closer than this (in pixels) to the last kept hit are the same glyph.
pub const DEDUP_TOLERANCE_PX: u32 = 2;

/// Windows with less variance than this are flat background and score 0.
const MIN_VARIANCE: f64 = 1e-6;

/// Score map: one correlation value per template placement.
pub type ScoreMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// One template hit inside a cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphCandidate {
    pub character: char,
    pub x: u32,
    pub score: f32,
}

/// Computes the zero-mean normalized cross-correlation of `template` at every
/// placement inside `cell` (OpenCV's `TM_CCOEFF_NORMED`).
///
/// The result is `(W - w + 1) x (H - h + 1)`. A template larger than the
/// cell, or an empty template, yields an empty map.
pub fn match_template_normed(cell: &GrayImage, template: &GrayImage) -> ScoreMap {
    let (cw, ch) = cell.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || tw > cw || th > ch {
        return ImageBuffer::new(0, 0);
    }

    let n = (tw * th) as f64;
    let t_mean = template.pixels().map(|p| p[0] as f64).sum::<f64>() / n;
    let t_zero: Vec<f64> = template.pixels().map(|p| p[0] as f64 - t_mean).collect();
    let t_energy: f64 = t_zero.iter().map(|v| v * v).sum();

    let sums = integral_image::<_, u64>(cell);
    let squares = integral_squared_image::<_, u64>(cell);

    let out_w = cw - tw + 1;
    let out_h = ch - th + 1;
    let mut scores = ImageBuffer::new(out_w, out_h);

    for y in 0..out_h {
        for x in 0..out_w {
            let (right, bottom) = (x + tw - 1, y + th - 1);
            let sum = sum_image_pixels(&sums, x, y, right, bottom)[0] as f64;
            let sum_sq = sum_image_pixels(&squares, x, y, right, bottom)[0] as f64;
            let window_energy = sum_sq - sum * sum / n;

            let denom = (t_energy * window_energy).sqrt();
            let score = if t_energy < MIN_VARIANCE || window_energy < MIN_VARIANCE {
                0.0
            } else {
                // The template is zero-mean, so the window mean drops out of the numerator
                let mut numerator = 0.0;
                for ty in 0..th {
                    let row = (ty * tw) as usize;
                    for tx in 0..tw {
                        numerator +=
                            t_zero[row + tx as usize] * cell.get_pixel(x + tx, y + ty)[0] as f64;
                    }
                }
                (numerator / denom).clamp(-1.0, 1.0)
            };

            scores.put_pixel(x, y, Luma([score as f32]));
        }
    }

    scores
}

/// Collapses candidates into the recognized string.
///
/// Candidates are read left to right. A candidate is kept only if it lies more
/// than `tolerance` pixels right of the last kept one, which folds several
/// templates firing on one physical glyph into a single character. At equal
/// x the stronger match wins.
pub fn collapse_candidates(mut candidates: Vec<GlyphCandidate>, tolerance: u32) -> String {
    candidates.sort_by(|a, b| {
        a.x.cmp(&b.x)
            .then_with(|| b.score.total_cmp(&a.score))
            .then_with(|| a.character.cmp(&b.character))
    });

    let mut text = String::new();
    let mut last_x: Option<u32> = None;

    for candidate in candidates {
        if last_x.is_none_or(|last| candidate.x > last + tolerance) {
            text.push(candidate.character);
            last_x = Some(candidate.x);
        }
    }

    text
}

/// Template-matching recognizer with a fixed threshold and tolerance.
#[derive(Debug, Clone, Copy)]
pub struct GlyphRecognizer {
    threshold: f32,
    tolerance: u32,
}

impl Default for GlyphRecognizer {
    fn default() -> Self {
        Self::new(CONFIDENCE_THRESHOLD, DEDUP_TOLERANCE_PX)
    }
}

impl GlyphRecognizer {
    pub fn new(threshold: f32, tolerance: u32) -> Self {
        Self { threshold, tolerance }
    }

    /// Every placement of every glyph scoring at or above the threshold.
    pub fn find_candidates(&self, cell: &GrayImage, glyphs: &GlyphSet) -> Vec<GlyphCandidate> {
        let mut candidates = Vec::new();

        for (&character, template) in glyphs {
            let scores = match_template_normed(cell, template);
            for (x, _y, score) in scores.enumerate_pixels() {
                if score[0] >= self.threshold {
                    candidates.push(GlyphCandidate {
                        character,
                        x,
                        score: score[0],
                    });
                }
            }
        }

        candidates
    }

    /// Reads one cropped cell. Returns an empty string if nothing cleared the threshold.
    pub fn recognize(&self, cell: &RgbImage, glyphs: &GlyphSet) -> String {
        let gray = to_intensity(cell);
        let candidates = self.find_candidates(&gray, glyphs);
        collapse_candidates(candidates, self.tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::test_glyphs::{glyph_bitmap, glyph_set, render_text};

    fn candidate(character: char, x: u32, score: f32) -> GlyphCandidate {
        GlyphCandidate { character, x, score }
    }

    #[test]
    fn test_match_template_exact_hit() {
        let template = glyph_bitmap('7');
        let mut cell = GrayImage::from_pixel(30, 14, Luma([30]));
        image::imageops::replace(&mut cell, &template, 11, 2);

        let scores = match_template_normed(&cell, &template);

        assert_eq!(scores.dimensions(), (30 - 8 + 1, 14 - 10 + 1));
        assert!(scores.get_pixel(11, 2)[0] > 0.99);
        // Flat background windows score zero
        assert_eq!(scores.get_pixel(0, 0)[0], 0.0);
    }

    #[test]
    fn test_match_template_larger_than_cell() {
        let template = glyph_bitmap('1');
        let cell = GrayImage::from_pixel(5, 5, Luma([30]));
        let scores = match_template_normed(&cell, &template);
        assert_eq!(scores.dimensions(), (0, 0));
    }

    #[test]
    fn test_collapse_orders_left_to_right() {
        let text = collapse_candidates(
            vec![
                candidate('3', 20, 0.9),
                candidate('1', 0, 0.9),
                candidate('2', 10, 0.9),
            ],
            DEDUP_TOLERANCE_PX,
        );
        assert_eq!(text, "123");
    }

    #[test]
    fn test_collapse_merges_hits_within_tolerance() {
        // Two detections of one glyph at adjacent offsets
        let text = collapse_candidates(
            vec![
                candidate('8', 10, 0.95),
                candidate('8', 11, 0.80),
                candidate('0', 12, 0.75),
                candidate('5', 20, 0.90),
            ],
            DEDUP_TOLERANCE_PX,
        );
        assert_eq!(text, "85");
    }

    #[test]
    fn test_collapse_tolerance_is_measured_from_last_kept() {
        // x=13 is more than 2px right of the kept x=10, even though x=12 was dropped
        let text = collapse_candidates(
            vec![
                candidate('1', 10, 0.9),
                candidate('2', 12, 0.9),
                candidate('3', 13, 0.9),
            ],
            DEDUP_TOLERANCE_PX,
        );
        assert_eq!(text, "13");
    }

    #[test]
    fn test_collapse_prefers_stronger_match_at_same_x() {
        let text = collapse_candidates(
            vec![candidate('.', 4, 0.72), candidate(',', 4, 0.98)],
            DEDUP_TOLERANCE_PX,
        );
        assert_eq!(text, ",");
    }

    #[test]
    fn test_collapse_empty() {
        assert_eq!(collapse_candidates(Vec::new(), DEDUP_TOLERANCE_PX), "");
    }

    #[test]
    fn test_recognize_rendered_ratio() {
        let glyphs = glyph_set("0123456789:,.");
        let cell = render_text("12,500:1", 3, 2);

        let recognizer = GlyphRecognizer::default();
        assert_eq!(recognizer.recognize(&cell, &glyphs), "12,500:1");
    }

    #[test]
    fn test_recognize_is_deterministic() {
        let glyphs = glyph_set("0123456789:,.");
        let cell = render_text("3,400", 3, 2);

        let recognizer = GlyphRecognizer::default();
        let first = recognizer.recognize(&cell, &glyphs);
        for _ in 0..3 {
            assert_eq!(recognizer.recognize(&cell, &glyphs), first);
        }
        assert_eq!(first, "3,400");
    }

    #[test]
    fn test_recognize_blank_cell() {
        let glyphs = glyph_set("0123456789");
        let cell = render_text("", 20, 2);
        assert_eq!(GlyphRecognizer::default().recognize(&cell, &glyphs), "");
    }

    #[test]
    fn test_recognize_missing_glyph_is_skipped() {
        // No colon template: the colon is simply not read
        let glyphs = glyph_set("0123456789");
        let cell = render_text("5:1", 3, 2);
        assert_eq!(GlyphRecognizer::default().recognize(&cell, &glyphs), "51");
    }
}
