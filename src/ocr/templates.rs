//! Character template library.
//!
//! Loads the small labeled glyph bitmaps used by the recognizer. Files are
//! named `<domain>_<glyph>.<ext>` (a leading `template_` is accepted), e.g.
//! `ratio_colon.png` or `template_stock_7.png`.

use anyhow::{anyhow, Context, Result};
use image::{GrayImage, ImageFormat};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

const TEMPLATE_NAME_PATTERN: &str = r"^(?:template_)?([A-Za-z]+)_([A-Za-z0-9]+)$";

/// Glyph bitmaps for one domain, keyed by the character they render.
pub type GlyphSet = BTreeMap<char, GrayImage>;

/// Which table column a template set belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlyphDomain {
    Ratio,
    Stock,
}

impl GlyphDomain {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "ratio" => Some(GlyphDomain::Ratio),
            "stock" => Some(GlyphDomain::Stock),
            _ => None,
        }
    }
}

impl fmt::Display for GlyphDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GlyphDomain::Ratio => write!(f, "ratio"),
            GlyphDomain::Stock => write!(f, "stock"),
        }
    }
}

/// Maps a glyph file name to the character it represents.
pub fn glyph_char(name: &str) -> Option<char> {
    match name {
        "colon" => Some(':'),
        "comma" => Some(','),
        "decimal" => Some('.'),
        _ => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_digit() => Some(c),
                _ => None,
            }
        }
    }
}

/// Both template sets. Immutable after loading; shared read-only by workers.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
    pub ratio: GlyphSet,
    pub stock: GlyphSet,
}

impl TemplateSet {
    /// Loads every recognizable template in `dir`.
    ///
    /// Unrecognized names, unknown domains and undecodable images are skipped
    /// with a warning. Fails only if the directory itself cannot be read.
    pub fn load(dir: &Path) -> Result<Self> {
        let name_regex = Regex::new(TEMPLATE_NAME_PATTERN)?;
        let entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read template directory: {}", dir.display()))?;

        let mut set = TemplateSet::default();

        for entry in entries {
            let path = entry.context("Failed to read template directory entry")?.path();
            if !path.is_file() || ImageFormat::from_path(&path).is_err() {
                continue;
            }

            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_default();

            let Some(caps) = name_regex.captures(&stem) else {
                log::warn!("Skipping template with unexpected name: {}", file_name);
                continue;
            };

            let Some(domain) = GlyphDomain::from_name(&caps[1]) else {
                log::warn!("Skipping template with unknown domain '{}': {}", &caps[1], file_name);
                continue;
            };

            let Some(character) = glyph_char(&caps[2]) else {
                log::warn!("Skipping template with unknown glyph '{}': {}", &caps[2], file_name);
                continue;
            };

            let bitmap = match image::open(&path) {
                Ok(img) => img.to_luma8(),
                Err(e) => {
                    log::warn!("Could not load template image {}: {}", file_name, e);
                    continue;
                }
            };

            set.glyphs_mut(domain).insert(character, bitmap);
        }

        log::info!(
            "Loaded {} ratio templates and {} stock templates.",
            set.ratio.len(),
            set.stock.len()
        );

        Ok(set)
    }

    /// Returns the glyphs for one domain.
    pub fn glyphs(&self, domain: GlyphDomain) -> &GlyphSet {
        match domain {
            GlyphDomain::Ratio => &self.ratio,
            GlyphDomain::Stock => &self.stock,
        }
    }

    fn glyphs_mut(&mut self, domain: GlyphDomain) -> &mut GlyphSet {
        match domain {
            GlyphDomain::Ratio => &mut self.ratio,
            GlyphDomain::Stock => &mut self.stock,
        }
    }

    /// Errors if either domain has no templates. A batch must not run without both.
    pub fn ensure_usable(&self) -> Result<()> {
        for domain in [GlyphDomain::Ratio, GlyphDomain::Stock] {
            if self.glyphs(domain).is_empty() {
                return Err(anyhow!("No {} templates were loaded", domain));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};
    use tempfile::tempdir;

    fn write_glyph(dir: &Path, name: &str) {
        let img: GrayImage = ImageBuffer::from_fn(4, 6, |x, y| Luma([((x + y) * 20) as u8]));
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_glyph_char_table() {
        assert_eq!(glyph_char("colon"), Some(':'));
        assert_eq!(glyph_char("comma"), Some(','));
        assert_eq!(glyph_char("decimal"), Some('.'));
        assert_eq!(glyph_char("0"), Some('0'));
        assert_eq!(glyph_char("9"), Some('9'));
        assert_eq!(glyph_char("10"), None);
        assert_eq!(glyph_char("slash"), None);
        assert_eq!(glyph_char(""), None);
    }

    #[test]
    fn test_load_both_domains() {
        let dir = tempdir().unwrap();
        write_glyph(dir.path(), "ratio_1.png");
        write_glyph(dir.path(), "ratio_colon.png");
        write_glyph(dir.path(), "template_stock_comma.png");
        write_glyph(dir.path(), "stock_4.png");

        let set = TemplateSet::load(dir.path()).unwrap();

        assert_eq!(set.ratio.len(), 2);
        assert!(set.ratio.contains_key(&'1'));
        assert!(set.ratio.contains_key(&':'));
        assert_eq!(set.stock.len(), 2);
        assert!(set.stock.contains_key(&','));
        assert_eq!(set.stock[&'4'].dimensions(), (4, 6));
        assert!(set.ensure_usable().is_ok());
    }

    #[test]
    fn test_load_skips_unrecognized_files() {
        let dir = tempdir().unwrap();
        write_glyph(dir.path(), "ratio_slash.png");
        write_glyph(dir.path(), "price_1.png");
        write_glyph(dir.path(), "stock.png");
        write_glyph(dir.path(), "stock_2.png");
        std::fs::write(dir.path().join("ratio_3.png"), b"not an image").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignore me").unwrap();

        let set = TemplateSet::load(dir.path()).unwrap();

        assert!(set.ratio.is_empty());
        assert_eq!(set.stock.len(), 1);
        assert!(set.ensure_usable().is_err());
    }

    #[test]
    fn test_load_missing_directory_fails() {
        let dir = tempdir().unwrap();
        assert!(TemplateSet::load(&dir.path().join("missing")).is_err());
    }
}
