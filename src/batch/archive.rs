//! Moving consumed inputs out of the screenshots directory.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Moves `path` into `dir`, keeping its file name. Overwrites an existing
/// file of the same name so a re-captured lot replaces the old archive copy.
///
/// Falls back to copy + remove when a rename is not possible (e.g. the
/// archive lives on another filesystem).
pub fn move_into(path: &Path, dir: &Path) -> Result<PathBuf> {
    let name = path
        .file_name()
        .with_context(|| format!("No file name in {}", path.display()))?;
    let dest = dir.join(name);

    if fs::rename(path, &dest).is_ok() {
        return Ok(dest);
    }

    fs::copy(path, &dest)
        .with_context(|| format!("Failed to copy {} to {}", path.display(), dest.display()))?;
    fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    Ok(dest)
}

/// Moves a screenshot and, if present, its sidecar into `dir`.
pub fn archive_pair(screenshot: &Path, metadata: &Path, dir: &Path) -> Result<()> {
    move_into(screenshot, dir)?;
    if metadata.exists() {
        move_into(metadata, dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_move_into() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.png");
        let dest_dir = dir.path().join("processed");
        fs::create_dir_all(&dest_dir).unwrap();
        fs::write(&src, b"png").unwrap();

        let dest = move_into(&src, &dest_dir).unwrap();

        assert_eq!(dest, dest_dir.join("a.png"));
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"png");
    }

    #[test]
    fn test_move_into_replaces_existing() {
        let dir = tempdir().unwrap();
        let dest_dir = dir.path().join("processed");
        fs::create_dir_all(&dest_dir).unwrap();
        fs::write(dest_dir.join("a.png"), b"old").unwrap();
        let src = dir.path().join("a.png");
        fs::write(&src, b"new").unwrap();

        move_into(&src, &dest_dir).unwrap();

        assert_eq!(fs::read(dest_dir.join("a.png")).unwrap(), b"new");
    }

    #[test]
    fn test_move_into_missing_source() {
        let dir = tempdir().unwrap();
        assert!(move_into(&dir.path().join("gone.png"), dir.path()).is_err());
    }

    #[test]
    fn test_archive_pair_without_sidecar() {
        let dir = tempdir().unwrap();
        let dest_dir = dir.path().join("quarantine");
        fs::create_dir_all(&dest_dir).unwrap();
        let png = dir.path().join("a.png");
        fs::write(&png, b"png").unwrap();

        archive_pair(&png, &dir.path().join("a.json"), &dest_dir).unwrap();

        assert!(dest_dir.join("a.png").exists());
        assert!(!dest_dir.join("a.json").exists());
    }
}
