use std::path::{Path, PathBuf};
use std::sync::OnceLock;

static BASE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory all relative paths are resolved against.
///
/// This is the working directory the tool was started from, matching the
/// layout the capture process writes into.
pub fn get_base_dir() -> &'static PathBuf {
    BASE_DIR.get_or_init(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Returns the logs directory: `<base_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_base_dir().join("logs")
}

/// Resolves `path` against `base` unless it is already absolute.
pub fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Creates every directory in `dirs` (and parents). Call before dispatching work.
pub fn ensure_directories<'a>(dirs: impl IntoIterator<Item = &'a Path>) -> std::io::Result<()> {
    for dir in dirs {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
