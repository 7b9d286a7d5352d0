use std::path::{Component, Path, PathBuf};

use crate::error::{AppError, Result};

/// Absolute, lexically cleaned form of `path`: `.` segments dropped and
/// `..` segments applied against the preceding component.
///
/// Symlinks are not resolved; the guard works on the path text only.
pub fn clean_absolute(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)
        .map_err(|e| AppError::fs(format!("resolve {}", path.display()), e))?;

    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the filesystem root stays at the root.
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    Ok(cleaned)
}

/// Verify `target` stays under `root` and return its cleaned absolute form.
///
/// Both paths are made absolute and cleaned, then `target` is expressed
/// relative to `root`; a relative form that needs a `..` segment to get
/// there is rejected.
pub fn validate_path(root: &Path, target: &Path) -> Result<PathBuf> {
    let root = clean_absolute(root)?;
    let cleaned = clean_absolute(target)?;

    let relative = cleaned.strip_prefix(&root).map_err(|_| {
        AppError::Path(format!(
            "{} resolves outside the storage root",
            target.display()
        ))
    })?;

    if relative
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(AppError::Path(format!(
            "{} contains a parent directory segment",
            target.display()
        )));
    }

    Ok(cleaned)
}
