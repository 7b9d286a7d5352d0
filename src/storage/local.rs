use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::error::{AppError, Result};
use crate::storage::{guard, layout, Partition};

/// Local file system storage confined to a single root directory
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Guarded absolute path for a path relative to the root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        guard::validate_path(&self.root, &self.root.join(relative))
    }

    /// Ensure the directory tree for `partition` exists.
    pub async fn ensure_partition(&self, partition: Partition) -> Result<()> {
        layout::ensure_partition(&self.root, partition).await
    }

    /// Stream `reader` into a new file at `path`, returning the bytes written.
    ///
    /// At most `max_bytes` are accepted. On any failure, including the
    /// returned future being dropped mid-copy, the partially written file is
    /// removed.
    pub async fn write_stream<R>(&self, path: &Path, reader: R, max_bytes: u64) -> Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        let path = guard::validate_path(&self.root, path)?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| AppError::fs(format!("create {}", path.display()), e))?;
        let partial = PartialFile::new(path.clone());

        // One byte past the limit is enough to detect an oversized stream.
        let mut limited = reader.take(max_bytes.saturating_add(1));
        let copied = match tokio::io::copy(&mut limited, &mut file).await {
            Ok(n) => file.flush().await.map(|_| n),
            Err(e) => Err(e),
        };
        drop(file);

        let written = match copied {
            Ok(n) if n > max_bytes => {
                return Err(AppError::Validation(format!(
                    "payload exceeds the maximum of {} bytes",
                    max_bytes
                )))
            }
            Ok(n) => n,
            Err(e) => return Err(AppError::fs(format!("write {}", path.display()), e)),
        };

        partial.keep();
        tracing::debug!("Saved file to {:?}", path);
        Ok(written)
    }

    /// Remove a file. A file that is already gone is not an error.
    pub async fn remove(&self, path: &Path) -> Result<()> {
        let path = guard::validate_path(&self.root, path)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("Deleted file {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::fs(format!("remove {}", path.display()), e)),
        }
    }

    pub async fn exists(&self, path: &Path) -> Result<bool> {
        let path = guard::validate_path(&self.root, path)?;
        fs::try_exists(&path)
            .await
            .map_err(|e| AppError::fs(format!("stat {}", path.display()), e))
    }
}

/// A freshly created file that is deleted on drop unless [`PartialFile::keep`] is called.
struct PartialFile {
    path: Option<PathBuf>,
}

impl PartialFile {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn keep(mut self) {
        self.path = None;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!("Removed partial file {:?}", path),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove partial file {:?}: {}", path, e),
        }
    }
}
