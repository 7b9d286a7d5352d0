//! Date/type partitioned directory tree under the storage root:
//!
//! ```text
//! files/<YYYY>/<MM>/documents/<uuid><ext>
//! files/<YYYY>/<MM>/images/<uuid><ext>
//! files/<YYYY>/<MM>/thumbnails/<uuid>_thumb<ext>
//! ```

use chrono::{DateTime, Datelike, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{AppError, Result};

/// Top-level directory under the storage root.
pub const FILES_DIR: &str = "files";

/// Type subdirectory inside a month partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Documents,
    Images,
    Thumbnails,
}

impl FileCategory {
    pub const ALL: [FileCategory; 3] = [
        FileCategory::Documents,
        FileCategory::Images,
        FileCategory::Thumbnails,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            FileCategory::Documents => "documents",
            FileCategory::Images => "images",
            FileCategory::Thumbnails => "thumbnails",
        }
    }
}

/// Year/month partition of the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub year: i32,
    pub month: u32,
}

impl Partition {
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            year: time.year(),
            month: time.month(),
        }
    }

    /// `files/<YYYY>/<MM>/<category>`, relative to the storage root
    pub fn dir(&self, category: FileCategory) -> PathBuf {
        PathBuf::from(FILES_DIR)
            .join(format!("{:04}", self.year))
            .join(format!("{:02}", self.month))
            .join(category.dir_name())
    }

    /// Relative path of `name` inside `category`, using `/` separators so
    /// the stored value is identical on every platform.
    pub fn relative_path(&self, category: FileCategory, name: &str) -> String {
        format!(
            "{}/{:04}/{:02}/{}/{}",
            FILES_DIR,
            self.year,
            self.month,
            category.dir_name(),
            name
        )
    }
}

/// Create `files/` and the three type directories of `partition` under `root`.
///
/// Uses create-if-missing semantics, so repeated and concurrent calls are safe.
pub async fn ensure_partition(root: &Path, partition: Partition) -> Result<()> {
    let files_root = root.join(FILES_DIR);
    fs::create_dir_all(&files_root)
        .await
        .map_err(|e| AppError::fs(format!("create {}", files_root.display()), e))?;

    for category in FileCategory::ALL {
        let dir = root.join(partition.dir(category));
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::fs(format!("create {}", dir.display()), e))?;
    }

    tracing::debug!(
        "Ensured upload directories for {:04}/{:02} under {:?}",
        partition.year,
        partition.month,
        root
    );
    Ok(())
}

/// Ensure the tree for the current month exists.
pub async fn ensure_directories(root: &Path) -> Result<()> {
    ensure_partition(root, Partition::now()).await
}
