use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Stored file record
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FileRecord {
    pub id: i64,
    pub uuid: String,
    /// Display only; never used to build a filesystem path.
    pub original_name: String,
    pub stored_name: String,
    /// Path relative to the storage root
    pub path: String,
    pub size: i64,
    pub mime_type: String,
    pub download_count: i64,
    pub created_at: String,
    pub is_image: bool,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub thumbnail_path: Option<String>,
    pub alt_text: Option<String>,
}

/// Row to insert for a freshly written upload
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub uuid: String,
    pub original_name: String,
    pub stored_name: String,
    pub path: String,
    pub size: i64,
    pub mime_type: String,
    pub created_at: String,
    pub image: Option<ImageMetadata>,
}

/// Metadata extracted from a decoded image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    /// Thumbnail path relative to the storage root
    pub thumbnail_path: String,
}

/// Header metadata supplied alongside an upload stream
#[derive(Debug, Clone, Deserialize)]
pub struct UploadHeader {
    pub filename: String,
    /// Declared payload length in bytes
    pub size: u64,
    /// Declared content type; empty when the uploader sent none
    #[serde(default)]
    pub content_type: String,
}

impl UploadHeader {
    pub fn new(filename: impl Into<String>, size: u64, content_type: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            size,
            content_type: content_type.into(),
        }
    }
}

/// Page of records, newest first
#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub files: Vec<FileRecord>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}
