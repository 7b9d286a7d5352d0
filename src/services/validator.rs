use crate::error::{AppError, Result};

/// Document content types accepted for upload.
pub const DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "text/plain",
    "text/csv",
    "application/zip",
    "application/x-zip-compressed",
    "application/x-rar-compressed",
    "application/x-7z-compressed",
    "application/gzip",
    "application/x-tar",
    "application/json",
    "application/xml",
    "text/xml",
    "application/rtf",
    "text/rtf",
];

/// Raster image content types accepted when image support is enabled.
pub const IMAGE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/bmp",
    "image/tiff",
];

/// Essence of a declared content type: parameters dropped, trimmed, lowercased.
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Whether the declared content type is one of the recognized image types.
pub fn is_image_file(content_type: &str) -> bool {
    let essence = normalize_content_type(content_type);
    IMAGE_TYPES.contains(&essence.as_str())
}

/// Accepts or rejects an upload before anything touches disk
#[derive(Debug, Clone)]
pub struct UploadValidator {
    max_size: u64,
    allow_images: bool,
    require_content_type: bool,
}

impl UploadValidator {
    pub fn new(max_size: u64, allow_images: bool, require_content_type: bool) -> Self {
        Self {
            max_size,
            allow_images,
            require_content_type,
        }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn allows_images(&self) -> bool {
        self.allow_images
    }

    /// Check the declared size and content type.
    ///
    /// An empty content type passes unless `require_content_type` is set;
    /// such uploads are stored as opaque binaries.
    pub fn validate(&self, size: u64, content_type: &str) -> Result<()> {
        if size > self.max_size {
            return Err(AppError::Validation(format!(
                "file size {} exceeds the maximum of {} bytes",
                size, self.max_size
            )));
        }

        let essence = normalize_content_type(content_type);
        if essence.is_empty() {
            if self.require_content_type {
                return Err(AppError::Validation(
                    "content type is required".to_string(),
                ));
            }
            return Ok(());
        }

        if !self.is_allowed(&essence) {
            return Err(AppError::Validation(format!(
                "content type {} is not allowed",
                essence
            )));
        }

        Ok(())
    }

    fn is_allowed(&self, essence: &str) -> bool {
        DOCUMENT_TYPES.contains(&essence) || (self.allow_images && IMAGE_TYPES.contains(&essence))
    }
}
