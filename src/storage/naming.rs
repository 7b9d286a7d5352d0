use std::path::Path;
use uuid::Uuid;

/// Extension used when the original filename carries none.
pub const DEFAULT_EXTENSION: &str = "bin";

/// Longest extension kept from an uploaded filename.
const MAX_EXTENSION_LEN: usize = 10;

/// Marker inserted between the uuid and the extension of a thumbnail.
pub const THUMBNAIL_MARKER: &str = "_thumb";

/// Lowercased, ASCII-alphanumeric extension of `original_name`, or
/// [`DEFAULT_EXTENSION`] when nothing usable remains.
pub fn sanitize_extension(original_name: &str) -> String {
    // Treat backslashes as separators so Windows-style names lose their directories too.
    let name = original_name.replace('\\', "/");
    let ext: String = Path::new(&name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(MAX_EXTENSION_LEN)
        .collect::<String>()
        .to_ascii_lowercase();

    if ext.is_empty() {
        DEFAULT_EXTENSION.to_string()
    } else {
        ext
    }
}

/// On-disk name for an upload: `<uuid>.<ext>`.
pub fn derive_stored_name(uuid: &Uuid, original_name: &str) -> String {
    format!("{}.{}", uuid, sanitize_extension(original_name))
}

/// On-disk name for a thumbnail: `<uuid>_thumb.<ext>`.
pub fn thumbnail_name(uuid: &Uuid, extension: &str) -> String {
    format!("{}{}.{}", uuid, THUMBNAIL_MARKER, extension)
}
