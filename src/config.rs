use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub thumbnail: ThumbnailConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Storage root; every stored file and thumbnail lives under it.
    #[serde(default = "default_storage_root")]
    pub root: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Maximum payload size in bytes
    #[serde(default = "default_max_size")]
    pub max_size: u64,
    /// Accept raster image types and generate thumbnails for them
    #[serde(default = "default_true")]
    pub image_support: bool,
    /// Reject uploads that declare no content type instead of treating them as opaque binaries
    #[serde(default)]
    pub require_content_type: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThumbnailConfig {
    /// Length of the longer thumbnail side in pixels
    #[serde(default = "default_thumbnail_max")]
    pub max_dimension: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

// Default values
fn default_db_path() -> String {
    "data/mediavault.db".to_string()
}

fn default_storage_root() -> String {
    "data/storage".to_string()
}

fn default_max_size() -> u64 {
    10 * 1024 * 1024 // 10 MiB
}

fn default_true() -> bool {
    true
}

fn default_thumbnail_max() -> u32 {
    300
}

fn default_jpeg_quality() -> u8 {
    85
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            image_support: true,
            require_content_type: false,
        }
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            max_dimension: default_thumbnail_max(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides();
        config.normalize();
        config.ensure_directories()?;
        tracing::info!(
            "Storage config: root={}, max_size={}, image_support={}",
            config.storage.root,
            config.upload.max_size,
            config.upload.image_support
        );
        Ok(config)
    }

    /// Load configuration from mediavault.toml or config.toml
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = [
            "mediavault.toml",
            "config.toml",
            "data/mediavault.toml",
            "data/config.toml",
        ];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config = Self::from_toml(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment variable overrides
    /// Format: MV_CONF_<SECTION>_<KEY>
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("MV_CONF_DATABASE_PATH") {
            self.database.path = val;
        }

        if let Ok(val) = env::var("MV_CONF_STORAGE_ROOT") {
            self.storage.root = val;
        }

        if let Ok(val) = env::var("MV_CONF_UPLOAD_MAX_SIZE") {
            if let Ok(size) = val.parse() {
                self.upload.max_size = size;
            }
        }
        if let Ok(val) = env::var("MV_CONF_UPLOAD_IMAGE_SUPPORT") {
            if let Ok(v) = val.parse() {
                self.upload.image_support = v;
            }
        }
        if let Ok(val) = env::var("MV_CONF_UPLOAD_REQUIRE_CONTENT_TYPE") {
            if let Ok(v) = val.parse() {
                self.upload.require_content_type = v;
            }
        }

        if let Ok(val) = env::var("MV_CONF_THUMBNAIL_MAX_DIMENSION") {
            if let Ok(v) = val.parse() {
                self.thumbnail.max_dimension = v;
            }
        }
        if let Ok(val) = env::var("MV_CONF_THUMBNAIL_JPEG_QUALITY") {
            if let Ok(v) = val.parse() {
                self.thumbnail.jpeg_quality = v;
            }
        }
    }

    /// Replace out-of-range values with defaults
    fn normalize(&mut self) {
        if self.storage.root.trim().is_empty() {
            self.storage.root = default_storage_root();
        }
        if self.thumbnail.max_dimension == 0 {
            self.thumbnail.max_dimension = default_thumbnail_max();
        }
        if self.thumbnail.jpeg_quality == 0 || self.thumbnail.jpeg_quality > 100 {
            self.thumbnail.jpeg_quality = default_jpeg_quality();
        }
    }

    /// Ensure required directories exist
    fn ensure_directories(&self) -> anyhow::Result<()> {
        if let Some(parent) = Path::new(&self.database.path).parent() {
            fs::create_dir_all(parent)?;
        }

        fs::create_dir_all(&self.storage.root)?;

        Ok(())
    }
}
