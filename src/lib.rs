//! File ingestion and media processing core.
//!
//! Accepts uploaded payloads, validates them against a size limit and a
//! content-type allowlist, stores them under a date/type partitioned tree
//! confined to a storage root, and for raster images records dimensions and
//! writes a thumbnail. Metadata lives in SQLite.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;

pub use config::Config;
pub use db::Database;
pub use error::{AppError, ErrorKind, Result};
pub use models::{FileListResponse, FileRecord, UploadHeader};
pub use services::MediaService;
