use chrono::{SecondsFormat, Utc};
use std::path::PathBuf;
use tokio::io::AsyncRead;
use uuid::Uuid;

use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{FileListResponse, FileRecord, ImageMetadata, NewFileRecord, UploadHeader};
use crate::services::media::{ImageProcessor, ThumbnailFormat};
use crate::services::rollback::Rollback;
use crate::services::validator::{is_image_file, normalize_content_type, UploadValidator};
use crate::services::FileRepository;
use crate::storage::{
    derive_stored_name, thumbnail_name, FileCategory, LocalStorage, Partition,
};

/// Upload and delete façade over validation, storage, image processing and metadata
#[derive(Clone)]
pub struct MediaService {
    db: Database,
    storage: LocalStorage,
    validator: UploadValidator,
    images: ImageProcessor,
}

impl MediaService {
    pub fn new(
        db: Database,
        storage: LocalStorage,
        validator: UploadValidator,
        images: ImageProcessor,
    ) -> Self {
        Self {
            db,
            storage,
            validator,
            images,
        }
    }

    pub fn from_config(db: Database, config: &Config) -> Self {
        Self::new(
            db,
            LocalStorage::new(&config.storage.root),
            UploadValidator::new(
                config.upload.max_size,
                config.upload.image_support,
                config.upload.require_content_type,
            ),
            ImageProcessor::new(config.thumbnail.max_dimension, config.thumbnail.jpeg_quality),
        )
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// Create the current month's directory tree under the storage root
    pub async fn ensure_upload_directories(&self) -> Result<()> {
        crate::storage::ensure_directories(self.storage.root()).await
    }

    /// Whether `content_type` is a recognized image type
    pub fn is_image_file(content_type: &str) -> bool {
        is_image_file(content_type)
    }

    /// Store an upload and create its record.
    ///
    /// Either every step succeeds and the record is returned, or everything
    /// written along the way is removed before the error is returned.
    pub async fn upload_file<R>(&self, reader: R, header: UploadHeader) -> Result<FileRecord>
    where
        R: AsyncRead + Unpin,
    {
        self.validator.validate(header.size, &header.content_type)?;

        let mut rollback = Rollback::new(&self.db, &self.storage);
        match self.store_upload(reader, &header, &mut rollback).await {
            Ok(record) => {
                rollback.commit();
                tracing::info!(
                    "File uploaded: id={}, uuid={}, size={}, is_image={}",
                    record.id,
                    record.uuid,
                    record.size,
                    record.is_image
                );
                Ok(record)
            }
            Err(e) => {
                tracing::warn!(
                    "Upload of {:?} failed, rolling back {} step(s): {}",
                    header.filename,
                    rollback.len(),
                    e
                );
                rollback.unwind().await;
                Err(e)
            }
        }
    }

    async fn store_upload<R>(
        &self,
        reader: R,
        header: &UploadHeader,
        rollback: &mut Rollback<'_>,
    ) -> Result<FileRecord>
    where
        R: AsyncRead + Unpin,
    {
        let uuid = Uuid::new_v4();
        let stored_name = derive_stored_name(&uuid, &header.filename);
        let content_type = normalize_content_type(&header.content_type);
        let treat_as_image = self.validator.allows_images() && is_image_file(&content_type);
        let category = if treat_as_image {
            FileCategory::Images
        } else {
            FileCategory::Documents
        };

        let partition = Partition::now();
        self.storage.ensure_partition(partition).await?;

        let relative_path = partition.relative_path(category, &stored_name);
        let target = self.storage.resolve(&relative_path)?;

        let size = self
            .storage
            .write_stream(&target, reader, self.validator.max_size())
            .await?;
        rollback.remove_file(target.clone());
        tracing::debug!("Wrote {} bytes for {} to {}", size, uuid, relative_path);

        let image = if treat_as_image {
            Some(
                self.process_image(&uuid, partition, target, rollback)
                    .await?,
            )
        } else {
            None
        };

        let new_record = NewFileRecord {
            uuid: uuid.to_string(),
            original_name: header.filename.clone(),
            stored_name,
            path: relative_path,
            size: size as i64,
            mime_type: content_type,
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            image,
        };

        let id = FileRepository::create_file(&self.db, &new_record).await?;
        rollback.delete_record(id);

        FileRepository::get_file(&self.db, id).await
    }

    /// Decode the stored original and write its thumbnail.
    async fn process_image(
        &self,
        uuid: &Uuid,
        partition: Partition,
        source: PathBuf,
        rollback: &mut Rollback<'_>,
    ) -> Result<ImageMetadata> {
        let images = self.images.clone();
        let (decoded, format) =
            tokio::task::spawn_blocking(move || images.decode(&source)).await??;
        let (width, height) = ImageProcessor::dimensions(&decoded);

        let thumb_format = ThumbnailFormat::for_source(format);
        let thumbnail_path = partition.relative_path(
            FileCategory::Thumbnails,
            &thumbnail_name(uuid, thumb_format.extension()),
        );
        let thumb_target = self.storage.resolve(&thumbnail_path)?;
        rollback.remove_file(thumb_target.clone());

        self.images
            .write_thumbnail(decoded, thumb_format, thumb_target)
            .await?;

        Ok(ImageMetadata {
            width,
            height,
            thumbnail_path,
        })
    }

    pub async fn get_file(&self, id: i64) -> Result<FileRecord> {
        FileRepository::get_file(&self.db, id).await
    }

    pub async fn get_file_by_uuid(&self, uuid: &str) -> Result<FileRecord> {
        FileRepository::get_file_by_uuid(&self.db, uuid).await
    }

    /// Newest-first page of records with the total count
    pub async fn list_files(&self, limit: i64, offset: i64) -> Result<FileListResponse> {
        let (limit, offset) = crate::services::repository::clamp_page(limit, offset);
        let files = FileRepository::list_files(&self.db, limit, offset).await?;
        let total = FileRepository::count_files(&self.db).await?;
        Ok(FileListResponse {
            files,
            total,
            limit,
            offset,
        })
    }

    /// Absolute path of the stored original.
    ///
    /// A record whose file has gone missing yields `NotFound`.
    pub async fn get_file_path(&self, uuid: &str) -> Result<PathBuf> {
        let record = self.get_file_by_uuid(uuid).await?;
        self.existing_path(&record.path, uuid).await
    }

    /// Absolute path of the thumbnail, for image records.
    pub async fn get_thumbnail_path(&self, uuid: &str) -> Result<PathBuf> {
        let record = self.get_file_by_uuid(uuid).await?;
        let thumbnail = record
            .thumbnail_path
            .ok_or_else(|| AppError::NotFound(format!("File {} has no thumbnail", uuid)))?;
        self.existing_path(&thumbnail, uuid).await
    }

    async fn existing_path(&self, relative: &str, uuid: &str) -> Result<PathBuf> {
        let path = self.storage.resolve(relative)?;
        if !self.storage.exists(&path).await? {
            return Err(AppError::NotFound(format!(
                "Stored file for {} is missing",
                uuid
            )));
        }
        Ok(path)
    }

    /// Resolve the original for serving and count the download.
    pub async fn record_download(&self, uuid: &str) -> Result<PathBuf> {
        let record = self.get_file_by_uuid(uuid).await?;
        let path = self.existing_path(&record.path, uuid).await?;
        FileRepository::increment_download_count(&self.db, record.id).await?;
        Ok(path)
    }

    /// Set or clear the alt text of an image record
    pub async fn set_alt_text(&self, uuid: &str, alt_text: Option<&str>) -> Result<FileRecord> {
        let record = self.get_file_by_uuid(uuid).await?;
        if !record.is_image {
            return Err(AppError::Validation(format!(
                "File {} is not an image",
                uuid
            )));
        }

        let alt_text = alt_text.map(str::trim).filter(|s| !s.is_empty());
        FileRepository::update_alt_text(&self.db, record.id, alt_text).await?;
        self.get_file(record.id).await
    }

    /// Remove a file, its thumbnail and its record.
    ///
    /// The record is deleted last; a failed thumbnail removal is only logged.
    pub async fn delete_file(&self, uuid: &str) -> Result<()> {
        let record = self.get_file_by_uuid(uuid).await?;

        let original = self.storage.resolve(&record.path)?;
        self.storage.remove(&original).await?;

        if let Some(thumbnail) = &record.thumbnail_path {
            let removed = match self.storage.resolve(thumbnail) {
                Ok(path) => self.storage.remove(&path).await,
                Err(e) => Err(e),
            };
            if let Err(e) = removed {
                tracing::warn!("Failed to remove thumbnail for {}: {}", uuid, e);
            }
        }

        FileRepository::delete_file(&self.db, record.id).await?;

        tracing::info!("File deleted: id={}, uuid={}", record.id, record.uuid);
        Ok(())
    }
}
