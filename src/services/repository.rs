use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{FileRecord, NewFileRecord};

/// Clamp caller-supplied pagination: negatives become zero.
pub fn clamp_page(limit: i64, offset: i64) -> (i64, i64) {
    (limit.max(0), offset.max(0))
}

/// Metadata store for file records
pub struct FileRepository;

impl FileRepository {
    /// Insert a record, returning its store-assigned id.
    ///
    /// A duplicate uuid is rejected by the unique index and surfaces as a persistence error.
    pub async fn create_file(db: &Database, record: &NewFileRecord) -> Result<i64> {
        let (is_image, width, height, thumbnail_path) = match &record.image {
            Some(image) => (
                true,
                Some(image.width as i64),
                Some(image.height as i64),
                Some(image.thumbnail_path.as_str()),
            ),
            None => (false, None, None, None),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO files (uuid, original_name, stored_name, path, size, mime_type, download_count, created_at, is_image, width, height, thumbnail_path)
            VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.uuid)
        .bind(&record.original_name)
        .bind(&record.stored_name)
        .bind(&record.path)
        .bind(record.size)
        .bind(&record.mime_type)
        .bind(&record.created_at)
        .bind(is_image)
        .bind(width)
        .bind(height)
        .bind(thumbnail_path)
        .execute(db.pool())
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Get a record by id
    pub async fn get_file(db: &Database, id: i64) -> Result<FileRecord> {
        sqlx::query_as("SELECT * FROM files WHERE id = ?")
            .bind(id)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", id)))
    }

    /// Get a record by its external uuid
    pub async fn get_file_by_uuid(db: &Database, uuid: &str) -> Result<FileRecord> {
        sqlx::query_as("SELECT * FROM files WHERE uuid = ?")
            .bind(uuid)
            .fetch_optional(db.pool())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", uuid)))
    }

    /// List records newest first.
    ///
    /// Negative arguments are clamped to zero and a zero limit returns no records.
    pub async fn list_files(db: &Database, limit: i64, offset: i64) -> Result<Vec<FileRecord>> {
        let (limit, offset) = clamp_page(limit, offset);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let files = sqlx::query_as(
            "SELECT * FROM files ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(db.pool())
        .await?;

        Ok(files)
    }

    pub async fn count_files(db: &Database) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM files")
            .fetch_one(db.pool())
            .await?;
        Ok(count.0)
    }

    /// Atomically add one to the download counter
    pub async fn increment_download_count(db: &Database, id: i64) -> Result<()> {
        let result = sqlx::query("UPDATE files SET download_count = download_count + 1 WHERE id = ?")
            .bind(id)
            .execute(db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("File {} not found", id)));
        }
        Ok(())
    }

    pub async fn update_alt_text(db: &Database, id: i64, alt_text: Option<&str>) -> Result<()> {
        let result = sqlx::query("UPDATE files SET alt_text = ? WHERE id = ?")
            .bind(alt_text)
            .bind(id)
            .execute(db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("File {} not found", id)));
        }
        Ok(())
    }

    /// Delete a record. Deleting a missing id affects zero rows and is not an error.
    pub async fn delete_file(db: &Database, id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(db.pool())
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::ImageMetadata;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, Database) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("test.db");
        let db = Database::new(path.to_str().unwrap()).await.unwrap();
        db.run_migrations().await.unwrap();
        (temp_dir, db)
    }

    fn new_record(uuid: &str, created_at: &str) -> NewFileRecord {
        NewFileRecord {
            uuid: uuid.to_string(),
            original_name: "notes.txt".to_string(),
            stored_name: format!("{}.txt", uuid),
            path: format!("files/2024/03/documents/{}.txt", uuid),
            size: 20,
            mime_type: "text/plain".to_string(),
            created_at: created_at.to_string(),
            image: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (_dir, db) = setup().await;
        let id = FileRepository::create_file(&db, &new_record("a", "2024-03-01T00:00:00.000000Z"))
            .await
            .unwrap();

        let by_id = FileRepository::get_file(&db, id).await.unwrap();
        let by_uuid = FileRepository::get_file_by_uuid(&db, "a").await.unwrap();
        assert_eq!(by_id.id, by_uuid.id);
        assert_eq!(by_id.download_count, 0);
        assert!(!by_id.is_image);
        assert!(by_id.width.is_none());
        assert!(by_id.thumbnail_path.is_none());
    }

    #[tokio::test]
    async fn test_image_fields_round_trip() {
        let (_dir, db) = setup().await;
        let mut record = new_record("img", "2024-03-01T00:00:00.000000Z");
        record.image = Some(ImageMetadata {
            width: 800,
            height: 600,
            thumbnail_path: "files/2024/03/thumbnails/img_thumb.jpg".to_string(),
        });

        let id = FileRepository::create_file(&db, &record).await.unwrap();
        let stored = FileRepository::get_file(&db, id).await.unwrap();
        assert!(stored.is_image);
        assert_eq!(stored.width, Some(800));
        assert_eq!(stored.height, Some(600));
        assert_eq!(
            stored.thumbnail_path.as_deref(),
            Some("files/2024/03/thumbnails/img_thumb.jpg")
        );
    }

    #[tokio::test]
    async fn test_duplicate_uuid_is_rejected() {
        let (_dir, db) = setup().await;
        let record = new_record("dup", "2024-03-01T00:00:00.000000Z");
        FileRepository::create_file(&db, &record).await.unwrap();

        let err = FileRepository::create_file(&db, &record).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert_eq!(FileRepository::count_files(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_lookups_are_not_found() {
        let (_dir, db) = setup().await;
        assert_eq!(
            FileRepository::get_file(&db, 42).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            FileRepository::get_file_by_uuid(&db, "nope")
                .await
                .unwrap_err()
                .kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn test_increment_download_count() {
        let (_dir, db) = setup().await;
        for n in [1_i64, 5, 100] {
            let uuid = format!("counter-{}", n);
            let id = FileRepository::create_file(&db, &new_record(&uuid, "2024-03-01T00:00:00.000000Z"))
                .await
                .unwrap();
            for _ in 0..n {
                FileRepository::increment_download_count(&db, id).await.unwrap();
            }
            let stored = FileRepository::get_file(&db, id).await.unwrap();
            assert_eq!(stored.download_count, n);
        }
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_pages_partition() {
        let (_dir, db) = setup().await;
        for (i, uuid) in ["r0", "r1", "r2", "r3"].iter().enumerate() {
            let created = format!("2024-03-0{}T00:00:00.000000Z", i + 1);
            FileRepository::create_file(&db, &new_record(uuid, &created))
                .await
                .unwrap();
        }

        let first = FileRepository::list_files(&db, 2, 0).await.unwrap();
        let second = FileRepository::list_files(&db, 2, 2).await.unwrap();
        let uuids: Vec<_> = first.iter().chain(second.iter()).map(|f| f.uuid.as_str()).collect();
        assert_eq!(uuids, vec!["r3", "r2", "r1", "r0"]);
    }

    #[tokio::test]
    async fn test_list_pagination_edges() {
        let (_dir, db) = setup().await;
        FileRepository::create_file(&db, &new_record("only", "2024-03-01T00:00:00.000000Z"))
            .await
            .unwrap();

        assert!(FileRepository::list_files(&db, 0, 0).await.unwrap().is_empty());
        assert!(FileRepository::list_files(&db, -5, 0).await.unwrap().is_empty());
        assert_eq!(FileRepository::list_files(&db, 10, -3).await.unwrap().len(), 1);
        assert!(FileRepository::list_files(&db, 10, 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_an_error() {
        let (_dir, db) = setup().await;
        let id = FileRepository::create_file(&db, &new_record("gone", "2024-03-01T00:00:00.000000Z"))
            .await
            .unwrap();

        assert_eq!(FileRepository::delete_file(&db, id).await.unwrap(), 1);
        assert_eq!(FileRepository::delete_file(&db, id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_alt_text() {
        let (_dir, db) = setup().await;
        let id = FileRepository::create_file(&db, &new_record("alt", "2024-03-01T00:00:00.000000Z"))
            .await
            .unwrap();

        FileRepository::update_alt_text(&db, id, Some("a red bicycle"))
            .await
            .unwrap();
        let stored = FileRepository::get_file(&db, id).await.unwrap();
        assert_eq!(stored.alt_text.as_deref(), Some("a red bicycle"));

        FileRepository::update_alt_text(&db, id, None).await.unwrap();
        assert!(FileRepository::get_file(&db, id).await.unwrap().alt_text.is_none());
    }
}
