use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::error::Result;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(path: &str) -> Result<Self> {
        // Create database URL
        let url = format!("sqlite:{}?mode=rwc", path);

        // Create connection pool
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        Ok(Self { pool })
    }

    /// Get the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        // An image row carries all of width, height and thumbnail_path; a non-image row none of them.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                uuid TEXT NOT NULL,
                original_name TEXT NOT NULL,
                stored_name TEXT NOT NULL,
                path TEXT NOT NULL,
                size INTEGER NOT NULL,
                mime_type TEXT NOT NULL DEFAULT '',
                download_count INTEGER NOT NULL DEFAULT 0 CHECK (download_count >= 0),
                created_at TEXT NOT NULL,
                is_image INTEGER NOT NULL DEFAULT 0,
                width INTEGER,
                height INTEGER,
                thumbnail_path TEXT,
                alt_text TEXT,
                CHECK (
                    (is_image = 1 AND width IS NOT NULL AND height IS NOT NULL AND thumbnail_path IS NOT NULL)
                    OR (is_image = 0 AND width IS NULL AND height IS NULL AND thumbnail_path IS NULL)
                )
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_files_uuid ON files(uuid)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_files_created_at ON files(created_at)")
            .execute(&self.pool)
            .await?;

        tracing::info!("Database migrations completed");
        Ok(())
    }
}
