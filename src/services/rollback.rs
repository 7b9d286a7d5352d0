//! Ordered compensating actions for a multi-step upload.
//!
//! The filesystem and the metadata store share no transaction, so each step
//! that creates something registers how to undo it. On failure the actions
//! run newest first; on success the list is discarded.

use std::path::PathBuf;

use crate::db::Database;
use crate::services::FileRepository;
use crate::storage::LocalStorage;

#[derive(Debug)]
enum Compensation {
    RemoveFile(PathBuf),
    DeleteRecord(i64),
}

pub struct Rollback<'a> {
    db: &'a Database,
    storage: &'a LocalStorage,
    actions: Vec<Compensation>,
}

impl<'a> Rollback<'a> {
    pub fn new(db: &'a Database, storage: &'a LocalStorage) -> Self {
        Self {
            db,
            storage,
            actions: Vec::new(),
        }
    }

    /// Register a file to delete if a later step fails.
    pub fn remove_file(&mut self, path: PathBuf) {
        self.actions.push(Compensation::RemoveFile(path));
    }

    /// Register a metadata row to delete if a later step fails.
    pub fn delete_record(&mut self, id: i64) {
        self.actions.push(Compensation::DeleteRecord(id));
    }

    /// Number of pending undo steps.
    pub(crate) fn len(&self) -> usize {
        self.actions.len()
    }

    /// Keep everything that was created.
    pub fn commit(mut self) {
        self.actions.clear();
    }

    /// Undo every registered step, newest first. Failures are logged and
    /// the remaining actions still run.
    pub async fn unwind(mut self) {
        while let Some(action) = self.actions.pop() {
            match &action {
                Compensation::RemoveFile(path) => {
                    if let Err(e) = self.storage.remove(path).await {
                        tracing::warn!("Rollback could not remove {:?}: {}", path, e);
                    } else {
                        tracing::debug!("Rollback removed {:?}", path);
                    }
                }
                Compensation::DeleteRecord(id) => {
                    if let Err(e) = FileRepository::delete_file(self.db, *id).await {
                        tracing::warn!("Rollback could not delete file record {}: {}", id, e);
                    } else {
                        tracing::debug!("Rollback deleted file record {}", id);
                    }
                }
            }
        }
    }
}

impl Drop for Rollback<'_> {
    // Reached with pending actions only when the owning future is dropped
    // mid-upload. Files can still be removed synchronously; rows cannot.
    fn drop(&mut self) {
        for action in self.actions.drain(..).rev() {
            match action {
                Compensation::RemoveFile(path) => match std::fs::remove_file(&path) {
                    Ok(()) => tracing::debug!("Rollback removed {:?} on cancel", path),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => tracing::warn!("Rollback could not remove {:?} on cancel: {}", path, e),
                },
                Compensation::DeleteRecord(id) => {
                    tracing::warn!("Upload cancelled after file record {} was written; row left in place", id);
                }
            }
        }
    }
}
