//! Request-scoped compensation log.
//!
//! Handlers that write ahead of later, fallible steps push an undo action onto
//! the request's [`RollbackLog`]. When the response is a failure the middleware
//! in [`crate::middleware::rollback`] unwinds the log newest-first. On success
//! only the staged upload files are removed and every other entry is dropped.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use sea_orm::{ConnectionTrait, DbErr, EntityTrait};
use uuid::Uuid;

use crate::{
    entity::{Brands, Categories, Products, SubCategories},
    storage::{AssetStore, StorageError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Category,
    SubCategory,
    Brand,
    Product,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    DeleteRecord { kind: RecordKind, id: Uuid },
    DeleteFolder(String),
    DeleteStagedFile(PathBuf),
}

#[derive(Debug, thiserror::Error)]
enum CompensationError {
    #[error(transparent)]
    Db(#[from] DbErr),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Default)]
pub struct RollbackLog {
    entries: Arc<Mutex<Vec<Compensation>>>,
}

impl RollbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Compensation>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, compensation: Compensation) {
        self.lock().push(compensation);
    }

    pub fn delete_record(&self, kind: RecordKind, id: Uuid) {
        self.push(Compensation::DeleteRecord { kind, id });
    }

    pub fn delete_folder(&self, folder: impl Into<String>) {
        self.push(Compensation::DeleteFolder(folder.into()));
    }

    pub fn delete_staged_file(&self, path: impl Into<PathBuf>) {
        self.push(Compensation::DeleteStagedFile(path.into()));
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Settle a successful request: staged uploads are removed, every other
    /// compensation is dropped. Returns the number of files that could not be
    /// removed.
    pub async fn settle(&self) -> usize {
        let mut failed = 0;
        for compensation in self.take() {
            if let Compensation::DeleteStagedFile(path) = &compensation {
                if let Err(err) = remove_staged_file(path).await {
                    failed += 1;
                    tracing::warn!(?compensation, error = %err, "staged file left behind");
                }
            }
        }
        failed
    }

    fn take(&self) -> Vec<Compensation> {
        std::mem::take(&mut *self.lock())
    }

    /// Run pending compensations newest-first. Each failure is logged and the
    /// rest still run. Returns the number that failed.
    pub async fn unwind<C>(&self, db: &C, assets: &dyn AssetStore) -> usize
    where
        C: ConnectionTrait,
    {
        let mut failed = 0;
        for compensation in self.take().into_iter().rev() {
            match run(&compensation, db, assets).await {
                Ok(()) => tracing::debug!(?compensation, "compensation applied"),
                Err(err) => {
                    failed += 1;
                    tracing::warn!(?compensation, error = %err, "compensation failed");
                }
            }
        }
        failed
    }
}

async fn run<C>(
    compensation: &Compensation,
    db: &C,
    assets: &dyn AssetStore,
) -> Result<(), CompensationError>
where
    C: ConnectionTrait,
{
    match compensation {
        Compensation::DeleteRecord { kind, id } => {
            let id = *id;
            match kind {
                RecordKind::Category => Categories::delete_by_id(id).exec(db).await?,
                RecordKind::SubCategory => SubCategories::delete_by_id(id).exec(db).await?,
                RecordKind::Brand => Brands::delete_by_id(id).exec(db).await?,
                RecordKind::Product => Products::delete_by_id(id).exec(db).await?,
            };
        }
        Compensation::DeleteFolder(folder) => assets.delete_folder(folder).await?,
        Compensation::DeleteStagedFile(path) => remove_staged_file(path).await?,
    }
    Ok(())
}

async fn remove_staged_file(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use async_trait::async_trait;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Transaction};

    use super::*;
    use crate::storage::StoredAsset;

    #[derive(Default)]
    struct RecordingStore {
        deleted: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl AssetStore for RecordingStore {
        async fn upload(
            &self,
            _source: &Path,
            folder: &str,
            _public_id: Option<&str>,
        ) -> Result<StoredAsset, StorageError> {
            Ok(StoredAsset {
                secure_url: format!("mem://{folder}/x"),
                public_id: format!("{folder}/x"),
            })
        }

        async fn delete_folder(&self, folder: &str) -> Result<(), StorageError> {
            if self.fail {
                return Err(StorageError::InvalidPath(folder.to_string()));
            }
            self.deleted.lock().unwrap().push(folder.to_string());
            Ok(())
        }
    }

    fn one_row() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    #[tokio::test]
    async fn unwinds_newest_first() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([one_row(), one_row()])
            .into_connection();
        let store = RecordingStore::default();
        let category = Uuid::new_v4();
        let brand = Uuid::new_v4();

        let log = RollbackLog::new();
        log.delete_record(RecordKind::Category, category);
        log.delete_folder("ecommerce/Categories/a1b2");
        log.delete_record(RecordKind::Brand, brand);

        let failed = log.unwind(&db, &store).await;
        assert_eq!(failed, 0);
        assert!(log.is_empty());
        assert_eq!(
            *store.deleted.lock().unwrap(),
            vec!["ecommerce/Categories/a1b2".to_string()]
        );

        assert_eq!(
            db.into_transaction_log(),
            vec![
                Transaction::from_sql_and_values(
                    DatabaseBackend::Postgres,
                    r#"DELETE FROM "brands" WHERE "brands"."id" = $1"#,
                    [brand.into()],
                ),
                Transaction::from_sql_and_values(
                    DatabaseBackend::Postgres,
                    r#"DELETE FROM "categories" WHERE "categories"."id" = $1"#,
                    [category.into()],
                ),
            ]
        );
    }

    #[tokio::test]
    async fn failed_compensation_does_not_stop_the_rest() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([one_row()])
            .into_connection();
        let store = RecordingStore {
            fail: true,
            ..Default::default()
        };
        let product = Uuid::new_v4();

        let log = RollbackLog::new();
        log.delete_record(RecordKind::Product, product);
        log.delete_folder("ecommerce/Categories/zz99");

        let failed = log.unwind(&db, &store).await;
        assert_eq!(failed, 1);
        assert_eq!(db.into_transaction_log().len(), 1);
    }

    #[tokio::test]
    async fn staged_files_are_removed() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("abc123_photo.png");
        tokio::fs::write(&staged, b"bytes").await.unwrap();

        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let log = RollbackLog::new();
        log.delete_staged_file(&staged);
        log.delete_staged_file(dir.path().join("already-gone.png"));

        let failed = log.unwind(&db, &RecordingStore::default()).await;
        assert_eq!(failed, 0);
        assert!(!staged.exists());
    }

    #[tokio::test]
    async fn settle_removes_staged_files_only() {
        let dir = tempfile::tempdir().unwrap();
        let staged = dir.path().join("f00d_cover.png");
        tokio::fs::write(&staged, b"bytes").await.unwrap();

        let log = RollbackLog::new();
        log.delete_staged_file(&staged);
        log.delete_record(RecordKind::Category, Uuid::new_v4());
        log.delete_folder("ecommerce/Categories/a1b2");
        assert_eq!(log.len(), 3);

        assert_eq!(log.settle().await, 0);
        assert!(log.is_empty());
        assert!(!staged.exists());
    }
}
