//! Deleting (or pretending to delete) the files behind stale items.

use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tracing::{error, warn};

use super::model::{ItemKind, MediaItem};

/// Filesystem primitives used by the executor.
#[async_trait]
pub trait Filesystem: Send + Sync {
    async fn is_file(&self, path: &Path) -> bool;
    async fn is_dir(&self, path: &Path) -> bool;
    async fn remove_file(&self, path: &Path) -> io::Result<()>;
    async fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// The real filesystem via `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilesystem;

#[async_trait]
impl Filesystem for LocalFilesystem {
    async fn is_file(&self, path: &Path) -> bool {
        fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
    }

    async fn is_dir(&self, path: &Path) -> bool {
        fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path).await
    }

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path).await
    }
}

#[async_trait]
impl<T: Filesystem + ?Sized> Filesystem for Arc<T> {
    async fn is_file(&self, path: &Path) -> bool {
        (**self).is_file(path).await
    }

    async fn is_dir(&self, path: &Path) -> bool {
        (**self).is_dir(path).await
    }

    async fn remove_file(&self, path: &Path) -> io::Result<()> {
        (**self).remove_file(path).await
    }

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        (**self).remove_dir_all(path).await
    }
}

/// Result of one delete attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Dry run: the path would have been removed.
    WouldDelete { path: String },
    DeletedFile { path: String },
    DeletedDirectory { path: String },
    /// The item has no usable backing path.
    NoPath,
    /// Nothing exists at the path any more.
    NotFound { path: String },
    /// Removal failed; the sweep carries on.
    Failed { path: String, error: String },
}

impl DeleteOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(
            self,
            DeleteOutcome::WouldDelete { .. }
                | DeleteOutcome::DeletedFile { .. }
                | DeleteOutcome::DeletedDirectory { .. }
        )
    }

    /// Number of paths removed (or that would be removed): 0 or 1.
    pub fn paths_affected(&self) -> u64 {
        if self.succeeded() { 1 } else { 0 }
    }
}

/// Removes item paths, or only logs them in dry-run mode.
pub struct DeleteExecutor<F> {
    fs: F,
}

impl<F: Filesystem> DeleteExecutor<F> {
    pub fn new(fs: F) -> Self {
        Self { fs }
    }

    /// Delete the file or directory behind `item`.
    ///
    /// Never returns an error: every failure is logged and reported as a
    /// non-successful outcome so a single bad path cannot stop a sweep.
    pub async fn try_delete(&self, item: &MediaItem, dry_run: bool, reason: &str) -> DeleteOutcome {
        let Some(path) = item.usable_path() else {
            return DeleteOutcome::NoPath;
        };
        let kind: ItemKind = item.kind;

        if dry_run {
            warn!(path = %path, item_type = %kind, reason = %reason, "Dry run: would delete");
            return DeleteOutcome::WouldDelete {
                path: path.to_string(),
            };
        }

        let target = Path::new(path);

        if self.fs.is_file(target).await {
            return match self.fs.remove_file(target).await {
                Ok(()) => {
                    warn!(path = %path, reason = %reason, "Deleted file");
                    DeleteOutcome::DeletedFile {
                        path: path.to_string(),
                    }
                }
                Err(e) => Self::failed(path, kind, e),
            };
        }

        if self.fs.is_dir(target).await {
            return match self.fs.remove_dir_all(target).await {
                Ok(()) => {
                    warn!(path = %path, reason = %reason, "Deleted directory");
                    DeleteOutcome::DeletedDirectory {
                        path: path.to_string(),
                    }
                }
                Err(e) => Self::failed(path, kind, e),
            };
        }

        warn!(path = %path, item_type = %kind, "Path not found; skipping");
        DeleteOutcome::NotFound {
            path: path.to_string(),
        }
    }

    fn failed(path: &str, kind: ItemKind, e: io::Error) -> DeleteOutcome {
        error!(path = %path, item_type = %kind, error = %e, "Failed deleting path");
        DeleteOutcome::Failed {
            path: path.to_string(),
            error: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn item_at(kind: ItemKind, path: Option<String>) -> MediaItem {
        MediaItem {
            id: Uuid::new_v4(),
            kind,
            name: "item".to_string(),
            path,
            date_created: None,
            parent_id: None,
            is_virtual: false,
        }
    }

    #[tokio::test]
    async fn test_missing_path_is_skipped() {
        let executor = DeleteExecutor::new(LocalFilesystem);
        let outcome = executor
            .try_delete(&item_at(ItemKind::Movie, None), false, "test")
            .await;
        assert_eq!(outcome, DeleteOutcome::NoPath);
        assert_eq!(outcome.paths_affected(), 0);

        let outcome = executor
            .try_delete(&item_at(ItemKind::Movie, Some(" ".into())), true, "test")
            .await;
        assert_eq!(outcome, DeleteOutcome::NoPath);
    }

    #[tokio::test]
    async fn test_dry_run_leaves_file_in_place() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("movie.mkv");
        std::fs::write(&file, b"data").unwrap();

        let executor = DeleteExecutor::new(LocalFilesystem);
        let item = item_at(ItemKind::Movie, Some(file.to_string_lossy().to_string()));
        let outcome = executor.try_delete(&item, true, "test").await;

        assert_matches!(outcome, DeleteOutcome::WouldDelete { .. });
        assert!(outcome.succeeded());
        assert_eq!(outcome.paths_affected(), 1);
        assert!(file.exists());
    }

    #[tokio::test]
    async fn test_dry_run_reports_missing_paths_too() {
        let executor = DeleteExecutor::new(LocalFilesystem);
        let item = item_at(ItemKind::Movie, Some("/definitely/not/here.mkv".into()));
        let outcome = executor.try_delete(&item, true, "test").await;
        assert_matches!(outcome, DeleteOutcome::WouldDelete { .. });
    }

    #[tokio::test]
    async fn test_deletes_regular_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("episode.mkv");
        std::fs::write(&file, b"data").unwrap();

        let executor = DeleteExecutor::new(LocalFilesystem);
        let item = item_at(ItemKind::Episode, Some(file.to_string_lossy().to_string()));
        let outcome = executor.try_delete(&item, false, "test").await;

        assert_matches!(outcome, DeleteOutcome::DeletedFile { .. });
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_deletes_directory_recursively() {
        let dir = TempDir::new().unwrap();
        let season = dir.path().join("Season 01");
        std::fs::create_dir_all(season.join("extras")).unwrap();
        std::fs::write(season.join("e01.mkv"), b"1").unwrap();
        std::fs::write(season.join("extras").join("bts.mkv"), b"2").unwrap();

        let executor = DeleteExecutor::new(LocalFilesystem);
        let item = item_at(ItemKind::Season, Some(season.to_string_lossy().to_string()));
        let outcome = executor.try_delete(&item, false, "test").await;

        assert_matches!(outcome, DeleteOutcome::DeletedDirectory { .. });
        assert!(!season.exists());
        assert!(dir.path().exists());
    }

    #[tokio::test]
    async fn test_vanished_path_is_not_found() {
        let dir = TempDir::new().unwrap();
        let gone = dir.path().join("gone.mkv");

        let executor = DeleteExecutor::new(LocalFilesystem);
        let item = item_at(ItemKind::Movie, Some(gone.to_string_lossy().to_string()));
        let outcome = executor.try_delete(&item, false, "test").await;

        assert_matches!(outcome, DeleteOutcome::NotFound { .. });
        assert!(!outcome.succeeded());
    }

    struct BrokenFs {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Filesystem for BrokenFs {
        async fn is_file(&self, _path: &Path) -> bool {
            true
        }

        async fn is_dir(&self, _path: &Path) -> bool {
            false
        }

        async fn remove_file(&self, _path: &Path) -> io::Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }

        async fn remove_dir_all(&self, _path: &Path) -> io::Result<()> {
            unreachable!("not a directory")
        }
    }

    #[tokio::test]
    async fn test_io_failure_is_reported_not_raised() {
        let fs = Arc::new(BrokenFs {
            attempts: AtomicUsize::new(0),
        });
        let executor = DeleteExecutor::new(fs.clone());
        let item = item_at(ItemKind::Movie, Some("/media/locked.mkv".into()));
        let outcome = executor.try_delete(&item, false, "test").await;

        assert_matches!(outcome, DeleteOutcome::Failed { ref path, .. } if path == "/media/locked.mkv");
        assert_eq!(outcome.paths_affected(), 0);
        assert_eq!(fs.attempts.load(Ordering::SeqCst), 1);
    }
}
