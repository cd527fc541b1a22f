//! Upload directory holding the most recent batch's raw files.
//!
//! The directory is a scratch area, not an archive: every ingestion and
//! every explicit clear empties it first. Clearing is best effort with a
//! bounded retry and reports failure as a [`ClearOutcome`] value so a failed
//! cleanup never aborts the request that triggered it.

use std::io;
use std::path::{Path, PathBuf};

use crate::retry::{retry, RetryOutcome, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared { attempts: u32 },
    Failed { attempts: u32, error: String },
}

impl ClearOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ClearOutcome::Cleared { .. })
    }
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await
    }

    /// Write `bytes` under `filename`, which must already be a bare file name.
    pub async fn save(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        self.ensure_dir().await?;
        let path = self.dir.join(filename);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Remove every entry in the directory, then recreate it.
    pub async fn clear(&self, policy: RetryPolicy) -> ClearOutcome {
        let dir = self.dir.as_path();
        let outcome = retry(policy, |_| async move {
            remove_entries(dir).await?;
            tokio::fs::create_dir_all(dir).await
        })
        .await;

        match outcome {
            RetryOutcome::Succeeded { attempts, .. } => ClearOutcome::Cleared { attempts },
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => {
                tracing::error!(
                    dir = %self.dir.display(),
                    attempts,
                    error = %last_error,
                    "failed to clear upload directory"
                );
                ClearOutcome::Failed {
                    attempts,
                    error: last_error.to_string(),
                }
            }
        }
    }

    /// True when the directory is missing or has no entries.
    pub async fn is_empty(&self) -> io::Result<bool> {
        match tokio::fs::read_dir(&self.dir).await {
            Ok(mut entries) => Ok(entries.next_entry().await?.is_none()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e),
        }
    }
}

/// Delete every entry, continuing past individual failures; the first
/// failure is returned once all entries have been tried.
async fn remove_entries(dir: &Path) -> io::Result<()> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let mut first_error = None;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let result = match entry.file_type().await {
            Ok(ft) if ft.is_dir() => tokio::fs::remove_dir_all(&path).await,
            Ok(_) => tokio::fs::remove_file(&path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::warn!(path = %path.display(), error = %e, "failed to delete upload");
            first_error.get_or_insert(io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ));
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_save_then_clear() {
        let tmp = TempDir::new().unwrap();
        let store = UploadStore::new(tmp.path().join("uploads"));

        let path = store.save("a.pdf", b"%PDF").await.unwrap();
        assert!(path.exists());
        tokio::fs::create_dir_all(store.dir().join("nested/deeper"))
            .await
            .unwrap();
        assert!(!store.is_empty().await.unwrap());

        let outcome = store.clear(fast_policy()).await;
        assert_eq!(outcome, ClearOutcome::Cleared { attempts: 1 });
        assert!(store.dir().is_dir());
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_missing_dir_recreates_it() {
        let tmp = TempDir::new().unwrap();
        let store = UploadStore::new(tmp.path().join("never-created"));
        assert!(store.is_empty().await.unwrap());
        assert!(store.clear(fast_policy()).await.is_success());
        assert!(store.dir().is_dir());
    }

    #[tokio::test]
    async fn test_clear_failure_is_reported_not_raised() {
        let tmp = TempDir::new().unwrap();
        // A regular file where the directory should be: create_dir_all keeps failing.
        let blocker = tmp.path().join("uploads");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let store = UploadStore::new(&blocker);

        match store.clear(fast_policy()).await {
            ClearOutcome::Failed { attempts, error } => {
                assert_eq!(attempts, 3);
                assert!(!error.is_empty());
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
