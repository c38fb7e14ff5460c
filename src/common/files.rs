// src/common/files.rs

use std::path::{Component, Path, PathBuf};

use uuid::Uuid;

use crate::common::error::AppError;

/// Lower-cased extension of a client supplied file name.
pub fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Stored paths are relative and must never climb out of the upload dir.
fn resolve(base: &Path, relative: &str) -> Option<PathBuf> {
    let relative = Path::new(relative);
    let safe = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    safe.then(|| base.join(relative))
}

/// Writes `bytes` under `base/subdir` with a random name and returns the
/// path relative to `base` (always `/`-separated, served under `/uploads`).
pub async fn store_file(
    base: &Path,
    subdir: &str,
    original_name: &str,
    bytes: &[u8],
) -> Result<String, AppError> {
    let file_name = match extension_of(original_name) {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    };

    let dir = base.join(subdir);
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(dir.join(&file_name), bytes).await?;

    Ok(format!("{}/{}", subdir.trim_matches('/'), file_name))
}

/// Best-effort removal; returns how many files were actually deleted.
pub async fn remove_stored_files(base: &Path, paths: &[String]) -> usize {
    let mut removed = 0;
    for relative in paths {
        let Some(path) = resolve(base, relative) else {
            tracing::warn!(path = %relative, "refusing to delete a path outside the upload directory");
            continue;
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %relative, "attachment already missing on disk");
            }
            Err(e) => tracing::error!(path = %relative, error = %e, "failed to delete stored file"),
        }
    }
    removed
}

/// Deletes the files released by a database step, but only once that step
/// has committed; a failed step leaves every file in place.
pub async fn remove_after_commit(base: &Path, committed: Result<Vec<String>, AppError>) -> Result<usize, AppError> {
    let paths = committed?;
    Ok(remove_stored_files(base, &paths).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_lowercased() {
        assert_eq!(extension_of("Report.XLSX").as_deref(), Some("xlsx"));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of("archive.tar.gz").as_deref(), Some("gz"));
    }

    #[test]
    fn resolve_rejects_traversal() {
        let base = Path::new("/srv/uploads");
        assert!(resolve(base, "../etc/passwd").is_none());
        assert!(resolve(base, "/etc/passwd").is_none());
        assert_eq!(resolve(base, "support/a.png"), Some(PathBuf::from("/srv/uploads/support/a.png")));
    }

    #[tokio::test]
    async fn store_then_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let stored = store_file(dir.path(), "support", "shot.PNG", b"png").await.unwrap();
        assert!(stored.starts_with("support/") && stored.ends_with(".png"));
        assert!(dir.path().join(&stored).exists());

        let removed = remove_stored_files(dir.path(), &[stored.clone(), "support/missing.png".into()]).await;
        assert_eq!(removed, 1);
        assert!(!dir.path().join(&stored).exists());
    }

    #[tokio::test]
    async fn files_survive_a_failed_transaction() {
        let dir = tempfile::tempdir().unwrap();
        let stored = store_file(dir.path(), "support", "log.txt", b"x").await.unwrap();

        let failed: Result<Vec<String>, AppError> = Err(AppError::NotFound("Ticket"));
        assert!(remove_after_commit(dir.path(), failed).await.is_err());
        assert!(dir.path().join(&stored).exists());

        let removed = remove_after_commit(dir.path(), Ok(vec![stored.clone()])).await.unwrap();
        assert_eq!(removed, 1);
        assert!(!dir.path().join(&stored).exists());
    }
}
