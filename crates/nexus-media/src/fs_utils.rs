//! Filesystem helpers for publishing render outputs.
//!
//! Final artifacts are written to a sibling `.partial` path first and only
//! moved onto their canonical name once the encode succeeded, so a reader
//! never sees a half-written video under the final name.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

const PARTIAL_SUFFIX: &str = "partial";

/// Sibling path used while `dst` is being written.
pub fn partial_path(dst: &Path) -> PathBuf {
    let mut name = dst.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    dst.with_file_name(name)
}

/// Move a file into place, falling back to copy+delete across filesystems.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    ensure_parent(dst).await?;

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            debug!(
                "Cross-device rename, copying instead: {} -> {}",
                src.display(),
                dst.display()
            );
            fs::copy(src, dst).await?;
            if let Err(e) = fs::remove_file(src).await {
                warn!("Failed to remove {} after copy: {}", src.display(), e);
            }
            Ok(())
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// Promote a finished `.partial` file to its canonical path.
pub async fn commit_partial(dst: &Path) -> MediaResult<()> {
    let partial = partial_path(dst);
    if !partial.exists() {
        return Err(MediaError::encode_failed(
            format!("Encoder produced no output at {}", partial.display()),
            None,
            None,
        ));
    }
    move_file(&partial, dst).await
}

/// Remove a file if present. Missing files are not an error.
pub async fn remove_if_exists(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Create the parent directory of `path` if needed.
pub async fn ensure_parent(path: &Path) -> MediaResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }
    Ok(())
}

fn is_cross_device_error(e: &std::io::Error) -> bool {
    // EXDEV
    e.raw_os_error() == Some(18)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/out/final.mp4")),
            PathBuf::from("/out/final.mp4.partial")
        );
    }

    #[tokio::test]
    async fn test_commit_partial_moves_into_place() {
        let dir = TempDir::new().unwrap();
        let dst = dir.path().join("nested").join("final.mp4");
        ensure_parent(&dst).await.unwrap();
        fs::write(partial_path(&dst), b"video").await.unwrap();

        commit_partial(&dst).await.unwrap();

        assert!(dst.exists());
        assert!(!partial_path(&dst).exists());
        assert_eq!(fs::read(&dst).await.unwrap(), b"video");
    }

    #[tokio::test]
    async fn test_commit_without_partial_is_encode_error() {
        let dir = TempDir::new().unwrap();
        let err = commit_partial(&dir.path().join("final.mp4")).await.unwrap_err();
        assert!(matches!(err, MediaError::EncodeFailed { .. }));
    }

    #[tokio::test]
    async fn test_remove_if_exists_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.mp4");
        remove_if_exists(&path).await;
        fs::write(&path, b"x").await.unwrap();
        remove_if_exists(&path).await;
        assert!(!path.exists());
    }

    #[test]
    fn test_is_cross_device_error() {
        assert!(is_cross_device_error(&std::io::Error::from_raw_os_error(18)));
        assert!(!is_cross_device_error(&std::io::Error::from_raw_os_error(2)));
    }
}
