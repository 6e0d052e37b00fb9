// src/output/writer.rs
//! The only place export output touches the filesystem.
//!
//! Every write observes the run's cancellation token, so a cancelled export
//! stops at the next file boundary.

use crate::error::AppError;
use std::path::Path;
use tokio::fs;
use tokio_util::sync::CancellationToken;

/// Writes `content` to `path`, creating parent directories as needed.
/// Returns the number of bytes written.
pub async fn write_file(
    path: &Path,
    content: impl AsRef<[u8]>,
    cancel: &CancellationToken,
) -> Result<usize, AppError> {
    let content = content.as_ref();
    log::debug!("Writing {} bytes to {}", content.len(), path.display());

    if cancel.is_cancelled() {
        return Err(AppError::Cancelled);
    }

    let write = async {
        if let Some(parent) = path.parent() {
            create_directory(parent).await?;
        }
        fs::write(path, content)
            .await
            .map_err(|source| AppError::OutputWrite {
                path: path.to_path_buf(),
                source,
            })
    };

    tokio::select! {
        _ = cancel.cancelled() => Err(AppError::Cancelled),
        result = write => {
            result?;
            log::info!("Wrote file: {}", path.display());
            Ok(content.len())
        }
    }
}

/// Creates a directory and its parents. An existing directory is fine; an
/// existing file at that path is an error.
pub async fn create_directory(path: &Path) -> Result<(), AppError> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => return Ok(()),
        Ok(_) => {
            return Err(AppError::OutputWrite {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "path exists but is not a directory",
                ),
            })
        }
        Err(_) => {}
    }

    fs::create_dir_all(path)
        .await
        .map_err(|source| AppError::OutputWrite {
            path: path.to_path_buf(),
            source,
        })?;
    log::debug!("Created directory: {}", path.display());
    Ok(())
}
