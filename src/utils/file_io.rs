use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;
use tokio::fs::OpenOptions;
use tracing::debug;

use crate::Error;
use crate::Result;

pub(crate) async fn create_dir_if_not_exist(path: &Path) -> Result<()> {
    fs::create_dir_all(path).await.map_err(|source| Error::PathError {
        path: path.to_path_buf(),
        source,
    })
}

/// Creates an empty file, succeeding when it already exists.
pub(crate) async fn touch(path: &Path) -> Result<()> {
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .await
        .map_err(|source| Error::PathError {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(())
}

/// Replaces `path` with `bytes` through a temp file and rename, so readers in
/// other processes never observe a partially written file.
pub(crate) async fn write_atomically(
    path: &Path,
    bytes: &[u8],
) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, nanoid::nanoid!(8)));

    fs::write(&tmp, bytes).await.map_err(|source| Error::PathError {
        path: tmp.clone(),
        source,
    })?;
    if let Err(source) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(Error::PathError {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

/// Reads a file, mapping "not found" to `None`.
pub(crate) async fn read_if_exists(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(Error::PathError {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Recursively deletes a directory; a missing directory is not an error.
pub(crate) async fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => {
            debug!("removed directory {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(source) => Err(Error::PathError {
            path: path.to_path_buf(),
            source,
        }),
    }
}
