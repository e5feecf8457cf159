use std::fs::create_dir_all;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::error;

use crate::utils::time::system_time_millis;
use crate::Result;
use crate::StorageError;

pub fn create_parent_dir_if_not_exist(path: &Path) -> Result<()> {
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.exists() {
            if let Err(e) = create_dir_all(parent_dir) {
                error!("Failed to create directory {:?}: {:?}", parent_dir, e);
                return Err(StorageError::PathError {
                    path: parent_dir.to_path_buf(),
                    source: e,
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Reads the whole file, `None` when it does not exist
pub fn read_if_exists(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::PathError {
            path: path.to_path_buf(),
            source: e,
        }
        .into()),
    }
}

/// Writes through a sibling temp file and renames it over `path`, so readers
/// never observe a half-written file.
pub fn write_atomically(
    path: &Path,
    content: &str,
) -> Result<()> {
    create_parent_dir_if_not_exist(path)?;
    let tmp = tmp_path(path);
    std::fs::write(&tmp, content).map_err(|e| StorageError::PathError {
        path: tmp.clone(),
        source: e,
    })?;
    std::fs::rename(&tmp, path).map_err(|e| StorageError::PathError {
        path: path.to_path_buf(),
        source: e,
    })?;
    debug!("wrote {} bytes into {:?}", content.len(), path);
    Ok(())
}

/// Removes the file; a missing file is not an error
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::PathError {
            path: path.to_path_buf(),
            source: e,
        }
        .into()),
    }
}

/// Last modification time in milliseconds, `None` when the file does not exist
pub fn modified_millis(path: &Path) -> Result<Option<i64>> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => {
            let modified = meta.modified().map_err(StorageError::IoError)?;
            Ok(Some(system_time_millis(modified)))
        }
        Ok(_) => Ok(None),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::PathError {
            path: path.to_path_buf(),
            source: e,
        }
        .into()),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
