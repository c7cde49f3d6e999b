use crate::PersistError;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Replaces `path` with `bytes` via a temp file in the same directory
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let tmp = write_temp(path, bytes)?;
    tmp.persist(path).map_err(|e| PersistError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// Writes `path` only if it does not exist yet
///
/// Returns `Ok(false)` when another writer got there first; the existing
/// content is left untouched.
pub fn write_new_atomic(path: &Path, bytes: &[u8]) -> Result<bool, PersistError> {
    if path.exists() {
        return Ok(false);
    }

    let tmp = write_temp(path, bytes)?;
    match tmp.persist_noclobber(path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(PersistError::Io {
            path: path.to_path_buf(),
            source: e.error,
        }),
    }
}

/// Serializes `value` as pretty JSON and replaces `path` with it
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| PersistError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &bytes)
}

fn write_temp(path: &Path, bytes: &[u8]) -> Result<NamedTempFile, PersistError> {
    let io_err = |source| PersistError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.flush().map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    Ok(tmp)
}
