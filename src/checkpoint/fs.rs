use super::atomic::write_new_atomic;
use super::traits::{CheckpointStore, Stage, StageKey};
use crate::PersistError;
use std::path::{Path, PathBuf};

/// Checkpoint store backed by one JSON file per completed key
///
/// Layout: `<root>/<stage>/<encoded key>.json`. Keys are percent-encoded so
/// any key maps to exactly one flat file name.
#[derive(Debug, Clone)]
pub struct FsCheckpointStore {
    root: PathBuf,
}

impl FsCheckpointStore {
    /// Opens the store, creating the stage directories if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PersistError> {
        let root = root.into();
        for stage in Stage::ALL {
            let dir = root.join(stage.dir_name());
            std::fs::create_dir_all(&dir).map_err(|source| PersistError::Io { path: dir, source })?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File holding the checkpoint for `key`
    pub fn path_for(&self, key: &StageKey) -> PathBuf {
        self.root
            .join(key.stage.dir_name())
            .join(format!("{}.json", encode_key(&key.key)))
    }
}

impl CheckpointStore for FsCheckpointStore {
    fn is_complete(&self, key: &StageKey) -> bool {
        self.path_for(key).is_file()
    }

    fn mark_complete_bytes(&self, key: &StageKey, payload: &[u8]) -> Result<bool, PersistError> {
        let path = self.path_for(key);
        let written = write_new_atomic(&path, payload)?;
        if written {
            tracing::debug!(checkpoint = %key, "Checkpoint written");
        } else {
            tracing::debug!(checkpoint = %key, "Checkpoint already present");
        }
        Ok(written)
    }

    fn load_bytes(&self, key: &StageKey) -> Result<Option<Vec<u8>>, PersistError> {
        let path = self.path_for(key);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistError::Io { path, source }),
        }
    }

    fn completed_keys(&self, stage: Stage) -> Result<Vec<String>, PersistError> {
        let dir = self.root.join(stage.dir_name());
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(PersistError::Io { path: dir, source }),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PersistError::Io {
                path: dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            // Temp files from in-progress writes have no .json suffix
            if let Some(stem) = name.strip_suffix(".json") {
                if let Some(key) = decode_key(stem) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Encodes a key as a flat file name
///
/// ASCII letters, digits, `-` and `_` are kept; every other byte becomes `%XX`.
pub fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

/// Reverses [`encode_key`]; returns `None` for names it could not have produced
pub fn decode_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = name.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
