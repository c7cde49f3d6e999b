use crate::PersistError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// The unit-of-work levels that are checkpointed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Bootstrap: the region list read from the directory root
    Regions,
    /// One record per region listing its sub-regions
    SubRegions,
    /// One record per sub-region listing its store pages
    StoreLinks,
    /// One resolved store per store page
    Stores,
    /// One catalog per store
    Menus,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Regions,
        Stage::SubRegions,
        Stage::StoreLinks,
        Stage::Stores,
        Stage::Menus,
    ];

    /// Directory name under the checkpoint root
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Regions => "regions",
            Self::SubRegions => "sub-regions",
            Self::StoreLinks => "store-links",
            Self::Stores => "stores",
            Self::Menus => "menus",
        }
    }

    pub fn from_dir_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|stage| stage.dir_name() == s)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Names one unit of work: a stage plus a key unique within it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StageKey {
    pub stage: Stage,
    pub key: String,
}

impl StageKey {
    pub fn new(stage: Stage, key: impl Into<String>) -> Self {
        Self {
            stage,
            key: key.into(),
        }
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stage, self.key)
    }
}

/// Persistent record of completed units of work
///
/// Implementations must make `mark_complete_bytes` atomic and idempotent:
/// a reader sees either no checkpoint or the whole payload, and marking an
/// already complete key leaves the first payload in place.
pub trait CheckpointStore: Send + Sync {
    /// True once the key's checkpoint has been durably written
    fn is_complete(&self, key: &StageKey) -> bool;

    /// Writes the checkpoint payload; returns false if it already existed
    fn mark_complete_bytes(&self, key: &StageKey, payload: &[u8]) -> Result<bool, PersistError>;

    /// Reads the payload of a completed key
    fn load_bytes(&self, key: &StageKey) -> Result<Option<Vec<u8>>, PersistError>;

    /// Keys of every completed unit in a stage, sorted
    fn completed_keys(&self, stage: Stage) -> Result<Vec<String>, PersistError>;
}

/// Typed access on top of any [`CheckpointStore`]
pub trait CheckpointStoreExt: CheckpointStore {
    fn mark_complete<T: Serialize + ?Sized>(
        &self,
        key: &StageKey,
        value: &T,
    ) -> Result<bool, PersistError> {
        let payload = serde_json::to_vec_pretty(value).map_err(|source| {
            PersistError::Serialization {
                path: PathBuf::from(key.to_string()),
                source,
            }
        })?;
        self.mark_complete_bytes(key, &payload)
    }

    fn load<T: DeserializeOwned>(&self, key: &StageKey) -> Result<Option<T>, PersistError> {
        let Some(bytes) = self.load_bytes(key)? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| PersistError::Serialization {
                path: PathBuf::from(key.to_string()),
                source,
            })
    }

    /// Every completed payload of a stage, in key order
    fn load_stage<T: DeserializeOwned>(&self, stage: Stage) -> Result<Vec<(String, T)>, PersistError> {
        let mut out = Vec::new();
        for key in self.completed_keys(stage)? {
            let stage_key = StageKey::new(stage, key);
            if let Some(value) = self.load(&stage_key)? {
                out.push((stage_key.key, value));
            }
        }
        Ok(out)
    }
}

impl<S: CheckpointStore + ?Sized> CheckpointStoreExt for S {}
