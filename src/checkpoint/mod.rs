//! Durable record of which units of work are finished
//!
//! A checkpoint for a key is written only after the data for that key has
//! been persisted, and every write is a temp-file-then-rename so a crash can
//! never leave a half-written checkpoint behind.

mod atomic;
mod fs;
mod traits;

pub use atomic::{write_atomic, write_json_atomic, write_new_atomic};
pub use fs::{decode_key, encode_key, FsCheckpointStore};
pub use traits::{CheckpointStore, CheckpointStoreExt, Stage, StageKey};
