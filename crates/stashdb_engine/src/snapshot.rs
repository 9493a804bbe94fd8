//! Snapshot persistence for directory-backed engines.
//!
//! Each database is persisted as a single CBOR snapshot file inside the
//! engine directory:
//!
//! ```text
//! <engine_dir>/
//! ├─ LOCK               # Advisory lock for single-process access
//! ├─ <name>.stash       # One snapshot per database
//! └─ <name>.stash.tmp   # Temporary file for atomic writes
//! ```
//!
//! Snapshots are written to the temporary file and renamed into place so a
//! crash mid-write never corrupts the previous snapshot. Index entries are
//! not persisted; they are rebuilt from the records on load.

use crate::database::DatabaseInner;
use crate::error::{EngineError, EngineResult};
use crate::store::ObjectStore;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SNAPSHOT_SUFFIX: &str = ".stash";
const TEMP_SUFFIX: &str = ".stash.tmp";

/// On-disk form of one database.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    name: String,
    version: u32,
    stores: Vec<ObjectStore>,
}

/// Maps a database name to a safe file stem.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn snapshot_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}{SNAPSHOT_SUFFIX}", file_stem(name)))
}

fn temp_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}{TEMP_SUFFIX}", file_stem(name)))
}

/// Writes the database's snapshot atomically.
pub(crate) fn save(dir: &Path, db: &DatabaseInner) -> EngineResult<()> {
    let (name, version, stores) = db.snapshot_parts();
    let snapshot = Snapshot {
        name,
        version,
        stores,
    };

    let temp = temp_path(dir, &snapshot.name);
    let mut file = File::create(&temp)?;
    ciborium::into_writer(&snapshot, &mut file)
        .map_err(|error| EngineError::snapshot(error.to_string()))?;
    file.sync_all()?;
    fs::rename(&temp, snapshot_path(dir, &snapshot.name))?;

    tracing::trace!(database = %snapshot.name, "snapshot written");
    Ok(())
}

/// Loads a database from its snapshot, if one exists.
pub(crate) fn load(dir: &Path, name: &str) -> EngineResult<Option<Arc<DatabaseInner>>> {
    let path = snapshot_path(dir, name);
    if !path.exists() {
        return Ok(None);
    }

    let file = File::open(&path)?;
    let mut snapshot: Snapshot = ciborium::from_reader(file)
        .map_err(|error| EngineError::snapshot(error.to_string()))?;
    for store in &mut snapshot.stores {
        store.rebuild_indices();
    }

    Ok(Some(DatabaseInner::from_parts(
        snapshot.name,
        snapshot.version,
        snapshot.stores,
        Some(dir.to_path_buf()),
    )))
}
