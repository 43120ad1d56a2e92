//! File-snapshot store: a `MemoryStore` loaded from and flushed to one JSON
//! file.
//!
//! Lifecycle is open-at-startup / flush-at-shutdown. The snapshot is replaced
//! atomically (write to a sibling temp file, then rename), so a crash mid-
//! flush leaves the previous snapshot intact.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

use super::{Entity, MemoryStore, Store};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    patterns: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    profiles: BTreeMap<String, serde_json::Value>,
}

/// JSON-file backed store.
pub struct JsonStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonStore {
    /// Open a store, loading the snapshot at `path` when it exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EngineError> {
        let path = path.as_ref().to_path_buf();
        let inner = MemoryStore::new();

        if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| EngineError::Persistence(format!("reading {}: {e}", path.display())))?;
            let snapshot: Snapshot = serde_json::from_str(&content).map_err(|e| {
                EngineError::Persistence(format!("decoding {}: {e}", path.display()))
            })?;

            for (entity, entries) in [
                (Entity::Patterns, snapshot.patterns),
                (Entity::Profiles, snapshot.profiles),
            ] {
                for (key, value) in entries {
                    let bytes = serde_json::to_vec(&value).map_err(|e| {
                        EngineError::Persistence(format!("re-encoding {key}: {e}"))
                    })?;
                    inner.insert_raw(entity, key, bytes);
                }
            }
            log::debug!(
                "opened store {} ({} patterns, {} profiles)",
                path.display(),
                inner.len(Entity::Patterns),
                inner.len(Entity::Profiles)
            );
        } else {
            log::debug!("opened fresh store at {}", path.display());
        }

        Ok(Self { path, inner })
    }

    fn build_snapshot(&self) -> Result<Snapshot, EngineError> {
        let mut snapshot = Snapshot::default();
        for (entity, target) in [
            (Entity::Patterns, &mut snapshot.patterns),
            (Entity::Profiles, &mut snapshot.profiles),
        ] {
            for (key, bytes) in self.inner.snapshot(entity) {
                let value: serde_json::Value = serde_json::from_slice(&bytes)
                    .map_err(|e| EngineError::Persistence(format!("decoding {key}: {e}")))?;
                target.insert(key, value);
            }
        }
        Ok(snapshot)
    }
}

impl Store for JsonStore {
    fn get(&self, entity: Entity, key: &str) -> Result<Option<Vec<u8>>, EngineError> {
        self.inner.get(entity, key)
    }

    fn upsert(
        &self,
        entity: Entity,
        key: &str,
        mutator: &mut dyn FnMut(Option<&[u8]>) -> Result<Vec<u8>, EngineError>,
    ) -> Result<Vec<u8>, EngineError> {
        self.inner.upsert(entity, key, mutator)
    }

    fn scan(&self, entity: Entity, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, EngineError> {
        self.inner.scan(entity, prefix)
    }

    fn flush(&self) -> Result<(), EngineError> {
        let snapshot = self.build_snapshot()?;
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| EngineError::Persistence(format!("encoding snapshot: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .map_err(|e| EngineError::Persistence(format!("writing {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            EngineError::Persistence(format!("replacing {}: {e}", self.path.display()))
        })?;

        log::debug!("flushed store to {}", self.path.display());
        Ok(())
    }
}

impl Drop for JsonStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::warn!("store flush on drop failed: {e}");
        }
    }
}
