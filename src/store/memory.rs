//! In-memory store with per-key atomic upserts.

use dashmap::DashMap;

use crate::error::EngineError;

use super::{Entity, Store};

/// Process-local store backed by sharded concurrent maps.
///
/// The dashmap entry API holds the key's shard lock for the duration of the
/// mutator, which gives the single-writer-per-key discipline the learning
/// engine needs; disjoint keys in different shards proceed concurrently.
#[derive(Default)]
pub struct MemoryStore {
    patterns: DashMap<String, Vec<u8>>,
    profiles: DashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, entity: Entity) -> &DashMap<String, Vec<u8>> {
        match entity {
            Entity::Patterns => &self.patterns,
            Entity::Profiles => &self.profiles,
        }
    }

    /// Number of entries in a namespace.
    pub fn len(&self, entity: Entity) -> usize {
        self.map(entity).len()
    }

    pub fn is_empty(&self, entity: Entity) -> bool {
        self.map(entity).is_empty()
    }

    pub(super) fn insert_raw(&self, entity: Entity, key: String, value: Vec<u8>) {
        self.map(entity).insert(key, value);
    }

    pub(super) fn snapshot(&self, entity: Entity) -> Vec<(String, Vec<u8>)> {
        let mut entries: Vec<_> = self
            .map(entity)
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl Store for MemoryStore {
    fn get(&self, entity: Entity, key: &str) -> Result<Option<Vec<u8>>, EngineError> {
        Ok(self.map(entity).get(key).map(|v| v.clone()))
    }

    fn upsert(
        &self,
        entity: Entity,
        key: &str,
        mutator: &mut dyn FnMut(Option<&[u8]>) -> Result<Vec<u8>, EngineError>,
    ) -> Result<Vec<u8>, EngineError> {
        use dashmap::mapref::entry::Entry;

        // A mutator error leaves the entry untouched.
        let replacement = match self.map(entity).entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let next = mutator(Some(occupied.get().as_slice()))?;
                occupied.insert(next.clone());
                next
            }
            Entry::Vacant(vacant) => {
                let next = mutator(None)?;
                vacant.insert(next.clone());
                next
            }
        };
        Ok(replacement)
    }

    fn scan(&self, entity: Entity, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, EngineError> {
        let mut entries: Vec<_> = self
            .map(entity)
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    fn flush(&self) -> Result<(), EngineError> {
        Ok(())
    }
}
