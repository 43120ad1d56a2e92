//! Persistence collaborator contract.
//!
//! The core treats storage as an atomic per-key read-modify-write map plus
//! prefix scans. Any store offering atomic per-key upsert satisfies the
//! contract; no storage technology is assumed. Two implementations ship with
//! the crate: `MemoryStore` (process-local) and `JsonStore` (file snapshot
//! with an open-at-startup / flush-at-shutdown lifecycle).

mod json;
mod memory;

pub use json::JsonStore;
pub use memory::MemoryStore;

use crate::error::EngineError;

/// Storage namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Patterns,
    Profiles,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Patterns => "patterns",
            Entity::Profiles => "profiles",
        }
    }
}

/// Transactional key-value storage for pattern records and developer
/// profiles. Values are serialized bytes; the engine owns the encoding.
///
/// `upsert` must apply its mutator as one atomic step per key: the mutator
/// sees the current value (or `None`) and returns the replacement, and no
/// concurrent caller may observe a partial update. A mutator error aborts
/// the upsert with the key unchanged. Updates to disjoint keys must not
/// serialize against each other through a single global lock.
pub trait Store: Send + Sync {
    /// Read a value.
    fn get(&self, entity: Entity, key: &str) -> Result<Option<Vec<u8>>, EngineError>;

    /// Atomic read-modify-write. Returns the stored replacement value.
    fn upsert(
        &self,
        entity: Entity,
        key: &str,
        mutator: &mut dyn FnMut(Option<&[u8]>) -> Result<Vec<u8>, EngineError>,
    ) -> Result<Vec<u8>, EngineError>;

    /// All entries whose key starts with `prefix`, ordered by key.
    fn scan(&self, entity: Entity, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, EngineError>;

    /// Persist buffered state, if the implementation buffers any.
    fn flush(&self) -> Result<(), EngineError>;
}
