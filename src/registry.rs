use parking_lot::RwLock;
use tracing::debug;

use crate::{
    driver::Error,
    entities::source::{Source, SourceId},
};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SourceEntry {
    pub id: SourceId,
    pub name: String,
}

/// Bookkeeping of the sources taking part in a run.
///
/// The registry only records identities; it does not own or keep sources alive. It is internally
/// locked so actors can be added or removed from outside the simulation turn.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    entries: RwLock<Vec<SourceEntry>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails if a source with the same ID is already registered.
    pub fn register(&self, source: &Source) -> Result<(), Error> {
        let mut entries = self.entries.write();
        if entries.iter().any(|e| e.id == source.id()) {
            return Err(Error::AlreadyRegistered(source.id()));
        }
        entries.push(SourceEntry {
            id: source.id(),
            name: source.name().to_owned(),
        });
        debug!(source = %source.name(), id = %source.id(), "source registered");
        Ok(())
    }

    pub fn unregister(&self, source: &Source) -> bool {
        self.unregister_id(source.id())
    }

    pub fn unregister_id(&self, id: SourceId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if removed {
            debug!(%id, "source unregistered");
        }
        removed
    }

    pub fn contains(&self, id: SourceId) -> bool {
        self.entries.read().iter().any(|e| e.id == id)
    }

    /// A snapshot of the current members.
    pub fn list(&self) -> Vec<SourceEntry> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
