use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

/// Recognized display names keyed by track ID.
///
/// Written from the recognition callback and read/pruned from the frame
/// path, so every operation takes the internal lock itself. Share it
/// behind an `Arc`.
#[derive(Debug, Default)]
pub struct NameBindings {
    names: RwLock<HashMap<u32, String>>,
}

impl NameBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, track_id: u32, name: impl Into<String>) {
        self.names.write().insert(track_id, name.into());
    }

    pub fn lookup(&self, track_id: u32) -> Option<String> {
        self.names.read().get(&track_id).cloned()
    }

    /// Drops every binding whose track is not in `current`.
    ///
    /// Track IDs are never reused, but a stale binding would otherwise live
    /// for the whole session.
    pub fn prune(&self, current: &HashSet<u32>) {
        self.names.write().retain(|id, _| current.contains(id));
    }

    pub fn clear(&self) {
        self.names.write().clear();
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }

    /// Point-in-time copy of all bindings.
    pub fn snapshot(&self) -> HashMap<u32, String> {
        self.names.read().clone()
    }
}
