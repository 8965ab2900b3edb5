//! Materialised variant studies kept in memory between requests.

use parking_lot::RwLock;
use std::collections::HashMap;
use vs_study::FileStudy;

#[derive(Default)]
pub struct SnapshotCache {
    entries: RwLock<HashMap<String, FileStudy>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, variant_id: &str) -> Option<FileStudy> {
        self.entries.read().get(variant_id).cloned()
    }

    pub fn put(&self, variant_id: &str, study: FileStudy) {
        self.entries.write().insert(variant_id.to_string(), study);
    }

    /// Returns whether an entry was dropped.
    pub fn invalidate(&self, variant_id: &str) -> bool {
        let dropped = self.entries.write().remove(variant_id).is_some();
        if dropped {
            tracing::debug!(variant_id, "snapshot cache entry invalidated");
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_invalidate() {
        let cache = SnapshotCache::new();
        cache.put("v1", FileStudy::empty(820, "x"));
        assert!(cache.get("v1").is_some());
        assert!(cache.invalidate("v1"));
        assert!(!cache.invalidate("v1"));
        assert!(cache.is_empty());
    }
}
