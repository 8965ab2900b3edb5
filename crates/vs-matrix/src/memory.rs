//! Process-local matrix store.

use crate::hash::compute_matrix_id;
use crate::types::MatrixData;
use crate::{MatrixResult, MatrixService, validate_shape};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use vs_core::strip_matrix_protocol;

/// Thread-safe in-memory store. Clones share the same underlying map;
/// use [`InMemoryMatrixStore::snapshot`] for an independent copy.
#[derive(Clone, Default)]
pub struct InMemoryMatrixStore {
    matrices: Arc<RwLock<BTreeMap<String, MatrixData>>>,
}

impl InMemoryMatrixStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Self {
        Self {
            matrices: Arc::new(RwLock::new(self.matrices.read().clone())),
        }
    }

    /// Independent store holding `ids` as found in `source`. Ids `source` does
    /// not have are skipped.
    pub fn copy_of<'a>(
        source: &dyn MatrixService,
        ids: impl IntoIterator<Item = &'a str>,
    ) -> MatrixResult<Self> {
        let mut matrices = BTreeMap::new();
        for id in ids {
            let id = strip_matrix_protocol(id);
            if let Some(data) = source.get(id)? {
                matrices.insert(id.to_string(), data);
            }
        }
        Ok(Self {
            matrices: Arc::new(RwLock::new(matrices)),
        })
    }

    pub fn len(&self) -> usize {
        self.matrices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.read().is_empty()
    }
}

impl MatrixService for InMemoryMatrixStore {
    fn create(&self, data: &MatrixData) -> MatrixResult<String> {
        validate_shape(data)?;
        let id = compute_matrix_id(data);
        self.matrices
            .write()
            .entry(id.clone())
            .or_insert_with(|| data.clone());
        Ok(id)
    }

    fn get(&self, id: &str) -> MatrixResult<Option<MatrixData>> {
        Ok(self
            .matrices
            .read()
            .get(strip_matrix_protocol(id))
            .cloned())
    }

    fn exists(&self, id: &str) -> MatrixResult<bool> {
        Ok(self.matrices.read().contains_key(strip_matrix_protocol(id)))
    }

    fn delete(&self, id: &str) -> MatrixResult<()> {
        self.matrices.write().remove(strip_matrix_protocol(id));
        Ok(())
    }

    fn list(&self) -> MatrixResult<Vec<String>> {
        Ok(self.matrices.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_is_idempotent() {
        let store = InMemoryMatrixStore::new();
        let a = store.create(&vec![vec![1.0, 2.0]]).unwrap();
        let b = store.create(&vec![vec![1.0, 2.0]]).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn snapshot_is_independent() {
        let store = InMemoryMatrixStore::new();
        let id = store.create(&vec![vec![1.0]]).unwrap();
        let copy = store.snapshot();
        copy.delete(&id).unwrap();
        assert!(store.exists(&id).unwrap());
        assert!(!copy.exists(&id).unwrap());
    }

    #[test]
    fn copy_holds_only_the_requested_matrices() {
        let store = InMemoryMatrixStore::new();
        let kept = store.create(&vec![vec![1.0]]).unwrap();
        let other = store.create(&vec![vec![2.0]]).unwrap();
        let copy = InMemoryMatrixStore::copy_of(&store, [kept.as_str(), "missing"]).unwrap();
        assert_eq!(copy.list().unwrap(), vec![kept.clone()]);
        copy.delete(&kept).unwrap();
        assert!(copy.is_empty());
        assert!(store.exists(&kept).unwrap());
        assert!(store.exists(&other).unwrap());
    }

    #[test]
    fn protocol_prefix_is_accepted() {
        let store = InMemoryMatrixStore::new();
        let id = store.create(&vec![vec![5.0]]).unwrap();
        let uri = vs_core::to_matrix_uri(&id);
        assert!(store.exists(&uri).unwrap());
        assert_eq!(store.fetch(&uri).unwrap(), vec![vec![5.0]]);
    }

    #[test]
    fn ragged_matrix_is_rejected() {
        let store = InMemoryMatrixStore::new();
        assert!(store.create(&vec![vec![1.0, 2.0], vec![3.0]]).is_err());
    }
}
