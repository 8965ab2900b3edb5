//! Mirror/tree consistency checks.

use crate::config::StudyConfig;
use crate::study::FileStudy;
use crate::tree::{FileTree, TreeError};
use std::collections::BTreeSet;
use std::fmt::Debug;

#[derive(thiserror::Error, Debug)]
pub enum ConsistencyError {
    #[error("{entity} '{id}' is in the config mirror but not in the tree")]
    MissingInTree { entity: &'static str, id: String },

    #[error("{entity} '{id}' is in the tree but not in the config mirror")]
    MissingInMirror { entity: &'static str, id: String },

    #[error("Cannot read tree: {0}")]
    Tree(#[from] TreeError),
}

/// Verify that the mirror and the tree agree on which structural entities exist.
pub fn check_consistency<T: FileTree>(study: &FileStudy<T>) -> Result<(), ConsistencyError> {
    let mirror = study.config.summary();
    let tree = StudyConfig::from_tree(&study.tree)?.summary();

    compare("area", &mirror.areas, &tree.areas)?;
    compare("link", &mirror.links, &tree.links)?;
    compare("cluster", &mirror.clusters, &tree.clusters)?;
    compare("district", &mirror.districts, &tree.districts)?;
    compare("binding constraint", &mirror.bindings, &tree.bindings)?;
    Ok(())
}

fn compare<K: Ord + Debug>(
    entity: &'static str,
    mirror: &BTreeSet<K>,
    tree: &BTreeSet<K>,
) -> Result<(), ConsistencyError> {
    if let Some(id) = mirror.difference(tree).next() {
        return Err(ConsistencyError::MissingInTree {
            entity,
            id: format!("{:?}", id),
        });
    }
    if let Some(id) = tree.difference(mirror).next() {
        return Err(ConsistencyError::MissingInMirror {
            entity,
            id: format!("{:?}", id),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AreaConfig;
    use crate::tree::TreeValue;
    use serde_json::json;

    #[test]
    fn empty_study_is_consistent() {
        let study = FileStudy::empty(820, "s");
        check_consistency(&study).unwrap();
    }

    #[test]
    fn detects_mirror_only_area() {
        let mut study = FileStudy::empty(820, "s");
        study.config.areas.insert("ghost".into(), AreaConfig::new("Ghost"));
        let err = check_consistency(&study).unwrap_err();
        assert!(matches!(err, ConsistencyError::MissingInTree { entity: "area", .. }));
    }

    #[test]
    fn detects_tree_only_area() {
        let mut study = FileStudy::empty(820, "s");
        study
            .tree
            .save_at(TreeValue::Json(json!({"ui": {"name": "A"}})), "input/areas/a/ui")
            .unwrap();
        let err = check_consistency(&study).unwrap_err();
        assert!(matches!(err, ConsistencyError::MissingInMirror { entity: "area", .. }));
    }
}
