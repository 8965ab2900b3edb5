//! A study: the file tree plus its config mirror.

use crate::config::StudyConfig;
use crate::layout;
use crate::memory::MemoryTree;
use crate::tree::{FileTree, TreeResult, TreeValue};
use serde_json::json;

pub const DEFAULT_VERSION: u32 = 820;

#[derive(Debug, Clone)]
pub struct FileStudy<T: FileTree = MemoryTree> {
    pub config: StudyConfig,
    pub tree: T,
}

impl<T: FileTree> FileStudy<T> {
    /// Wrap a tree, deriving the mirror from its content.
    pub fn from_tree(tree: T) -> TreeResult<Self> {
        let config = StudyConfig::from_tree(&tree)?;
        Ok(Self { config, tree })
    }
}

impl FileStudy<MemoryTree> {
    /// The empty-study template variants are generated on top of.
    pub fn empty(version: u32, caption: &str) -> Self {
        let mut tree = MemoryTree::new();
        for (target, value) in template_entries(version, caption) {
            // Template paths are disjoint and well-formed.
            if let Err(e) = tree.save_at(value, target) {
                tracing::error!(target, error = %e, "template entry rejected");
            }
        }
        Self {
            config: StudyConfig::new(version),
            tree,
        }
    }

    pub fn fingerprint(&self) -> String {
        self.tree.fingerprint()
    }
}

fn template_entries(version: u32, caption: &str) -> Vec<(&'static str, TreeValue)> {
    vec![
        (
            layout::STUDY_INI,
            TreeValue::Json(json!({
                "antares": {
                    "version": version,
                    "caption": caption,
                    "created": 0,
                    "lastsave": 0,
                    "author": "Unknown",
                }
            })),
        ),
        (
            layout::GENERAL_DATA,
            TreeValue::Json(json!({
                "general": {
                    "mode": "Economy",
                    "horizon": "",
                    "nbyears": 1,
                    "simulation.start": 1,
                    "simulation.end": 365,
                    "user-playlist": false,
                },
                "output": {
                    "synthesis": true,
                    "storenewset": false,
                },
            })),
        ),
        (layout::COMMENTS, TreeValue::Raw(Vec::new())),
        (layout::SCENARIO_BUILDER, TreeValue::Json(json!({}))),
        (layout::AREAS_DIR, TreeValue::Folder(Vec::new())),
        (layout::DISTRICTS, TreeValue::Json(json!({}))),
        (layout::LINKS_DIR, TreeValue::Folder(Vec::new())),
        (layout::BINDING_CONSTRAINTS, TreeValue::Json(json!({}))),
    ]
}
