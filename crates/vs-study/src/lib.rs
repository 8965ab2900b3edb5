//! vs-study: the study file tree, its config mirror and persistence.

pub mod config;
pub mod layout;
pub mod memory;
pub mod study;
pub mod tree;
pub mod validate;

pub use config::{
    AreaConfig, BindingConstraintConfig, ClusterConfig, DistrictSet, LinkConfig, StorageConfig,
    StudyConfig,
};
pub use layout::ClusterFamily;
pub use memory::MemoryTree;
pub use study::{DEFAULT_VERSION, FileStudy};
pub use tree::{FileTree, MatrixContent, NodeKind, TreeError, TreeResult, TreeValue, parse_path};
pub use validate::{ConsistencyError, check_consistency};

pub type StudyResult<T> = Result<T, StudyError>;

#[derive(thiserror::Error, Debug)]
pub enum StudyError {
    #[error("Tree error: {0}")]
    Tree(#[from] TreeError),

    #[error("Inconsistent study: {0}")]
    Consistency(#[from] ConsistencyError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Load a study tree and rebuild its mirror.
pub fn load_json(path: &std::path::Path) -> StudyResult<FileStudy> {
    let content = std::fs::read_to_string(path)?;
    let tree: MemoryTree = serde_json::from_str(&content)?;
    Ok(FileStudy::from_tree(tree)?)
}

pub fn save_json(path: &std::path::Path, study: &FileStudy) -> StudyResult<()> {
    check_consistency(study)?;
    let content = serde_json::to_string_pretty(&study.tree)?;
    std::fs::write(path, content)?;
    Ok(())
}
