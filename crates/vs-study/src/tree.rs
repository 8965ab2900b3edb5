//! The file-tree contract the command engine writes through.
//!
//! A study is a hierarchy of folders whose leaves are ini files, matrices or raw
//! files. Once a path reaches an ini file, the remaining segments address
//! sections and keys inside it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vs_matrix::MatrixData;

pub type TreeResult<T> = Result<T, TreeError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("Child not found: {path}")]
    ChildNotFound { path: String },

    #[error("Type mismatch at {path}: {reason}")]
    TypeMismatch { path: String, reason: String },

    #[error("Invalid path: '{path}'")]
    InvalidPath { path: String },
}

impl TreeError {
    pub fn child_not_found(path: &[&str]) -> Self {
        TreeError::ChildNotFound {
            path: path.join("/"),
        }
    }

    pub fn type_mismatch(path: &[&str], reason: impl Into<String>) -> Self {
        TreeError::TypeMismatch {
            path: path.join("/"),
            reason: reason.into(),
        }
    }

    pub fn is_child_not_found(&self) -> bool {
        matches!(self, TreeError::ChildNotFound { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Folder,
    Ini,
    Matrix,
    Raw,
}

/// Matrix leaf: a link into the matrix store, or data stored inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatrixContent {
    Link(String),
    Data(MatrixData),
}

/// Value read from or written to a tree path.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeValue {
    /// Ini content: a whole file (object of sections), a section, or a single key.
    Json(Value),
    Matrix(MatrixContent),
    Raw(Vec<u8>),
    /// Child names of a folder; saving one creates an empty folder if missing.
    Folder(Vec<String>),
}

impl TreeValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TreeValue::Json(_) => "ini",
            TreeValue::Matrix(_) => "matrix",
            TreeValue::Raw(_) => "raw",
            TreeValue::Folder(_) => "folder",
        }
    }

    pub fn matrix_link(id: &str) -> Self {
        TreeValue::Matrix(MatrixContent::Link(vs_core::to_matrix_uri(id)))
    }
}

/// Split a `/`-separated target into path segments.
pub fn parse_path(target: &str) -> Vec<&str> {
    target.split('/').filter(|s| !s.is_empty()).collect()
}

pub trait FileTree: Send {
    fn get(&self, path: &[&str]) -> TreeResult<TreeValue>;

    fn save(&mut self, value: TreeValue, path: &[&str]) -> TreeResult<()>;

    /// Fails with `ChildNotFound` when nothing lives at `path`.
    fn delete(&mut self, path: &[&str]) -> TreeResult<()>;

    /// Kind of the node `path` resolves into; paths inside an ini file report `Ini`.
    fn get_node(&self, path: &[&str]) -> TreeResult<NodeKind>;

    fn exists(&self, path: &[&str]) -> bool {
        self.get(path).is_ok()
    }

    fn get_json(&self, path: &[&str]) -> TreeResult<Value> {
        match self.get(path)? {
            TreeValue::Json(value) => Ok(value),
            other => Err(TreeError::type_mismatch(
                path,
                format!("expected ini content, found {}", other.kind_name()),
            )),
        }
    }

    /// Child names of a folder, or section/key names of an ini object.
    fn list(&self, path: &[&str]) -> TreeResult<Vec<String>> {
        match self.get(path)? {
            TreeValue::Folder(names) => Ok(names),
            TreeValue::Json(Value::Object(map)) => Ok(map.keys().cloned().collect()),
            other => Err(TreeError::type_mismatch(
                path,
                format!("cannot list a {}", other.kind_name()),
            )),
        }
    }

    fn get_at(&self, target: &str) -> TreeResult<TreeValue> {
        self.get(&parse_path(target))
    }

    fn save_at(&mut self, value: TreeValue, target: &str) -> TreeResult<()> {
        self.save(value, &parse_path(target))
    }

    fn delete_at(&mut self, target: &str) -> TreeResult<()> {
        self.delete(&parse_path(target))
    }

    /// Delete, treating an already-missing node as success.
    fn delete_if_exists(&mut self, target: &str) -> TreeResult<()> {
        match self.delete_at(target) {
            Err(e) if e.is_child_not_found() => Ok(()),
            other => other,
        }
    }
}
