//! In-memory [`FileTree`] implementation, serialisable to a single JSON document.

use crate::tree::{FileTree, MatrixContent, NodeKind, TreeError, TreeResult, TreeValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum Node {
    Folder(BTreeMap<String, Node>),
    Ini(Map<String, Value>),
    Matrix(MatrixContent),
    Raw(Vec<u8>),
}

impl Node {
    fn kind(&self) -> NodeKind {
        match self {
            Node::Folder(_) => NodeKind::Folder,
            Node::Ini(_) => NodeKind::Ini,
            Node::Matrix(_) => NodeKind::Matrix,
            Node::Raw(_) => NodeKind::Raw,
        }
    }

    fn from_value(value: TreeValue, path: &[&str]) -> TreeResult<Self> {
        match value {
            TreeValue::Json(Value::Object(map)) => Ok(Node::Ini(map)),
            TreeValue::Json(_) => Err(TreeError::type_mismatch(
                path,
                "an ini file must be an object of sections",
            )),
            TreeValue::Matrix(m) => Ok(Node::Matrix(m)),
            TreeValue::Raw(bytes) => Ok(Node::Raw(bytes)),
            TreeValue::Folder(_) => Ok(Node::Folder(BTreeMap::new())),
        }
    }

    fn to_value(&self) -> TreeValue {
        match self {
            Node::Folder(children) => TreeValue::Folder(children.keys().cloned().collect()),
            Node::Ini(map) => TreeValue::Json(Value::Object(map.clone())),
            Node::Matrix(m) => TreeValue::Matrix(m.clone()),
            Node::Raw(bytes) => TreeValue::Raw(bytes.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryTree {
    root: BTreeMap<String, Node>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// SHA-256 over the canonical JSON form; equal trees have equal fingerprints.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        // BTreeMap-backed maps serialise in key order, so the encoding is canonical.
        let json = serde_json::to_string(&self.root).unwrap_or_default();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Every matrix link stored anywhere in the tree.
    pub fn matrix_links(&self) -> Vec<String> {
        fn walk(children: &BTreeMap<String, Node>, out: &mut Vec<String>) {
            for node in children.values() {
                match node {
                    Node::Folder(inner) => walk(inner, out),
                    Node::Matrix(MatrixContent::Link(link)) => out.push(link.clone()),
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.root, &mut out);
        out
    }
}

fn json_get<'a>(mut value: &'a Value, keys: &[&str], path: &[&str]) -> TreeResult<&'a Value> {
    for key in keys {
        value = value
            .as_object()
            .and_then(|obj| obj.get(*key))
            .ok_or_else(|| TreeError::child_not_found(path))?;
    }
    Ok(value)
}

fn json_set(map: &mut Map<String, Value>, keys: &[&str], value: Value, path: &[&str]) -> TreeResult<()> {
    let (last, parents) = match keys.split_last() {
        Some(split) => split,
        None => return Err(TreeError::InvalidPath { path: path.join("/") }),
    };
    let mut current = map;
    for key in parents {
        let entry = current
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        current = match entry {
            Value::Object(obj) => obj,
            _ => {
                return Err(TreeError::type_mismatch(
                    path,
                    format!("'{}' is a value, not a section", key),
                ));
            }
        };
    }
    current.insert(last.to_string(), value);
    Ok(())
}

fn json_remove(map: &mut Map<String, Value>, keys: &[&str], path: &[&str]) -> TreeResult<()> {
    let (last, parents) = match keys.split_last() {
        Some(split) => split,
        None => return Err(TreeError::InvalidPath { path: path.join("/") }),
    };
    let mut current = map;
    for key in parents {
        current = current
            .get_mut(*key)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| TreeError::child_not_found(path))?;
    }
    current
        .remove(*last)
        .map(|_| ())
        .ok_or_else(|| TreeError::child_not_found(path))
}

fn save_in(
    children: &mut BTreeMap<String, Node>,
    rest: &[&str],
    value: TreeValue,
    path: &[&str],
) -> TreeResult<()> {
    let (segment, rest) = match rest.split_first() {
        Some(split) => split,
        None => return Err(TreeError::InvalidPath { path: path.join("/") }),
    };

    if rest.is_empty() {
        match (children.get_mut(*segment), value) {
            (Some(Node::Folder(_)), TreeValue::Folder(_)) => Ok(()),
            (Some(Node::Ini(map)), TreeValue::Json(Value::Object(obj))) => {
                *map = obj;
                Ok(())
            }
            (_, value) => {
                let node = Node::from_value(value, path)?;
                children.insert(segment.to_string(), node);
                Ok(())
            }
        }
    } else {
        let entry = children
            .entry(segment.to_string())
            .or_insert_with(|| Node::Folder(BTreeMap::new()));
        match entry {
            Node::Folder(inner) => save_in(inner, rest, value, path),
            Node::Ini(map) => match value {
                TreeValue::Json(json) => json_set(map, rest, json, path),
                other => Err(TreeError::type_mismatch(
                    path,
                    format!("cannot store a {} inside an ini file", other.kind_name()),
                )),
            },
            other => Err(TreeError::type_mismatch(
                path,
                format!("cannot descend into a {:?} node", other.kind()),
            )),
        }
    }
}

fn delete_in(children: &mut BTreeMap<String, Node>, rest: &[&str], path: &[&str]) -> TreeResult<()> {
    let (segment, rest) = match rest.split_first() {
        Some(split) => split,
        None => return Err(TreeError::InvalidPath { path: path.join("/") }),
    };

    if rest.is_empty() {
        return children
            .remove(*segment)
            .map(|_| ())
            .ok_or_else(|| TreeError::child_not_found(path));
    }

    match children.get_mut(*segment) {
        Some(Node::Folder(inner)) => delete_in(inner, rest, path),
        Some(Node::Ini(map)) => json_remove(map, rest, path),
        _ => Err(TreeError::child_not_found(path)),
    }
}

impl FileTree for MemoryTree {
    fn get(&self, path: &[&str]) -> TreeResult<TreeValue> {
        let mut children = &self.root;
        for (i, segment) in path.iter().enumerate() {
            let node = children
                .get(*segment)
                .ok_or_else(|| TreeError::child_not_found(&path[..=i]))?;
            let rest = &path[i + 1..];
            match node {
                Node::Folder(inner) => {
                    if rest.is_empty() {
                        return Ok(node.to_value());
                    }
                    children = inner;
                }
                Node::Ini(map) => {
                    if rest.is_empty() {
                        return Ok(node.to_value());
                    }
                    let first = map
                        .get(rest[0])
                        .ok_or_else(|| TreeError::child_not_found(path))?;
                    return Ok(TreeValue::Json(json_get(first, &rest[1..], path)?.clone()));
                }
                leaf => {
                    if rest.is_empty() {
                        return Ok(leaf.to_value());
                    }
                    return Err(TreeError::child_not_found(path));
                }
            }
        }
        Ok(TreeValue::Folder(children.keys().cloned().collect()))
    }

    fn save(&mut self, value: TreeValue, path: &[&str]) -> TreeResult<()> {
        save_in(&mut self.root, path, value, path)
    }

    fn delete(&mut self, path: &[&str]) -> TreeResult<()> {
        delete_in(&mut self.root, path, path)
    }

    fn get_node(&self, path: &[&str]) -> TreeResult<NodeKind> {
        let mut children = &self.root;
        for (i, segment) in path.iter().enumerate() {
            let node = children
                .get(*segment)
                .ok_or_else(|| TreeError::child_not_found(&path[..=i]))?;
            match node {
                Node::Folder(inner) => children = inner,
                leaf => {
                    if leaf.kind() != NodeKind::Ini && i + 1 < path.len() {
                        return Err(TreeError::child_not_found(path));
                    }
                    return Ok(leaf.kind());
                }
            }
        }
        Ok(NodeKind::Folder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ini(value: Value) -> TreeValue {
        TreeValue::Json(value)
    }

    #[test]
    fn save_creates_intermediate_folders() {
        let mut tree = MemoryTree::new();
        tree.save(ini(json!({"general": {"nbyears": 1}})), &["settings", "generaldata"])
            .unwrap();

        assert_eq!(tree.get_node(&["settings"]).unwrap(), NodeKind::Folder);
        assert_eq!(tree.get_node(&["settings", "generaldata"]).unwrap(), NodeKind::Ini);
        assert_eq!(
            tree.get(&["settings", "generaldata", "general", "nbyears"]).unwrap(),
            ini(json!(1))
        );
    }

    #[test]
    fn save_inside_ini_creates_sections() {
        let mut tree = MemoryTree::new();
        tree.save(ini(json!({})), &["input", "links", "a", "properties"]).unwrap();
        tree.save(
            ini(json!({"hurdles-cost": false})),
            &["input", "links", "a", "properties", "b"],
        )
        .unwrap();

        assert_eq!(
            tree.list(&["input", "links", "a", "properties"]).unwrap(),
            vec!["b".to_string()]
        );
        assert_eq!(
            tree.get_node(&["input", "links", "a", "properties", "b", "missing"]).unwrap(),
            NodeKind::Ini
        );
    }

    #[test]
    fn missing_paths_are_child_not_found() {
        let tree = MemoryTree::new();
        assert!(tree.get(&["input"]).unwrap_err().is_child_not_found());
        let mut tree = tree;
        assert!(tree.delete(&["input", "x"]).unwrap_err().is_child_not_found());
    }

    #[test]
    fn delete_removes_ini_keys_and_nodes() {
        let mut tree = MemoryTree::new();
        tree.save(ini(json!({"s": {"k": 1, "j": 2}})), &["f"]).unwrap();
        tree.delete(&["f", "s", "k"]).unwrap();
        assert_eq!(tree.get(&["f", "s"]).unwrap(), ini(json!({"j": 2})));
        tree.delete(&["f"]).unwrap();
        assert!(!tree.exists(&["f"]));
    }

    #[test]
    fn cannot_descend_into_matrix() {
        let mut tree = MemoryTree::new();
        tree.save(TreeValue::matrix_link("abc"), &["m"]).unwrap();
        assert!(tree.save(ini(json!(1)), &["m", "x"]).is_err());
        assert!(tree.get(&["m", "x"]).unwrap_err().is_child_not_found());
        assert_eq!(tree.matrix_links(), vec!["matrix://abc".to_string()]);
    }

    #[test]
    fn ini_file_must_be_object() {
        let mut tree = MemoryTree::new();
        let err = tree.save(ini(json!(3)), &["f"]).unwrap_err();
        assert!(matches!(err, TreeError::TypeMismatch { .. }));
    }

    #[test]
    fn fingerprint_tracks_content() {
        let mut a = MemoryTree::new();
        let mut b = MemoryTree::new();
        a.save(ini(json!({"x": {"y": 1}})), &["f"]).unwrap();
        b.save(ini(json!({"x": {"y": 1}})), &["f"]).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.save(ini(json!(2)), &["f", "x", "y"]).unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn serde_roundtrip() {
        let mut tree = MemoryTree::new();
        tree.save(TreeValue::Raw(b"hello".to_vec()), &["settings", "comments"])
            .unwrap();
        tree.save(TreeValue::matrix_link("abc"), &["input", "m"]).unwrap();
        let json = serde_json::to_string(&tree).unwrap();
        let back: MemoryTree = serde_json::from_str(&json).unwrap();
        assert_eq!(tree, back);
    }
}
