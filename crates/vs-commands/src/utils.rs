//! Helpers shared by the command implementations.

use crate::common::CommandName;
use crate::context::CommandContext;
use crate::error::{CommandError, CommandResult};
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use vs_core::strip_matrix_protocol;
use vs_matrix::MatrixData;
use vs_study::{FileTree, MatrixContent, TreeValue, layout, parse_path};

/// Argument fields holding a matrix, per command kind.
pub fn matrix_fields(name: CommandName) -> &'static [&'static str] {
    match name {
        CommandName::CreateLink => &["series"],
        CommandName::CreateCluster => &["prepro", "modulation"],
        CommandName::CreateStStorage => &[
            "pmax_injection",
            "pmax_withdrawal",
            "lower_rule_curve",
            "upper_rule_curve",
            "inflows",
        ],
        CommandName::CreateBindingConstraint | CommandName::UpdateBindingConstraint => &["values"],
        CommandName::ReplaceMatrix => &["matrix"],
        _ => &[],
    }
}

/// Resolve a matrix argument to a stored id: inline data is uploaded,
/// references must already exist.
pub fn validate_matrix(value: &Value, ctx: &CommandContext) -> CommandResult<String> {
    match value {
        Value::String(reference) => {
            let id = strip_matrix_protocol(reference);
            if ctx.matrix_service.exists(id)? {
                Ok(id.to_string())
            } else {
                Err(CommandError::validation(format!(
                    "Matrix '{}' does not exist",
                    id
                )))
            }
        }
        Value::Array(_) => {
            let data: MatrixData = serde_json::from_value(value.clone()).map_err(|e| {
                CommandError::validation(format!("Invalid matrix data: {}", e))
            })?;
            Ok(ctx.matrix_service.create(&data)?)
        }
        _ => Err(CommandError::validation(
            "A matrix argument must be a matrix id or a 2-D array",
        )),
    }
}

/// Replace every matrix field of `args` by its stored id.
pub fn normalize_matrix_args(
    name: CommandName,
    args: &mut Map<String, Value>,
    ctx: &CommandContext,
) -> CommandResult<()> {
    for field in matrix_fields(name) {
        if let Some(value) = args.get_mut(*field)
            && !value.is_null()
        {
            *value = Value::String(validate_matrix(value, ctx)?);
        }
    }
    Ok(())
}

/// Id of the matrix stored at `target`, uploading inline data if needed.
pub fn read_matrix_id(
    tree: &dyn FileTree,
    target: &str,
    ctx: &CommandContext,
) -> CommandResult<String> {
    match tree.get_at(target)? {
        TreeValue::Matrix(MatrixContent::Link(link)) => Ok(strip_matrix_protocol(&link).to_string()),
        TreeValue::Matrix(MatrixContent::Data(data)) => Ok(ctx.matrix_service.create(&data)?),
        other => Err(CommandError::failed(format!(
            "Path '{}' does not target a matrix (found {})",
            target,
            other.kind_name()
        ))),
    }
}

pub fn save_matrix(tree: &mut dyn FileTree, matrix_id: &str, target: &str) -> CommandResult<()> {
    tree.save_at(TreeValue::matrix_link(matrix_id), target)?;
    Ok(())
}

/// Create an empty ini file at `target` unless something is already there.
pub fn ensure_ini(tree: &mut dyn FileTree, target: &str) -> CommandResult<()> {
    if !tree.exists(&parse_path(target)) {
        tree.save_at(TreeValue::Json(json!({})), target)?;
    }
    Ok(())
}

/// Read an ini file as an object, treating a missing file as empty.
pub fn read_ini_or_empty(tree: &dyn FileTree, target: &str) -> CommandResult<Map<String, Value>> {
    match tree.get_json(&parse_path(target)) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CommandError::failed(format!(
            "Study node at path {} is invalid",
            target
        ))),
        Err(e) if e.is_child_not_found() => Ok(Map::new()),
        Err(e) => Err(e.into()),
    }
}

/// Binding-constraint sections ordered by their numeric key.
pub fn binding_sections(tree: &dyn FileTree) -> CommandResult<Vec<(String, Map<String, Value>)>> {
    let mut sections: Vec<(String, Map<String, Value>)> =
        read_ini_or_empty(tree, layout::BINDING_CONSTRAINTS)?
            .into_iter()
            .filter_map(|(key, value)| match value {
                Value::Object(section) => Some((key, section)),
                _ => None,
            })
            .collect();
    sections.sort_by_key(|(key, _)| (key.parse::<usize>().unwrap_or(usize::MAX), key.clone()));
    Ok(sections)
}

pub fn section_id(section: &Map<String, Value>) -> Option<&str> {
    section.get("id").and_then(Value::as_str)
}

/// First free numeric section key.
pub fn next_binding_key(sections: &[(String, Map<String, Value>)]) -> String {
    let used: BTreeSet<&str> = sections.iter().map(|(key, _)| key.as_str()).collect();
    (0..)
        .map(|k: usize| k.to_string())
        .find(|k| !used.contains(k.as_str()))
        .unwrap_or_default()
}

/// Drop the given constraints, renumber the remaining sections from 0 and
/// delete the dropped constraints' series.
pub fn remove_binding_constraints(
    tree: &mut dyn FileTree,
    ids: &BTreeSet<String>,
) -> CommandResult<()> {
    if ids.is_empty() {
        return Ok(());
    }
    let kept: Map<String, Value> = binding_sections(tree)?
        .into_iter()
        .filter(|(_, section)| !section_id(section).is_some_and(|id| ids.contains(id)))
        .enumerate()
        .map(|(i, (_, section))| (i.to_string(), Value::Object(section)))
        .collect();
    tree.save_at(TreeValue::Json(Value::Object(kept)), layout::BINDING_CONSTRAINTS)?;
    for id in ids {
        tree.delete_if_exists(&layout::binding_constraint_series(id))?;
    }
    Ok(())
}

/// Serde adapter writing raw bytes as a base64 string.
pub mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
