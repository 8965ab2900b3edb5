//! Identifier normalisation for areas, clusters, districts and constraints.
//!
//! Studies address entities by an id derived from the user-facing name, so two
//! commands naming "Area 1" and "area 1" target the same entity.

use crate::error::{CoreError, CoreResult};

/// Separator between the fields of a command match signature.
pub const MATCH_SIGNATURE_SEPARATOR: &str = "%";

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '(' | ')' | ',' | '&' | ' ' | '-')
}

/// Turn a display name into an entity id.
///
/// Each run of characters outside `[a-zA-Z0-9_(),& -]` collapses into a single
/// space, then the result is trimmed (and lower-cased when `lower` is set).
pub fn transform_name_to_id(name: &str, lower: bool) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_invalid_run = false;
    for c in name.chars() {
        if is_allowed(c) {
            out.push(c);
            in_invalid_run = false;
        } else if !in_invalid_run {
            out.push(' ');
            in_invalid_run = true;
        }
    }
    let trimmed = out.trim();
    if lower {
        trimmed.to_ascii_lowercase()
    } else {
        trimmed.to_string()
    }
}

/// Lower-cased id of a name; the common case.
pub fn name_to_id(name: &str) -> String {
    transform_name_to_id(name, true)
}

/// Reject names that normalise to an empty id.
pub fn validate_name(name: &str) -> CoreResult<String> {
    let id = name_to_id(name);
    if id.is_empty() {
        return Err(CoreError::InvalidName {
            name: name.to_string(),
            reason: "name must contain at least one of [a-zA-Z0-9_(),& -]",
        });
    }
    Ok(id)
}

/// Reject names that would be altered by normalisation (districts keep their name verbatim).
pub fn validate_strict_name(name: &str) -> CoreResult<String> {
    let id = validate_name(name)?;
    if transform_name_to_id(name, false) != name {
        return Err(CoreError::InvalidName {
            name: name.to_string(),
            reason: "name must only contain [a-zA-Z0-9],&,-,_,(,) characters",
        });
    }
    Ok(id)
}

/// Links are stored under the lexicographically smaller area.
pub fn link_ends<'a>(area1: &'a str, area2: &'a str) -> (&'a str, &'a str) {
    if area1 <= area2 {
        (area1, area2)
    } else {
        (area2, area1)
    }
}

/// Join signature parts with [`MATCH_SIGNATURE_SEPARATOR`].
pub fn signature<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    parts
        .into_iter()
        .map(|p| p.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(MATCH_SIGNATURE_SEPARATOR)
}
