//! The config mirror: a structural summary of a study kept in lockstep with its tree.

use crate::layout::{self, ClusterFamily};
use crate::tree::{FileTree, TreeError, TreeResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_FILTERS: [&str; 5] = ["hourly", "daily", "weekly", "monthly", "annual"];

pub fn default_filters() -> Vec<String> {
    DEFAULT_FILTERS.iter().map(|s| s.to_string()).collect()
}

/// Parse a comma-separated filter list (`"hourly, daily"`).
pub fn parse_filters(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => default_filters(),
    }
}

pub fn json_bool(value: Option<&Value>, default: bool) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" => true,
            "false" => false,
            _ => default,
        },
        _ => default,
    }
}

pub fn json_str_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    pub filters_synthesis: Vec<String>,
    pub filters_year: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub id: String,
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub id: String,
    pub name: String,
    pub group: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaConfig {
    pub name: String,
    #[serde(default)]
    pub links: BTreeMap<String, LinkConfig>,
    #[serde(default)]
    pub thermals: Vec<ClusterConfig>,
    #[serde(default)]
    pub renewables: Vec<ClusterConfig>,
    #[serde(default)]
    pub st_storages: Vec<StorageConfig>,
    pub filters_synthesis: Vec<String>,
    pub filters_year: Vec<String>,
}

impl AreaConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            links: BTreeMap::new(),
            thermals: Vec::new(),
            renewables: Vec::new(),
            st_storages: Vec::new(),
            filters_synthesis: default_filters(),
            filters_year: default_filters(),
        }
    }

    pub fn clusters(&self, family: ClusterFamily) -> Vec<&str> {
        match family {
            ClusterFamily::Thermal => self.thermals.iter().map(|c| c.id.as_str()).collect(),
            ClusterFamily::Renewables => self.renewables.iter().map(|c| c.id.as_str()).collect(),
            ClusterFamily::StStorage => self.st_storages.iter().map(|s| s.id.as_str()).collect(),
        }
    }

    pub fn has_cluster(&self, family: ClusterFamily, cluster_id: &str) -> bool {
        self.clusters(family).contains(&cluster_id)
    }

    /// Insert or replace a thermal or renewable cluster, keeping the list ordered by id.
    pub fn upsert_cluster(&mut self, family: ClusterFamily, cluster: ClusterConfig) {
        let list = match family {
            ClusterFamily::Thermal => &mut self.thermals,
            ClusterFamily::Renewables => &mut self.renewables,
            ClusterFamily::StStorage => return,
        };
        list.retain(|c| c.id != cluster.id);
        list.push(cluster);
        list.sort_by(|a, b| a.id.cmp(&b.id));
    }

    pub fn upsert_storage(&mut self, storage: StorageConfig) {
        self.st_storages.retain(|s| s.id != storage.id);
        self.st_storages.push(storage);
        self.st_storages.sort_by(|a, b| a.id.cmp(&b.id));
    }

    /// Returns whether anything was removed.
    pub fn remove_cluster(&mut self, family: ClusterFamily, cluster_id: &str) -> bool {
        let before = self.clusters(family).len();
        match family {
            ClusterFamily::Thermal => self.thermals.retain(|c| c.id != cluster_id),
            ClusterFamily::Renewables => self.renewables.retain(|c| c.id != cluster_id),
            ClusterFamily::StStorage => self.st_storages.retain(|s| s.id != cluster_id),
        }
        self.clusters(family).len() != before
    }
}

/// A district: a named selection of areas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictSet {
    pub name: Option<String>,
    /// When set, `areas` lists the *excluded* areas.
    pub inverted_set: bool,
    pub areas: Vec<String>,
    pub output: bool,
}

impl DistrictSet {
    pub fn resolved_areas(&self, all_areas: &[String]) -> Vec<String> {
        if self.inverted_set {
            all_areas
                .iter()
                .filter(|a| !self.areas.contains(a))
                .cloned()
                .collect()
        } else {
            self.areas.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingConstraintConfig {
    pub id: String,
    /// Areas referenced by the constraint's link or cluster terms.
    pub areas: BTreeSet<String>,
    /// Referenced links as `(from, to)` pairs and clusters as `(area, cluster)` pairs.
    pub links: BTreeSet<(String, String)>,
    pub clusters: BTreeSet<(String, String)>,
}

impl BindingConstraintConfig {
    /// Build the mirror entry from the term keys of a constraint section.
    pub fn from_terms<'a>(id: &str, terms: impl IntoIterator<Item = &'a str>) -> Self {
        let mut config = Self {
            id: id.to_string(),
            areas: BTreeSet::new(),
            links: BTreeSet::new(),
            clusters: BTreeSet::new(),
        };
        for term in terms {
            if let Some((a1, a2)) = term.split_once('%') {
                config.areas.insert(a1.to_string());
                config.areas.insert(a2.to_string());
                config.links.insert((a1.to_string(), a2.to_string()));
            } else if let Some((area, cluster)) = term.split_once('.') {
                config.areas.insert(area.to_string());
                config.clusters.insert((area.to_string(), cluster.to_string()));
            }
        }
        config
    }

    pub fn references_area(&self, area_id: &str) -> bool {
        self.areas.contains(area_id)
    }

    pub fn references_link(&self, area1: &str, area2: &str) -> bool {
        self.links.contains(&(area1.to_string(), area2.to_string()))
            || self.links.contains(&(area2.to_string(), area1.to_string()))
    }

    pub fn references_cluster(&self, area_id: &str, cluster_id: &str) -> bool {
        self.clusters
            .contains(&(area_id.to_string(), cluster_id.to_string()))
    }
}

/// Section keys of a binding-constraint ini section that are not terms.
pub const BINDING_PROPERTY_KEYS: [&str; 8] = [
    "id",
    "name",
    "enabled",
    "type",
    "operator",
    "comments",
    "filter-year-by-year",
    "filter-synthesis",
];

pub fn is_binding_term(key: &str) -> bool {
    !BINDING_PROPERTY_KEYS.contains(&key) && (key.contains('%') || key.contains('.'))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyConfig {
    pub version: u32,
    #[serde(default)]
    pub areas: BTreeMap<String, AreaConfig>,
    #[serde(default)]
    pub sets: BTreeMap<String, DistrictSet>,
    /// Keyed by constraint id.
    #[serde(default)]
    pub bindings: BTreeMap<String, BindingConstraintConfig>,
    #[serde(default)]
    pub outputs: Vec<String>,
}

/// Existence-only view of a mirror, used to compare it against its tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StructureSummary {
    pub areas: BTreeSet<String>,
    pub links: BTreeSet<(String, String)>,
    pub clusters: BTreeSet<(String, String, String)>,
    pub districts: BTreeSet<String>,
    pub bindings: BTreeSet<String>,
}

impl StudyConfig {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            areas: BTreeMap::new(),
            sets: BTreeMap::new(),
            bindings: BTreeMap::new(),
            outputs: Vec::new(),
        }
    }

    pub fn area_ids(&self) -> Vec<String> {
        self.areas.keys().cloned().collect()
    }

    pub fn has_link(&self, area_from: &str, area_to: &str) -> bool {
        self.areas
            .get(area_from)
            .is_some_and(|a| a.links.contains_key(area_to))
    }

    pub fn binding(&self, id: &str) -> Option<&BindingConstraintConfig> {
        self.bindings.get(id)
    }

    pub fn insert_binding(&mut self, binding: BindingConstraintConfig) {
        self.bindings.insert(binding.id.clone(), binding);
    }

    pub fn summary(&self) -> StructureSummary {
        let mut summary = StructureSummary::default();
        for (area_id, area) in &self.areas {
            summary.areas.insert(area_id.clone());
            for to in area.links.keys() {
                summary.links.insert((area_id.clone(), to.clone()));
            }
            for (family, label) in [
                (ClusterFamily::Thermal, "thermal"),
                (ClusterFamily::Renewables, "renewables"),
                (ClusterFamily::StStorage, "st-storage"),
            ] {
                for id in area.clusters(family) {
                    summary
                        .clusters
                        .insert((label.to_string(), area_id.clone(), id.to_string()));
                }
            }
        }
        summary.districts = self.sets.keys().cloned().collect();
        summary.bindings = self.bindings.keys().cloned().collect();
        summary
    }

    /// Rebuild the mirror by reading the tree.
    pub fn from_tree(tree: &dyn FileTree) -> TreeResult<Self> {
        let version = tree
            .get_json(&["study", "antares", "version"])
            .ok()
            .and_then(|v| match v {
                Value::Number(n) => n.as_u64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            })
            .unwrap_or(0) as u32;

        let mut config = StudyConfig::new(version);

        for area_id in list_or_empty(tree, layout::AREAS_DIR)? {
            if layout::RESERVED_AREA_ENTRIES.contains(&area_id.as_str()) {
                continue;
            }
            let area = read_area(tree, &area_id)?;
            config.areas.insert(area_id, area);
        }

        if let Some(Value::Object(sets)) = json_or_none(tree, layout::DISTRICTS)? {
            for (set_id, section) in sets {
                let inverted_set = section.get("apply-filter").and_then(Value::as_str) == Some("add-all");
                let areas = if inverted_set {
                    json_str_list(section.get("-"))
                } else {
                    json_str_list(section.get("+"))
                };
                config.sets.insert(
                    set_id,
                    DistrictSet {
                        name: section
                            .get("caption")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        inverted_set,
                        areas,
                        output: json_bool(section.get("output"), true),
                    },
                );
            }
        }

        if let Some(Value::Object(sections)) = json_or_none(tree, layout::BINDING_CONSTRAINTS)? {
            for section in sections.values() {
                if let Value::Object(props) = section
                    && let Some(id) = props.get("id").and_then(Value::as_str)
                {
                    let terms = props.keys().map(String::as_str).filter(|k| is_binding_term(k));
                    config.insert_binding(BindingConstraintConfig::from_terms(id, terms));
                }
            }
        }

        config.outputs = list_or_empty(tree, layout::OUTPUT_DIR)?;
        Ok(config)
    }
}

fn list_or_empty(tree: &dyn FileTree, target: &str) -> TreeResult<Vec<String>> {
    match tree.list(&crate::tree::parse_path(target)) {
        Ok(names) => Ok(names),
        Err(TreeError::ChildNotFound { .. }) => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

fn json_or_none(tree: &dyn FileTree, target: &str) -> TreeResult<Option<Value>> {
    match tree.get_json(&crate::tree::parse_path(target)) {
        Ok(value) => Ok(Some(value)),
        Err(TreeError::ChildNotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

fn read_area(tree: &dyn FileTree, area_id: &str) -> TreeResult<AreaConfig> {
    let ui = json_or_none(tree, &layout::area_ui(area_id))?;
    let name = ui
        .as_ref()
        .and_then(|v| v.pointer("/ui/name"))
        .and_then(Value::as_str)
        .unwrap_or(area_id);
    let mut area = AreaConfig::new(name);

    if let Some(optimization) = json_or_none(tree, &layout::area_optimization(area_id))? {
        area.filters_synthesis = parse_filters(optimization.pointer("/filtering/filter-synthesis"));
        area.filters_year = parse_filters(optimization.pointer("/filtering/filter-year-by-year"));
    }

    if let Some(Value::Object(links)) = json_or_none(tree, &layout::link_properties_file(area_id))? {
        for (to, props) in links {
            area.links.insert(
                to,
                LinkConfig {
                    filters_synthesis: parse_filters(props.get("filter-synthesis")),
                    filters_year: parse_filters(props.get("filter-year-by-year")),
                },
            );
        }
    }

    for family in [ClusterFamily::Thermal, ClusterFamily::Renewables, ClusterFamily::StStorage] {
        if let Some(Value::Object(list)) = json_or_none(tree, &family.list(area_id))? {
            for (cluster_id, props) in list {
                let name = props
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or(&cluster_id)
                    .to_string();
                match family {
                    ClusterFamily::Thermal | ClusterFamily::Renewables => area.upsert_cluster(
                        family,
                        ClusterConfig {
                            id: cluster_id,
                            name,
                            enabled: json_bool(props.get("enabled"), true),
                        },
                    ),
                    ClusterFamily::StStorage => area.upsert_storage(StorageConfig {
                        id: cluster_id,
                        name,
                        group: props
                            .get("group")
                            .and_then(Value::as_str)
                            .unwrap_or("Other1")
                            .to_string(),
                    }),
                }
            }
        }
    }

    Ok(area)
}
