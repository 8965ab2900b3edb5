use super::{Command, CommandOps, ReplaceMatrix, UpdateConfig};
use crate::common::{CommandName, ExtraData};
use crate::context::CommandContext;
use crate::error::{CommandError, CommandResult};
use crate::utils::{ensure_ini, remove_binding_constraints, save_matrix};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use vs_core::{link_ends, name_to_id};
use vs_study::config::{DEFAULT_FILTERS, parse_filters};
use vs_study::{FileTree, LinkConfig, StudyConfig, TreeValue, layout};

/// Link properties written when no parameter overrides them.
pub fn default_link_properties() -> Map<String, Value> {
    let filters = DEFAULT_FILTERS.join(", ");
    match json!({
        "hurdles-cost": false,
        "loop-flow": false,
        "use-phase-shifter": false,
        "transmission-capacities": "enabled",
        "asset-type": "ac",
        "link-style": "plain",
        "link-width": 1,
        "colorr": 112,
        "colorg": 112,
        "colorb": 112,
        "display-comments": true,
        "filter-synthesis": filters,
        "filter-year-by-year": filters,
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateLink {
    pub area1: String,
    pub area2: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
}

impl CreateLink {
    pub fn new(area1: &str, area2: &str) -> Self {
        Self {
            area1: area1.to_string(),
            area2: area2.to_string(),
            parameters: None,
            series: None,
        }
    }

    /// Normalised `(from, to)` ids; links are stored under the smaller id.
    pub fn ends(&self) -> (String, String) {
        let (a1, a2) = (name_to_id(&self.area1), name_to_id(&self.area2));
        let (from, to) = link_ends(&a1, &a2);
        (from.to_string(), to.to_string())
    }

    pub fn properties(&self) -> Map<String, Value> {
        let mut properties = default_link_properties();
        if let Some(parameters) = &self.parameters {
            for (key, value) in parameters {
                properties.insert(key.clone(), value.clone());
            }
        }
        properties
    }
}

impl CommandOps for CreateLink {
    fn name(&self) -> CommandName {
        CommandName::CreateLink
    }

    fn update_config(&self, config: &mut StudyConfig) -> CommandResult<ExtraData> {
        let (from, to) = self.ends();
        for area in [&from, &to] {
            if !config.areas.contains_key(area.as_str()) {
                return Err(CommandError::failed(format!(
                    "The area '{}' does not exist",
                    area
                )));
            }
        }
        if from == to {
            return Err(CommandError::failed("Cannot create link on same node"));
        }
        if config.has_link(&from, &to) {
            return Err(CommandError::failed(format!(
                "The link between {} and {} already exist.",
                from, to
            )));
        }

        let properties = self.properties();
        let link = LinkConfig {
            filters_synthesis: parse_filters(properties.get("filter-synthesis")),
            filters_year: parse_filters(properties.get("filter-year-by-year")),
        };
        if let Some(area) = config.areas.get_mut(&from) {
            area.links.insert(to.clone(), link);
        }
        Ok(ExtraData::from([
            ("area_from".to_string(), from),
            ("area_to".to_string(), to),
        ]))
    }

    fn apply_tree(
        &self,
        _config: &StudyConfig,
        tree: &mut dyn FileTree,
        ctx: &CommandContext,
    ) -> CommandResult<()> {
        let (from, to) = self.ends();
        ensure_ini(tree, &layout::link_properties_file(&from))?;
        tree.save_at(
            TreeValue::Json(Value::Object(self.properties())),
            &layout::link_properties(&from, &to),
        )?;
        let series = self.series.as_deref().unwrap_or(&ctx.constants.link);
        save_matrix(tree, series, &layout::link_series(&from, &to))
    }

    fn success_message(&self) -> String {
        let (from, to) = self.ends();
        format!("Link between '{}' and '{}' created", from, to)
    }

    fn signature_keys(&self) -> Vec<String> {
        vec![self.area1.clone(), self.area2.clone()]
    }

    fn create_diff(&self, other: &Command) -> Vec<Command> {
        let Command::CreateLink(other) = other else {
            return Vec::new();
        };
        let (from, to) = other.ends();
        let mut commands = vec![Command::UpdateConfig(UpdateConfig {
            target: layout::link_properties(&from, &to),
            data: Value::Object(other.properties()),
        })];
        if self.series != other.series
            && let Some(series) = &other.series
        {
            commands.push(Command::ReplaceMatrix(ReplaceMatrix {
                target: layout::link_series(&from, &to),
                matrix: series.clone(),
            }));
        }
        commands
    }

    fn inner_matrices(&self) -> Vec<String> {
        self.series.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveLink {
    pub area1: String,
    pub area2: String,
}

impl RemoveLink {
    pub fn new(area1: &str, area2: &str) -> Self {
        Self {
            area1: area1.to_string(),
            area2: area2.to_string(),
        }
    }

    fn ends(&self) -> (String, String) {
        let (a1, a2) = (name_to_id(&self.area1), name_to_id(&self.area2));
        let (from, to) = link_ends(&a1, &a2);
        (from.to_string(), to.to_string())
    }
}

impl CommandOps for RemoveLink {
    fn name(&self) -> CommandName {
        CommandName::RemoveLink
    }

    fn update_config(&self, config: &mut StudyConfig) -> CommandResult<ExtraData> {
        let (from, to) = self.ends();
        let removed = config
            .areas
            .get_mut(&from)
            .and_then(|area| area.links.remove(&to));
        if removed.is_none() {
            return Err(CommandError::failed(format!(
                "The link between {} and {} does not exist",
                from, to
            )));
        }
        config.bindings.retain(|_, b| !b.references_link(&from, &to));
        Ok(ExtraData::new())
    }

    fn apply_tree(
        &self,
        config: &StudyConfig,
        tree: &mut dyn FileTree,
        _ctx: &CommandContext,
    ) -> CommandResult<()> {
        let (from, to) = self.ends();
        tree.delete_at(&layout::link_properties(&from, &to))?;
        tree.delete_if_exists(&layout::link_series(&from, &to))?;

        let bindings: BTreeSet<String> = config
            .bindings
            .values()
            .filter(|b| b.references_link(&from, &to))
            .map(|b| b.id.clone())
            .collect();
        remove_binding_constraints(tree, &bindings)
    }

    fn success_message(&self) -> String {
        let (from, to) = self.ends();
        format!("Link between '{}' and '{}' removed", from, to)
    }

    fn signature_keys(&self) -> Vec<String> {
        vec![self.area1.clone(), self.area2.clone()]
    }

    fn create_diff(&self, _other: &Command) -> Vec<Command> {
        Vec::new()
    }
}
