use super::{Command, CommandOps};
use crate::common::{CommandName, ExtraData};
use crate::context::CommandContext;
use crate::error::{CommandError, CommandResult};
use crate::utils::{ensure_ini, remove_binding_constraints, save_matrix};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeSet;
use vs_core::{link_ends, name_to_id, validate_name};
use vs_study::config::DEFAULT_FILTERS;
use vs_study::{AreaConfig, ClusterFamily, FileTree, StudyConfig, TreeValue, layout};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateArea {
    pub area_name: String,
}

impl CreateArea {
    pub fn new(area_name: &str) -> Self {
        Self {
            area_name: area_name.to_string(),
        }
    }

    pub fn area_id(&self) -> String {
        name_to_id(&self.area_name)
    }
}

fn optimization_ini() -> Value {
    let filters = DEFAULT_FILTERS.join(", ");
    json!({
        "nodal optimization": {
            "non-dispatchable-power": true,
            "dispatchable-hydro-power": true,
            "other-dispatchable-power": true,
            "spread-unsupplied-energy-cost": 0,
            "spread-spilled-energy-cost": 0,
        },
        "filtering": {
            "filter-synthesis": filters,
            "filter-year-by-year": filters,
        },
    })
}

fn ui_ini(area_name: &str) -> Value {
    json!({
        "ui": {
            "name": area_name,
            "x": 0,
            "y": 0,
            "color_r": 230,
            "color_g": 108,
            "color_b": 44,
            "layers": "0",
        },
        "layerX": {"0": 0},
        "layerY": {"0": 0},
        "layerColor": {"0": "230 , 108 , 44"},
    })
}

impl CommandOps for CreateArea {
    fn name(&self) -> CommandName {
        CommandName::CreateArea
    }

    fn validate(&self) -> CommandResult<()> {
        validate_name(&self.area_name)?;
        Ok(())
    }

    fn update_config(&self, config: &mut StudyConfig) -> CommandResult<ExtraData> {
        let area_id = self.area_id();
        if area_id.is_empty() || layout::RESERVED_AREA_ENTRIES.contains(&area_id.as_str()) {
            return Err(CommandError::failed(format!(
                "Area name '{}' is not a valid area name",
                self.area_name
            )));
        }
        if config.areas.contains_key(&area_id) {
            return Err(CommandError::failed(format!(
                "Area '{}' already exists and could not be created",
                self.area_name
            )));
        }
        config
            .areas
            .insert(area_id.clone(), AreaConfig::new(&self.area_name));
        Ok(ExtraData::from([("area_id".to_string(), area_id)]))
    }

    fn apply_tree(
        &self,
        _config: &StudyConfig,
        tree: &mut dyn FileTree,
        ctx: &CommandContext,
    ) -> CommandResult<()> {
        let area_id = self.area_id();
        tree.save_at(
            TreeValue::Json(optimization_ini()),
            &layout::area_optimization(&area_id),
        )?;
        tree.save_at(TreeValue::Json(ui_ini(&self.area_name)), &layout::area_ui(&area_id))?;

        let null = &ctx.constants.null_matrix;
        for kind in layout::AREA_SERIES_KINDS {
            save_matrix(tree, null, &layout::area_series(kind, &area_id))?;
        }
        save_matrix(tree, null, &layout::area_misc_gen(&area_id))?;
        save_matrix(tree, null, &layout::area_reserves(&area_id))?;

        ensure_ini(tree, &layout::link_properties_file(&area_id))?;
        for family in [
            ClusterFamily::Thermal,
            ClusterFamily::Renewables,
            ClusterFamily::StStorage,
        ] {
            ensure_ini(tree, &family.list(&area_id))?;
        }
        Ok(())
    }

    fn success_message(&self) -> String {
        format!("Area '{}' created", self.area_name)
    }

    fn signature_keys(&self) -> Vec<String> {
        vec![self.area_name.clone()]
    }

    fn create_diff(&self, _other: &Command) -> Vec<Command> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveArea {
    pub id: String,
}

impl RemoveArea {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

impl CommandOps for RemoveArea {
    fn name(&self) -> CommandName {
        CommandName::RemoveArea
    }

    fn update_config(&self, config: &mut StudyConfig) -> CommandResult<ExtraData> {
        if config.areas.remove(&self.id).is_none() {
            return Err(CommandError::failed(format!(
                "Area '{}' does not exist",
                self.id
            )));
        }
        for area in config.areas.values_mut() {
            area.links.remove(&self.id);
        }
        for set in config.sets.values_mut() {
            set.areas.retain(|a| a != &self.id);
        }
        config.bindings.retain(|_, b| !b.references_area(&self.id));
        Ok(ExtraData::new())
    }

    fn apply_tree(
        &self,
        config: &StudyConfig,
        tree: &mut dyn FileTree,
        _ctx: &CommandContext,
    ) -> CommandResult<()> {
        let id = self.id.as_str();

        // Links pointing at this area live under the other end.
        for (other_id, other) in &config.areas {
            if other_id != id && other.links.contains_key(id) {
                let (from, to) = link_ends(other_id, id);
                tree.delete_if_exists(&layout::link_properties(from, to))?;
                tree.delete_if_exists(&layout::link_series(from, to))?;
            }
        }
        tree.delete_if_exists(&layout::links_dir(id))?;

        tree.delete_if_exists(&layout::area_dir(id))?;
        for kind in layout::AREA_SERIES_KINDS {
            tree.delete_if_exists(&layout::area_series(kind, id))?;
        }
        tree.delete_if_exists(&layout::area_misc_gen(id))?;
        tree.delete_if_exists(&layout::area_reserves(id))?;
        for family in [
            ClusterFamily::Thermal,
            ClusterFamily::Renewables,
            ClusterFamily::StStorage,
        ] {
            tree.delete_if_exists(&family.area_clusters_dir(id))?;
            tree.delete_if_exists(&family.area_series_dir(id))?;
        }
        tree.delete_if_exists(&layout::thermal_area_prepro_dir(id))?;

        remove_from_districts(tree, config, id)?;

        let bindings: BTreeSet<String> = config
            .bindings
            .values()
            .filter(|b| b.references_area(id))
            .map(|b| b.id.clone())
            .collect();
        remove_binding_constraints(tree, &bindings)
    }

    fn success_message(&self) -> String {
        format!("Area '{}' deleted", self.id)
    }

    fn signature_keys(&self) -> Vec<String> {
        vec![self.id.clone()]
    }

    fn create_diff(&self, _other: &Command) -> Vec<Command> {
        Vec::new()
    }
}

fn remove_from_districts(
    tree: &mut dyn FileTree,
    config: &StudyConfig,
    area_id: &str,
) -> CommandResult<()> {
    for (set_id, set) in &config.sets {
        if !set.areas.iter().any(|a| a == area_id) {
            continue;
        }
        let key = if set.inverted_set { "-" } else { "+" };
        let remaining: Vec<&String> = set.areas.iter().filter(|a| *a != area_id).collect();
        tree.save_at(
            TreeValue::Json(json!(remaining)),
            &format!("{}/{}", layout::district(set_id), key),
        )?;
    }
    Ok(())
}
