//! Thermal and renewable clusters.

use super::{Command, CommandOps, ReplaceMatrix, UpdateConfig};
use crate::common::{CommandName, ExtraData};
use crate::context::CommandContext;
use crate::error::{CommandError, CommandResult};
use crate::utils::{ensure_ini, remove_binding_constraints, save_matrix};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use vs_core::{name_to_id, validate_name};
use vs_study::config::json_bool;
use vs_study::{ClusterConfig, ClusterFamily, FileTree, StudyConfig, TreeValue, layout};

/// The list section of a cluster: its parameters with the display name forced.
pub(crate) fn cluster_section(name: &str, parameters: &Map<String, Value>) -> Map<String, Value> {
    let mut section = parameters.clone();
    section.remove("id");
    section.insert("name".into(), Value::String(name.to_string()));
    section
}

fn check_area(config: &StudyConfig, area_id: &str) -> CommandResult<()> {
    if config.areas.contains_key(area_id) {
        Ok(())
    } else {
        Err(CommandError::failed(format!(
            "Area '{}' does not exist",
            area_id
        )))
    }
}

fn add_cluster(
    config: &mut StudyConfig,
    family: ClusterFamily,
    area_id: &str,
    cluster_name: &str,
    parameters: &Map<String, Value>,
) -> CommandResult<ExtraData> {
    check_area(config, area_id)?;
    let cluster_id = name_to_id(cluster_name);
    let area = config
        .areas
        .get_mut(area_id)
        .ok_or_else(|| CommandError::failed(format!("Area '{}' does not exist", area_id)))?;
    if area.has_cluster(family, &cluster_id) {
        return Err(CommandError::failed(format!(
            "Cluster '{}' already exists in the area '{}'",
            cluster_name, area_id
        )));
    }
    area.upsert_cluster(
        family,
        ClusterConfig {
            id: cluster_id.clone(),
            name: cluster_name.to_string(),
            enabled: json_bool(parameters.get("enabled"), true),
        },
    );
    Ok(ExtraData::from([("cluster_id".to_string(), cluster_id)]))
}

fn drop_cluster(
    config: &mut StudyConfig,
    family: ClusterFamily,
    area_id: &str,
    cluster_id: &str,
) -> CommandResult<ExtraData> {
    check_area(config, area_id)?;
    let removed = config
        .areas
        .get_mut(area_id)
        .is_some_and(|area| area.remove_cluster(family, cluster_id));
    if !removed {
        return Err(CommandError::failed(format!(
            "Cluster '{}' does not exist in the area '{}'",
            cluster_id, area_id
        )));
    }
    config
        .bindings
        .retain(|_, b| !b.references_cluster(area_id, cluster_id));
    Ok(ExtraData::new())
}

fn write_cluster_section(
    tree: &mut dyn FileTree,
    family: ClusterFamily,
    area_id: &str,
    cluster_name: &str,
    parameters: &Map<String, Value>,
) -> CommandResult<String> {
    let cluster_id = name_to_id(cluster_name);
    ensure_ini(tree, &family.list(area_id))?;
    tree.save_at(
        TreeValue::Json(Value::Object(cluster_section(cluster_name, parameters))),
        &family.section(area_id, &cluster_id),
    )?;
    Ok(cluster_id)
}

fn delete_cluster_files(
    tree: &mut dyn FileTree,
    config: &StudyConfig,
    family: ClusterFamily,
    area_id: &str,
    cluster_id: &str,
) -> CommandResult<()> {
    tree.delete_at(&family.section(area_id, cluster_id))?;
    tree.delete_if_exists(&family.series_dir(area_id, cluster_id))?;
    if family == ClusterFamily::Thermal {
        tree.delete_if_exists(&layout::thermal_prepro_dir(area_id, cluster_id))?;
    }
    let bindings: BTreeSet<String> = config
        .bindings
        .values()
        .filter(|b| b.references_cluster(area_id, cluster_id))
        .map(|b| b.id.clone())
        .collect();
    remove_binding_constraints(tree, &bindings)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCluster {
    pub area_id: String,
    pub cluster_name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prepro: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modulation: Option<String>,
}

impl CreateCluster {
    pub fn new(area_id: &str, cluster_name: &str) -> Self {
        Self {
            area_id: area_id.to_string(),
            cluster_name: cluster_name.to_string(),
            parameters: Map::new(),
            prepro: None,
            modulation: None,
        }
    }

    pub fn cluster_id(&self) -> String {
        name_to_id(&self.cluster_name)
    }
}

impl CommandOps for CreateCluster {
    fn name(&self) -> CommandName {
        CommandName::CreateCluster
    }

    fn validate(&self) -> CommandResult<()> {
        validate_name(&self.cluster_name)?;
        Ok(())
    }

    fn update_config(&self, config: &mut StudyConfig) -> CommandResult<ExtraData> {
        add_cluster(
            config,
            ClusterFamily::Thermal,
            &self.area_id,
            &self.cluster_name,
            &self.parameters,
        )
    }

    fn apply_tree(
        &self,
        _config: &StudyConfig,
        tree: &mut dyn FileTree,
        ctx: &CommandContext,
    ) -> CommandResult<()> {
        let family = ClusterFamily::Thermal;
        let cluster_id =
            write_cluster_section(tree, family, &self.area_id, &self.cluster_name, &self.parameters)?;
        let prepro = self.prepro.as_deref().unwrap_or(&ctx.constants.thermal_prepro);
        let modulation = self
            .modulation
            .as_deref()
            .unwrap_or(&ctx.constants.thermal_modulation);
        save_matrix(tree, prepro, &layout::thermal_prepro(&self.area_id, &cluster_id))?;
        save_matrix(
            tree,
            modulation,
            &layout::thermal_modulation(&self.area_id, &cluster_id),
        )?;
        save_matrix(
            tree,
            &ctx.constants.null_matrix,
            &layout::cluster_series(family, &self.area_id, &cluster_id),
        )
    }

    fn success_message(&self) -> String {
        format!(
            "Thermal cluster '{}' added to area '{}'",
            self.cluster_name, self.area_id
        )
    }

    fn signature_keys(&self) -> Vec<String> {
        vec![self.cluster_name.clone(), self.area_id.clone()]
    }

    fn create_diff(&self, other: &Command) -> Vec<Command> {
        let Command::CreateCluster(other) = other else {
            return Vec::new();
        };
        let cluster_id = other.cluster_id();
        let mut commands = vec![Command::UpdateConfig(UpdateConfig {
            target: ClusterFamily::Thermal.section(&other.area_id, &cluster_id),
            data: Value::Object(cluster_section(&other.cluster_name, &other.parameters)),
        })];
        if self.prepro != other.prepro
            && let Some(prepro) = &other.prepro
        {
            commands.push(Command::ReplaceMatrix(ReplaceMatrix {
                target: layout::thermal_prepro(&other.area_id, &cluster_id),
                matrix: prepro.clone(),
            }));
        }
        if self.modulation != other.modulation
            && let Some(modulation) = &other.modulation
        {
            commands.push(Command::ReplaceMatrix(ReplaceMatrix {
                target: layout::thermal_modulation(&other.area_id, &cluster_id),
                matrix: modulation.clone(),
            }));
        }
        commands
    }

    fn inner_matrices(&self) -> Vec<String> {
        self.prepro
            .iter()
            .chain(self.modulation.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveCluster {
    pub area_id: String,
    pub cluster_id: String,
}

impl CommandOps for RemoveCluster {
    fn name(&self) -> CommandName {
        CommandName::RemoveCluster
    }

    fn update_config(&self, config: &mut StudyConfig) -> CommandResult<ExtraData> {
        drop_cluster(config, ClusterFamily::Thermal, &self.area_id, &self.cluster_id)
    }

    fn apply_tree(
        &self,
        config: &StudyConfig,
        tree: &mut dyn FileTree,
        _ctx: &CommandContext,
    ) -> CommandResult<()> {
        delete_cluster_files(
            tree,
            config,
            ClusterFamily::Thermal,
            &self.area_id,
            &self.cluster_id,
        )
    }

    fn success_message(&self) -> String {
        format!(
            "Thermal cluster '{}' removed from area '{}'",
            self.cluster_id, self.area_id
        )
    }

    fn signature_keys(&self) -> Vec<String> {
        vec![self.cluster_id.clone(), self.area_id.clone()]
    }

    fn create_diff(&self, _other: &Command) -> Vec<Command> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRenewablesCluster {
    pub area_id: String,
    pub cluster_name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl CreateRenewablesCluster {
    pub fn new(area_id: &str, cluster_name: &str) -> Self {
        Self {
            area_id: area_id.to_string(),
            cluster_name: cluster_name.to_string(),
            parameters: Map::new(),
        }
    }

    pub fn cluster_id(&self) -> String {
        name_to_id(&self.cluster_name)
    }
}

impl CommandOps for CreateRenewablesCluster {
    fn name(&self) -> CommandName {
        CommandName::CreateRenewablesCluster
    }

    fn validate(&self) -> CommandResult<()> {
        validate_name(&self.cluster_name)?;
        Ok(())
    }

    fn update_config(&self, config: &mut StudyConfig) -> CommandResult<ExtraData> {
        add_cluster(
            config,
            ClusterFamily::Renewables,
            &self.area_id,
            &self.cluster_name,
            &self.parameters,
        )
    }

    fn apply_tree(
        &self,
        _config: &StudyConfig,
        tree: &mut dyn FileTree,
        ctx: &CommandContext,
    ) -> CommandResult<()> {
        let family = ClusterFamily::Renewables;
        let cluster_id =
            write_cluster_section(tree, family, &self.area_id, &self.cluster_name, &self.parameters)?;
        save_matrix(
            tree,
            &ctx.constants.null_matrix,
            &layout::cluster_series(family, &self.area_id, &cluster_id),
        )
    }

    fn success_message(&self) -> String {
        format!(
            "Renewable cluster '{}' added to area '{}'",
            self.cluster_name, self.area_id
        )
    }

    fn signature_keys(&self) -> Vec<String> {
        vec![self.cluster_name.clone(), self.area_id.clone()]
    }

    fn create_diff(&self, other: &Command) -> Vec<Command> {
        let Command::CreateRenewablesCluster(other) = other else {
            return Vec::new();
        };
        vec![Command::UpdateConfig(UpdateConfig {
            target: ClusterFamily::Renewables.section(&other.area_id, &other.cluster_id()),
            data: Value::Object(cluster_section(&other.cluster_name, &other.parameters)),
        })]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveRenewablesCluster {
    pub area_id: String,
    pub cluster_id: String,
}

impl CommandOps for RemoveRenewablesCluster {
    fn name(&self) -> CommandName {
        CommandName::RemoveRenewablesCluster
    }

    fn update_config(&self, config: &mut StudyConfig) -> CommandResult<ExtraData> {
        drop_cluster(
            config,
            ClusterFamily::Renewables,
            &self.area_id,
            &self.cluster_id,
        )
    }

    fn apply_tree(
        &self,
        config: &StudyConfig,
        tree: &mut dyn FileTree,
        _ctx: &CommandContext,
    ) -> CommandResult<()> {
        delete_cluster_files(
            tree,
            config,
            ClusterFamily::Renewables,
            &self.area_id,
            &self.cluster_id,
        )
    }

    fn success_message(&self) -> String {
        format!(
            "Renewable cluster '{}' removed from area '{}'",
            self.cluster_id, self.area_id
        )
    }

    fn signature_keys(&self) -> Vec<String> {
        vec![self.cluster_id.clone(), self.area_id.clone()]
    }

    fn create_diff(&self, _other: &Command) -> Vec<Command> {
        Vec::new()
    }
}
