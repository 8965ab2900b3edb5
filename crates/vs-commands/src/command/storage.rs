//! Short-term storages.

use super::cluster::cluster_section;
use super::{Command, CommandOps, ReplaceMatrix, UpdateConfig};
use crate::common::{CommandName, ExtraData};
use crate::context::{CommandContext, MatrixConstants};
use crate::error::{CommandError, CommandResult};
use crate::utils::{ensure_ini, save_matrix};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use vs_core::{name_to_id, validate_name};
use vs_study::{ClusterFamily, FileTree, StorageConfig, StudyConfig, TreeValue, layout};

pub const DEFAULT_STORAGE_GROUP: &str = "Other1";

/// Series file names of a storage, in argument order.
pub const STORAGE_SERIES: [&str; 5] = [
    "pmax_injection",
    "pmax_withdrawal",
    "lower_rule_curve",
    "upper_rule_curve",
    "inflows",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateStStorage {
    pub area_id: String,
    pub storage_name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmax_injection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pmax_withdrawal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lower_rule_curve: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upper_rule_curve: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inflows: Option<String>,
}

impl CreateStStorage {
    pub fn new(area_id: &str, storage_name: &str) -> Self {
        Self {
            area_id: area_id.to_string(),
            storage_name: storage_name.to_string(),
            parameters: Map::new(),
            pmax_injection: None,
            pmax_withdrawal: None,
            lower_rule_curve: None,
            upper_rule_curve: None,
            inflows: None,
        }
    }

    pub fn storage_id(&self) -> String {
        name_to_id(&self.storage_name)
    }

    pub fn group(&self) -> String {
        self.parameters
            .get("group")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_STORAGE_GROUP)
            .to_string()
    }

    fn section(&self) -> Map<String, Value> {
        let mut section = cluster_section(&self.storage_name, &self.parameters);
        section.insert("group".into(), Value::String(self.group()));
        section
    }

    /// The five series in [`STORAGE_SERIES`] order.
    pub fn series(&self) -> [&Option<String>; 5] {
        [
            &self.pmax_injection,
            &self.pmax_withdrawal,
            &self.lower_rule_curve,
            &self.upper_rule_curve,
            &self.inflows,
        ]
    }

    pub(crate) fn series_mut(&mut self) -> [&mut Option<String>; 5] {
        [
            &mut self.pmax_injection,
            &mut self.pmax_withdrawal,
            &mut self.lower_rule_curve,
            &mut self.upper_rule_curve,
            &mut self.inflows,
        ]
    }

    pub(crate) fn default_series(constants: &MatrixConstants) -> [&str; 5] {
        [
            &constants.storage_ones,
            &constants.storage_ones,
            &constants.storage_zeros,
            &constants.storage_ones,
            &constants.storage_zeros,
        ]
    }
}

impl CommandOps for CreateStStorage {
    fn name(&self) -> CommandName {
        CommandName::CreateStStorage
    }

    fn validate(&self) -> CommandResult<()> {
        validate_name(&self.storage_name)?;
        Ok(())
    }

    fn update_config(&self, config: &mut StudyConfig) -> CommandResult<ExtraData> {
        let storage_id = self.storage_id();
        let area = config.areas.get_mut(&self.area_id).ok_or_else(|| {
            CommandError::failed(format!("Area '{}' does not exist", self.area_id))
        })?;
        if area.has_cluster(ClusterFamily::StStorage, &storage_id) {
            return Err(CommandError::failed(format!(
                "Short-term storage '{}' already exists in the area '{}'",
                self.storage_name, self.area_id
            )));
        }
        area.upsert_storage(StorageConfig {
            id: storage_id.clone(),
            name: self.storage_name.clone(),
            group: self.group(),
        });
        Ok(ExtraData::from([("storage_id".to_string(), storage_id)]))
    }

    fn apply_tree(
        &self,
        _config: &StudyConfig,
        tree: &mut dyn FileTree,
        ctx: &CommandContext,
    ) -> CommandResult<()> {
        let family = ClusterFamily::StStorage;
        let storage_id = self.storage_id();
        ensure_ini(tree, &family.list(&self.area_id))?;
        tree.save_at(
            TreeValue::Json(Value::Object(self.section())),
            &family.section(&self.area_id, &storage_id),
        )?;
        let defaults = Self::default_series(&ctx.constants);
        for ((file, series), default) in STORAGE_SERIES.iter().zip(self.series()).zip(defaults) {
            let matrix = series.as_deref().unwrap_or(default);
            save_matrix(
                tree,
                matrix,
                &layout::storage_series(&self.area_id, &storage_id, file),
            )?;
        }
        Ok(())
    }

    fn success_message(&self) -> String {
        format!(
            "Short-term storage '{}' added to area '{}'",
            self.storage_name, self.area_id
        )
    }

    fn signature_keys(&self) -> Vec<String> {
        vec![self.storage_name.clone(), self.area_id.clone()]
    }

    fn create_diff(&self, other: &Command) -> Vec<Command> {
        let Command::CreateStStorage(other) = other else {
            return Vec::new();
        };
        let storage_id = other.storage_id();
        let mut commands = vec![Command::UpdateConfig(UpdateConfig {
            target: ClusterFamily::StStorage.section(&other.area_id, &storage_id),
            data: Value::Object(other.section()),
        })];
        for ((file, mine), theirs) in STORAGE_SERIES.iter().zip(self.series()).zip(other.series()) {
            if mine != theirs
                && let Some(matrix) = theirs
            {
                commands.push(Command::ReplaceMatrix(ReplaceMatrix {
                    target: layout::storage_series(&other.area_id, &storage_id, file),
                    matrix: matrix.clone(),
                }));
            }
        }
        commands
    }

    fn inner_matrices(&self) -> Vec<String> {
        self.series().into_iter().flatten().cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveStStorage {
    pub area_id: String,
    pub storage_id: String,
}

impl CommandOps for RemoveStStorage {
    fn name(&self) -> CommandName {
        CommandName::RemoveStStorage
    }

    fn update_config(&self, config: &mut StudyConfig) -> CommandResult<ExtraData> {
        let area = config.areas.get_mut(&self.area_id).ok_or_else(|| {
            CommandError::failed(format!("Area '{}' does not exist", self.area_id))
        })?;
        if !area.remove_cluster(ClusterFamily::StStorage, &self.storage_id) {
            return Err(CommandError::failed(format!(
                "Short-term storage '{}' does not exist in the area '{}'",
                self.storage_id, self.area_id
            )));
        }
        Ok(ExtraData::new())
    }

    fn apply_tree(
        &self,
        _config: &StudyConfig,
        tree: &mut dyn FileTree,
        _ctx: &CommandContext,
    ) -> CommandResult<()> {
        let family = ClusterFamily::StStorage;
        tree.delete_at(&family.section(&self.area_id, &self.storage_id))?;
        tree.delete_if_exists(&family.series_dir(&self.area_id, &self.storage_id))?;
        Ok(())
    }

    fn success_message(&self) -> String {
        format!(
            "Short-term storage '{}' removed from area '{}'",
            self.storage_id, self.area_id
        )
    }

    fn signature_keys(&self) -> Vec<String> {
        vec![self.storage_id.clone(), self.area_id.clone()]
    }

    fn create_diff(&self, _other: &Command) -> Vec<Command> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CreateArea;
    use vs_study::FileStudy;

    #[test]
    fn storage_lifecycle_keeps_mirror_in_sync() {
        let (ctx, _) = CommandContext::in_memory(24).unwrap();
        let mut study = FileStudy::empty(820, "storage");
        assert!(Command::CreateArea(CreateArea::new("A")).apply(&mut study, &ctx).status);

        let mut create = CreateStStorage::new("a", "Battery");
        create
            .parameters
            .insert("group".into(), Value::String("Battery".into()));
        assert!(Command::CreateStStorage(create).apply(&mut study, &ctx).status);
        assert_eq!(study.config.areas["a"].st_storages[0].group, "Battery");
        assert!(study.tree.exists(&["input", "st-storage", "series", "a", "battery", "inflows"]));
        assert_eq!(StudyConfig::from_tree(&study.tree).unwrap(), study.config);

        let remove = Command::RemoveStStorage(RemoveStStorage {
            area_id: "a".into(),
            storage_id: "battery".into(),
        });
        assert!(remove.apply(&mut study, &ctx).status);
        assert!(study.config.areas["a"].st_storages.is_empty());
        vs_study::check_consistency(&study).unwrap();
    }

    #[test]
    fn inner_matrices_skip_defaults() {
        let mut create = CreateStStorage::new("a", "b");
        create.inflows = Some("m".into());
        assert_eq!(
            Command::CreateStStorage(create).get_inner_matrices(),
            vec!["m".to_string()]
        );
    }
}
