//! Overwrite-style commands addressing a single tree node.

use super::{Command, CommandOps};
use crate::common::{CommandName, ExtraData};
use crate::context::CommandContext;
use crate::error::{CommandError, CommandResult};
use crate::utils::{base64_bytes, read_ini_or_empty, save_matrix};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use vs_study::{FileTree, NodeKind, StudyConfig, TreeValue, layout, parse_path};

fn expect_node(tree: &dyn FileTree, target: &str, kind: NodeKind) -> CommandResult<()> {
    match tree.get_node(&parse_path(target)) {
        Ok(found) if found == kind => Ok(()),
        Ok(_) => Err(CommandError::failed(format!(
            "Study node at path {} is invalid",
            target
        ))),
        Err(e) if e.is_child_not_found() => Err(CommandError::failed(format!(
            "Path '{}' does not exist",
            target
        ))),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaceMatrix {
    pub target: String,
    pub matrix: String,
}

impl CommandOps for ReplaceMatrix {
    fn name(&self) -> CommandName {
        CommandName::ReplaceMatrix
    }

    fn update_config(&self, _config: &mut StudyConfig) -> CommandResult<ExtraData> {
        Ok(ExtraData::new())
    }

    fn apply_tree(
        &self,
        _config: &StudyConfig,
        tree: &mut dyn FileTree,
        _ctx: &CommandContext,
    ) -> CommandResult<()> {
        expect_node(tree, &self.target, NodeKind::Matrix)?;
        save_matrix(tree, &self.matrix, &self.target)
    }

    fn success_message(&self) -> String {
        format!("Matrix '{}' has been successfully replaced.", self.target)
    }

    fn signature_keys(&self) -> Vec<String> {
        vec![self.target.clone()]
    }

    fn create_diff(&self, other: &Command) -> Vec<Command> {
        vec![other.clone()]
    }

    fn inner_matrices(&self) -> Vec<String> {
        vec![self.matrix.clone()]
    }
}

/// Overwrite an ini file, section or key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateConfig {
    pub target: String,
    pub data: Value,
}

impl CommandOps for UpdateConfig {
    fn name(&self) -> CommandName {
        CommandName::UpdateConfig
    }

    fn update_config(&self, _config: &mut StudyConfig) -> CommandResult<ExtraData> {
        Ok(ExtraData::new())
    }

    fn apply_tree(
        &self,
        _config: &StudyConfig,
        tree: &mut dyn FileTree,
        _ctx: &CommandContext,
    ) -> CommandResult<()> {
        expect_node(tree, &self.target, NodeKind::Ini)?;
        tree.save_at(TreeValue::Json(self.data.clone()), &self.target)?;
        Ok(())
    }

    fn success_message(&self) -> String {
        format!("Study node at path {} updated", self.target)
    }

    fn signature_keys(&self) -> Vec<String> {
        vec![self.target.clone()]
    }

    fn create_diff(&self, other: &Command) -> Vec<Command> {
        vec![other.clone()]
    }

    fn resyncs_mirror(&self) -> bool {
        self.target.starts_with("input/") || self.target.starts_with(layout::STUDY_INI)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateComments {
    pub comments: String,
}

impl CommandOps for UpdateComments {
    fn name(&self) -> CommandName {
        CommandName::UpdateComments
    }

    fn update_config(&self, _config: &mut StudyConfig) -> CommandResult<ExtraData> {
        Ok(ExtraData::new())
    }

    fn apply_tree(
        &self,
        _config: &StudyConfig,
        tree: &mut dyn FileTree,
        _ctx: &CommandContext,
    ) -> CommandResult<()> {
        tree.save_at(
            TreeValue::Raw(self.comments.as_bytes().to_vec()),
            layout::COMMENTS,
        )?;
        Ok(())
    }

    fn success_message(&self) -> String {
        "Comments updated".to_string()
    }

    fn create_diff(&self, other: &Command) -> Vec<Command> {
        vec![other.clone()]
    }
}

/// Replace the bytes of a raw (non-ini, non-matrix) file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateFile {
    pub target: String,
    #[serde(with = "base64_bytes")]
    pub b64_data: Vec<u8>,
}

impl CommandOps for UpdateFile {
    fn name(&self) -> CommandName {
        CommandName::UpdateFile
    }

    fn update_config(&self, _config: &mut StudyConfig) -> CommandResult<ExtraData> {
        Ok(ExtraData::new())
    }

    fn apply_tree(
        &self,
        _config: &StudyConfig,
        tree: &mut dyn FileTree,
        _ctx: &CommandContext,
    ) -> CommandResult<()> {
        expect_node(tree, &self.target, NodeKind::Raw)?;
        tree.save_at(TreeValue::Raw(self.b64_data.clone()), &self.target)?;
        Ok(())
    }

    fn success_message(&self) -> String {
        format!("File '{}' updated", self.target)
    }

    fn signature_keys(&self) -> Vec<String> {
        vec![self.target.clone()]
    }

    fn create_diff(&self, other: &Command) -> Vec<Command> {
        vec![other.clone()]
    }
}

/// Select the Monte-Carlo years to simulate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePlaylist {
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<u32>>,
    /// Year (as a string key) to weight.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<BTreeMap<String, f64>>,
    /// When set, `items` lists the excluded years instead of the included ones.
    #[serde(default)]
    pub reverse: bool,
}

const PLAYLIST_SECTION: &str = "playlist";

impl UpdatePlaylist {
    fn playlist_section(&self) -> Value {
        let mut section = Map::new();
        section.insert("playlist_reset".into(), json!(self.reverse));
        let key = if self.reverse {
            "playlist_year -"
        } else {
            "playlist_year +"
        };
        section.insert(key.into(), json!(self.items.clone().unwrap_or_default()));
        if let Some(weights) = &self.weights {
            let weights: Vec<String> = weights
                .iter()
                .map(|(year, weight)| format!("{},{}", year, weight))
                .collect();
            section.insert("playlist_year_weight".into(), json!(weights));
        }
        Value::Object(section)
    }
}

impl CommandOps for UpdatePlaylist {
    fn name(&self) -> CommandName {
        CommandName::UpdatePlaylist
    }

    fn update_config(&self, _config: &mut StudyConfig) -> CommandResult<ExtraData> {
        Ok(ExtraData::new())
    }

    fn apply_tree(
        &self,
        _config: &StudyConfig,
        tree: &mut dyn FileTree,
        _ctx: &CommandContext,
    ) -> CommandResult<()> {
        let mut data = read_ini_or_empty(tree, layout::GENERAL_DATA)?;
        let general = data
            .entry("general")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(general) = general {
            general.insert("user-playlist".into(), json!(self.active));
        }
        if self.active {
            data.insert(PLAYLIST_SECTION.into(), self.playlist_section());
        } else {
            data.remove(PLAYLIST_SECTION);
        }
        tree.save_at(TreeValue::Json(Value::Object(data)), layout::GENERAL_DATA)?;
        Ok(())
    }

    fn success_message(&self) -> String {
        "Playlist updated".to_string()
    }

    fn create_diff(&self, other: &Command) -> Vec<Command> {
        vec![other.clone()]
    }
}

/// Patch scenario-builder rulesets; a `null` value removes the rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateScenarioBuilder {
    pub data: Map<String, Value>,
}

impl CommandOps for UpdateScenarioBuilder {
    fn name(&self) -> CommandName {
        CommandName::UpdateScenarioBuilder
    }

    fn validate(&self) -> CommandResult<()> {
        match self.data.iter().find(|(_, rules)| !rules.is_object()) {
            Some((ruleset, _)) => Err(CommandError::validation(format!(
                "Ruleset '{}' must be an object of rules",
                ruleset
            ))),
            None => Ok(()),
        }
    }

    fn update_config(&self, _config: &mut StudyConfig) -> CommandResult<ExtraData> {
        Ok(ExtraData::new())
    }

    fn apply_tree(
        &self,
        _config: &StudyConfig,
        tree: &mut dyn FileTree,
        _ctx: &CommandContext,
    ) -> CommandResult<()> {
        let mut rulesets = read_ini_or_empty(tree, layout::SCENARIO_BUILDER)?;
        for (ruleset, rules) in &self.data {
            let Value::Object(rules) = rules else {
                continue;
            };
            let current = rulesets
                .entry(ruleset.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(current) = current {
                for (key, value) in rules {
                    if value.is_null() {
                        current.remove(key);
                    } else {
                        current.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        tree.save_at(
            TreeValue::Json(Value::Object(rulesets)),
            layout::SCENARIO_BUILDER,
        )?;
        Ok(())
    }

    fn success_message(&self) -> String {
        "Scenario builder updated".to_string()
    }

    fn create_diff(&self, other: &Command) -> Vec<Command> {
        vec![other.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vs_study::FileStudy;

    fn setup() -> (FileStudy, CommandContext) {
        let (ctx, _) = CommandContext::in_memory(24).unwrap();
        (FileStudy::empty(820, "updates"), ctx)
    }

    #[test]
    fn update_config_requires_ini_target() {
        let (mut study, ctx) = setup();
        let ok = Command::UpdateConfig(UpdateConfig {
            target: "settings/generaldata/general/nbyears".into(),
            data: json!(5),
        });
        assert!(ok.apply(&mut study, &ctx).status);
        assert_eq!(
            study.tree.get_at("settings/generaldata/general/nbyears").unwrap(),
            TreeValue::Json(json!(5))
        );

        let bad = Command::UpdateConfig(UpdateConfig {
            target: "settings/comments".into(),
            data: json!({}),
        });
        let out = bad.apply(&mut study, &ctx);
        assert!(!out.status);
        assert_eq!(out.message, "Study node at path settings/comments is invalid");
    }

    #[test]
    fn replace_matrix_requires_existing_matrix() {
        let (mut study, ctx) = setup();
        let cmd = Command::ReplaceMatrix(ReplaceMatrix {
            target: "input/links/a/b".into(),
            matrix: ctx.constants.null_matrix.clone(),
        });
        let out = cmd.apply(&mut study, &ctx);
        assert!(!out.status);
        assert_eq!(out.message, "Path 'input/links/a/b' does not exist");
    }

    #[test]
    fn comments_and_raw_files() {
        let (mut study, ctx) = setup();
        assert!(
            Command::UpdateComments(UpdateComments { comments: "hello".into() })
                .apply(&mut study, &ctx)
                .status
        );
        let file = Command::UpdateFile(UpdateFile {
            target: "settings/comments".into(),
            b64_data: b"bytes".to_vec(),
        });
        assert!(file.apply(&mut study, &ctx).status);
        assert_eq!(
            study.tree.get_at("settings/comments").unwrap(),
            TreeValue::Raw(b"bytes".to_vec())
        );
        assert_eq!(file.args().unwrap()["b64_data"], json!("Ynl0ZXM="));
    }

    #[test]
    fn playlist_toggles_section() {
        let (mut study, ctx) = setup();
        let on = Command::UpdatePlaylist(UpdatePlaylist {
            active: true,
            items: Some(vec![0, 2]),
            weights: Some(BTreeMap::from([("2".to_string(), 0.5)])),
            reverse: false,
        });
        assert!(on.apply(&mut study, &ctx).status);
        let playlist = study.tree.get_json(&["settings", "generaldata", "playlist"]).unwrap();
        assert_eq!(playlist["playlist_year +"], json!([0, 2]));
        assert_eq!(playlist["playlist_year_weight"], json!(["2,0.5"]));

        let off = Command::UpdatePlaylist(UpdatePlaylist {
            active: false,
            items: None,
            weights: None,
            reverse: false,
        });
        assert!(off.apply(&mut study, &ctx).status);
        assert!(!study.tree.exists(&["settings", "generaldata", "playlist"]));
        assert_eq!(
            study
                .tree
                .get_json(&["settings", "generaldata", "general", "user-playlist"])
                .unwrap(),
            json!(false)
        );
    }

    #[test]
    fn scenario_builder_merges_and_deletes_rules() {
        let (mut study, ctx) = setup();
        let set = Command::UpdateScenarioBuilder(UpdateScenarioBuilder {
            data: match json!({"Default Ruleset": {"l,a,0": 1, "l,b,0": 2}}) {
                Value::Object(m) => m,
                _ => unreachable!(),
            },
        });
        assert!(set.apply(&mut study, &ctx).status);
        let unset = Command::UpdateScenarioBuilder(UpdateScenarioBuilder {
            data: match json!({"Default Ruleset": {"l,a,0": null}}) {
                Value::Object(m) => m,
                _ => unreachable!(),
            },
        });
        assert!(unset.apply(&mut study, &ctx).status);
        assert_eq!(
            study.tree.get_json(&["settings", "scenariobuilder", "Default Ruleset"]).unwrap(),
            json!({"l,b,0": 2})
        );
    }

    #[test]
    fn update_config_resyncs_mirror_for_inputs() {
        let (mut study, ctx) = setup();
        assert!(
            Command::CreateArea(crate::command::CreateArea::new("A"))
                .apply(&mut study, &ctx)
                .status
        );
        let cmd = Command::UpdateConfig(UpdateConfig {
            target: "input/areas/a/ui/ui/name".into(),
            data: json!("Renamed"),
        });
        assert!(cmd.apply(&mut study, &ctx).status);
        assert_eq!(study.config.areas["a"].name, "Renamed");
    }
}
