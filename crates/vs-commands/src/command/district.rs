use super::{Command, CommandOps, UpdateConfig};
use crate::common::{CommandName, DistrictBaseFilter, ExtraData};
use crate::context::CommandContext;
use crate::error::{CommandError, CommandResult};
use crate::utils::ensure_ini;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use vs_core::{name_to_id, validate_strict_name};
use vs_study::{DistrictSet, FileTree, StudyConfig, TreeValue, layout};

fn district_section(
    caption: &str,
    base_filter: DistrictBaseFilter,
    items: &[String],
    output: bool,
    comments: &str,
) -> Value {
    let key = match base_filter {
        DistrictBaseFilter::AddAll => "-",
        DistrictBaseFilter::RemoveAll => "+",
    };
    let mut section = Map::new();
    section.insert("caption".into(), json!(caption));
    section.insert("comments".into(), json!(comments));
    section.insert("output".into(), json!(output));
    section.insert("apply-filter".into(), json!(base_filter.as_str()));
    section.insert(key.into(), json!(items));
    Value::Object(section)
}

fn base_filter_of(set: &DistrictSet) -> DistrictBaseFilter {
    if set.inverted_set {
        DistrictBaseFilter::AddAll
    } else {
        DistrictBaseFilter::RemoveAll
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateDistrict {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_filter: Option<DistrictBaseFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_items: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl CreateDistrict {
    pub fn new(name: &str, items: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            base_filter: None,
            filter_items: Some(items.iter().map(|s| s.to_string()).collect()),
            output: None,
            comments: None,
        }
    }

    pub fn district_id(&self) -> String {
        name_to_id(&self.name)
    }

    fn section(&self) -> Value {
        district_section(
            &self.name,
            self.base_filter.unwrap_or(DistrictBaseFilter::RemoveAll),
            self.filter_items.as_deref().unwrap_or_default(),
            self.output.unwrap_or(true),
            self.comments.as_deref().unwrap_or_default(),
        )
    }
}

impl CommandOps for CreateDistrict {
    fn name(&self) -> CommandName {
        CommandName::CreateDistrict
    }

    fn validate(&self) -> CommandResult<()> {
        validate_strict_name(&self.name)?;
        Ok(())
    }

    fn update_config(&self, config: &mut StudyConfig) -> CommandResult<ExtraData> {
        let district_id = self.district_id();
        if config.sets.contains_key(&district_id) {
            return Err(CommandError::failed(format!(
                "District '{}' already exists and could not be created",
                self.name
            )));
        }
        config.sets.insert(
            district_id.clone(),
            DistrictSet {
                name: Some(self.name.clone()),
                inverted_set: self.base_filter == Some(DistrictBaseFilter::AddAll),
                areas: self.filter_items.clone().unwrap_or_default(),
                output: self.output.unwrap_or(true),
            },
        );
        Ok(ExtraData::from([("district_id".to_string(), district_id)]))
    }

    fn apply_tree(
        &self,
        _config: &StudyConfig,
        tree: &mut dyn FileTree,
        _ctx: &CommandContext,
    ) -> CommandResult<()> {
        ensure_ini(tree, layout::DISTRICTS)?;
        tree.save_at(
            TreeValue::Json(self.section()),
            &layout::district(&self.district_id()),
        )?;
        Ok(())
    }

    fn success_message(&self) -> String {
        format!("District '{}' created", self.name)
    }

    fn signature_keys(&self) -> Vec<String> {
        vec![self.name.clone()]
    }

    fn create_diff(&self, other: &Command) -> Vec<Command> {
        let Command::CreateDistrict(other) = other else {
            return Vec::new();
        };
        vec![Command::UpdateConfig(UpdateConfig {
            target: layout::district(&other.district_id()),
            data: other.section(),
        })]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveDistrict {
    pub id: String,
}

impl CommandOps for RemoveDistrict {
    fn name(&self) -> CommandName {
        CommandName::RemoveDistrict
    }

    fn update_config(&self, config: &mut StudyConfig) -> CommandResult<ExtraData> {
        if config.sets.remove(&self.id).is_none() {
            return Err(CommandError::failed(format!(
                "District '{}' does not exist",
                self.id
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
        tree.delete_at(&layout::district(&self.id))?;
        Ok(())
    }

    fn success_message(&self) -> String {
        format!("District '{}' deleted", self.id)
    }

    fn signature_keys(&self) -> Vec<String> {
        vec![self.id.clone()]
    }

    fn create_diff(&self, _other: &Command) -> Vec<Command> {
        Vec::new()
    }
}

/// Partial update of a district; omitted fields keep their value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateDistrict {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_filter: Option<DistrictBaseFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_items: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

impl UpdateDistrict {
    /// Fill fields this update leaves unset from an earlier update of the same district.
    pub fn inherit(&mut self, earlier: &UpdateDistrict) {
        if self.base_filter.is_none() {
            self.base_filter = earlier.base_filter;
        }
        if self.filter_items.is_none() {
            self.filter_items = earlier.filter_items.clone();
        }
        if self.output.is_none() {
            self.output = earlier.output;
        }
        if self.comments.is_none() {
            self.comments = earlier.comments.clone();
        }
    }

    fn updated(&self, current: &DistrictSet) -> DistrictSet {
        let inverted_set = match self.base_filter {
            Some(filter) => filter == DistrictBaseFilter::AddAll,
            None => current.inverted_set,
        };
        DistrictSet {
            name: current.name.clone(),
            inverted_set,
            areas: self
                .filter_items
                .clone()
                .unwrap_or_else(|| current.areas.clone()),
            output: self.output.unwrap_or(current.output),
        }
    }
}

impl From<&CreateDistrict> for UpdateDistrict {
    fn from(create: &CreateDistrict) -> Self {
        Self {
            id: create.district_id(),
            base_filter: Some(create.base_filter.unwrap_or(DistrictBaseFilter::RemoveAll)),
            filter_items: Some(create.filter_items.clone().unwrap_or_default()),
            output: Some(create.output.unwrap_or(true)),
            comments: Some(create.comments.clone().unwrap_or_default()),
        }
    }
}

impl CommandOps for UpdateDistrict {
    fn name(&self) -> CommandName {
        CommandName::UpdateDistrict
    }

    fn update_config(&self, config: &mut StudyConfig) -> CommandResult<ExtraData> {
        let current = config.sets.get(&self.id).ok_or_else(|| {
            CommandError::failed(format!("District '{}' does not exist", self.id))
        })?;
        let updated = self.updated(current);
        config.sets.insert(self.id.clone(), updated);
        Ok(ExtraData::new())
    }

    fn apply_tree(
        &self,
        config: &StudyConfig,
        tree: &mut dyn FileTree,
        _ctx: &CommandContext,
    ) -> CommandResult<()> {
        let current = config.sets.get(&self.id).ok_or_else(|| {
            CommandError::failed(format!("District '{}' does not exist", self.id))
        })?;
        let target = layout::district(&self.id);
        let comments = match &self.comments {
            Some(comments) => comments.clone(),
            None => tree
                .get_json(&vs_study::parse_path(&format!("{}/comments", target)))
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
        };
        let updated = self.updated(current);
        let caption = current.name.clone().unwrap_or_else(|| self.id.clone());
        tree.save_at(
            TreeValue::Json(district_section(
                &caption,
                base_filter_of(&updated),
                &updated.areas,
                updated.output,
                &comments,
            )),
            &target,
        )?;
        Ok(())
    }

    fn success_message(&self) -> String {
        format!("District '{}' updated", self.id)
    }

    fn signature_keys(&self) -> Vec<String> {
        vec![self.id.clone()]
    }

    fn create_diff(&self, other: &Command) -> Vec<Command> {
        vec![other.clone()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CreateArea;
    use vs_study::FileStudy;

    fn setup() -> (FileStudy, CommandContext) {
        let (ctx, _) = CommandContext::in_memory(24).unwrap();
        let mut study = FileStudy::empty(820, "districts");
        for area in ["A", "B"] {
            assert!(Command::CreateArea(CreateArea::new(area)).apply(&mut study, &ctx).status);
        }
        (study, ctx)
    }

    #[test]
    fn create_update_remove_district() {
        let (mut study, ctx) = setup();
        let create = Command::CreateDistrict(CreateDistrict::new("North", &["a"]));
        assert!(create.apply(&mut study, &ctx).status);
        assert_eq!(study.config.sets["north"].areas, vec!["a".to_string()]);
        vs_study::check_consistency(&study).unwrap();

        let update = Command::UpdateDistrict(UpdateDistrict {
            id: "north".into(),
            base_filter: Some(DistrictBaseFilter::AddAll),
            filter_items: Some(vec!["b".into()]),
            output: None,
            comments: None,
        });
        assert!(update.apply(&mut study, &ctx).status);
        let rebuilt = StudyConfig::from_tree(&study.tree).unwrap();
        assert_eq!(rebuilt.sets["north"], study.config.sets["north"]);
        assert!(study.config.sets["north"].inverted_set);

        let remove = Command::RemoveDistrict(RemoveDistrict { id: "north".into() });
        assert!(remove.apply(&mut study, &ctx).status);
        assert!(study.config.sets.is_empty());
    }

    #[test]
    fn removing_area_drops_district_membership() {
        let (mut study, ctx) = setup();
        let create = Command::CreateDistrict(CreateDistrict::new("All", &["a", "b"]));
        assert!(create.apply(&mut study, &ctx).status);
        let remove = Command::RemoveArea(crate::command::RemoveArea::new("a"));
        assert!(remove.apply(&mut study, &ctx).status);

        assert_eq!(study.config.sets["all"].areas, vec!["b".to_string()]);
        let rebuilt = StudyConfig::from_tree(&study.tree).unwrap();
        assert_eq!(rebuilt, study.config);
    }

    #[test]
    fn district_names_are_strict() {
        let bad = Command::CreateDistrict(CreateDistrict::new("north/east", &[]));
        assert!(bad.validate().is_err());
    }

    #[test]
    fn inherit_keeps_earlier_fields() {
        let earlier = UpdateDistrict {
            id: "d".into(),
            base_filter: None,
            filter_items: Some(vec!["a".into()]),
            output: Some(false),
            comments: None,
        };
        let mut later = UpdateDistrict {
            id: "d".into(),
            base_filter: None,
            filter_items: None,
            output: Some(true),
            comments: None,
        };
        later.inherit(&earlier);
        assert_eq!(later.filter_items, Some(vec!["a".to_string()]));
        assert_eq!(later.output, Some(true));
    }
}
