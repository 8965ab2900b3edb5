//! Synthesise the commands that would have produced a piece of existing study state.
//!
//! Extraction reads the real tree, so it only works while the base study is
//! materialised. It is the fallback when history holds no earlier command.

use crate::command::{
    Command, CreateArea, CreateBindingConstraint, CreateCluster, CreateDistrict, CreateLink,
    CreateRenewablesCluster, CreateStStorage, ReplaceMatrix, UpdateBindingConstraint,
    UpdateComments, UpdateConfig, UpdateDistrict, UpdateFile, UpdatePlaylist,
};
use crate::command::{Coefficients, STORAGE_SERIES, parse_term_value};
use crate::common::{BindingConstraintOperator, DistrictBaseFilter, TimeStep};
use crate::context::CommandContext;
use crate::error::{CommandError, CommandResult};
use crate::utils::{binding_sections, read_matrix_id, section_id};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use vs_core::name_to_id;
use vs_study::config::{is_binding_term, json_bool, json_str_list};
use vs_study::{ClusterFamily, FileStudy, FileTree, StudyConfig, TreeError, TreeValue, layout, parse_path};

fn not_found(target: &str) -> CommandError {
    CommandError::ChildNotFound {
        path: target.to_string(),
    }
}

/// A display name that maps back to `id`, falling back to the id itself.
fn name_for_id(name: Option<&str>, id: &str) -> String {
    match name {
        Some(name) if name_to_id(name) == id => name.to_string(),
        _ => id.to_string(),
    }
}

fn get_section(tree: &dyn FileTree, target: &str) -> CommandResult<Map<String, Value>> {
    match tree.get_json(&parse_path(target))? {
        Value::Object(section) => Ok(section),
        _ => Err(CommandError::failed(format!(
            "Study node at path {} is not a section",
            target
        ))),
    }
}

fn optional_matrix(
    tree: &dyn FileTree,
    target: &str,
    ctx: &CommandContext,
) -> CommandResult<Option<String>> {
    match read_matrix_id(tree, target, ctx) {
        Ok(id) => Ok(Some(id)),
        Err(e) if e.is_child_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

pub struct CommandExtractor<'a> {
    ctx: &'a CommandContext,
}

impl<'a> CommandExtractor<'a> {
    pub fn new(ctx: &'a CommandContext) -> Self {
        Self { ctx }
    }

    /// Commands rebuilding a whole study on top of the empty template.
    pub fn extract_study<T: FileTree>(&self, study: &FileStudy<T>) -> CommandResult<Vec<Command>> {
        let config = &study.config;
        let tree: &dyn FileTree = &study.tree;
        let mut commands = Vec::new();

        for area_id in config.areas.keys() {
            commands.extend(self.extract_area(config, tree, area_id)?);
        }
        for (from, area) in &config.areas {
            for to in area.links.keys() {
                commands.extend(self.extract_link(tree, from, to)?);
            }
        }
        for district_id in config.sets.keys() {
            commands.extend(self.extract_district(config, tree, district_id)?);
        }
        for binding_id in config.bindings.keys() {
            commands.extend(self.extract_binding_constraint(tree, binding_id)?);
        }
        match self.generate_update_comments(tree) {
            Ok(command) => commands.push(command),
            Err(e) if e.is_child_not_found() => {}
            Err(e) => return Err(e),
        }
        tracing::debug!(count = commands.len(), "extracted study commands");
        Ok(commands)
    }

    pub fn extract_area(
        &self,
        config: &StudyConfig,
        tree: &dyn FileTree,
        area_id: &str,
    ) -> CommandResult<Vec<Command>> {
        let area = config
            .areas
            .get(area_id)
            .ok_or_else(|| not_found(&layout::area_dir(area_id)))?;
        let mut commands = vec![Command::CreateArea(CreateArea {
            area_name: name_for_id(Some(&area.name), area_id),
        })];

        for target in [layout::area_optimization(area_id), layout::area_ui(area_id)] {
            match self.generate_update_config(tree, &target) {
                Ok(command) => commands.push(command),
                Err(e) if e.is_child_not_found() => {}
                Err(e) => return Err(e),
            }
        }

        let mut series: Vec<String> = layout::AREA_SERIES_KINDS
            .iter()
            .map(|kind| layout::area_series(kind, area_id))
            .collect();
        series.push(layout::area_misc_gen(area_id));
        series.push(layout::area_reserves(area_id));
        for target in series {
            if let Some(matrix) = optional_matrix(tree, &target, self.ctx)? {
                commands.push(Command::ReplaceMatrix(ReplaceMatrix { target, matrix }));
            }
        }

        for cluster in &area.thermals {
            commands.extend(self.extract_cluster(tree, area_id, &cluster.id)?);
        }
        for cluster in &area.renewables {
            commands.extend(self.extract_renewables_cluster(tree, area_id, &cluster.id)?);
        }
        for storage in &area.st_storages {
            commands.push(self.extract_st_storage(tree, area_id, &storage.id)?);
        }
        Ok(commands)
    }

    pub fn extract_link(
        &self,
        tree: &dyn FileTree,
        area1: &str,
        area2: &str,
    ) -> CommandResult<Vec<Command>> {
        let (from, to) = vs_core::link_ends(area1, area2);
        let parameters = get_section(tree, &layout::link_properties(from, to))?;
        let series = optional_matrix(tree, &layout::link_series(from, to), self.ctx)?;
        Ok(vec![Command::CreateLink(CreateLink {
            area1: from.to_string(),
            area2: to.to_string(),
            parameters: Some(parameters),
            series,
        })])
    }

    fn cluster_parts(
        &self,
        tree: &dyn FileTree,
        family: ClusterFamily,
        area_id: &str,
        cluster_id: &str,
    ) -> CommandResult<(String, Map<String, Value>)> {
        let mut parameters = get_section(tree, &family.section(area_id, cluster_id))?;
        let name = parameters.remove("name");
        Ok((
            name_for_id(name.as_ref().and_then(Value::as_str), cluster_id),
            parameters,
        ))
    }

    pub fn extract_cluster(
        &self,
        tree: &dyn FileTree,
        area_id: &str,
        cluster_id: &str,
    ) -> CommandResult<Vec<Command>> {
        let family = ClusterFamily::Thermal;
        let (cluster_name, parameters) = self.cluster_parts(tree, family, area_id, cluster_id)?;
        let mut commands = vec![Command::CreateCluster(CreateCluster {
            area_id: area_id.to_string(),
            cluster_name,
            parameters,
            prepro: optional_matrix(tree, &layout::thermal_prepro(area_id, cluster_id), self.ctx)?,
            modulation: optional_matrix(
                tree,
                &layout::thermal_modulation(area_id, cluster_id),
                self.ctx,
            )?,
        })];
        let series = layout::cluster_series(family, area_id, cluster_id);
        if let Some(matrix) = optional_matrix(tree, &series, self.ctx)? {
            commands.push(Command::ReplaceMatrix(ReplaceMatrix {
                target: series,
                matrix,
            }));
        }
        Ok(commands)
    }

    pub fn extract_renewables_cluster(
        &self,
        tree: &dyn FileTree,
        area_id: &str,
        cluster_id: &str,
    ) -> CommandResult<Vec<Command>> {
        let family = ClusterFamily::Renewables;
        let (cluster_name, parameters) = self.cluster_parts(tree, family, area_id, cluster_id)?;
        let mut commands = vec![Command::CreateRenewablesCluster(CreateRenewablesCluster {
            area_id: area_id.to_string(),
            cluster_name,
            parameters,
        })];
        let series = layout::cluster_series(family, area_id, cluster_id);
        if let Some(matrix) = optional_matrix(tree, &series, self.ctx)? {
            commands.push(Command::ReplaceMatrix(ReplaceMatrix {
                target: series,
                matrix,
            }));
        }
        Ok(commands)
    }

    pub fn extract_st_storage(
        &self,
        tree: &dyn FileTree,
        area_id: &str,
        storage_id: &str,
    ) -> CommandResult<Command> {
        let (storage_name, parameters) =
            self.cluster_parts(tree, ClusterFamily::StStorage, area_id, storage_id)?;
        let mut create = CreateStStorage::new(area_id, &storage_name);
        create.parameters = parameters;
        for (file, slot) in STORAGE_SERIES.iter().zip(create.series_mut()) {
            *slot = optional_matrix(
                tree,
                &layout::storage_series(area_id, storage_id, file),
                self.ctx,
            )?;
        }
        Ok(Command::CreateStStorage(create))
    }

    pub fn extract_district(
        &self,
        config: &StudyConfig,
        tree: &dyn FileTree,
        district_id: &str,
    ) -> CommandResult<Vec<Command>> {
        let set = config
            .sets
            .get(district_id)
            .ok_or_else(|| not_found(&layout::district(district_id)))?;
        let comments = get_section(tree, &layout::district(district_id))?
            .get("comments")
            .and_then(Value::as_str)
            .map(str::to_string);
        Ok(vec![Command::CreateDistrict(CreateDistrict {
            name: name_for_id(set.name.as_deref(), district_id),
            base_filter: Some(if set.inverted_set {
                DistrictBaseFilter::AddAll
            } else {
                DistrictBaseFilter::RemoveAll
            }),
            filter_items: Some(set.areas.clone()),
            output: Some(set.output),
            comments,
        })])
    }

    pub fn generate_update_district(
        &self,
        tree: &dyn FileTree,
        district_id: &str,
    ) -> CommandResult<Command> {
        let section = get_section(tree, &layout::district(district_id))?;
        let inverted = section.get("apply-filter").and_then(Value::as_str) == Some("add-all");
        let items = if inverted {
            json_str_list(section.get("-"))
        } else {
            json_str_list(section.get("+"))
        };
        Ok(Command::UpdateDistrict(UpdateDistrict {
            id: district_id.to_string(),
            base_filter: Some(if inverted {
                DistrictBaseFilter::AddAll
            } else {
                DistrictBaseFilter::RemoveAll
            }),
            filter_items: Some(items),
            output: Some(json_bool(section.get("output"), true)),
            comments: Some(
                section
                    .get("comments")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            ),
        }))
    }

    fn binding_parts(&self, tree: &dyn FileTree, binding_id: &str) -> CommandResult<BindingParts> {
        let section = binding_sections(tree)?
            .into_iter()
            .map(|(_, section)| section)
            .find(|section| section_id(section) == Some(binding_id))
            .ok_or_else(|| not_found(&format!("{}/{}", layout::BINDING_CONSTRAINTS, binding_id)))?;
        let text = |key: &str| section.get(key).and_then(Value::as_str).map(str::to_string);

        let coeffs: Coefficients = section
            .iter()
            .filter(|(key, _)| is_binding_term(key))
            .filter_map(|(key, value)| parse_term_value(value).map(|v| (key.clone(), v)))
            .collect();

        Ok(BindingParts {
            name: text("name").unwrap_or_else(|| binding_id.to_string()),
            enabled: json_bool(section.get("enabled"), true),
            time_step: text("type")
                .and_then(|t| TimeStep::parse(&t))
                .unwrap_or(TimeStep::Hourly),
            operator: text("operator")
                .and_then(|o| BindingConstraintOperator::parse(&o))
                .unwrap_or(BindingConstraintOperator::Equal),
            coeffs,
            values: optional_matrix(
                tree,
                &layout::binding_constraint_series(binding_id),
                self.ctx,
            )?,
            comments: text("comments"),
            filter_year_by_year: text("filter-year-by-year"),
            filter_synthesis: text("filter-synthesis"),
        })
    }

    pub fn extract_binding_constraint(
        &self,
        tree: &dyn FileTree,
        binding_id: &str,
    ) -> CommandResult<Vec<Command>> {
        let parts = self.binding_parts(tree, binding_id)?;
        Ok(vec![Command::CreateBindingConstraint(CreateBindingConstraint {
            name: name_for_id(Some(&parts.name), binding_id),
            enabled: parts.enabled,
            time_step: parts.time_step,
            operator: parts.operator,
            coeffs: parts.coeffs,
            values: parts.values,
            comments: parts.comments,
            filter_year_by_year: parts.filter_year_by_year,
            filter_synthesis: parts.filter_synthesis,
        })])
    }

    pub fn generate_update_binding_constraint(
        &self,
        tree: &dyn FileTree,
        binding_id: &str,
    ) -> CommandResult<Command> {
        let parts = self.binding_parts(tree, binding_id)?;
        Ok(Command::UpdateBindingConstraint(UpdateBindingConstraint {
            id: binding_id.to_string(),
            enabled: parts.enabled,
            time_step: parts.time_step,
            operator: parts.operator,
            coeffs: parts.coeffs,
            values: parts.values,
            comments: parts.comments,
            filter_year_by_year: parts.filter_year_by_year,
            filter_synthesis: parts.filter_synthesis,
        }))
    }

    pub fn generate_update_config(&self, tree: &dyn FileTree, target: &str) -> CommandResult<Command> {
        let data = tree.get_json(&parse_path(target))?;
        Ok(Command::UpdateConfig(UpdateConfig {
            target: target.to_string(),
            data,
        }))
    }

    pub fn generate_replace_matrix(&self, tree: &dyn FileTree, target: &str) -> CommandResult<Command> {
        Ok(Command::ReplaceMatrix(ReplaceMatrix {
            target: target.to_string(),
            matrix: read_matrix_id(tree, target, self.ctx)?,
        }))
    }

    pub fn generate_update_comments(&self, tree: &dyn FileTree) -> CommandResult<Command> {
        match tree.get_at(layout::COMMENTS)? {
            TreeValue::Raw(bytes) => Ok(Command::UpdateComments(UpdateComments {
                comments: String::from_utf8_lossy(&bytes).into_owned(),
            })),
            other => Err(TreeError::type_mismatch(
                &parse_path(layout::COMMENTS),
                format!("expected a raw file, found {}", other.kind_name()),
            )
            .into()),
        }
    }

    pub fn generate_update_rawfile(&self, tree: &dyn FileTree, target: &str) -> CommandResult<Command> {
        match tree.get_at(target)? {
            TreeValue::Raw(bytes) => Ok(Command::UpdateFile(UpdateFile {
                target: target.to_string(),
                b64_data: bytes,
            })),
            other => Err(TreeError::type_mismatch(
                &parse_path(target),
                format!("expected a raw file, found {}", other.kind_name()),
            )
            .into()),
        }
    }

    pub fn generate_update_playlist(&self, tree: &dyn FileTree) -> CommandResult<Command> {
        let data = tree.get_json(&parse_path(layout::GENERAL_DATA))?;
        let active = json_bool(data.pointer("/general/user-playlist"), false);
        let playlist = data.get("playlist");
        let reverse = json_bool(playlist.and_then(|p| p.get("playlist_reset")), false);
        let key = if reverse {
            "playlist_year -"
        } else {
            "playlist_year +"
        };
        let items = playlist.and_then(|p| p.get(key)).map(|v| match v {
            Value::Array(years) => years
                .iter()
                .filter_map(Value::as_u64)
                .filter_map(|y| u32::try_from(y).ok())
                .collect(),
            _ => Vec::new(),
        });
        let weights = playlist
            .and_then(|p| p.get("playlist_year_weight"))
            .map(|w| {
                json_str_list(Some(w))
                    .iter()
                    .filter_map(|entry| {
                        let (year, weight) = entry.split_once(',')?;
                        Some((year.trim().to_string(), weight.trim().parse::<f64>().ok()?))
                    })
                    .collect::<BTreeMap<String, f64>>()
            });
        Ok(Command::UpdatePlaylist(UpdatePlaylist {
            active,
            items: if active { items } else { None },
            weights: if active { weights } else { None },
            reverse,
        }))
    }
}

struct BindingParts {
    name: String,
    enabled: bool,
    time_step: TimeStep,
    operator: BindingConstraintOperator,
    coeffs: Coefficients,
    values: Option<String>,
    comments: Option<String>,
    filter_year_by_year: Option<String>,
    filter_synthesis: Option<String>,
}
