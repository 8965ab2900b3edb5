//! Binding constraints: linear constraints over link flows and cluster outputs.

use super::{Command, CommandOps};
use crate::common::{BindingConstraintOperator, CommandName, ExtraData, TimeStep};
use crate::context::CommandContext;
use crate::error::{CommandError, CommandResult};
use crate::utils::{
    binding_sections, ensure_ini, next_binding_key, remove_binding_constraints, save_matrix,
    section_id,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};
use vs_core::{name_to_id, validate_name};
use vs_study::{BindingConstraintConfig, ClusterFamily, FileTree, StudyConfig, TreeValue, layout};

/// Term key (`area1%area2` or `area.cluster`) to weight, optionally followed by an offset.
pub type Coefficients = BTreeMap<String, Vec<f64>>;

fn validate_coeffs(coeffs: &Coefficients) -> CommandResult<()> {
    for (term, values) in coeffs {
        if values.is_empty() || values.len() > 2 {
            return Err(CommandError::validation(format!(
                "Term '{}' must have a weight and an optional offset",
                term
            )));
        }
    }
    Ok(())
}

fn check_terms(config: &StudyConfig, coeffs: &Coefficients) -> CommandResult<()> {
    for term in coeffs.keys() {
        if let Some((area1, area2)) = term.split_once('%') {
            if !config.has_link(area1, area2) {
                return Err(CommandError::failed(format!(
                    "Link '{}' does not exist",
                    term
                )));
            }
        } else if let Some((area, cluster)) = term.split_once('.') {
            let exists = config
                .areas
                .get(area)
                .is_some_and(|a| a.has_cluster(ClusterFamily::Thermal, cluster));
            if !exists {
                return Err(CommandError::failed(format!(
                    "Cluster '{}' does not exist",
                    term
                )));
            }
        } else {
            return Err(CommandError::failed(format!(
                "Invalid binding constraint term '{}'",
                term
            )));
        }
    }
    Ok(())
}

fn term_value(values: &[f64]) -> Value {
    match values {
        [weight] => json!(weight),
        [weight, offset, ..] => Value::String(format!("{}%{}", weight, offset)),
        [] => json!(0.0),
    }
}

/// Parse a term value back into `[weight]` or `[weight, offset]`.
pub fn parse_term_value(value: &Value) -> Option<Vec<f64>> {
    match value {
        Value::Number(n) => n.as_f64().map(|w| vec![w]),
        Value::String(s) => match s.split_once('%') {
            Some((w, o)) => Some(vec![w.trim().parse().ok()?, o.trim().parse().ok()?]),
            None => s.trim().parse().ok().map(|w| vec![w]),
        },
        _ => None,
    }
}

struct BindingSection<'a> {
    id: &'a str,
    name: &'a str,
    enabled: bool,
    time_step: TimeStep,
    operator: BindingConstraintOperator,
    coeffs: &'a Coefficients,
    comments: Option<&'a str>,
    filter_year_by_year: Option<&'a str>,
    filter_synthesis: Option<&'a str>,
}

impl BindingSection<'_> {
    fn to_json(&self) -> Value {
        let mut section = Map::new();
        section.insert("id".into(), json!(self.id));
        section.insert("name".into(), json!(self.name));
        section.insert("enabled".into(), json!(self.enabled));
        section.insert("type".into(), json!(self.time_step.as_str()));
        section.insert("operator".into(), json!(self.operator.as_str()));
        if let Some(comments) = self.comments {
            section.insert("comments".into(), json!(comments));
        }
        if let Some(filter) = self.filter_year_by_year {
            section.insert("filter-year-by-year".into(), json!(filter));
        }
        if let Some(filter) = self.filter_synthesis {
            section.insert("filter-synthesis".into(), json!(filter));
        }
        for (term, values) in self.coeffs {
            section.insert(term.clone(), term_value(values));
        }
        Value::Object(section)
    }

    fn save(&self, tree: &mut dyn FileTree, key: &str) -> CommandResult<()> {
        ensure_ini(tree, layout::BINDING_CONSTRAINTS)?;
        tree.save_at(
            TreeValue::Json(self.to_json()),
            &format!("{}/{}", layout::BINDING_CONSTRAINTS, key),
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateBindingConstraint {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub time_step: TimeStep,
    pub operator: BindingConstraintOperator,
    #[serde(default)]
    pub coeffs: Coefficients,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_year_by_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_synthesis: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl CreateBindingConstraint {
    pub fn new(
        name: &str,
        time_step: TimeStep,
        operator: BindingConstraintOperator,
        coeffs: Coefficients,
    ) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            time_step,
            operator,
            coeffs,
            values: None,
            comments: None,
            filter_year_by_year: None,
            filter_synthesis: None,
        }
    }

    pub fn constraint_id(&self) -> String {
        name_to_id(&self.name)
    }
}

impl CommandOps for CreateBindingConstraint {
    fn name(&self) -> CommandName {
        CommandName::CreateBindingConstraint
    }

    fn validate(&self) -> CommandResult<()> {
        validate_name(&self.name)?;
        validate_coeffs(&self.coeffs)
    }

    fn update_config(&self, config: &mut StudyConfig) -> CommandResult<ExtraData> {
        let id = self.constraint_id();
        if config.binding(&id).is_some() {
            return Err(CommandError::failed(format!(
                "Binding constraint '{}' already exists",
                self.name
            )));
        }
        check_terms(config, &self.coeffs)?;
        config.insert_binding(BindingConstraintConfig::from_terms(
            &id,
            self.coeffs.keys().map(String::as_str),
        ));
        Ok(ExtraData::from([("binding_id".to_string(), id)]))
    }

    fn apply_tree(
        &self,
        _config: &StudyConfig,
        tree: &mut dyn FileTree,
        ctx: &CommandContext,
    ) -> CommandResult<()> {
        let id = self.constraint_id();
        let key = next_binding_key(&binding_sections(tree)?);
        BindingSection {
            id: &id,
            name: &self.name,
            enabled: self.enabled,
            time_step: self.time_step,
            operator: self.operator,
            coeffs: &self.coeffs,
            comments: self.comments.as_deref(),
            filter_year_by_year: self.filter_year_by_year.as_deref(),
            filter_synthesis: self.filter_synthesis.as_deref(),
        }
        .save(tree, &key)?;
        let values = self
            .values
            .as_deref()
            .unwrap_or(ctx.constants.binding_series(self.time_step));
        save_matrix(tree, values, &layout::binding_constraint_series(&id))
    }

    fn success_message(&self) -> String {
        format!("Binding constraint '{}' created", self.name)
    }

    fn signature_keys(&self) -> Vec<String> {
        vec![self.name.clone()]
    }

    fn create_diff(&self, other: &Command) -> Vec<Command> {
        let Command::CreateBindingConstraint(other) = other else {
            return Vec::new();
        };
        vec![Command::UpdateBindingConstraint(UpdateBindingConstraint {
            id: other.constraint_id(),
            enabled: other.enabled,
            time_step: other.time_step,
            operator: other.operator,
            coeffs: other.coeffs.clone(),
            values: if self.values != other.values {
                other.values.clone()
            } else {
                None
            },
            comments: other.comments.clone(),
            filter_year_by_year: other.filter_year_by_year.clone(),
            filter_synthesis: other.filter_synthesis.clone(),
        })]
    }

    fn inner_matrices(&self) -> Vec<String> {
        self.values.iter().cloned().collect()
    }
}

/// Rewrite a constraint; `values` is kept when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateBindingConstraint {
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub time_step: TimeStep,
    pub operator: BindingConstraintOperator,
    #[serde(default)]
    pub coeffs: Coefficients,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_year_by_year: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_synthesis: Option<String>,
}

impl From<&CreateBindingConstraint> for UpdateBindingConstraint {
    fn from(create: &CreateBindingConstraint) -> Self {
        Self {
            id: create.constraint_id(),
            enabled: create.enabled,
            time_step: create.time_step,
            operator: create.operator,
            coeffs: create.coeffs.clone(),
            values: create.values.clone(),
            comments: create.comments.clone(),
            filter_year_by_year: create.filter_year_by_year.clone(),
            filter_synthesis: create.filter_synthesis.clone(),
        }
    }
}

impl CommandOps for UpdateBindingConstraint {
    fn name(&self) -> CommandName {
        CommandName::UpdateBindingConstraint
    }

    fn validate(&self) -> CommandResult<()> {
        validate_coeffs(&self.coeffs)
    }

    fn update_config(&self, config: &mut StudyConfig) -> CommandResult<ExtraData> {
        if config.binding(&self.id).is_none() {
            return Err(CommandError::failed(
                "Failed to retrieve existing binding constraint",
            ));
        }
        check_terms(config, &self.coeffs)?;
        config.insert_binding(BindingConstraintConfig::from_terms(
            &self.id,
            self.coeffs.keys().map(String::as_str),
        ));
        Ok(ExtraData::new())
    }

    fn apply_tree(
        &self,
        _config: &StudyConfig,
        tree: &mut dyn FileTree,
        _ctx: &CommandContext,
    ) -> CommandResult<()> {
        let sections = binding_sections(tree)?;
        let (key, existing) = sections
            .iter()
            .find(|(_, section)| section_id(section) == Some(self.id.as_str()))
            .ok_or_else(|| CommandError::failed("Failed to retrieve existing binding constraint"))?;
        let name = existing
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(&self.id)
            .to_string();
        BindingSection {
            id: &self.id,
            name: &name,
            enabled: self.enabled,
            time_step: self.time_step,
            operator: self.operator,
            coeffs: &self.coeffs,
            comments: self.comments.as_deref(),
            filter_year_by_year: self.filter_year_by_year.as_deref(),
            filter_synthesis: self.filter_synthesis.as_deref(),
        }
        .save(tree, key)?;
        if let Some(values) = &self.values {
            save_matrix(tree, values, &layout::binding_constraint_series(&self.id))?;
        }
        Ok(())
    }

    fn success_message(&self) -> String {
        format!("Binding constraint '{}' updated", self.id)
    }

    fn signature_keys(&self) -> Vec<String> {
        vec![self.id.clone()]
    }

    fn create_diff(&self, other: &Command) -> Vec<Command> {
        vec![other.clone()]
    }

    fn inner_matrices(&self) -> Vec<String> {
        self.values.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoveBindingConstraint {
    pub id: String,
}

impl CommandOps for RemoveBindingConstraint {
    fn name(&self) -> CommandName {
        CommandName::RemoveBindingConstraint
    }

    fn update_config(&self, config: &mut StudyConfig) -> CommandResult<ExtraData> {
        if config.bindings.remove(&self.id).is_none() {
            return Err(CommandError::failed(format!(
                "Binding constraint '{}' does not exist",
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
        remove_binding_constraints(tree, &BTreeSet::from([self.id.clone()]))
    }

    fn success_message(&self) -> String {
        format!("Binding constraint '{}' removed", self.id)
    }

    fn signature_keys(&self) -> Vec<String> {
        vec![self.id.clone()]
    }

    fn create_diff(&self, _other: &Command) -> Vec<Command> {
        Vec::new()
    }
}
