//! Types shared by every command kind.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Stable tag of a command kind, as written in the `action` field of a DTO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandName {
    CreateArea,
    RemoveArea,
    CreateDistrict,
    RemoveDistrict,
    UpdateDistrict,
    CreateLink,
    RemoveLink,
    CreateCluster,
    RemoveCluster,
    CreateRenewablesCluster,
    RemoveRenewablesCluster,
    CreateStStorage,
    RemoveStStorage,
    CreateBindingConstraint,
    UpdateBindingConstraint,
    RemoveBindingConstraint,
    ReplaceMatrix,
    UpdateConfig,
    UpdateComments,
    UpdateFile,
    UpdatePlaylist,
    UpdateScenarioBuilder,
}

impl CommandName {
    pub const ALL: [CommandName; 22] = [
        CommandName::CreateArea,
        CommandName::RemoveArea,
        CommandName::CreateDistrict,
        CommandName::RemoveDistrict,
        CommandName::UpdateDistrict,
        CommandName::CreateLink,
        CommandName::RemoveLink,
        CommandName::CreateCluster,
        CommandName::RemoveCluster,
        CommandName::CreateRenewablesCluster,
        CommandName::RemoveRenewablesCluster,
        CommandName::CreateStStorage,
        CommandName::RemoveStStorage,
        CommandName::CreateBindingConstraint,
        CommandName::UpdateBindingConstraint,
        CommandName::RemoveBindingConstraint,
        CommandName::ReplaceMatrix,
        CommandName::UpdateConfig,
        CommandName::UpdateComments,
        CommandName::UpdateFile,
        CommandName::UpdatePlaylist,
        CommandName::UpdateScenarioBuilder,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommandName::CreateArea => "create_area",
            CommandName::RemoveArea => "remove_area",
            CommandName::CreateDistrict => "create_district",
            CommandName::RemoveDistrict => "remove_district",
            CommandName::UpdateDistrict => "update_district",
            CommandName::CreateLink => "create_link",
            CommandName::RemoveLink => "remove_link",
            CommandName::CreateCluster => "create_cluster",
            CommandName::RemoveCluster => "remove_cluster",
            CommandName::CreateRenewablesCluster => "create_renewables_cluster",
            CommandName::RemoveRenewablesCluster => "remove_renewables_cluster",
            CommandName::CreateStStorage => "create_st_storage",
            CommandName::RemoveStStorage => "remove_st_storage",
            CommandName::CreateBindingConstraint => "create_binding_constraint",
            CommandName::UpdateBindingConstraint => "update_binding_constraint",
            CommandName::RemoveBindingConstraint => "remove_binding_constraint",
            CommandName::ReplaceMatrix => "replace_matrix",
            CommandName::UpdateConfig => "update_config",
            CommandName::UpdateComments => "update_comments",
            CommandName::UpdateFile => "update_file",
            CommandName::UpdatePlaylist => "update_playlist",
            CommandName::UpdateScenarioBuilder => "update_scenario_builder",
        }
    }
}

impl fmt::Display for CommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for CommandName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommandName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| format!("Unknown command action: {}", s))
    }
}

/// Outcome of applying one command. There is no partial success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub status: bool,
    #[serde(default)]
    pub message: String,
}

impl CommandOutput {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
        }
    }
}

/// Side data produced by `apply_config` (ids computed while validating).
pub type ExtraData = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeStep {
    Hourly,
    Daily,
    Weekly,
}

impl TimeStep {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeStep::Hourly => "hourly",
            TimeStep::Daily => "daily",
            TimeStep::Weekly => "weekly",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "hourly" => Some(TimeStep::Hourly),
            "daily" => Some(TimeStep::Daily),
            "weekly" => Some(TimeStep::Weekly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingConstraintOperator {
    Both,
    Equal,
    Greater,
    Less,
}

impl BindingConstraintOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            BindingConstraintOperator::Both => "both",
            BindingConstraintOperator::Equal => "equal",
            BindingConstraintOperator::Greater => "greater",
            BindingConstraintOperator::Less => "less",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "both" => Some(BindingConstraintOperator::Both),
            "equal" => Some(BindingConstraintOperator::Equal),
            "greater" => Some(BindingConstraintOperator::Greater),
            "less" => Some(BindingConstraintOperator::Less),
            _ => None,
        }
    }
}

/// How a district's area list is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistrictBaseFilter {
    /// Start from every area and remove the listed ones.
    AddAll,
    /// Start from nothing and add the listed ones.
    RemoveAll,
}

impl DistrictBaseFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            DistrictBaseFilter::AddAll => "add-all",
            DistrictBaseFilter::RemoveAll => "remove-all",
        }
    }
}
