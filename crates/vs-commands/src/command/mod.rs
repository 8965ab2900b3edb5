//! The closed set of command kinds and their shared contract.

mod area;
mod binding;
mod cluster;
mod district;
mod link;
mod storage;
mod update;

pub use area::{CreateArea, RemoveArea};
pub use binding::{
    Coefficients, CreateBindingConstraint, RemoveBindingConstraint, UpdateBindingConstraint,
    parse_term_value,
};
pub use cluster::{CreateCluster, CreateRenewablesCluster, RemoveCluster, RemoveRenewablesCluster};
pub use district::{CreateDistrict, RemoveDistrict, UpdateDistrict};
pub use link::{CreateLink, RemoveLink};
pub use storage::{CreateStStorage, DEFAULT_STORAGE_GROUP, RemoveStStorage, STORAGE_SERIES};
pub use update::{
    ReplaceMatrix, UpdateComments, UpdateConfig, UpdateFile, UpdatePlaylist, UpdateScenarioBuilder,
};

use crate::common::{CommandName, CommandOutput, ExtraData};
use crate::context::{CommandContext, MatrixConstants};
use crate::dto::{CommandArgs, CommandDTO};
use crate::error::{CommandError, CommandResult};
use serde::Serialize;
use serde_json::{Map, Value};
use vs_core::signature;
use vs_study::{FileStudy, FileTree, StudyConfig};

/// Per-kind behaviour behind [`Command`].
pub(crate) trait CommandOps {
    fn name(&self) -> CommandName;

    /// Argument checks that need no study.
    fn validate(&self) -> CommandResult<()> {
        Ok(())
    }

    /// Check feasibility against the mirror and record the structural change.
    fn update_config(&self, config: &mut StudyConfig) -> CommandResult<ExtraData>;

    /// Write to the tree. `config` is the mirror as it was before this command.
    fn apply_tree(
        &self,
        config: &StudyConfig,
        tree: &mut dyn FileTree,
        ctx: &CommandContext,
    ) -> CommandResult<()>;

    fn success_message(&self) -> String;

    /// Fields identifying the target, after the command name.
    fn signature_keys(&self) -> Vec<String> {
        Vec::new()
    }

    /// Commands turning this command's effect into `other`'s. `other` has the same signature.
    fn create_diff(&self, other: &Command) -> Vec<Command>;

    fn inner_matrices(&self) -> Vec<String> {
        Vec::new()
    }

    /// Whether the mirror must be rebuilt from the tree after a write.
    fn resyncs_mirror(&self) -> bool {
        false
    }
}

/// One reversible edit of a study.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateArea(CreateArea),
    RemoveArea(RemoveArea),
    CreateDistrict(CreateDistrict),
    RemoveDistrict(RemoveDistrict),
    UpdateDistrict(UpdateDistrict),
    CreateLink(CreateLink),
    RemoveLink(RemoveLink),
    CreateCluster(CreateCluster),
    RemoveCluster(RemoveCluster),
    CreateRenewablesCluster(CreateRenewablesCluster),
    RemoveRenewablesCluster(RemoveRenewablesCluster),
    CreateStStorage(CreateStStorage),
    RemoveStStorage(RemoveStStorage),
    CreateBindingConstraint(CreateBindingConstraint),
    UpdateBindingConstraint(UpdateBindingConstraint),
    RemoveBindingConstraint(RemoveBindingConstraint),
    ReplaceMatrix(ReplaceMatrix),
    UpdateConfig(UpdateConfig),
    UpdateComments(UpdateComments),
    UpdateFile(UpdateFile),
    UpdatePlaylist(UpdatePlaylist),
    UpdateScenarioBuilder(UpdateScenarioBuilder),
}

fn to_args<T: Serialize>(command: &T) -> CommandResult<Map<String, Value>> {
    match serde_json::to_value(command)? {
        Value::Object(map) => Ok(map),
        other => Err(CommandError::validation(format!(
            "command arguments must serialise to an object, got {}",
            other
        ))),
    }
}

impl Command {
    pub(crate) fn ops(&self) -> &dyn CommandOps {
        match self {
            Command::CreateArea(c) => c,
            Command::RemoveArea(c) => c,
            Command::CreateDistrict(c) => c,
            Command::RemoveDistrict(c) => c,
            Command::UpdateDistrict(c) => c,
            Command::CreateLink(c) => c,
            Command::RemoveLink(c) => c,
            Command::CreateCluster(c) => c,
            Command::RemoveCluster(c) => c,
            Command::CreateRenewablesCluster(c) => c,
            Command::RemoveRenewablesCluster(c) => c,
            Command::CreateStStorage(c) => c,
            Command::RemoveStStorage(c) => c,
            Command::CreateBindingConstraint(c) => c,
            Command::UpdateBindingConstraint(c) => c,
            Command::RemoveBindingConstraint(c) => c,
            Command::ReplaceMatrix(c) => c,
            Command::UpdateConfig(c) => c,
            Command::UpdateComments(c) => c,
            Command::UpdateFile(c) => c,
            Command::UpdatePlaylist(c) => c,
            Command::UpdateScenarioBuilder(c) => c,
        }
    }

    pub fn name(&self) -> CommandName {
        self.ops().name()
    }

    pub fn validate(&self) -> CommandResult<()> {
        self.ops().validate()
    }

    /// Dry run against the mirror only.
    pub fn apply_config(&self, config: &mut StudyConfig) -> (CommandOutput, ExtraData) {
        match self.ops().update_config(config) {
            Ok(extra) => (CommandOutput::ok(self.ops().success_message()), extra),
            Err(e) => (self.failure_output(e), ExtraData::new()),
        }
    }

    /// Apply to the tree and the mirror. Never panics on a failing command and
    /// never propagates: every error becomes a failed [`CommandOutput`].
    pub fn apply<T: FileTree>(&self, study: &mut FileStudy<T>, ctx: &CommandContext) -> CommandOutput {
        match self.try_apply(study, ctx) {
            Ok(()) => CommandOutput::ok(self.ops().success_message()),
            Err(e) => self.failure_output(e),
        }
    }

    fn try_apply<T: FileTree>(&self, study: &mut FileStudy<T>, ctx: &CommandContext) -> CommandResult<()> {
        let mut staged = study.config.clone();
        self.ops().update_config(&mut staged)?;
        self.ops().apply_tree(&study.config, &mut study.tree, ctx)?;
        if self.ops().resyncs_mirror() {
            staged = StudyConfig::from_tree(&study.tree)?;
        }
        study.config = staged;
        Ok(())
    }

    fn failure_output(&self, error: CommandError) -> CommandOutput {
        match error {
            CommandError::Failed(message) => CommandOutput::failure(message),
            CommandError::ChildNotFound { path } => {
                CommandOutput::failure(format!("Path '{}' does not exist", path))
            }
            other => {
                tracing::warn!(
                    command = %self.name(),
                    error = %other,
                    "Unexpected exception while applying command"
                );
                CommandOutput::failure(format!(
                    "Unexpected exception occurred when trying to apply command {}: {}",
                    self.name(),
                    other
                ))
            }
        }
    }

    /// Argument bag as written on the wire; matrices appear as bare ids.
    pub fn args(&self) -> CommandResult<Map<String, Value>> {
        match self {
            Command::CreateArea(c) => to_args(c),
            Command::RemoveArea(c) => to_args(c),
            Command::CreateDistrict(c) => to_args(c),
            Command::RemoveDistrict(c) => to_args(c),
            Command::UpdateDistrict(c) => to_args(c),
            Command::CreateLink(c) => to_args(c),
            Command::RemoveLink(c) => to_args(c),
            Command::CreateCluster(c) => to_args(c),
            Command::RemoveCluster(c) => to_args(c),
            Command::CreateRenewablesCluster(c) => to_args(c),
            Command::RemoveRenewablesCluster(c) => to_args(c),
            Command::CreateStStorage(c) => to_args(c),
            Command::RemoveStStorage(c) => to_args(c),
            Command::CreateBindingConstraint(c) => to_args(c),
            Command::UpdateBindingConstraint(c) => to_args(c),
            Command::RemoveBindingConstraint(c) => to_args(c),
            Command::ReplaceMatrix(c) => to_args(c),
            Command::UpdateConfig(c) => to_args(c),
            Command::UpdateComments(c) => to_args(c),
            Command::UpdateFile(c) => to_args(c),
            Command::UpdatePlaylist(c) => to_args(c),
            Command::UpdateScenarioBuilder(c) => to_args(c),
        }
    }

    pub fn to_dto(&self) -> CommandResult<CommandDTO> {
        Ok(CommandDTO::new(self.name(), CommandArgs::One(self.args()?)))
    }

    /// Key naming the entity this command addresses, independent of its values.
    pub fn match_signature(&self) -> String {
        signature(std::iter::once(self.name().as_str().to_string()).chain(self.ops().signature_keys()))
    }

    /// Same target; with `equal`, also identical arguments.
    pub fn matches(&self, other: &Command, equal: bool) -> bool {
        if equal {
            self == other
        } else {
            self.match_signature() == other.match_signature()
        }
    }

    /// Minimal commands turning this command's effect into `other`'s.
    /// A command with a different signature is returned unchanged.
    pub fn create_diff(&self, other: &Command) -> Vec<Command> {
        if !self.matches(other, false) {
            return vec![other.clone()];
        }
        self.ops().create_diff(other)
    }

    pub fn get_inner_matrices(&self) -> Vec<String> {
        self.ops().inner_matrices()
    }

    /// Make omitted matrix arguments explicit so the DTO records what was written.
    pub(crate) fn fill_matrix_defaults(&mut self, constants: &MatrixConstants) {
        match self {
            Command::CreateLink(c) => {
                c.series.get_or_insert_with(|| constants.link.clone());
            }
            Command::CreateCluster(c) => {
                c.prepro.get_or_insert_with(|| constants.thermal_prepro.clone());
                c.modulation
                    .get_or_insert_with(|| constants.thermal_modulation.clone());
            }
            Command::CreateStStorage(c) => {
                let defaults = CreateStStorage::default_series(constants);
                for (slot, default) in c.series_mut().into_iter().zip(defaults) {
                    slot.get_or_insert_with(|| default.to_string());
                }
            }
            Command::CreateBindingConstraint(c) => {
                let step = c.time_step;
                c.values
                    .get_or_insert_with(|| constants.binding_series(step).to_string());
            }
            _ => {}
        }
    }

    /// Commands undoing this one; see [`crate::reverter::CommandReverter`].
    pub fn revert<T: FileTree>(
        &self,
        history: &[Command],
        base: &FileStudy<T>,
        ctx: &CommandContext,
    ) -> CommandResult<Vec<Command>> {
        crate::reverter::CommandReverter::new(ctx).revert(self, history, base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signatures_join_name_and_keys() {
        let link = Command::CreateLink(CreateLink::new("a", "b"));
        assert_eq!(link.match_signature(), "create_link%a%b");
        let comments = Command::UpdateComments(UpdateComments {
            comments: "x".into(),
        });
        assert_eq!(comments.match_signature(), "update_comments");
    }

    #[test]
    fn match_with_equal_compares_arguments() {
        let a = Command::UpdateComments(UpdateComments { comments: "a".into() });
        let b = Command::UpdateComments(UpdateComments { comments: "b".into() });
        assert!(a.matches(&b, false));
        assert!(!a.matches(&b, true));
        assert!(a.matches(&a.clone(), true));
    }

    #[test]
    fn unexpected_errors_become_failures() {
        let cmd = Command::CreateArea(CreateArea::new("A"));
        let out = cmd.failure_output(CommandError::Tree(vs_study::TreeError::InvalidPath {
            path: "x".into(),
        }));
        assert!(!out.status);
        assert!(out.message.starts_with(
            "Unexpected exception occurred when trying to apply command create_area"
        ));
    }
}
