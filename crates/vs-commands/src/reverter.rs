//! Compute the commands that undo one command.
//!
//! The most recent earlier command addressing the same target wins. When the
//! history has none, the prior state is extracted from the base study.

use crate::command::{
    Command, RemoveArea, RemoveBindingConstraint, RemoveCluster, RemoveDistrict, RemoveLink,
    RemoveRenewablesCluster, RemoveStStorage, UpdateBindingConstraint, UpdateConfig,
    UpdateDistrict,
};
use crate::context::CommandContext;
use crate::error::{CommandError, CommandResult};
use crate::extractor::CommandExtractor;
use vs_study::{FileStudy, FileTree, parse_path};

pub struct CommandReverter<'a> {
    ctx: &'a CommandContext,
}

/// Extraction result where a missing base node means there is nothing to restore.
fn or_nothing(result: CommandResult<Command>, target: &str) -> CommandResult<Vec<Command>> {
    match result {
        Ok(command) => Ok(vec![command]),
        Err(e) if e.is_child_not_found() => {
            tracing::warn!(target = %target, "Failed to extract revert command");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

fn unsupported(command: &Command) -> CommandError {
    CommandError::RevertUnsupported {
        command: command.name(),
    }
}

fn is_under(path: &[&str], parent: &[&str]) -> bool {
    path.len() >= parent.len() && path[..parent.len()] == *parent
}

impl<'a> CommandReverter<'a> {
    pub fn new(ctx: &'a CommandContext) -> Self {
        Self { ctx }
    }

    fn extractor(&self) -> CommandExtractor<'a> {
        CommandExtractor::new(self.ctx)
    }

    /// `history` holds the commands applied before `command`, oldest first.
    pub fn revert<T: FileTree>(
        &self,
        command: &Command,
        history: &[Command],
        base: &FileStudy<T>,
    ) -> CommandResult<Vec<Command>> {
        let tree: &dyn FileTree = &base.tree;
        match command {
            Command::CreateArea(c) => Ok(vec![Command::RemoveArea(RemoveArea::new(&c.area_id()))]),
            Command::CreateDistrict(c) => Ok(vec![Command::RemoveDistrict(RemoveDistrict {
                id: c.district_id(),
            })]),
            Command::CreateLink(c) => {
                let (from, to) = c.ends();
                Ok(vec![Command::RemoveLink(RemoveLink::new(&from, &to))])
            }
            Command::CreateCluster(c) => Ok(vec![Command::RemoveCluster(RemoveCluster {
                area_id: c.area_id.clone(),
                cluster_id: c.cluster_id(),
            })]),
            Command::CreateRenewablesCluster(c) => Ok(vec![Command::RemoveRenewablesCluster(
                RemoveRenewablesCluster {
                    area_id: c.area_id.clone(),
                    cluster_id: c.cluster_id(),
                },
            )]),
            Command::CreateStStorage(c) => Ok(vec![Command::RemoveStStorage(RemoveStStorage {
                area_id: c.area_id.clone(),
                storage_id: c.storage_id(),
            })]),
            Command::CreateBindingConstraint(c) => Ok(vec![Command::RemoveBindingConstraint(
                RemoveBindingConstraint {
                    id: c.constraint_id(),
                },
            )]),

            Command::RemoveArea(_)
            | Command::RemoveDistrict(_)
            | Command::RemoveLink(_)
            | Command::RemoveCluster(_)
            | Command::RemoveRenewablesCluster(_)
            | Command::RemoveStStorage(_)
            | Command::RemoveBindingConstraint(_)
            | Command::UpdateScenarioBuilder(_) => Err(unsupported(command)),

            Command::UpdateDistrict(c) => {
                for prior in history.iter().rev() {
                    match prior {
                        Command::UpdateDistrict(u) if u.id == c.id => return Ok(vec![prior.clone()]),
                        Command::CreateDistrict(d) if d.district_id() == c.id => {
                            return Ok(vec![Command::UpdateDistrict(UpdateDistrict::from(d))]);
                        }
                        _ => {}
                    }
                }
                or_nothing(self.extractor().generate_update_district(tree, &c.id), &c.id)
            }
            Command::UpdateBindingConstraint(c) => {
                for prior in history.iter().rev() {
                    match prior {
                        Command::UpdateBindingConstraint(u) if u.id == c.id => {
                            return Ok(vec![prior.clone()]);
                        }
                        Command::CreateBindingConstraint(b) if b.constraint_id() == c.id => {
                            return Ok(vec![Command::UpdateBindingConstraint(
                                UpdateBindingConstraint::from(b),
                            )]);
                        }
                        _ => {}
                    }
                }
                or_nothing(
                    self.extractor().generate_update_binding_constraint(tree, &c.id),
                    &c.id,
                )
            }
            Command::UpdateConfig(c) => self.revert_update_config(c, history, tree),
            Command::ReplaceMatrix(c) => match self.last_matching(command, history) {
                Some(prior) => Ok(vec![prior]),
                None => or_nothing(
                    self.extractor().generate_replace_matrix(tree, &c.target),
                    &c.target,
                ),
            },
            Command::UpdateComments(_) => match self.last_matching(command, history) {
                Some(prior) => Ok(vec![prior]),
                None => or_nothing(
                    self.extractor().generate_update_comments(tree),
                    vs_study::layout::COMMENTS,
                ),
            },
            Command::UpdateFile(c) => match self.last_matching(command, history) {
                Some(prior) => Ok(vec![prior]),
                None => or_nothing(
                    self.extractor().generate_update_rawfile(tree, &c.target),
                    &c.target,
                ),
            },
            Command::UpdatePlaylist(_) => match self.last_matching(command, history) {
                Some(prior) => Ok(vec![prior]),
                None => or_nothing(
                    self.extractor().generate_update_playlist(tree),
                    vs_study::layout::GENERAL_DATA,
                ),
            },
        }
    }

    fn last_matching(&self, command: &Command, history: &[Command]) -> Option<Command> {
        history
            .iter()
            .rev()
            .find(|prior| prior.matches(command, false))
            .cloned()
    }

    /// An earlier write to a parent node also restores this node; replay it
    /// together with the later writes below it.
    fn revert_update_config(
        &self,
        command: &UpdateConfig,
        history: &[Command],
        tree: &dyn FileTree,
    ) -> CommandResult<Vec<Command>> {
        let target = parse_path(&command.target);
        let mut collected: Vec<&UpdateConfig> = Vec::new();
        let mut parent: Option<Vec<&str>> = None;

        for prior in history.iter().rev() {
            let Command::UpdateConfig(update) = prior else {
                continue;
            };
            if update.target == command.target {
                return Ok(vec![prior.clone()]);
            }
            collected.push(update);
            let path = parse_path(&update.target);
            if is_under(&target, &path) {
                parent = Some(path);
                break;
            }
        }

        if let Some(parent) = parent {
            let replay: Vec<Command> = collected
                .into_iter()
                .rev()
                .filter(|update| is_under(&parse_path(&update.target), &parent))
                .map(|update| Command::UpdateConfig(update.clone()))
                .collect();
            return Ok(replay);
        }

        or_nothing(
            self.extractor().generate_update_config(tree, &command.target),
            &command.target,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{
        CreateArea, CreateBindingConstraint, CreateCluster, CreateDistrict, CreateLink,
        CreateRenewablesCluster, CreateStStorage,
    };
    use serde_json::json;

    fn update(target: &str, data: serde_json::Value) -> Command {
        Command::UpdateConfig(UpdateConfig {
            target: target.to_string(),
            data,
        })
    }

    #[test]
    fn create_reverts_to_remove() {
        let (ctx, _) = CommandContext::in_memory(24).unwrap();
        let base = FileStudy::empty(820, "base");
        let reverted = CommandReverter::new(&ctx)
            .revert(&Command::CreateArea(CreateArea::new("North Sea")), &[], &base)
            .unwrap();
        assert_eq!(reverted, vec![Command::RemoveArea(RemoveArea::new("north sea"))]);
    }

    #[test]
    fn removals_cannot_be_reverted() {
        let (ctx, _) = CommandContext::in_memory(24).unwrap();
        let base = FileStudy::empty(820, "base");
        let err = CommandReverter::new(&ctx)
            .revert(&Command::RemoveArea(RemoveArea::new("a")), &[], &base)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "The revert function for remove_area is not available"
        );
    }

    #[test]
    fn parent_update_is_replayed_with_later_children() {
        let (ctx, _) = CommandContext::in_memory(24).unwrap();
        let base = FileStudy::empty(820, "base");
        let history = vec![
            update("settings/generaldata", json!({"general": {"nbyears": 1}})),
            update("settings/generaldata/output", json!({"synthesis": true})),
            update("settings/generaldata/general/mode", json!("Adequacy")),
        ];
        let cmd = update("settings/generaldata/general/nbyears", json!(5));
        let reverted = CommandReverter::new(&ctx)
            .revert(&cmd, &history, &base)
            .unwrap();
        assert_eq!(reverted, vec![history[0].clone(), history[2].clone()]);
    }

    #[test]
    fn exact_target_wins_over_parent() {
        let (ctx, _) = CommandContext::in_memory(24).unwrap();
        let base = FileStudy::empty(820, "base");
        let history = vec![
            update("settings/generaldata", json!({})),
            update("settings/generaldata/general/nbyears", json!(2)),
        ];
        let cmd = update("settings/generaldata/general/nbyears", json!(5));
        let reverted = CommandReverter::new(&ctx)
            .revert(&cmd, &history, &base)
            .unwrap();
        assert_eq!(reverted, vec![history[1].clone()]);
    }

    #[test]
    fn update_config_falls_back_to_base_value() {
        let (ctx, _) = CommandContext::in_memory(24).unwrap();
        let base = FileStudy::empty(820, "base");
        let reverter = CommandReverter::new(&ctx);

        let cmd = update("settings/generaldata/general/user-playlist", json!(true));
        let reverted = reverter.revert(&cmd, &[], &base).unwrap();
        assert_eq!(
            reverted,
            vec![update("settings/generaldata/general/user-playlist", json!(false))]
        );

        let missing = update("input/areas/nowhere/ui", json!({}));
        assert!(reverter.revert(&missing, &[], &base).unwrap().is_empty());
    }

    #[test]
    fn update_district_reverts_to_its_creation() {
        let (ctx, _) = CommandContext::in_memory(24).unwrap();
        let base = FileStudy::empty(820, "base");
        let create = CreateDistrict::new("zone", &["a"]);
        let cmd = Command::UpdateDistrict(UpdateDistrict {
            id: "zone".into(),
            base_filter: None,
            filter_items: Some(vec!["b".into()]),
            output: None,
            comments: None,
        });
        let reverted = CommandReverter::new(&ctx)
            .revert(&cmd, &[Command::CreateDistrict(create.clone())], &base)
            .unwrap();
        assert_eq!(
            reverted,
            vec![Command::UpdateDistrict(UpdateDistrict::from(&create))]
        );
    }

    #[test]
    fn cluster_and_storage_creations_revert_to_removals() {
        let (ctx, _) = CommandContext::in_memory(24).unwrap();
        let base = FileStudy::empty(820, "base");
        let reverter = CommandReverter::new(&ctx);
        let cluster = Command::CreateCluster(CreateCluster::new("a", "Gas 1"));
        assert_eq!(
            reverter.revert(&cluster, &[], &base).unwrap(),
            vec![Command::RemoveCluster(RemoveCluster {
                area_id: "a".into(),
                cluster_id: "gas 1".into(),
            })]
        );
        let storage = Command::CreateStStorage(CreateStStorage::new("a", "Battery"));
        assert_eq!(
            reverter.revert(&storage, &[], &base).unwrap(),
            vec![Command::RemoveStStorage(RemoveStStorage {
                area_id: "a".into(),
                storage_id: "battery".into(),
            })]
        );
        let link = Command::CreateLink(CreateLink::new("Zeta", "alpha"));
        assert_eq!(
            reverter.revert(&link, &[], &base).unwrap(),
            vec![Command::RemoveLink(RemoveLink::new("alpha", "zeta"))]
        );
        let wind = Command::CreateRenewablesCluster(CreateRenewablesCluster::new("a", "Wind"));
        assert_eq!(
            reverter.revert(&wind, &[], &base).unwrap(),
            vec![Command::RemoveRenewablesCluster(RemoveRenewablesCluster {
                area_id: "a".into(),
                cluster_id: "wind".into(),
            })]
        );
    }

    #[test]
    fn update_binding_constraint_reverts_to_its_creation() {
        let (ctx, _) = CommandContext::in_memory(24).unwrap();
        let base = FileStudy::empty(820, "base");
        let create = CreateBindingConstraint::new(
            "Flow cap",
            crate::common::TimeStep::Daily,
            crate::common::BindingConstraintOperator::Less,
            [("a%b".to_string(), vec![1.0])].into_iter().collect(),
        );
        let mut update = UpdateBindingConstraint::from(&create);
        update.enabled = false;
        let reverted = CommandReverter::new(&ctx)
            .revert(
                &Command::UpdateBindingConstraint(update),
                &[Command::CreateBindingConstraint(create.clone())],
                &base,
            )
            .unwrap();
        assert_eq!(
            reverted,
            vec![Command::UpdateBindingConstraint(UpdateBindingConstraint::from(&create))]
        );
    }
}
