//! Merge two command histories sharing an ancestor into one compact list.

use crate::command::Command;
use crate::common::CommandName;
use crate::context::CommandContext;
use crate::error::CommandResult;
use crate::reverter::CommandReverter;
use std::collections::{BTreeSet, HashMap, HashSet};
use vs_matrix::MatrixService;
use vs_study::{FileStudy, FileTree};

#[derive(Debug, Clone, PartialEq)]
pub struct DiffOutcome {
    /// Commands to apply after `base` to reach the variant's state.
    pub commands: Vec<Command>,
    /// Matrix ids removed from the store because nothing references them anymore.
    pub collected_matrices: Vec<String>,
}

/// Kinds whose last write fully determines the target's state, once the
/// fields [`absorb`] folds in are accounted for. The scenario builder merges
/// rules into what is there, so it is not one of them.
fn is_overwrite(name: CommandName) -> bool {
    matches!(
        name,
        CommandName::UpdateConfig
            | CommandName::ReplaceMatrix
            | CommandName::UpdateFile
            | CommandName::UpdateComments
            | CommandName::UpdatePlaylist
            | CommandName::UpdateBindingConstraint
            | CommandName::UpdateDistrict
    )
}

/// Creations and removals reset the state of the entities they touch, and
/// removals cascade into other entities.
fn is_structural(name: CommandName) -> bool {
    name.as_str().starts_with("create_") || name.as_str().starts_with("remove_")
}

/// Fold the fields `later` leaves unset from a superseded `earlier`.
fn absorb(later: &mut Command, earlier: &Command) {
    match (later, earlier) {
        (Command::UpdateBindingConstraint(later), Command::UpdateBindingConstraint(earlier)) => {
            if later.values.is_none() {
                later.values = earlier.values.clone();
            }
        }
        (Command::UpdateDistrict(later), Command::UpdateDistrict(earlier)) => {
            later.inherit(earlier);
        }
        _ => {}
    }
}

/// Drop overwrite commands superseded by a later one with the same signature.
///
/// A structural command between two writes ends the run: the earlier write is
/// kept and nothing is absorbed across it.
pub fn compact(commands: Vec<Command>) -> Vec<Command> {
    let mut kept: Vec<Command> = Vec::with_capacity(commands.len());
    let mut latest: HashMap<String, usize> = HashMap::new();
    for command in commands.into_iter().rev() {
        if is_structural(command.name()) {
            latest.clear();
        } else if is_overwrite(command.name()) {
            let signature = command.match_signature();
            if let Some(&at) = latest.get(&signature) {
                absorb(&mut kept[at], &command);
                continue;
            }
            latest.insert(signature, kept.len());
        }
        kept.push(command);
    }
    kept.reverse();
    kept
}

fn inner_matrices<'a>(commands: impl IntoIterator<Item = &'a Command>) -> HashSet<String> {
    commands
        .into_iter()
        .flat_map(Command::get_inner_matrices)
        .collect()
}

/// Compute the commands turning `base`'s result into `variant`'s.
///
/// Base-only targets are undone first, newest first. Shared targets are diffed
/// against the latest base command. Matrices only the dropped variant commands
/// referenced are deleted from `store`, which should be a scratch clone.
pub fn diff<T: FileTree>(
    base: &[Command],
    variant: &[Command],
    base_study: &FileStudy<T>,
    ctx: &CommandContext,
    store: &dyn MatrixService,
) -> CommandResult<DiffOutcome> {
    let mut first_in_base: HashMap<String, usize> = HashMap::new();
    let mut last_in_base: HashMap<String, usize> = HashMap::new();
    for (index, command) in base.iter().enumerate() {
        let signature = command.match_signature();
        first_in_base.entry(signature.clone()).or_insert(index);
        last_in_base.insert(signature, index);
    }
    let variant_signatures: HashSet<String> =
        variant.iter().map(Command::match_signature).collect();

    let mut base_only: Vec<usize> = first_in_base
        .iter()
        .filter(|(signature, _)| !variant_signatures.contains(*signature))
        .map(|(_, &index)| index)
        .collect();
    base_only.sort_unstable_by(|a, b| b.cmp(a));

    let reverter = CommandReverter::new(ctx);
    let mut commands = Vec::new();
    for index in base_only {
        commands.extend(reverter.revert(&base[index], &base[..index], base_study)?);
    }

    // An identical pair is skipped only while the target still holds the base
    // state; once an earlier variant command rewrote it, the pair is replayed.
    let mut rewritten: HashSet<String> = HashSet::new();
    for command in variant {
        let signature = command.match_signature();
        match last_in_base.get(&signature) {
            Some(&index) if base[index] == *command && !rewritten.contains(&signature) => {}
            Some(&index) if base[index] == *command => commands.push(command.clone()),
            Some(&index) => {
                commands.extend(base[index].create_diff(command));
                rewritten.insert(signature);
            }
            None => commands.push(command.clone()),
        }
    }

    let commands = compact(commands);

    let mut referenced = inner_matrices(&commands);
    referenced.extend(inner_matrices(base));
    referenced.extend(ctx.constants.ids().into_iter().map(str::to_string));
    let collected: BTreeSet<String> = inner_matrices(variant)
        .into_iter()
        .filter(|id| !referenced.contains(id))
        .collect();
    for id in &collected {
        store.delete(id)?;
    }

    tracing::info!(
        base = base.len(),
        variant = variant.len(),
        output = commands.len(),
        collected = collected.len(),
        "computed command diff"
    );
    Ok(DiffOutcome {
        commands,
        collected_matrices: collected.into_iter().collect(),
    })
}
