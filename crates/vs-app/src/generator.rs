//! Replay of a command list against a study.

use crate::error::AppResult;
use crate::progress::{GenerationEvent, GenerationListener};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use vs_commands::{Command, CommandContext, CommandName, CommandOutput};
use vs_study::{FileStudy, FileTree};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDetail {
    pub name: CommandName,
    pub status: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub success: bool,
    pub details: Vec<CommandDetail>,
}

impl GenerationResult {
    /// The command that stopped the run, if any.
    pub fn failure(&self) -> Option<&CommandDetail> {
        self.details.iter().find(|d| !d.status)
    }
}

pub struct Generator<'a> {
    ctx: &'a CommandContext,
}

impl<'a> Generator<'a> {
    pub fn new(ctx: &'a CommandContext) -> Self {
        Self { ctx }
    }

    /// Apply `commands` in order, stopping at the first failure.
    ///
    /// On failure `study` holds every change made before the failing command.
    pub fn generate<T: FileTree>(
        &self,
        commands: &[Command],
        study: &mut FileStudy<T>,
        mut listener: Option<GenerationListener<'_>>,
    ) -> GenerationResult {
        let started = Instant::now();
        let total = commands.len();
        let mut details = Vec::with_capacity(total);
        tracing::info!(commands = total, "generation started");

        for (index, command) in commands.iter().enumerate() {
            let output = command.apply(study, self.ctx);
            details.push(CommandDetail {
                name: command.name(),
                status: output.status,
                message: output.message.clone(),
            });
            let failed = !output.status;
            emit(&mut listener, index, total, command.name(), output, started);
            if failed {
                tracing::warn!(
                    index,
                    command = %command.name(),
                    message = %details[index].message,
                    "generation stopped on failing command"
                );
                return GenerationResult {
                    success: false,
                    details,
                };
            }
        }

        tracing::info!(
            commands = total,
            elapsed_s = started.elapsed().as_secs_f64(),
            "generation finished"
        );
        GenerationResult {
            success: true,
            details,
        }
    }

    /// Materialise `base` plus `commands` into `dest`.
    ///
    /// A failed run removes `dest` when `delete_on_failure` is set and otherwise
    /// writes the partial tree there for inspection.
    pub fn generate_snapshot(
        &self,
        commands: &[Command],
        base: &FileStudy,
        dest: &Path,
        delete_on_failure: bool,
        listener: Option<GenerationListener<'_>>,
    ) -> AppResult<GenerationResult> {
        let mut study = base.clone();
        let result = self.generate(commands, &mut study, listener);
        if result.success {
            vs_study::save_json(dest, &study)?;
        } else if delete_on_failure {
            if dest.exists() {
                std::fs::remove_file(dest)?;
            }
        } else {
            std::fs::write(dest, serde_json::to_string_pretty(&study.tree)?)?;
        }
        Ok(result)
    }
}

fn emit(
    listener: &mut Option<GenerationListener<'_>>,
    index: usize,
    total: usize,
    name: CommandName,
    output: CommandOutput,
    started: Instant,
) {
    if let Some(cb) = listener.as_deref_mut() {
        cb(GenerationEvent {
            index,
            total,
            name,
            output,
            elapsed_wall_s: started.elapsed().as_secs_f64(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vs_commands::command::{CreateArea, CreateLink};

    fn commands() -> Vec<Command> {
        vec![
            Command::CreateArea(CreateArea::new("a")),
            Command::CreateLink(CreateLink::new("a", "b")),
            Command::CreateArea(CreateArea::new("b")),
        ]
    }

    #[test]
    fn stops_at_first_failure() {
        let (ctx, _) = CommandContext::in_memory(24).unwrap();
        let mut study = FileStudy::empty(820, "g");
        let mut events = Vec::new();
        let result = Generator::new(&ctx).generate(
            &commands(),
            &mut study,
            Some(&mut |e: GenerationEvent| events.push(e)),
        );

        assert!(!result.success);
        assert_eq!(result.details.len(), 2);
        assert_eq!(result.failure().map(|d| d.name), Some(CommandName::CreateLink));
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].total, 3);
        assert!(study.config.areas.contains_key("a"));
        assert!(!study.config.areas.contains_key("b"));
    }

    #[test]
    fn failed_snapshot_is_deleted_or_kept() {
        let (ctx, _) = CommandContext::in_memory(24).unwrap();
        let base = FileStudy::empty(820, "g");
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.json");
        std::fs::write(&dest, "stale").unwrap();

        let generator = Generator::new(&ctx);
        let result = generator
            .generate_snapshot(&commands(), &base, &dest, true, None)
            .unwrap();
        assert!(!result.success);
        assert!(!dest.exists());

        generator
            .generate_snapshot(&commands(), &base, &dest, false, None)
            .unwrap();
        let partial = vs_study::load_json(&dest).unwrap();
        assert!(partial.config.areas.contains_key("a"));
    }

    #[test]
    fn successful_snapshot_is_written() {
        let (ctx, _) = CommandContext::in_memory(24).unwrap();
        let base = FileStudy::empty(820, "g");
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.json");
        let mut ordered = commands();
        ordered.swap(1, 2);

        let result = Generator::new(&ctx)
            .generate_snapshot(&ordered, &base, &dest, true, None)
            .unwrap();
        assert!(result.success, "{:?}", result.failure());
        let written = vs_study::load_json(&dest).unwrap();
        assert!(written.config.has_link("a", "b"));
    }
}
