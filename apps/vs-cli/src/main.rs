use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vs_app::{AppConfig, AppError, AppResult, GenerationEvent, GenerationResult, Generator};
use vs_commands::{Command, CommandContext, CommandDTO, CommandFactory};
use vs_core::strip_matrix_protocol;
use vs_matrix::{FsMatrixStore, InMemoryMatrixStore};
use vs_study::{DEFAULT_VERSION, FileStudy};

#[derive(Parser)]
#[command(name = "vs-cli")]
#[command(about = "Variant study CLI - replay, revert and diff study command logs", long_about = None)]
struct Cli {
    /// App config YAML file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Matrix store directory (overrides the config file)
    #[arg(long, global = true)]
    matrix_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an empty study
    Init {
        /// Output study JSON file
        study_path: PathBuf,
        #[arg(long, default_value = "study")]
        caption: String,
        #[arg(long, default_value_t = DEFAULT_VERSION)]
        version: u32,
    },
    /// Apply a command list to a base study and write the result
    Generate {
        base: PathBuf,
        /// Command DTO list (JSON)
        commands: PathBuf,
        out: PathBuf,
        /// Keep the partial study when a command fails
        #[arg(long)]
        keep_on_failure: bool,
    },
    /// Check a command list against the base study's structure only
    DryRun { base: PathBuf, commands: PathBuf },
    /// Commands turning one command list's result into another's
    Diff {
        base_commands: PathBuf,
        variant_commands: PathBuf,
        /// Study both lists were applied to (defaults to an empty study)
        #[arg(long)]
        base_study: Option<PathBuf>,
    },
    /// Commands undoing the command at `index` of a list
    Revert {
        base: PathBuf,
        commands: PathBuf,
        index: usize,
    },
    /// Matrix ids referenced by a command list
    Matrices {
        commands: PathBuf,
        /// Also list the matrices linked from this study's tree
        #[arg(long)]
        study: Option<PathBuf>,
    },
}

fn main() -> AppResult<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    if let Some(dir) = cli.matrix_dir {
        config.matrix_dir = dir;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Init {
            study_path,
            caption,
            version,
        } => cmd_init(&study_path, &caption, version),
        Commands::Generate {
            base,
            commands,
            out,
            keep_on_failure,
        } => cmd_generate(&config, &base, &commands, &out, keep_on_failure),
        Commands::DryRun { base, commands } => cmd_dry_run(&config, &base, &commands),
        Commands::Diff {
            base_commands,
            variant_commands,
            base_study,
        } => cmd_diff(
            &config,
            &base_commands,
            &variant_commands,
            base_study.as_deref(),
        ),
        Commands::Revert {
            base,
            commands,
            index,
        } => cmd_revert(&config, &base, &commands, index),
        Commands::Matrices { commands, study } => {
            cmd_matrices(&config, &commands, study.as_deref())
        }
    }
}

fn context(config: &AppConfig) -> AppResult<CommandContext> {
    let store = FsMatrixStore::new(config.matrix_dir.clone())?;
    Ok(CommandContext::new(Arc::new(store), config.hourly_rows)?)
}

fn load_commands(ctx: &CommandContext, path: &Path) -> AppResult<Vec<Command>> {
    let content = std::fs::read_to_string(path)?;
    let dtos: Vec<CommandDTO> = serde_json::from_str(&content)?;
    Ok(CommandFactory::new(ctx).to_commands(&dtos)?)
}

fn print_dtos(commands: &[Command]) -> AppResult<()> {
    let dtos = CommandFactory::to_dtos(commands)?;
    println!("{}", serde_json::to_string_pretty(&dtos)?);
    Ok(())
}

fn cmd_init(study_path: &Path, caption: &str, version: u32) -> AppResult<()> {
    let study = FileStudy::empty(version, caption);
    vs_study::save_json(study_path, &study)?;
    println!("✓ Empty study written to {}", study_path.display());
    Ok(())
}

fn render_progress(event: &GenerationEvent) {
    let mark = if event.output.status { "ok" } else { "FAILED" };
    print!(
        "\r[{}/{}] {:<28} {:<6} {:.2}s",
        event.index + 1,
        event.total,
        event.name,
        mark,
        event.elapsed_wall_s
    );
    let _ = io::stdout().flush();
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(80));
    let _ = io::stdout().flush();
}

fn report(result: &GenerationResult) -> AppResult<()> {
    match result.failure() {
        None => {
            println!("✓ {} commands applied", result.details.len());
            Ok(())
        }
        Some(failure) => {
            println!(
                "✗ Command {} ({}) failed: {}",
                result.details.len(),
                failure.name,
                failure.message
            );
            Err(AppError::Command(failure.message.clone()))
        }
    }
}

fn cmd_generate(
    config: &AppConfig,
    base: &Path,
    commands: &Path,
    out: &Path,
    keep_on_failure: bool,
) -> AppResult<()> {
    let ctx = context(config)?;
    let base_study = vs_study::load_json(base)?;
    let commands = load_commands(&ctx, commands)?;
    println!("Generating {} commands onto {}", commands.len(), base.display());

    let delete_on_failure = config.delete_on_failure && !keep_on_failure;
    let result = Generator::new(&ctx).generate_snapshot(
        &commands,
        &base_study,
        out,
        delete_on_failure,
        Some(&mut |event| render_progress(&event)),
    )?;
    clear_progress_line();
    report(&result)?;
    println!("  Study written to {}", out.display());
    Ok(())
}

fn cmd_dry_run(config: &AppConfig, base: &Path, commands: &Path) -> AppResult<()> {
    let ctx = context(config)?;
    let mut mirror = vs_study::load_json(base)?.config;
    for (index, command) in load_commands(&ctx, commands)?.iter().enumerate() {
        let (output, _) = command.apply_config(&mut mirror);
        if !output.status {
            println!("✗ [{}] {}: {}", index, command.name(), output.message);
            return Err(AppError::Command(output.message));
        }
        println!("  [{}] {}: {}", index, command.name(), output.message);
    }
    println!("✓ All commands are applicable");
    Ok(())
}

fn cmd_diff(
    config: &AppConfig,
    base_commands: &Path,
    variant_commands: &Path,
    base_study: Option<&Path>,
) -> AppResult<()> {
    let ctx = context(config)?;
    let study = match base_study {
        Some(path) => vs_study::load_json(path)?,
        None => FileStudy::empty(DEFAULT_VERSION, "study"),
    };
    let base = load_commands(&ctx, base_commands)?;
    let variant = load_commands(&ctx, variant_commands)?;
    // Collection runs on a copy of the variant's matrices; the matrix directory
    // is left untouched.
    let referenced: BTreeSet<String> = variant.iter().flat_map(Command::get_inner_matrices).collect();
    let scratch = InMemoryMatrixStore::copy_of(
        ctx.matrix_service.as_ref(),
        referenced.iter().map(String::as_str),
    )?;
    let outcome = vs_commands::diff(&base, &variant, &study, &ctx, &scratch)?;
    print_dtos(&outcome.commands)?;
    for id in &outcome.collected_matrices {
        eprintln!("unreferenced matrix: {}", id);
    }
    Ok(())
}

fn cmd_revert(config: &AppConfig, base: &Path, commands: &Path, index: usize) -> AppResult<()> {
    let ctx = context(config)?;
    let base_study = vs_study::load_json(base)?;
    let commands = load_commands(&ctx, commands)?;
    let command = commands.get(index).ok_or_else(|| {
        AppError::InvalidInput(format!(
            "index {} is out of range for {} commands",
            index,
            commands.len()
        ))
    })?;
    let undo = command.revert(&commands[..index], &base_study, &ctx)?;
    print_dtos(&undo)
}

fn cmd_matrices(config: &AppConfig, commands: &Path, study: Option<&Path>) -> AppResult<()> {
    let ctx = context(config)?;
    let mut ids: BTreeSet<String> = load_commands(&ctx, commands)?
        .iter()
        .flat_map(Command::get_inner_matrices)
        .collect();
    if let Some(path) = study {
        let study = vs_study::load_json(path)?;
        ids.extend(
            study
                .tree
                .matrix_links()
                .iter()
                .map(|link| strip_matrix_protocol(link).to_string()),
        );
    }
    for id in ids {
        println!("{}", id);
    }
    Ok(())
}
