//! Variant studies: a registered base study plus a command log.

use crate::cache::SnapshotCache;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::generator::{GenerationResult, Generator};
use crate::progress::GenerationListener;
use crate::store::{CommandRecord, SnapshotRecord, VariantRecord, VariantStore};
use chrono::Utc;
use parking_lot::Mutex;
use rayon::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use uuid::Uuid;
use vs_commands::{
    Command, CommandContext, CommandDTO, CommandFactory, CommandOutput, DiffOutcome,
};
use vs_matrix::{FsMatrixStore, InMemoryMatrixStore, MatrixService};
use vs_study::FileStudy;

pub struct VariantService {
    store: VariantStore,
    ctx: CommandContext,
    config: AppConfig,
    /// Per-variant locks; an entry lives as long as someone holds its lock handle.
    locks: Mutex<HashMap<String, Weak<Mutex<()>>>>,
    cache: SnapshotCache,
}

impl VariantService {
    pub fn new(config: AppConfig, matrices: Arc<dyn MatrixService>) -> AppResult<Self> {
        let store = VariantStore::new(config.storage_root.clone())?;
        let ctx = CommandContext::new(matrices, config.hourly_rows)?;
        Ok(Self {
            store,
            ctx,
            config,
            locks: Mutex::new(HashMap::new()),
            cache: SnapshotCache::new(),
        })
    }

    /// Service backed by a filesystem matrix store at `config.matrix_dir`.
    pub fn open(config: AppConfig) -> AppResult<Self> {
        let matrices = FsMatrixStore::new(config.matrix_dir.clone())?;
        Self::new(config, Arc::new(matrices))
    }

    pub fn context(&self) -> &CommandContext {
        &self.ctx
    }

    pub fn store(&self) -> &VariantStore {
        &self.store
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    fn variant_lock(&self, variant_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        if let Some(lock) = locks.get(variant_id).and_then(Weak::upgrade) {
            return lock;
        }
        locks.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(Mutex::new(()));
        locks.insert(variant_id.to_string(), Arc::downgrade(&lock));
        lock
    }

    pub fn register_base(&self, study: &FileStudy) -> AppResult<String> {
        let base_id = Uuid::new_v4().to_string();
        self.store.save_base(&base_id, study)?;
        tracing::info!(base_id = %base_id, "registered base study");
        Ok(base_id)
    }

    pub fn create_variant(&self, base_id: &str, name: &str) -> AppResult<String> {
        if !self.store.has_base(base_id) {
            return Err(AppError::BaseNotFound(base_id.to_string()));
        }
        let now = Utc::now();
        let record = VariantRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            base_id: base_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.store.save_variant(&record)?;
        self.store.save_commands(&record.id, &[])?;
        tracing::info!(variant_id = %record.id, base_id, "created variant");
        Ok(record.id)
    }

    pub fn list_commands(&self, variant_id: &str) -> AppResult<Vec<CommandRecord>> {
        self.store.load_variant(variant_id)?;
        self.store.load_commands(variant_id)
    }

    /// The typed commands of the log, in order.
    pub fn commands(&self, variant_id: &str) -> AppResult<Vec<Command>> {
        let records = self.list_commands(variant_id)?;
        self.parse_records(&records)
    }

    fn parse_records(&self, records: &[CommandRecord]) -> AppResult<Vec<Command>> {
        let factory = CommandFactory::new(&self.ctx);
        let mut commands = Vec::with_capacity(records.len());
        for record in records {
            commands.extend(factory.to_command(&record.dto)?);
        }
        Ok(commands)
    }

    /// Validate `dtos` and turn each command into its own log record.
    fn to_records(&self, dtos: &[CommandDTO]) -> AppResult<Vec<CommandRecord>> {
        let commands = CommandFactory::new(&self.ctx).to_commands(dtos)?;
        let now = Utc::now();
        commands
            .iter()
            .map(|command| {
                Ok(CommandRecord {
                    id: Uuid::new_v4().to_string(),
                    dto: command.to_dto()?,
                    created_at: now,
                })
            })
            .collect()
    }

    fn touch(&self, variant_id: &str) -> AppResult<()> {
        let mut record = self.store.load_variant(variant_id)?;
        record.updated_at = Utc::now();
        self.store.save_variant(&record)
    }

    /// Append commands to the log; returns the new command ids.
    pub fn append_commands(&self, variant_id: &str, dtos: &[CommandDTO]) -> AppResult<Vec<String>> {
        let lock = self.variant_lock(variant_id);
        let _guard = lock.lock();
        let mut records = self.list_commands(variant_id)?;
        let added = self.to_records(dtos)?;
        let ids = added.iter().map(|r| r.id.clone()).collect();
        records.extend(added);
        self.store.save_commands(variant_id, &records)?;
        self.touch(variant_id)?;
        Ok(ids)
    }

    /// Replace the whole log.
    pub fn replace_commands(&self, variant_id: &str, dtos: &[CommandDTO]) -> AppResult<Vec<String>> {
        let lock = self.variant_lock(variant_id);
        let _guard = lock.lock();
        self.store.load_variant(variant_id)?;
        let records = self.to_records(dtos)?;
        let ids = records.iter().map(|r| r.id.clone()).collect();
        self.store.save_commands(variant_id, &records)?;
        self.touch(variant_id)?;
        Ok(ids)
    }

    pub fn remove_command(&self, variant_id: &str, command_id: &str) -> AppResult<()> {
        let lock = self.variant_lock(variant_id);
        let _guard = lock.lock();
        let mut records = self.list_commands(variant_id)?;
        let before = records.len();
        records.retain(|r| r.id != command_id);
        if records.len() == before {
            return Err(AppError::CommandNotFound(command_id.to_string()));
        }
        self.store.save_commands(variant_id, &records)?;
        self.touch(variant_id)
    }

    /// Bring the variant's snapshot up to date with its log.
    ///
    /// When the stored snapshot was built from a prefix of the current log, only
    /// the commands after it are replayed.
    pub fn generate(
        &self,
        variant_id: &str,
        listener: Option<GenerationListener<'_>>,
    ) -> AppResult<GenerationResult> {
        self.run_generation(variant_id, false, listener)
    }

    /// Rebuild the snapshot from the base study, ignoring any stored snapshot.
    pub fn regenerate(
        &self,
        variant_id: &str,
        listener: Option<GenerationListener<'_>>,
    ) -> AppResult<GenerationResult> {
        self.run_generation(variant_id, true, listener)
    }

    fn run_generation(
        &self,
        variant_id: &str,
        full: bool,
        listener: Option<GenerationListener<'_>>,
    ) -> AppResult<GenerationResult> {
        let lock = self.variant_lock(variant_id);
        let _guard = lock.lock();

        let variant = self.store.load_variant(variant_id)?;
        let records = self.store.load_commands(variant_id)?;
        let ids: Vec<String> = records.iter().map(|r| r.id.clone()).collect();

        let reusable = if full {
            None
        } else {
            self.store
                .load_snapshot(variant_id)?
                .filter(|(_, meta)| ids.starts_with(&meta.executed))
        };
        let (mut study, start) = match reusable {
            Some((study, meta)) => (study, meta.executed.len()),
            None => (self.store.load_base(&variant.base_id)?, 0),
        };
        let commands = self.parse_records(&records[start..])?;
        tracing::info!(
            variant_id,
            reused = start,
            replayed = commands.len(),
            "generating variant"
        );

        let result = Generator::new(&self.ctx).generate(&commands, &mut study, listener);
        if result.success {
            let record = SnapshotRecord {
                generated_at: Utc::now(),
                last_executed_command: ids.last().cloned(),
                executed: ids,
            };
            self.store.save_snapshot(variant_id, &study, &record)?;
        } else if self.config.delete_on_failure {
            self.store.clear_snapshot(variant_id)?;
        } else {
            self.store.save_partial_snapshot(variant_id, &study)?;
        }
        self.cache.invalidate(variant_id);
        Ok(result)
    }

    /// Generate several variants in parallel. Each variant still runs under its own lock.
    pub fn generate_many(&self, variant_ids: &[String]) -> Vec<(String, AppResult<GenerationResult>)> {
        variant_ids
            .par_iter()
            .map(|id| (id.clone(), self.generate(id, None)))
            .collect()
    }

    /// The variant's materialised study, generating it when no snapshot exists.
    pub fn snapshot(&self, variant_id: &str) -> AppResult<FileStudy> {
        if let Some(study) = self.stored_snapshot(variant_id)? {
            return Ok(study);
        }
        let result = self.generate(variant_id, None)?;
        if let Some(failure) = result.failure() {
            return Err(AppError::Command(format!(
                "Generation of variant {} failed at {}: {}",
                variant_id, failure.name, failure.message
            )));
        }
        self.stored_snapshot(variant_id)?
            .ok_or_else(|| AppError::VariantNotFound(variant_id.to_string()))
    }

    /// Cached or on-disk snapshot, read under the variant lock so a concurrent
    /// generation cannot be overtaken by a stale cache entry.
    fn stored_snapshot(&self, variant_id: &str) -> AppResult<Option<FileStudy>> {
        let lock = self.variant_lock(variant_id);
        let _guard = lock.lock();
        if let Some(study) = self.cache.get(variant_id) {
            return Ok(Some(study));
        }
        let Some((study, _)) = self.store.load_snapshot(variant_id)? else {
            return Ok(None);
        };
        self.cache.put(variant_id, study.clone());
        Ok(Some(study))
    }

    /// Commands undoing one log entry, computed against the history before it.
    pub fn revert_command(&self, variant_id: &str, command_id: &str) -> AppResult<Vec<CommandDTO>> {
        let variant = self.store.load_variant(variant_id)?;
        let records = self.store.load_commands(variant_id)?;
        let index = records
            .iter()
            .position(|r| r.id == command_id)
            .ok_or_else(|| AppError::CommandNotFound(command_id.to_string()))?;
        let history = self.parse_records(&records[..index])?;
        let target = self.parse_records(&records[index..=index])?;
        let base = self.store.load_base(&variant.base_id)?;

        let mut undo = Vec::new();
        for command in &target {
            undo.extend(command.revert(&history, &base, &self.ctx)?);
        }
        Ok(CommandFactory::to_dtos(&undo)?)
    }

    /// Commands turning `base_variant`'s result into `variant`'s. Both must share
    /// a base study. Matrix garbage collection runs against a copy of the
    /// variant's matrices, so the shared store keeps them.
    pub fn diff_variants(&self, base_variant: &str, variant: &str) -> AppResult<DiffOutcome> {
        let left = self.store.load_variant(base_variant)?;
        let right = self.store.load_variant(variant)?;
        if left.base_id != right.base_id {
            return Err(AppError::InvalidInput(format!(
                "Variants {} and {} do not share a base study",
                base_variant, variant
            )));
        }
        let base_study = self.store.load_base(&left.base_id)?;
        let base_commands = self.commands(base_variant)?;
        let variant_commands = self.commands(variant)?;
        let referenced: BTreeSet<String> = variant_commands
            .iter()
            .flat_map(Command::get_inner_matrices)
            .collect();
        let scratch = InMemoryMatrixStore::copy_of(
            self.ctx.matrix_service.as_ref(),
            referenced.iter().map(String::as_str),
        )?;
        Ok(vs_commands::diff(
            &base_commands,
            &variant_commands,
            &base_study,
            &self.ctx,
            &scratch,
        )?)
    }

    /// Check the log against the base study's mirror only, stopping at the first failure.
    pub fn dry_run(&self, variant_id: &str) -> AppResult<Vec<CommandOutput>> {
        let variant = self.store.load_variant(variant_id)?;
        let mut config = self.store.load_base(&variant.base_id)?.config;
        let mut outputs = Vec::new();
        for command in self.commands(variant_id)? {
            let (output, _) = command.apply_config(&mut config);
            let failed = !output.status;
            outputs.push(output);
            if failed {
                break;
            }
        }
        Ok(outputs)
    }
}
