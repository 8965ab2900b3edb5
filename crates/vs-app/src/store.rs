//! Filesystem storage for base studies, variant command logs and snapshots.
//!
//! Layout under the root:
//! `bases/<id>.json`, `variants/<id>/{variant,commands,snapshot,snapshot_meta}.json`.

use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use vs_commands::CommandDTO;
use vs_study::FileStudy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub id: String,
    pub name: String,
    pub base_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One entry of a variant's command log. `dto` always holds a single command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: String,
    pub dto: CommandDTO,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub generated_at: DateTime<Utc>,
    pub last_executed_command: Option<String>,
    /// Ids of the log prefix the snapshot was built from.
    pub executed: Vec<String>,
}

#[derive(Clone)]
pub struct VariantStore {
    root_dir: PathBuf,
}

impl VariantStore {
    pub fn new(root_dir: PathBuf) -> AppResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn base_path(&self, base_id: &str) -> PathBuf {
        self.root_dir.join("bases").join(format!("{}.json", base_id))
    }

    fn variant_dir(&self, variant_id: &str) -> PathBuf {
        self.root_dir.join("variants").join(variant_id)
    }

    fn write_json<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(value)?)?;
        Ok(())
    }

    fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> AppResult<T> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn has_base(&self, base_id: &str) -> bool {
        self.base_path(base_id).exists()
    }

    pub fn save_base(&self, base_id: &str, study: &FileStudy) -> AppResult<()> {
        let path = self.base_path(base_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        vs_study::save_json(&path, study)?;
        Ok(())
    }

    pub fn load_base(&self, base_id: &str) -> AppResult<FileStudy> {
        let path = self.base_path(base_id);
        if !path.exists() {
            return Err(AppError::BaseNotFound(base_id.to_string()));
        }
        Ok(vs_study::load_json(&path)?)
    }

    pub fn has_variant(&self, variant_id: &str) -> bool {
        self.variant_dir(variant_id).join("variant.json").exists()
    }

    pub fn save_variant(&self, record: &VariantRecord) -> AppResult<()> {
        Self::write_json(&self.variant_dir(&record.id).join("variant.json"), record)
    }

    pub fn load_variant(&self, variant_id: &str) -> AppResult<VariantRecord> {
        if !self.has_variant(variant_id) {
            return Err(AppError::VariantNotFound(variant_id.to_string()));
        }
        Self::read_json(&self.variant_dir(variant_id).join("variant.json"))
    }

    pub fn list_variants(&self) -> AppResult<Vec<VariantRecord>> {
        let dir = self.root_dir.join("variants");
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut variants = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if entry.path().is_dir()
                && let Some(id) = entry.file_name().to_str()
                && self.has_variant(id)
            {
                variants.push(self.load_variant(id)?);
            }
        }
        variants.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(variants)
    }

    pub fn save_commands(&self, variant_id: &str, records: &[CommandRecord]) -> AppResult<()> {
        Self::write_json(&self.variant_dir(variant_id).join("commands.json"), &records)
    }

    pub fn load_commands(&self, variant_id: &str) -> AppResult<Vec<CommandRecord>> {
        let path = self.variant_dir(variant_id).join("commands.json");
        if !path.exists() {
            return Ok(Vec::new());
        }
        Self::read_json(&path)
    }

    pub fn save_snapshot(
        &self,
        variant_id: &str,
        study: &FileStudy,
        record: &SnapshotRecord,
    ) -> AppResult<()> {
        let dir = self.variant_dir(variant_id);
        fs::create_dir_all(&dir)?;
        vs_study::save_json(&dir.join("snapshot.json"), study)?;
        Self::write_json(&dir.join("snapshot_meta.json"), record)
    }

    /// Keep a partial tree for inspection; without metadata it is never reused.
    pub fn save_partial_snapshot(&self, variant_id: &str, study: &FileStudy) -> AppResult<()> {
        self.clear_snapshot(variant_id)?;
        Self::write_json(&self.variant_dir(variant_id).join("snapshot.json"), &study.tree)
    }

    pub fn load_snapshot(&self, variant_id: &str) -> AppResult<Option<(FileStudy, SnapshotRecord)>> {
        let dir = self.variant_dir(variant_id);
        let (tree, meta) = (dir.join("snapshot.json"), dir.join("snapshot_meta.json"));
        if !tree.exists() || !meta.exists() {
            return Ok(None);
        }
        Ok(Some((vs_study::load_json(&tree)?, Self::read_json(&meta)?)))
    }

    pub fn clear_snapshot(&self, variant_id: &str) -> AppResult<()> {
        let dir = self.variant_dir(variant_id);
        for file in ["snapshot.json", "snapshot_meta.json"] {
            let path = dir.join(file);
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vs_commands::{CommandArgs, CommandName};

    #[test]
    fn command_log_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = VariantStore::new(dir.path().to_path_buf()).unwrap();
        let mut args = serde_json::Map::new();
        args.insert("area_name".into(), "a".into());
        let records = vec![CommandRecord {
            id: "c1".into(),
            dto: CommandDTO::new(CommandName::CreateArea, CommandArgs::One(args)),
            created_at: Utc::now(),
        }];
        store.save_commands("v", &records).unwrap();
        assert_eq!(store.load_commands("v").unwrap(), records);
        assert!(store.load_commands("other").unwrap().is_empty());
    }

    #[test]
    fn missing_entities_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = VariantStore::new(dir.path().to_path_buf()).unwrap();
        assert!(matches!(store.load_base("b"), Err(AppError::BaseNotFound(_))));
        assert!(matches!(store.load_variant("v"), Err(AppError::VariantNotFound(_))));
        assert!(store.load_snapshot("v").unwrap().is_none());
    }
}
