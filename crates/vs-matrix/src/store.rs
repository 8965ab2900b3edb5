//! Filesystem matrix store: one JSON file per matrix, named by its id.

use crate::hash::{compute_matrix_id, is_valid_id};
use crate::types::{MatrixData, MatrixFile, MatrixInfo};
use crate::{MatrixError, MatrixResult, MatrixService, validate_shape};
use std::fs;
use std::path::{Path, PathBuf};
use vs_core::strip_matrix_protocol;

#[derive(Clone)]
pub struct FsMatrixStore {
    root_dir: PathBuf,
}

impl FsMatrixStore {
    pub fn new(root_dir: PathBuf) -> MatrixResult<Self> {
        if !root_dir.exists() {
            fs::create_dir_all(&root_dir)?;
        }
        Ok(Self { root_dir })
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    fn matrix_path(&self, id: &str) -> MatrixResult<PathBuf> {
        let id = strip_matrix_protocol(id);
        if !is_valid_id(id) {
            return Err(MatrixError::InvalidHash(id.to_string()));
        }
        Ok(self.root_dir.join(format!("{}.json", id)))
    }

    pub fn load_info(&self, id: &str) -> MatrixResult<MatrixInfo> {
        let path = self.matrix_path(id)?;
        if !path.exists() {
            return Err(MatrixError::NotFound { id: id.to_string() });
        }
        let content = fs::read_to_string(path)?;
        let file: MatrixFile = serde_json::from_str(&content)?;
        Ok(file.info)
    }
}

impl MatrixService for FsMatrixStore {
    fn create(&self, data: &MatrixData) -> MatrixResult<String> {
        validate_shape(data)?;
        let id = compute_matrix_id(data);
        let path = self.matrix_path(&id)?;
        if path.exists() {
            return Ok(id);
        }

        let file = MatrixFile {
            info: MatrixInfo::describe(&id, data),
            data: data.clone(),
        };
        // Write-then-rename so a concurrent reader never sees a half-written file.
        let tmp_path = self
            .root_dir
            .join(format!("{}.{}.tmp", id, std::process::id()));
        fs::write(&tmp_path, serde_json::to_string(&file)?)?;
        fs::rename(&tmp_path, &path)?;
        tracing::debug!(matrix_id = %id, "stored matrix");
        Ok(id)
    }

    fn get(&self, id: &str) -> MatrixResult<Option<MatrixData>> {
        let path = self.matrix_path(id)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        let file: MatrixFile = serde_json::from_str(&content)?;
        Ok(Some(file.data))
    }

    fn exists(&self, id: &str) -> MatrixResult<bool> {
        Ok(self.matrix_path(id)?.exists())
    }

    fn delete(&self, id: &str) -> MatrixResult<()> {
        let path = self.matrix_path(id)?;
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn list(&self) -> MatrixResult<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json")
                && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                && is_valid_id(stem)
            {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
