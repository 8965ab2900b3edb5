//! Matrix data types.

use serde::{Deserialize, Serialize};

pub type MatrixId = String;

/// Row-major 2-D time series.
pub type MatrixData = Vec<Vec<f64>>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatrixInfo {
    pub id: MatrixId,
    pub width: usize,
    pub height: usize,
    pub created_at: String,
}

impl MatrixInfo {
    pub fn describe(id: &str, data: &MatrixData) -> Self {
        Self {
            id: id.to_string(),
            width: data.first().map_or(0, Vec::len),
            height: data.len(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// On-disk representation used by [`crate::FsMatrixStore`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatrixFile {
    pub info: MatrixInfo,
    pub data: MatrixData,
}
