use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Value stored for a fingerprint whose upload has started but not finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InFlightEntry {
    pub dest_path: PathBuf,
    pub started_at: i64,
}

/// Value stored for a fingerprint that finished uploading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedEntry {
    pub completed_at: i64,
}

impl InFlightEntry {
    pub fn new(dest_path: &Path) -> Self {
        Self {
            dest_path: dest_path.to_path_buf(),
            started_at: chrono::Utc::now().timestamp(),
        }
    }
}

impl CompletedEntry {
    pub fn now() -> Self {
        Self {
            completed_at: chrono::Utc::now().timestamp(),
        }
    }
}
