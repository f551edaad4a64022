use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use treadle::WorkItem;
use uuid::Uuid;

/// Directory under the output root that holds per-run staging areas.
pub const STAGING_DIR: &str = "_staging";

/// One full batch run.
///
/// This is the treadle `WorkItem` that flows through the song_data →
/// log_data → commit stages. Every run gets a fresh id, so the state store
/// never treats a new run as already done.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRun {
    id: String,
    pub started_at: DateTime<Utc>,
}

impl BatchRun {
    #[must_use]
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            started_at: Utc::now(),
        }
    }
}

impl Default for BatchRun {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkItem for BatchRun {
    fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for BatchRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch run {}", self.id)
    }
}

/// Staging area for a run: `<output>/_staging/<run id>`.
#[must_use]
pub fn staging_dir(output_root: &Path, run_id: &str) -> PathBuf {
    output_root.join(STAGING_DIR).join(run_id)
}
