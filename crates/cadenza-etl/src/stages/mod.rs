//! Treadle stages of a batch run.
//!
//! `song_data` and `log_data` write their tables into the run's staging
//! area; `commit` moves every staged table into place. A stage that fails
//! removes the run's staging area before reporting the error.

use std::path::Path;

use cadenza_core::Table;
use treadle::TreadleError;

use crate::error::{EtlError, EtlResult};
use crate::ledger::RunLedger;
use crate::work_item::{staging_dir, STAGING_DIR};
use crate::writer::PartitionedWriter;

pub mod commit;
pub mod log_data;
pub mod song_data;

pub use commit::CommitStage;
pub use log_data::LogDataStage;
pub use song_data::SongDataStage;

fn stage_failed(stage: &str, e: &EtlError) -> TreadleError {
    TreadleError::StageExecution(format!("{stage} failed: {e}"))
}

/// Drop the run's staging area if `result` is an error, then return it.
fn discard_on_error(output: &Path, run_id: &str, result: EtlResult<()>) -> EtlResult<()> {
    if result.is_err() {
        let staging = staging_dir(output, run_id);
        if staging.exists() {
            match std::fs::remove_dir_all(&staging) {
                Ok(()) => log::info!("Discarded staged tables in {}", staging.display()),
                Err(e) => log::warn!("Failed to remove {}: {e}", staging.display()),
            }
        }
        prune_staging_root(output);
    }
    result
}

/// Remove `<output>/_staging` once no run is using it.
fn prune_staging_root(output: &Path) {
    let root = output.join(STAGING_DIR);
    if root.exists() {
        if let Err(e) = std::fs::remove_dir(&root) {
            // Another run may still be staging.
            log::debug!("Leaving {}: {e}", root.display());
        }
    }
}

/// Write `rows` under `staging` and record the table in the ledger.
fn stage_table<T: Table>(
    writer: &PartitionedWriter,
    ledger: &RunLedger,
    rows: &[T],
    staging: &Path,
) -> EtlResult<()> {
    let summary = writer.write(rows, staging)?;
    log::info!("Staged {} ({} rows, {} files)", summary.table, summary.rows, summary.files);
    ledger.record_staged(&summary);
    Ok(())
}
