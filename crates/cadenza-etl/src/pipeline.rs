use std::sync::Arc;

use cadenza_core::model::{ArtistRecord, SongRow, SongplayRecord, TimeRecord, UserRecord};
use cadenza_core::Table;
use treadle::Workflow;

use crate::config::Settings;
use crate::ledger::RunLedger;
use crate::stages::{CommitStage, LogDataStage, SongDataStage};
use crate::work_item::BatchRun;

/// Every table a complete run publishes.
pub const ALL_TABLES: &[&str] = &[
    SongRow::NAME,
    ArtistRecord::NAME,
    UserRecord::NAME,
    TimeRecord::NAME,
    SongplayRecord::NAME,
];

const STAGE_COUNT: usize = 3;

/// Build the song_data → log_data → commit pipeline.
///
/// # Errors
/// Returns an error if the workflow cannot be built.
pub fn build_pipeline(
    settings: Arc<Settings>,
    ledger: Arc<RunLedger>,
) -> treadle::Result<Workflow> {
    let song_data = SongDataStage::new(Arc::clone(&settings), Arc::clone(&ledger));
    let log_data = LogDataStage::new(Arc::clone(&settings), Arc::clone(&ledger));
    let commit = CommitStage::new(settings, ledger);

    Workflow::builder()
        .stage("song_data", song_data)
        .stage("log_data", log_data)
        .stage("commit", commit)
        .dependency("log_data", "song_data")
        .dependency("commit", "song_data")
        .dependency("commit", "log_data")
        .build()
}

/// Advance `run` until every table is published or the stages stop making
/// progress.
///
/// A failed stage does not surface as an error here: treadle records the
/// failure and stops advancing that stage, so the caller detects it as
/// tables missing from `ledger`.
///
/// # Errors
/// Returns an error only if the workflow itself cannot advance, for
/// example when the state store fails.
pub async fn run_to_completion(
    workflow: &Workflow,
    run: &BatchRun,
    store: &mut treadle::SqliteStateStore,
    ledger: &RunLedger,
) -> treadle::Result<()> {
    for _ in 0..STAGE_COUNT {
        if ledger.is_published(ALL_TABLES) {
            break;
        }
        workflow.advance(run, store).await?;
    }
    Ok(())
}
