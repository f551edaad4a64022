//! Commit stage: publish staged tables into the output root.

use std::path::Path;
use std::sync::Arc;

use treadle::{Stage, StageContext, StageOutcome};

use crate::config::Settings;
use crate::error::{EtlError, EtlResult};
use crate::ledger::RunLedger;
use crate::pipeline::ALL_TABLES;
use crate::work_item::{staging_dir, STAGING_DIR};

/// Replaces each `<output>/<table>` with the run's staged copy.
///
/// Nothing is published unless all tables were staged. Tables are swapped
/// one at a time, so a failure part way leaves the earlier ones published.
#[derive(Debug)]
pub struct CommitStage {
    settings: Arc<Settings>,
    ledger: Arc<RunLedger>,
}

impl CommitStage {
    #[must_use]
    pub fn new(settings: Arc<Settings>, ledger: Arc<RunLedger>) -> Self {
        Self { settings, ledger }
    }

    /// Publish every staged table of `run_id`.
    ///
    /// Whatever is still staged when this fails is discarded.
    pub fn run(&self, run_id: &str) -> EtlResult<()> {
        let result = self.publish_all(run_id);
        super::discard_on_error(&self.settings.output_data, run_id, result)
    }

    fn publish_all(&self, run_id: &str) -> EtlResult<()> {
        self.ledger.ensure_staged(ALL_TABLES)?;

        let output = &self.settings.output_data;
        let staging = staging_dir(output, run_id);
        let staged = self.ledger.staged();

        for table in ALL_TABLES {
            publish(&staging.join(table), &output.join(table))?;
            let rows = staged.get(*table).copied().unwrap_or_default();
            self.ledger.record_published(table, rows);
            log::info!("Published {table} ({rows} rows)");
        }

        std::fs::remove_dir_all(&staging).map_err(|e| EtlError::io(&staging, e))?;
        super::prune_staging_root(output);
        Ok(())
    }
}

fn publish(staged: &Path, target: &Path) -> EtlResult<()> {
    if target.exists() {
        std::fs::remove_dir_all(target).map_err(|e| EtlError::io(target, e))?;
    }
    std::fs::rename(staged, target).map_err(|e| EtlError::io(staged, e))
}

#[async_trait::async_trait]
impl Stage for CommitStage {
    fn name(&self) -> &str {
        "commit"
    }

    async fn execute(
        &self,
        item: &dyn treadle::WorkItem,
        _ctx: &mut StageContext,
    ) -> treadle::Result<StageOutcome> {
        self.run(item.id())
            .map_err(|e| super::stage_failed("commit", &e))?;
        Ok(StageOutcome::Complete)
    }
}
