//! Log-data stage: events + catalog → `users`, `time`, `songplay`.

use std::sync::Arc;

use treadle::{Stage, StageContext, StageOutcome};

use crate::catalog::CatalogReader;
use crate::config::Settings;
use crate::dimensions::DimensionBuilder;
use crate::error::EtlResult;
use crate::events::EventReader;
use crate::facts::FactBuilder;
use crate::ledger::RunLedger;
use crate::work_item::staging_dir;
use crate::writer::PartitionedWriter;

#[derive(Debug)]
pub struct LogDataStage {
    settings: Arc<Settings>,
    ledger: Arc<RunLedger>,
    writer: PartitionedWriter,
}

impl LogDataStage {
    #[must_use]
    pub fn new(settings: Arc<Settings>, ledger: Arc<RunLedger>) -> Self {
        Self {
            settings,
            ledger,
            writer: PartitionedWriter::new(),
        }
    }

    /// Build and stage the event-derived tables for the run `run_id`.
    ///
    /// The catalog is read again here for the fact join. On failure the
    /// run's staging area is removed, including tables staged by
    /// `song_data`.
    pub fn run(&self, run_id: &str) -> EtlResult<()> {
        let result = self.stage(run_id);
        super::discard_on_error(&self.settings.output_data, run_id, result)
    }

    fn stage(&self, run_id: &str) -> EtlResult<()> {
        let policy = self.settings.on_malformed;
        let events = EventReader::new(policy).read_dir(&self.settings.events_root())?;
        let catalog = CatalogReader::new(policy).read_dir(&self.settings.catalog_root())?;

        let dimensions = DimensionBuilder::new(self.settings.user_granularity);
        let users = dimensions.users(&events.events);
        let time = dimensions.time(&events.events);
        let facts = FactBuilder::new(self.settings.duration_tolerance_secs)
            .songplays(&events.events, &catalog.records);

        let staging = staging_dir(&self.settings.output_data, run_id);
        super::stage_table(&self.writer, &self.ledger, &users, &staging)?;
        super::stage_table(&self.writer, &self.ledger, &time, &staging)?;
        super::stage_table(&self.writer, &self.ledger, &facts.songplays, &staging)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Stage for LogDataStage {
    fn name(&self) -> &str {
        "log_data"
    }

    async fn execute(
        &self,
        item: &dyn treadle::WorkItem,
        _ctx: &mut StageContext,
    ) -> treadle::Result<StageOutcome> {
        log::info!("Processing log data under {}", self.settings.events_root().display());
        self.run(item.id())
            .map_err(|e| super::stage_failed("log_data", &e))?;
        Ok(StageOutcome::Complete)
    }
}
