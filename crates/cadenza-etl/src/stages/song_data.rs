//! Song-data stage: catalog → `songs`, `artists`.

use std::sync::Arc;

use treadle::{Stage, StageContext, StageOutcome};

use crate::catalog::CatalogReader;
use crate::config::Settings;
use crate::dimensions::DimensionBuilder;
use crate::error::EtlResult;
use crate::ledger::RunLedger;
use crate::work_item::staging_dir;
use crate::writer::PartitionedWriter;

/// Reads the catalog and stages the `songs` and `artists` dimensions.
#[derive(Debug)]
pub struct SongDataStage {
    settings: Arc<Settings>,
    ledger: Arc<RunLedger>,
    writer: PartitionedWriter,
}

impl SongDataStage {
    #[must_use]
    pub fn new(settings: Arc<Settings>, ledger: Arc<RunLedger>) -> Self {
        Self {
            settings,
            ledger,
            writer: PartitionedWriter::new(),
        }
    }

    /// Build and stage both tables for the run `run_id`.
    ///
    /// On failure the run's staging area is removed.
    pub fn run(&self, run_id: &str) -> EtlResult<()> {
        let result = self.stage(run_id);
        super::discard_on_error(&self.settings.output_data, run_id, result)
    }

    fn stage(&self, run_id: &str) -> EtlResult<()> {
        let catalog = CatalogReader::new(self.settings.on_malformed)
            .read_dir(&self.settings.catalog_root())?;

        let dimensions = DimensionBuilder::new(self.settings.user_granularity);
        let songs = dimensions.songs(&catalog.records);
        let artists = dimensions.artists(&catalog.records);

        let staging = staging_dir(&self.settings.output_data, run_id);
        super::stage_table(&self.writer, &self.ledger, &songs, &staging)?;
        super::stage_table(&self.writer, &self.ledger, &artists, &staging)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Stage for SongDataStage {
    fn name(&self) -> &str {
        "song_data"
    }

    async fn execute(
        &self,
        item: &dyn treadle::WorkItem,
        _ctx: &mut StageContext,
    ) -> treadle::Result<StageOutcome> {
        log::info!("Processing song data under {}", self.settings.catalog_root().display());
        self.run(item.id())
            .map_err(|e| super::stage_failed("song_data", &e))?;
        Ok(StageOutcome::Complete)
    }
}
