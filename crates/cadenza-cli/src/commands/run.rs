use anyhow::{Context, Result};
use cadenza_etl::{build_pipeline, run_to_completion, BatchRun, Config, RunLedger, ALL_TABLES};
use std::sync::Arc;

/// Run the full batch job: song_data → log_data → commit.
///
/// Fails unless every table was published.
pub async fn run_batch(config: &Config) -> Result<()> {
    let settings = Arc::new(config.validate().context("Invalid configuration")?);

    println!("\n🎵 Cadenza batch run\n");
    println!("  Catalog: {}", settings.catalog_root().display());
    println!("  Events: {}", settings.events_root().display());
    println!("  Output: {}", settings.output_data.display());
    println!();

    if let Some(parent) = settings.state_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create state directory")?;
    }

    let ledger = Arc::new(RunLedger::new());
    let workflow = build_pipeline(Arc::clone(&settings), Arc::clone(&ledger))
        .context("Failed to build pipeline")?;

    let mut store = treadle::SqliteStateStore::open(&settings.state_path)
        .await
        .context("Failed to open pipeline state store")?;

    let run = BatchRun::new();
    log::info!("Starting {run}");

    // Subscribe to events for progress display
    let mut events = workflow.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                treadle::WorkflowEvent::StageStarted { stage, .. } => {
                    println!("  ⏳ [{stage}] Starting...");
                }
                treadle::WorkflowEvent::StageCompleted { stage, .. } => {
                    println!("  ✓ [{stage}] Complete");
                }
                treadle::WorkflowEvent::StageFailed { stage, error, .. } => {
                    eprintln!("  ✗ [{stage}] FAILED: {error}");
                }
                _ => {}
            }
        }
    });

    run_to_completion(&workflow, &run, &mut store, &ledger)
        .await
        .context("Pipeline execution failed")?;
    ledger
        .ensure_published(ALL_TABLES)
        .with_context(|| format!("{run} did not complete"))?;

    println!("\n✓ Batch run complete\n");
    for (table, rows) in ledger.published() {
        println!("  {table}: {rows} rows");
    }

    Ok(())
}
