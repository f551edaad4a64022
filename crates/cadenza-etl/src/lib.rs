//! Batch job for cadenza.
//!
//! Reads the song catalog and listening events, builds the star-schema
//! dimension and fact tables, and writes them as partitioned Parquet. The
//! run is a treadle workflow of song_data, log_data, and commit stages.

#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]

pub mod catalog;
pub mod config;
pub mod dimensions;
pub mod error;
pub mod events;
pub mod facts;
pub mod ledger;
pub mod pipeline;
pub mod source;
pub mod stages;
pub mod work_item;
pub mod writer;

pub use catalog::CatalogReader;
pub use config::{Config, Settings};
pub use dimensions::{DimensionBuilder, UserGranularity};
pub use error::{EtlError, EtlResult};
pub use events::{EventBatch, EventReader};
pub use facts::{FactBuilder, FactTable};
pub use ledger::RunLedger;
pub use pipeline::{build_pipeline, run_to_completion, ALL_TABLES};
pub use source::{ParsePolicy, Parsed};
pub use stages::{CommitStage, LogDataStage, SongDataStage};
pub use work_item::BatchRun;
pub use writer::{read_table, PartitionedWriter, WriteSummary};
