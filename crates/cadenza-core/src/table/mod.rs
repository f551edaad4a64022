//! Columnar layouts for the star-schema tables.
//!
//! Each output table has a fixed Arrow schema and converts to and from a
//! single [`RecordBatch`]. The schemas are the contract for downstream
//! readers of the Parquet output; keep changes backwards-compatible.

mod columns;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;

use crate::error::Result;

pub use columns::{
    column, opt_f64, opt_string, timestamp_at, timestamp_field, timestamp_type, utc_millis,
};

/// A table of the star schema.
pub trait Table: Sized {
    /// Directory name under the output root.
    const NAME: &'static str;

    /// Partition columns, outermost first. Empty for unpartitioned tables.
    const PARTITION_BY: &'static [&'static str];

    fn schema() -> SchemaRef;

    fn to_batch(rows: &[Self]) -> Result<RecordBatch>;

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>>;
}
