use std::sync::Arc;

use arrow::array::{Array, Float64Array, StringArray, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

const UTC: &str = "UTC";

/// Millisecond timestamps, pinned to UTC.
#[must_use]
pub fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Millisecond, Some(Arc::from(UTC)))
}

#[must_use]
pub fn timestamp_field(name: &str) -> Field {
    Field::new(name, timestamp_type(), false)
}

/// Convert epoch milliseconds to a UTC instant.
///
/// Returns `None` when the value is outside the representable range.
#[must_use]
pub fn utc_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// Look up a column by name and downcast it to its concrete array type.
pub fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|_| Error::MissingColumn(name.to_string()))?;

    batch
        .column(idx)
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::ColumnType {
            column: name.to_string(),
            expected: std::any::type_name::<T>(),
        })
}

#[must_use]
pub fn opt_string(array: &StringArray, idx: usize) -> Option<String> {
    if array.is_null(idx) {
        None
    } else {
        Some(array.value(idx).to_string())
    }
}

#[must_use]
pub fn opt_f64(array: &Float64Array, idx: usize) -> Option<f64> {
    if array.is_null(idx) {
        None
    } else {
        Some(array.value(idx))
    }
}

pub fn timestamp_at(array: &TimestampMillisecondArray, idx: usize) -> Result<DateTime<Utc>> {
    let millis = array.value(idx);
    utc_millis(millis)
        .ok_or_else(|| Error::InvalidData(format!("timestamp {millis} ms is out of range")))
}
