use std::sync::Arc;

use arrow::array::{Int32Array, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::distinct::RowKey;
use crate::error::Result;
use crate::table::{column, timestamp_at, timestamp_field, Table};

/// A row of the `time` dimension.
///
/// All calendar fields are computed in UTC, so a given `start_time` always
/// lands in the same buckets no matter where the job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRecord {
    pub start_time: DateTime<Utc>,
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub hour: i32,
    /// ISO 8601 week number.
    pub week: i32,
    /// ISO 8601 weekday, Monday = 1 through Sunday = 7.
    pub weekday: i32,
}

impl TimeRecord {
    #[must_use]
    pub fn from_start_time(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            year: start_time.year(),
            month: start_time.month() as i32,
            day: start_time.day() as i32,
            hour: start_time.hour() as i32,
            week: start_time.iso_week().week() as i32,
            weekday: start_time.weekday().number_from_monday() as i32,
        }
    }
}

impl RowKey for TimeRecord {
    type Key = DateTime<Utc>;

    fn row_key(&self) -> Self::Key {
        self.start_time
    }
}

impl Table for TimeRecord {
    const NAME: &'static str = "time";
    const PARTITION_BY: &'static [&'static str] = &["year", "month"];

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            timestamp_field("start_time"),
            Field::new("year", DataType::Int32, false),
            Field::new("month", DataType::Int32, false),
            Field::new("day", DataType::Int32, false),
            Field::new("hour", DataType::Int32, false),
            Field::new("week", DataType::Int32, false),
            Field::new("weekday", DataType::Int32, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let start_times = TimestampMillisecondArray::from_iter_values(
            rows.iter().map(|r| r.start_time.timestamp_millis()),
        )
        .with_timezone("UTC");
        let int_column =
            |f: fn(&Self) -> i32| Int32Array::from_iter_values(rows.iter().map(f));

        Ok(RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(start_times),
                Arc::new(int_column(|r| r.year)),
                Arc::new(int_column(|r| r.month)),
                Arc::new(int_column(|r| r.day)),
                Arc::new(int_column(|r| r.hour)),
                Arc::new(int_column(|r| r.week)),
                Arc::new(int_column(|r| r.weekday)),
            ],
        )?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let start_times = column::<TimestampMillisecondArray>(batch, "start_time")?;
        let years = column::<Int32Array>(batch, "year")?;
        let months = column::<Int32Array>(batch, "month")?;
        let days = column::<Int32Array>(batch, "day")?;
        let hours = column::<Int32Array>(batch, "hour")?;
        let weeks = column::<Int32Array>(batch, "week")?;
        let weekdays = column::<Int32Array>(batch, "weekday")?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(Self {
                    start_time: timestamp_at(start_times, i)?,
                    year: years.value(i),
                    month: months.value(i),
                    day: days.value(i),
                    hour: hours.value(i),
                    week: weeks.value(i),
                    weekday: weekdays.value(i),
                })
            })
            .collect()
    }
}
