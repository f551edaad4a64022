use std::sync::Arc;

use arrow::array::{Int32Array, Int64Array, StringArray, TimestampMillisecondArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::distinct::RowKey;
use crate::error::Result;
use crate::model::{EventRecord, SongRecord};
use crate::table::{column, opt_string, timestamp_at, timestamp_field, Table};

/// A row of the `songplays` fact table.
///
/// `year` and `month` are derived from the row's own `start_time` (UTC)
/// and are the partition columns of the stored table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SongplayRecord {
    pub start_time: DateTime<Utc>,
    pub user_id: String,
    pub level: String,
    pub song_id: String,
    pub artist_id: String,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
    pub year: i32,
    pub month: i32,
}

impl SongplayRecord {
    /// Fact row for an event matched to a catalog song.
    #[must_use]
    pub fn new(event: &EventRecord, song: &SongRecord) -> Self {
        Self {
            start_time: event.start_time,
            user_id: event.user_id.clone(),
            level: event.level.clone(),
            song_id: song.song_id.clone(),
            artist_id: song.artist_id.clone(),
            session_id: event.session_id,
            location: event.location.clone(),
            user_agent: event.user_agent.clone(),
            year: event.start_time.year(),
            month: event.start_time.month() as i32,
        }
    }
}

impl RowKey for SongplayRecord {
    type Key = Self;

    fn row_key(&self) -> Self::Key {
        self.clone()
    }
}

impl Table for SongplayRecord {
    const NAME: &'static str = "songplay";
    const PARTITION_BY: &'static [&'static str] = &["year", "month"];

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            timestamp_field("start_time"),
            Field::new("user_id", DataType::Utf8, false),
            Field::new("level", DataType::Utf8, false),
            Field::new("song_id", DataType::Utf8, false),
            Field::new("artist_id", DataType::Utf8, false),
            Field::new("session_id", DataType::Int64, false),
            Field::new("location", DataType::Utf8, true),
            Field::new("user_agent", DataType::Utf8, true),
            Field::new("year", DataType::Int32, false),
            Field::new("month", DataType::Int32, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let start_times = TimestampMillisecondArray::from_iter_values(
            rows.iter().map(|r| r.start_time.timestamp_millis()),
        )
        .with_timezone("UTC");
        let user_ids = StringArray::from_iter_values(rows.iter().map(|r| r.user_id.as_str()));
        let levels = StringArray::from_iter_values(rows.iter().map(|r| r.level.as_str()));
        let song_ids = StringArray::from_iter_values(rows.iter().map(|r| r.song_id.as_str()));
        let artist_ids = StringArray::from_iter_values(rows.iter().map(|r| r.artist_id.as_str()));
        let session_ids = Int64Array::from_iter_values(rows.iter().map(|r| r.session_id));
        let locations = StringArray::from(
            rows.iter()
                .map(|r| r.location.as_deref())
                .collect::<Vec<_>>(),
        );
        let user_agents = StringArray::from(
            rows.iter()
                .map(|r| r.user_agent.as_deref())
                .collect::<Vec<_>>(),
        );
        let years = Int32Array::from_iter_values(rows.iter().map(|r| r.year));
        let months = Int32Array::from_iter_values(rows.iter().map(|r| r.month));

        Ok(RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(start_times),
                Arc::new(user_ids),
                Arc::new(levels),
                Arc::new(song_ids),
                Arc::new(artist_ids),
                Arc::new(session_ids),
                Arc::new(locations),
                Arc::new(user_agents),
                Arc::new(years),
                Arc::new(months),
            ],
        )?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let start_times = column::<TimestampMillisecondArray>(batch, "start_time")?;
        let user_ids = column::<StringArray>(batch, "user_id")?;
        let levels = column::<StringArray>(batch, "level")?;
        let song_ids = column::<StringArray>(batch, "song_id")?;
        let artist_ids = column::<StringArray>(batch, "artist_id")?;
        let session_ids = column::<Int64Array>(batch, "session_id")?;
        let locations = column::<StringArray>(batch, "location")?;
        let user_agents = column::<StringArray>(batch, "user_agent")?;
        let years = column::<Int32Array>(batch, "year")?;
        let months = column::<Int32Array>(batch, "month")?;

        (0..batch.num_rows())
            .map(|i| {
                Ok(Self {
                    start_time: timestamp_at(start_times, i)?,
                    user_id: user_ids.value(i).to_string(),
                    level: levels.value(i).to_string(),
                    song_id: song_ids.value(i).to_string(),
                    artist_id: artist_ids.value(i).to_string(),
                    session_id: session_ids.value(i),
                    location: opt_string(locations, i),
                    user_agent: opt_string(user_agents, i),
                    year: years.value(i),
                    month: months.value(i),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::utc_millis;

    fn event() -> EventRecord {
        EventRecord {
            artist: "Eminem".to_string(),
            song: "Lose Yourself".to_string(),
            length: 326.43,
            level: "free".to_string(),
            session_id: 100,
            location: Some("X".to_string()),
            user_agent: Some("UA".to_string()),
            ts: 1_541_207_953_796,
            start_time: utc_millis(1_541_207_953_796).unwrap(),
            user_id: "26".to_string(),
            first_name: None,
            last_name: None,
            gender: None,
            page: "NextSong".to_string(),
        }
    }

    fn song() -> SongRecord {
        SongRecord {
            song_id: "S1".to_string(),
            title: "Lose Yourself".to_string(),
            artist_id: "A1".to_string(),
            artist_name: "Eminem".to_string(),
            artist_location: None,
            artist_latitude: None,
            artist_longitude: None,
            year: 2002,
            duration: 326.43,
        }
    }

    #[test]
    fn test_partition_columns_follow_start_time() {
        let row = SongplayRecord::new(&event(), &song());
        assert_eq!(row.year, 2018);
        assert_eq!(row.month, 11);
        assert_eq!(row.song_id, "S1");
        assert_eq!(row.artist_id, "A1");
        assert_eq!(row.session_id, 100);
    }

    #[test]
    fn test_songplay_batch_round_trip() {
        let rows = vec![SongplayRecord::new(&event(), &song())];
        let batch = SongplayRecord::to_batch(&rows).unwrap();
        assert_eq!(SongplayRecord::from_batch(&batch).unwrap(), rows);
    }
}
