use std::sync::Arc;

use arrow::array::{Float64Array, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::distinct::{float_bits, RowKey};
use crate::error::Result;
use crate::model::artist::ArtistRecord;
use crate::table::{column, Table};

/// A song as published in the catalog, one per catalog record.
///
/// Field names match the catalog JSON keys. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongRecord {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub artist_name: String,
    #[serde(default)]
    pub artist_location: Option<String>,
    #[serde(default)]
    pub artist_latitude: Option<f64>,
    #[serde(default)]
    pub artist_longitude: Option<f64>,
    pub year: i32,
    /// Track length in seconds.
    pub duration: f64,
}

impl SongRecord {
    /// Projection onto the `songs` dimension.
    #[must_use]
    pub fn song_row(&self) -> SongRow {
        SongRow {
            song_id: self.song_id.clone(),
            title: self.title.clone(),
            artist_id: self.artist_id.clone(),
            year: self.year,
            duration: self.duration,
        }
    }

    /// Projection onto the `artists` dimension.
    #[must_use]
    pub fn artist(&self) -> ArtistRecord {
        ArtistRecord {
            artist_id: self.artist_id.clone(),
            name: self.artist_name.clone(),
            location: self.artist_location.clone(),
            latitude: self.artist_latitude,
            longitude: self.artist_longitude,
        }
    }
}

/// A row of the `songs` dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongRow {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub year: i32,
    pub duration: f64,
}

impl RowKey for SongRow {
    type Key = (String, String, String, i32, u64);

    fn row_key(&self) -> Self::Key {
        (
            self.song_id.clone(),
            self.title.clone(),
            self.artist_id.clone(),
            self.year,
            float_bits(self.duration),
        )
    }
}

impl SongRow {
    /// Total order used to pick one row when a `song_id` carries
    /// conflicting attributes.
    #[must_use]
    pub fn canonical_cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.title
            .cmp(&other.title)
            .then_with(|| self.artist_id.cmp(&other.artist_id))
            .then_with(|| self.year.cmp(&other.year))
            .then_with(|| self.duration.total_cmp(&other.duration))
    }
}

impl Table for SongRow {
    const NAME: &'static str = "songs";
    const PARTITION_BY: &'static [&'static str] = &["year", "artist_id"];

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("song_id", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("artist_id", DataType::Utf8, false),
            Field::new("year", DataType::Int32, false),
            Field::new("duration", DataType::Float64, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let song_ids = StringArray::from_iter_values(rows.iter().map(|r| r.song_id.as_str()));
        let titles = StringArray::from_iter_values(rows.iter().map(|r| r.title.as_str()));
        let artist_ids = StringArray::from_iter_values(rows.iter().map(|r| r.artist_id.as_str()));
        let years = Int32Array::from_iter_values(rows.iter().map(|r| r.year));
        let durations = Float64Array::from_iter_values(rows.iter().map(|r| r.duration));

        Ok(RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(song_ids),
                Arc::new(titles),
                Arc::new(artist_ids),
                Arc::new(years),
                Arc::new(durations),
            ],
        )?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let song_ids = column::<StringArray>(batch, "song_id")?;
        let titles = column::<StringArray>(batch, "title")?;
        let artist_ids = column::<StringArray>(batch, "artist_id")?;
        let years = column::<Int32Array>(batch, "year")?;
        let durations = column::<Float64Array>(batch, "duration")?;

        Ok((0..batch.num_rows())
            .map(|i| Self {
                song_id: song_ids.value(i).to_string(),
                title: titles.value(i).to_string(),
                artist_id: artist_ids.value(i).to_string(),
                year: years.value(i),
                duration: durations.value(i),
            })
            .collect())
    }
}
