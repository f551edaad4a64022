use std::cmp::Ordering;
use std::sync::Arc;

use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::distinct::{opt_float_bits, RowKey};
use crate::error::Result;
use crate::table::{column, opt_f64, opt_string, Table};

/// A row of the `artists` dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistRecord {
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl ArtistRecord {
    fn populated_fields(&self) -> usize {
        usize::from(self.location.is_some())
            + usize::from(self.latitude.is_some())
            + usize::from(self.longitude.is_some())
    }

    /// Total order used to pick one row per `artist_id`.
    ///
    /// The most complete row sorts first; remaining ties fall back to a
    /// lexicographic comparison of the attributes.
    #[must_use]
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        fn opt_float(a: Option<f64>, b: Option<f64>) -> Ordering {
            match (a, b) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                (a, b) => a.is_some().cmp(&b.is_some()),
            }
        }

        other
            .populated_fields()
            .cmp(&self.populated_fields())
            .then_with(|| self.name.cmp(&other.name))
            .then_with(|| self.location.cmp(&other.location))
            .then_with(|| opt_float(self.latitude, other.latitude))
            .then_with(|| opt_float(self.longitude, other.longitude))
    }
}

impl RowKey for ArtistRecord {
    type Key = (String, String, Option<String>, Option<u64>, Option<u64>);

    fn row_key(&self) -> Self::Key {
        (
            self.artist_id.clone(),
            self.name.clone(),
            self.location.clone(),
            opt_float_bits(self.latitude),
            opt_float_bits(self.longitude),
        )
    }
}

impl Table for ArtistRecord {
    const NAME: &'static str = "artists";
    const PARTITION_BY: &'static [&'static str] = &[];

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("artist_id", DataType::Utf8, false),
            Field::new("name", DataType::Utf8, false),
            Field::new("location", DataType::Utf8, true),
            Field::new("latitude", DataType::Float64, true),
            Field::new("longitude", DataType::Float64, true),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let ids = StringArray::from_iter_values(rows.iter().map(|r| r.artist_id.as_str()));
        let names = StringArray::from_iter_values(rows.iter().map(|r| r.name.as_str()));
        let locations = StringArray::from(
            rows.iter()
                .map(|r| r.location.as_deref())
                .collect::<Vec<_>>(),
        );
        let latitudes = Float64Array::from(rows.iter().map(|r| r.latitude).collect::<Vec<_>>());
        let longitudes = Float64Array::from(rows.iter().map(|r| r.longitude).collect::<Vec<_>>());

        Ok(RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(ids),
                Arc::new(names),
                Arc::new(locations),
                Arc::new(latitudes),
                Arc::new(longitudes),
            ],
        )?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let ids = column::<StringArray>(batch, "artist_id")?;
        let names = column::<StringArray>(batch, "name")?;
        let locations = column::<StringArray>(batch, "location")?;
        let latitudes = column::<Float64Array>(batch, "latitude")?;
        let longitudes = column::<Float64Array>(batch, "longitude")?;

        Ok((0..batch.num_rows())
            .map(|i| Self {
                artist_id: ids.value(i).to_string(),
                name: names.value(i).to_string(),
                location: opt_string(locations, i),
                latitude: opt_f64(latitudes, i),
                longitude: opt_f64(longitudes, i),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artist(location: Option<&str>, latitude: Option<f64>) -> ArtistRecord {
        ArtistRecord {
            artist_id: "AR1".to_string(),
            name: "Miles Davis".to_string(),
            location: location.map(String::from),
            latitude,
            longitude: None,
        }
    }

    #[test]
    fn test_canonical_prefers_most_complete_row() {
        let sparse = artist(None, None);
        let full = artist(Some("Alton, IL"), Some(38.89));
        assert_eq!(full.canonical_cmp(&sparse), Ordering::Less);
        assert_eq!(sparse.canonical_cmp(&full), Ordering::Greater);
    }

    #[test]
    fn test_artists_batch_round_trip_with_nulls() {
        let rows = vec![artist(None, None), artist(Some("New York"), Some(40.7))];
        let batch = ArtistRecord::to_batch(&rows).unwrap();
        assert_eq!(ArtistRecord::from_batch(&batch).unwrap(), rows);
    }
}
