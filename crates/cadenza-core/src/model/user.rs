use std::sync::Arc;

use arrow::array::StringArray;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};

use crate::distinct::RowKey;
use crate::error::Result;
use crate::table::{column, opt_string, Table};

/// A row of the `users` dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserRecord {
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    /// Subscription level at the time of the event (`free` or `paid`).
    pub level: String,
}

impl RowKey for UserRecord {
    type Key = Self;

    fn row_key(&self) -> Self::Key {
        self.clone()
    }
}

impl Table for UserRecord {
    const NAME: &'static str = "users";
    const PARTITION_BY: &'static [&'static str] = &[];

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("user_id", DataType::Utf8, false),
            Field::new("first_name", DataType::Utf8, true),
            Field::new("last_name", DataType::Utf8, true),
            Field::new("gender", DataType::Utf8, true),
            Field::new("level", DataType::Utf8, false),
        ]))
    }

    fn to_batch(rows: &[Self]) -> Result<RecordBatch> {
        let user_ids = StringArray::from_iter_values(rows.iter().map(|r| r.user_id.as_str()));
        let first_names = StringArray::from(
            rows.iter()
                .map(|r| r.first_name.as_deref())
                .collect::<Vec<_>>(),
        );
        let last_names = StringArray::from(
            rows.iter()
                .map(|r| r.last_name.as_deref())
                .collect::<Vec<_>>(),
        );
        let genders = StringArray::from(rows.iter().map(|r| r.gender.as_deref()).collect::<Vec<_>>());
        let levels = StringArray::from_iter_values(rows.iter().map(|r| r.level.as_str()));

        Ok(RecordBatch::try_new(
            Self::schema(),
            vec![
                Arc::new(user_ids),
                Arc::new(first_names),
                Arc::new(last_names),
                Arc::new(genders),
                Arc::new(levels),
            ],
        )?)
    }

    fn from_batch(batch: &RecordBatch) -> Result<Vec<Self>> {
        let user_ids = column::<StringArray>(batch, "user_id")?;
        let first_names = column::<StringArray>(batch, "first_name")?;
        let last_names = column::<StringArray>(batch, "last_name")?;
        let genders = column::<StringArray>(batch, "gender")?;
        let levels = column::<StringArray>(batch, "level")?;

        Ok((0..batch.num_rows())
            .map(|i| Self {
                user_id: user_ids.value(i).to_string(),
                first_name: opt_string(first_names, i),
                last_name: opt_string(last_names, i),
                gender: opt_string(genders, i),
                level: levels.value(i).to_string(),
            })
            .collect())
    }
}
