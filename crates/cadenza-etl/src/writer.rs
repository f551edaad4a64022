//! Partitioned Parquet storage for star-schema tables.
//!
//! Layout under an output root:
//!
//! ```text
//! <root>/<table>/<k1>=<v1>/<k2>=<v2>/part-00000.parquet
//! ```
//!
//! Partition columns live in the directory names, not in the files. Values
//! are percent-escaped the way Hive does it, and nulls are written as
//! `__HIVE_DEFAULT_PARTITION__`, so Spark, DuckDB, and other readers that
//! understand Hive partitioning see the same rows.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Int32Array, Int64Array, StringArray, UInt32Array};
use arrow::compute::{concat_batches, take_record_batch};
use arrow::datatypes::{DataType, Field, Int32Type, Int64Type, SchemaRef};
use arrow::record_batch::RecordBatch;
use cadenza_core::Table;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use walkdir::WalkDir;

use crate::error::{EtlError, EtlResult};

/// Directory name used for null partition values.
pub const DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

const PART_FILE: &str = "part-00000.parquet";

/// What a single table write produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub table: String,
    pub rows: usize,
    /// Number of Parquet files written (one per partition).
    pub files: usize,
    pub path: PathBuf,
}

/// Writes tables as Hive-partitioned Parquet.
///
/// Every write replaces the table directory as a whole, so re-running with
/// the same input yields the same output.
#[derive(Debug, Clone, Default)]
pub struct PartitionedWriter;

impl PartitionedWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Write typed rows under `root` using the table's name and partition
    /// columns.
    pub fn write<T: Table>(&self, rows: &[T], root: &Path) -> EtlResult<WriteSummary> {
        let batch = T::to_batch(rows)?;
        self.write_batch(&batch, root, T::NAME, T::PARTITION_BY)
    }

    /// Write `batch` to `<root>/<table>`, partitioned by `partition_by`.
    pub fn write_batch(
        &self,
        batch: &RecordBatch,
        root: &Path,
        table: &str,
        partition_by: &[&str],
    ) -> EtlResult<WriteSummary> {
        let table_dir = root.join(table);
        if table_dir.exists() {
            std::fs::remove_dir_all(&table_dir).map_err(|e| EtlError::io(&table_dir, e))?;
        }
        create_dir(&table_dir)?;

        let files = if partition_by.is_empty() {
            write_file(&table_dir.join(PART_FILE), batch)?;
            1
        } else {
            write_partitions(batch, &table_dir, partition_by)?
        };

        log::debug!(
            "Wrote {} rows of {} to {} ({} files)",
            batch.num_rows(),
            table,
            table_dir.display(),
            files
        );

        Ok(WriteSummary {
            table: table.to_string(),
            rows: batch.num_rows(),
            files,
            path: table_dir,
        })
    }
}

fn write_partitions(
    batch: &RecordBatch,
    table_dir: &Path,
    partition_by: &[&str],
) -> EtlResult<usize> {
    let schema = batch.schema();
    let mut key_columns = Vec::with_capacity(partition_by.len());
    for name in partition_by {
        let idx = schema
            .index_of(name)
            .map_err(|_| cadenza_core::Error::MissingColumn((*name).to_string()))?;
        check_partition_type(schema.field(idx))?;
        key_columns.push(idx);
    }
    let data_columns: Vec<usize> = (0..schema.fields().len())
        .filter(|idx| !key_columns.contains(idx))
        .collect();

    let mut groups: BTreeMap<Vec<String>, Vec<u32>> = BTreeMap::new();
    for row in 0..batch.num_rows() {
        let segments = key_columns
            .iter()
            .map(|&idx| {
                let value = partition_value(batch.column(idx), row);
                format!(
                    "{}={}",
                    schema.field(idx).name(),
                    value.as_deref().map_or_else(
                        || DEFAULT_PARTITION.to_string(),
                        escape_partition_value
                    )
                )
            })
            .collect();
        groups.entry(segments).or_default().push(row as u32);
    }

    for (segments, rows) in &groups {
        let dir = segments
            .iter()
            .fold(table_dir.to_path_buf(), |dir, segment| dir.join(segment));
        create_dir(&dir)?;
        let indices = UInt32Array::from(rows.clone());
        let part = take_record_batch(batch, &indices)?.project(&data_columns)?;
        write_file(&dir.join(PART_FILE), &part)?;
    }

    Ok(groups.len())
}

fn create_dir(dir: &Path) -> EtlResult<()> {
    std::fs::create_dir_all(dir).map_err(|e| EtlError::io(dir, e))
}

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some("cadenza".to_string()),
    };
    WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

fn write_file(path: &Path, batch: &RecordBatch) -> EtlResult<()> {
    let file = File::create(path).map_err(|e| EtlError::io(path, e))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(writer_properties()))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

fn check_partition_type(field: &Field) -> EtlResult<()> {
    match field.data_type() {
        DataType::Utf8 | DataType::Int32 | DataType::Int64 => Ok(()),
        other => Err(EtlError::UnsupportedPartition {
            column: field.name().clone(),
            data_type: other.to_string(),
        }),
    }
}

/// Raw (unescaped) partition value of a checked partition column.
fn partition_value(array: &ArrayRef, row: usize) -> Option<String> {
    if array.is_null(row) {
        return None;
    }
    match array.data_type() {
        DataType::Utf8 => Some(array.as_string::<i32>().value(row).to_string()),
        DataType::Int32 => Some(array.as_primitive::<Int32Type>().value(row).to_string()),
        DataType::Int64 => Some(array.as_primitive::<Int64Type>().value(row).to_string()),
        _ => None,
    }
}

fn needs_escape(c: char) -> bool {
    c.is_ascii_control()
        || matches!(
            c,
            '"' | '#' | '%' | '\'' | '*' | '/' | ':' | '=' | '?' | '\\' | '{' | '[' | ']' | '^'
        )
}

/// Percent-escape a partition value for use in a directory name.
#[must_use]
pub fn escape_partition_value(value: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if needs_escape(c) {
            let byte = c as u8;
            escaped.push('%');
            escaped.push(char::from(HEX[usize::from(byte >> 4)]));
            escaped.push(char::from(HEX[usize::from(byte & 0x0F)]));
        } else {
            escaped.push(c);
        }
    }
    escaped
}

/// Inverse of [`escape_partition_value`]. `None` if the result is not UTF-8.
#[must_use]
pub fn unescape_partition_value(segment: &str) -> Option<String> {
    fn hex(byte: u8) -> Option<u8> {
        char::from(byte).to_digit(16).map(|d| d as u8)
    }

    let bytes = segment.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                out.push((high << 4) | low);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).ok()
}

/// Parse the `key=value` directories between a table root and a file.
fn partition_segments(table_dir: &Path, file: &Path) -> EtlResult<Vec<(String, Option<String>)>> {
    let invalid = |message: &str| EtlError::PartitionPath {
        path: file.to_path_buf(),
        message: message.to_string(),
    };

    let relative = file
        .strip_prefix(table_dir)
        .map_err(|_| invalid("file is outside the table directory"))?;
    let Some(parent) = relative.parent() else {
        return Ok(Vec::new());
    };

    parent
        .components()
        .map(|component| {
            let segment = component
                .as_os_str()
                .to_str()
                .ok_or_else(|| invalid("directory name is not UTF-8"))?;
            let (key, value) = segment
                .split_once('=')
                .ok_or_else(|| invalid("directory is not a key=value partition"))?;
            let value = if value == DEFAULT_PARTITION {
                None
            } else {
                Some(
                    unescape_partition_value(value)
                        .ok_or_else(|| invalid("partition value is not UTF-8"))?,
                )
            };
            Ok((key.to_string(), value))
        })
        .collect()
}

fn partition_array(field: &Field, raw: Option<&str>, rows: usize) -> EtlResult<ArrayRef> {
    let bad_value = |value: &str| cadenza_core::Error::InvalidData(format!(
        "partition value '{value}' is not a valid {} for column '{}'",
        field.data_type(),
        field.name()
    ));

    let array: ArrayRef = match field.data_type() {
        DataType::Utf8 => Arc::new(StringArray::from(vec![raw; rows])),
        DataType::Int32 => {
            let value = raw
                .map(|v| v.parse::<i32>().map_err(|_| bad_value(v)))
                .transpose()?;
            Arc::new(Int32Array::from(vec![value; rows]))
        }
        DataType::Int64 => {
            let value = raw
                .map(|v| v.parse::<i64>().map_err(|_| bad_value(v)))
                .transpose()?;
            Arc::new(Int64Array::from(vec![value; rows]))
        }
        other => {
            return Err(EtlError::UnsupportedPartition {
                column: field.name().clone(),
                data_type: other.to_string(),
            })
        }
    };
    Ok(array)
}

fn restore_partitions(
    schema: &SchemaRef,
    batch: &RecordBatch,
    partitions: &[(String, Option<String>)],
) -> EtlResult<RecordBatch> {
    let columns = schema
        .fields()
        .iter()
        .map(|field| match partitions.iter().find(|(key, _)| key == field.name()) {
            Some((_, value)) => partition_array(field, value.as_deref(), batch.num_rows()),
            None => batch
                .column_by_name(field.name())
                .cloned()
                .ok_or_else(|| cadenza_core::Error::MissingColumn(field.name().clone()).into()),
        })
        .collect::<EtlResult<Vec<ArrayRef>>>()?;

    Ok(RecordBatch::try_new(Arc::clone(schema), columns)?)
}

/// Read `<root>/<table>` back into one batch with the given schema.
///
/// Partition columns are restored from the directory names. Row order is
/// not preserved.
pub fn read_batch(root: &Path, table: &str, schema: &SchemaRef) -> EtlResult<RecordBatch> {
    let table_dir = root.join(table);
    let mut batches = Vec::new();

    for entry in WalkDir::new(&table_dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file()
            || path.extension().and_then(|ext| ext.to_str()) != Some("parquet")
        {
            continue;
        }

        let partitions = partition_segments(&table_dir, path)?;
        let file = File::open(path).map_err(|e| EtlError::io(path, e))?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
        for batch in reader {
            batches.push(restore_partitions(schema, &batch?, &partitions)?);
        }
    }

    Ok(concat_batches(schema, &batches)?)
}

/// Read a table written by [`PartitionedWriter::write`].
pub fn read_table<T: Table>(root: &Path) -> EtlResult<Vec<T>> {
    let batch = read_batch(root, T::NAME, &T::schema())?;
    Ok(T::from_batch(&batch)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Float64Array;
    use arrow::datatypes::Schema;
    use cadenza_core::model::{ArtistRecord, SongRow, SongplayRecord, TimeRecord, UserRecord};
    use cadenza_core::table::utc_millis;
    use tempfile::TempDir;

    fn song(song_id: &str, artist_id: &str, year: i32) -> SongRow {
        SongRow {
            song_id: song_id.to_string(),
            title: format!("Title {song_id}"),
            artist_id: artist_id.to_string(),
            year,
            duration: 218.93179,
        }
    }

    fn sorted_songs(mut rows: Vec<SongRow>) -> Vec<SongRow> {
        rows.sort_by(|a, b| a.song_id.cmp(&b.song_id));
        rows
    }

    #[test]
    fn test_songs_layout_and_round_trip() {
        let dir = TempDir::new().unwrap();
        let rows = vec![
            song("S1", "AR1", 2002),
            song("S2", "AR1", 2002),
            song("S3", "AR/2=x", 0),
        ];

        let summary = PartitionedWriter::new().write(&rows, dir.path()).unwrap();
        assert_eq!(summary.rows, 3);
        assert_eq!(summary.files, 2);
        assert!(dir
            .path()
            .join("songs/year=2002/artist_id=AR1")
            .join(PART_FILE)
            .exists());
        assert!(dir.path().join("songs/year=0/artist_id=AR%2F2%3Dx").is_dir());

        let back: Vec<SongRow> = read_table(dir.path()).unwrap();
        assert_eq!(sorted_songs(back), sorted_songs(rows));
    }

    #[test]
    fn test_partition_columns_are_not_stored_in_files() {
        let dir = TempDir::new().unwrap();
        PartitionedWriter::new()
            .write(&[song("S1", "AR1", 2002)], dir.path())
            .unwrap();

        let file = File::open(
            dir.path()
                .join("songs/year=2002/artist_id=AR1")
                .join(PART_FILE),
        )
        .unwrap();
        let builder = ParquetRecordBatchReaderBuilder::try_new(file).unwrap();
        let names: Vec<&String> = builder.schema().fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, ["song_id", "title", "duration"]);
    }

    #[test]
    fn test_rewrite_replaces_previous_output() {
        let dir = TempDir::new().unwrap();
        let writer = PartitionedWriter::new();
        writer
            .write(&[song("OLD", "AR9", 1990), song("S1", "AR1", 2002)], dir.path())
            .unwrap();
        writer.write(&[song("S1", "AR1", 2002)], dir.path()).unwrap();
        writer.write(&[song("S1", "AR1", 2002)], dir.path()).unwrap();

        let back: Vec<SongRow> = read_table(dir.path()).unwrap();
        assert_eq!(back, vec![song("S1", "AR1", 2002)]);
        assert!(!dir.path().join("songs/year=1990").exists());
    }

    #[test]
    fn test_unpartitioned_round_trip_with_nulls() {
        let dir = TempDir::new().unwrap();
        let rows = vec![
            ArtistRecord {
                artist_id: "AR1".to_string(),
                name: "Casual".to_string(),
                location: None,
                latitude: None,
                longitude: None,
            },
            ArtistRecord {
                artist_id: "AR2".to_string(),
                name: "Planet P Project".to_string(),
                location: Some("California - LA".to_string()),
                latitude: Some(34.05),
                longitude: Some(-118.24),
            },
        ];
        PartitionedWriter::new().write(&rows, dir.path()).unwrap();
        assert!(dir.path().join("artists").join(PART_FILE).exists());

        let mut back: Vec<ArtistRecord> = read_table(dir.path()).unwrap();
        back.sort_by(|a, b| a.artist_id.cmp(&b.artist_id));
        assert_eq!(back, rows);

        let users = vec![UserRecord {
            user_id: "26".to_string(),
            first_name: Some("Ryan".to_string()),
            last_name: None,
            gender: Some("M".to_string()),
            level: "free".to_string(),
        }];
        PartitionedWriter::new().write(&users, dir.path()).unwrap();
        assert_eq!(read_table::<UserRecord>(dir.path()).unwrap(), users);
    }

    #[test]
    fn test_time_and_songplays_round_trip() {
        let dir = TempDir::new().unwrap();
        let times: Vec<TimeRecord> = [1_541_207_953_796, 1_543_622_400_000]
            .into_iter()
            .map(|ms| TimeRecord::from_start_time(utc_millis(ms).unwrap()))
            .collect();
        let summary = PartitionedWriter::new().write(&times, dir.path()).unwrap();
        assert_eq!(summary.files, 2);
        assert!(dir.path().join("time/year=2018/month=11").is_dir());
        assert!(dir.path().join("time/year=2018/month=12").is_dir());

        let mut back: Vec<TimeRecord> = read_table(dir.path()).unwrap();
        back.sort_by_key(|t| t.start_time);
        assert_eq!(back, times);

        let plays = vec![SongplayRecord {
            start_time: times[0].start_time,
            user_id: "26".to_string(),
            level: "free".to_string(),
            song_id: "S1".to_string(),
            artist_id: "A1".to_string(),
            session_id: 100,
            location: Some("X".to_string()),
            user_agent: None,
            year: 2018,
            month: 11,
        }];
        PartitionedWriter::new().write(&plays, dir.path()).unwrap();
        assert!(dir.path().join("songplay/year=2018/month=11").is_dir());
        assert_eq!(read_table::<SongplayRecord>(dir.path()).unwrap(), plays);
    }

    #[test]
    fn test_empty_partitioned_table_reads_back_empty() {
        let dir = TempDir::new().unwrap();
        let summary = PartitionedWriter::new()
            .write::<SongRow>(&[], dir.path())
            .unwrap();
        assert_eq!(summary.files, 0);
        assert!(dir.path().join("songs").is_dir());
        assert!(read_table::<SongRow>(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_null_partition_values_use_default_directory() {
        let dir = TempDir::new().unwrap();
        let schema = Arc::new(Schema::new(vec![
            Field::new("region", DataType::Utf8, true),
            Field::new("score", DataType::Float64, false),
        ]));
        let batch = RecordBatch::try_new(
            Arc::clone(&schema),
            vec![
                Arc::new(StringArray::from(vec![Some("eu"), None])),
                Arc::new(Float64Array::from(vec![1.0, 2.0])),
            ],
        )
        .unwrap();

        PartitionedWriter::new()
            .write_batch(&batch, dir.path(), "scores", &["region"])
            .unwrap();
        assert!(dir
            .path()
            .join("scores")
            .join(format!("region={DEFAULT_PARTITION}"))
            .is_dir());

        let back = read_batch(dir.path(), "scores", &schema).unwrap();
        assert_eq!(back.num_rows(), 2);
        assert_eq!(back.column(0).null_count(), 1);
    }

    #[test]
    fn test_float_partition_column_is_rejected() {
        let dir = TempDir::new().unwrap();
        let batch = SongRow::to_batch(&[song("S1", "AR1", 2002)]).unwrap();
        let err = PartitionedWriter::new()
            .write_batch(&batch, dir.path(), "songs", &["duration"])
            .unwrap_err();
        assert!(matches!(err, EtlError::UnsupportedPartition { .. }));
    }

    #[test]
    fn test_escape_round_trip() {
        for value in ["plain", "a/b", "100%", "k=v?", "tab\there", "Beyoncé"] {
            let escaped = escape_partition_value(value);
            assert!(!escaped.contains('/'));
            assert_eq!(unescape_partition_value(&escaped).as_deref(), Some(value));
        }
        assert_eq!(escape_partition_value("a/b"), "a%2Fb");
    }

    #[test]
    fn test_read_rejects_foreign_directories() {
        let dir = TempDir::new().unwrap();
        PartitionedWriter::new()
            .write(&[song("S1", "AR1", 2002)], dir.path())
            .unwrap();
        let stray = dir.path().join("songs/not-a-partition");
        std::fs::create_dir_all(&stray).unwrap();
        let batch = SongRow::to_batch(&[song("S2", "AR1", 2002)]).unwrap();
        write_file(&stray.join(PART_FILE), &batch).unwrap();

        let err = read_table::<SongRow>(dir.path()).unwrap_err();
        assert!(matches!(err, EtlError::PartitionPath { .. }));
    }
}
