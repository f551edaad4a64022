//! Error types for the batch job.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading, transforming, or writing tables.
#[derive(Debug, Error)]
pub enum EtlError {
    /// A filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Walking an input or output directory failed.
    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// An input record could not be parsed into its typed form.
    #[error("malformed record at {location}: {message}")]
    Parse { location: String, message: String },

    /// A table could not be converted to or from its columnar form.
    #[error("table error: {0}")]
    Table(#[from] cadenza_core::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// A partition column has a type that cannot be encoded in a path.
    #[error("unsupported partition column '{column}' of type {data_type}")]
    UnsupportedPartition { column: String, data_type: String },

    /// A directory inside a table does not follow the partition layout.
    #[error("invalid partition path {path}: {message}")]
    PartitionPath { path: PathBuf, message: String },

    /// A required configuration value is absent or blank.
    #[error("missing required configuration value: {key}")]
    MissingConfig { key: &'static str },

    /// A configuration value is present but unusable.
    #[error("invalid configuration value for {key}: {message}")]
    InvalidConfig { key: &'static str, message: String },

    /// The run finished without publishing every table.
    #[error("run incomplete, tables not {phase}: {}", missing.join(", "))]
    Incomplete {
        phase: &'static str,
        missing: Vec<String>,
    },
}

impl EtlError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(location: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            location: location.into(),
            message: message.to_string(),
        }
    }

    /// Returns `true` for per-record data-shape failures, as opposed to
    /// I/O, storage, or configuration failures.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

/// Convenience alias for batch job results.
pub type EtlResult<T> = std::result::Result<T, EtlError>;
