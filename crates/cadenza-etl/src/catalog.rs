//! Catalog reader: song/artist records, one JSON object per song.

use std::path::Path;

use cadenza_core::model::SongRecord;
use serde_json::{Deserializer, Value};

use crate::error::{EtlError, EtlResult};
use crate::source::{self, ParsePolicy, Parsed};

/// Reads catalog files into typed [`SongRecord`]s.
///
/// Every well-formed record is kept exactly once; there is no filtering.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogReader {
    policy: ParsePolicy,
}

impl CatalogReader {
    #[must_use]
    pub fn new(policy: ParsePolicy) -> Self {
        Self { policy }
    }

    /// Read every `*.json` file under `root`.
    pub fn read_dir(&self, root: &Path) -> EtlResult<Parsed<SongRecord>> {
        let mut parsed = Parsed::default();
        let files = source::json_files(root)?;
        log::debug!("Reading {} catalog files under {}", files.len(), root.display());

        for path in &files {
            let content = source::read_to_string(path)?;
            parsed.extend(self.read_str(&path.display().to_string(), &content)?);
        }

        log::info!(
            "Catalog: {} records from {} files ({} skipped)",
            parsed.records.len(),
            files.len(),
            parsed.skipped
        );
        Ok(parsed)
    }

    /// Parse one catalog document. `origin` names it in error messages.
    ///
    /// A document holds one or more whitespace-separated JSON objects. A JSON
    /// syntax error ends the document: everything from that point on counts
    /// as a single malformed record.
    pub fn read_str(&self, origin: &str, content: &str) -> EtlResult<Parsed<SongRecord>> {
        let mut parsed = Parsed::default();
        for result in parse_records(origin, content) {
            parsed.accept(self.policy, result)?;
        }
        Ok(parsed)
    }
}

fn parse_records(origin: &str, content: &str) -> Vec<EtlResult<SongRecord>> {
    let mut results = Vec::new();
    for (idx, value) in Deserializer::from_str(content)
        .into_iter::<Value>()
        .enumerate()
    {
        let location = format!("{origin} record {}", idx + 1);
        match value {
            Ok(value) => results.push(
                serde_json::from_value::<SongRecord>(value)
                    .map_err(|e| EtlError::parse(location, e)),
            ),
            Err(e) => {
                // The stream cannot resynchronize after a syntax error.
                results.push(Err(EtlError::parse(
                    location,
                    format!("{e}; rest of the document discarded"),
                )));
                break;
            }
        }
    }
    results
}
