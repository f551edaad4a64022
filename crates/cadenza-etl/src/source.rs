//! Input discovery and the malformed-record policy shared by the readers.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{EtlError, EtlResult};

/// What a reader does with a record it cannot parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParsePolicy {
    /// Fail the run on the first malformed record.
    #[default]
    Abort,
    /// Drop malformed records, logging and counting each one.
    Skip,
}

/// Records accepted by a reader plus the number it skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub skipped: usize,
}

impl<T> Default for Parsed<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped: 0,
        }
    }
}

impl<T> Parsed<T> {
    /// Apply the policy to one parse result.
    ///
    /// Non-parse errors always propagate.
    pub(crate) fn accept(&mut self, policy: ParsePolicy, result: EtlResult<T>) -> EtlResult<()> {
        match result {
            Ok(record) => self.records.push(record),
            Err(e) if e.is_parse() && policy == ParsePolicy::Skip => {
                log::warn!("Skipping {e}");
                self.skipped += 1;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }

    pub(crate) fn extend(&mut self, other: Self) {
        self.records.extend(other.records);
        self.skipped += other.skipped;
    }
}

fn is_json_file(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// All `*.json` files below `root` at any depth, in sorted path order.
///
/// A missing `root` is an error.
pub fn json_files(root: &Path) -> EtlResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && is_json_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

pub(crate) fn read_to_string(path: &Path) -> EtlResult<String> {
    std::fs::read_to_string(path).map_err(|e| EtlError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_json_files_walks_nested_directories() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("A").join("B").join("C");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("TRAAA.json"), "{}").unwrap();
        fs::write(dir.path().join("top.JSON"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let files = json_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().any(|p| p.ends_with("A/B/C/TRAAA.json")));
    }

    #[test]
    fn test_json_files_missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(json_files(&dir.path().join("absent")).is_err());
    }

    #[test]
    fn test_accept_applies_policy() {
        let mut parsed = Parsed::default();
        parsed.accept(ParsePolicy::Skip, Ok(1)).unwrap();
        parsed
            .accept(ParsePolicy::Skip, Err(EtlError::parse("line 2", "bad")))
            .unwrap();
        assert_eq!(parsed.records, vec![1]);
        assert_eq!(parsed.skipped, 1);

        let result = parsed.accept(ParsePolicy::Abort, Err(EtlError::parse("line 3", "bad")));
        assert!(result.unwrap_err().is_parse());
    }

    #[test]
    fn test_accept_never_skips_io_errors() {
        let mut parsed: Parsed<i32> = Parsed::default();
        let io = EtlError::io("x", std::io::Error::other("disk gone"));
        assert!(parsed.accept(ParsePolicy::Skip, Err(io)).is_err());
    }
}
