//! Shared record of what a run has staged and published.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{EtlError, EtlResult};
use crate::writer::WriteSummary;

#[derive(Debug, Default)]
struct LedgerState {
    staged: BTreeMap<String, usize>,
    published: BTreeMap<String, usize>,
}

/// Table name to row count, for staged and for published tables.
///
/// Stages hold it behind an `Arc`; the binary reads it after the workflow
/// finishes to decide whether the run succeeded.
#[derive(Debug, Default)]
pub struct RunLedger {
    state: Mutex<LedgerState>,
}

impl RunLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        // A panicking stage cannot leave the maps half-updated.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_staged(&self, summary: &WriteSummary) {
        self.state()
            .staged
            .insert(summary.table.clone(), summary.rows);
    }

    pub fn record_published(&self, table: &str, rows: usize) {
        self.state().published.insert(table.to_string(), rows);
    }

    #[must_use]
    pub fn staged(&self) -> BTreeMap<String, usize> {
        self.state().staged.clone()
    }

    #[must_use]
    pub fn published(&self) -> BTreeMap<String, usize> {
        self.state().published.clone()
    }

    #[must_use]
    pub fn is_published(&self, tables: &[&str]) -> bool {
        let state = self.state();
        tables.iter().all(|t| state.published.contains_key(*t))
    }

    /// Fails with [`EtlError::Incomplete`] unless every table is staged.
    pub fn ensure_staged(&self, tables: &[&str]) -> EtlResult<()> {
        missing("staged", &self.state().staged, tables)
    }

    /// Fails with [`EtlError::Incomplete`] unless every table is published.
    pub fn ensure_published(&self, tables: &[&str]) -> EtlResult<()> {
        missing("published", &self.state().published, tables)
    }
}

fn missing(
    phase: &'static str,
    recorded: &BTreeMap<String, usize>,
    tables: &[&str],
) -> EtlResult<()> {
    let missing: Vec<String> = tables
        .iter()
        .filter(|t| !recorded.contains_key(**t))
        .map(|t| (*t).to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EtlError::Incomplete { phase, missing })
    }
}
