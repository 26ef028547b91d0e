//! In-memory ledger with failure injection.
//!
//! Behaves like [`crate::CsvLedger`] (same row numbering, same write-once and
//! de-duplication rules) and additionally records every successful mutation
//! so tests can assert on exactly what was written.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use pmr_schemas::{LedgerColumn, LedgerRecord, MetricsWriteBack, RowIndex};

use crate::table::RawTable;
use crate::{AppendOutcome, Ledger, LedgerError};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    pub tab: String,
    pub row_index: RowIndex,
    pub write_back: MetricsWriteBack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAppend {
    pub source_tab: String,
    pub target_tab: String,
    pub row_index: RowIndex,
}

#[derive(Debug, Default)]
struct State {
    tabs: BTreeMap<String, RawTable>,
    write_failures: BTreeMap<RowIndex, LedgerError>,
    append_failures: BTreeMap<RowIndex, LedgerError>,
    history_failure: Option<LedgerError>,
    omit_content_in_listing: bool,
    writes: Vec<RecordedWrite>,
    appends: Vec<RecordedAppend>,
}

#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<State>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a tab built from `records`, placed at their row indexes.
    pub fn with_records(self, tab: &str, records: &[LedgerRecord]) -> Self {
        self.lock()
            .tabs
            .insert(tab.to_string(), RawTable::from_records(records));
        self
    }

    pub fn with_table(self, tab: &str, table: RawTable) -> Self {
        self.lock().tabs.insert(tab.to_string(), table);
        self
    }

    /// Every `write_metrics` on `row_index` fails with `err`.
    pub fn fail_write(self, row_index: RowIndex, err: LedgerError) -> Self {
        self.lock().write_failures.insert(row_index, err);
        self
    }

    /// Every `append_row` of `row_index` fails with `err`.
    pub fn fail_append(self, row_index: RowIndex, err: LedgerError) -> Self {
        self.lock().append_failures.insert(row_index, err);
        self
    }

    pub fn fail_history(self, err: LedgerError) -> Self {
        self.lock().history_failure = Some(err);
        self
    }

    /// `list_pending` returns records with empty content, like a ledger
    /// view that only projects identifier columns.
    pub fn omit_content_in_listing(self) -> Self {
        self.lock().omit_content_in_listing = true;
        self
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.lock().writes.clone()
    }

    pub fn appends(&self) -> Vec<RecordedAppend> {
        self.lock().appends.clone()
    }

    pub fn records(&self, tab: &str) -> Vec<LedgerRecord> {
        self.lock()
            .tabs
            .get(tab)
            .map(RawTable::records)
            .unwrap_or_default()
    }

    pub fn table(&self, tab: &str) -> Option<RawTable> {
        self.lock().tabs.get(tab).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn tab_ref<'a>(state: &'a State, tab: &str) -> Result<&'a RawTable, LedgerError> {
    state
        .tabs
        .get(tab)
        .ok_or_else(|| LedgerError::MissingTab(tab.to_string()))
}

#[async_trait::async_trait]
impl Ledger for MemoryLedger {
    async fn list_pending(&self, tab: &str) -> Result<Vec<LedgerRecord>, LedgerError> {
        let state = self.lock();
        let mut pending = tab_ref(&state, tab)?.pending();
        if state.omit_content_in_listing {
            for r in &mut pending {
                r.content.clear();
            }
        }
        Ok(pending)
    }

    async fn list_historical_engagement(&self, tab: &str) -> Result<Vec<f64>, LedgerError> {
        let state = self.lock();
        if let Some(err) = &state.history_failure {
            return Err(err.clone());
        }
        Ok(tab_ref(&state, tab)?.historical_engagement())
    }

    async fn write_metrics(
        &self,
        tab: &str,
        row_index: RowIndex,
        write_back: &MetricsWriteBack,
    ) -> Result<(), LedgerError> {
        let mut state = self.lock();
        if let Some(err) = state.write_failures.get(&row_index) {
            return Err(err.clone());
        }
        state
            .tabs
            .get_mut(tab)
            .ok_or_else(|| LedgerError::MissingTab(tab.to_string()))?
            .write_metrics(tab, row_index, write_back)?;
        state.writes.push(RecordedWrite {
            tab: tab.to_string(),
            row_index,
            write_back: write_back.clone(),
        });
        Ok(())
    }

    async fn append_row(
        &self,
        source_tab: &str,
        target_tab: &str,
        row_index: RowIndex,
    ) -> Result<AppendOutcome, LedgerError> {
        let mut state = self.lock();
        if let Some(err) = state.append_failures.get(&row_index) {
            return Err(err.clone());
        }
        let cells = tab_ref(&state, source_tab)?
            .row(row_index)
            .ok_or_else(|| LedgerError::UnknownRow {
                tab: source_tab.to_string(),
                row_index,
            })?
            .to_vec();

        let outcome = state
            .tabs
            .entry(target_tab.to_string())
            .or_insert_with(RawTable::with_contract_headers)
            .append_unique(cells);
        if let AppendOutcome::Appended(_) = outcome {
            state.appends.push(RecordedAppend {
                source_tab: source_tab.to_string(),
                target_tab: target_tab.to_string(),
                row_index,
            });
        }
        Ok(outcome)
    }

    async fn raw_rows(&self, tab: &str) -> Result<RawTable, LedgerError> {
        let state = self.lock();
        tab_ref(&state, tab).cloned()
    }
}

impl MemoryLedger {
    /// Cell text for assertions; `None` when the tab or row is missing.
    pub fn cell(&self, tab: &str, row_index: RowIndex, col: LedgerColumn) -> Option<String> {
        self.lock()
            .tabs
            .get(tab)
            .and_then(|t| t.cell(row_index, col))
            .map(str::to_string)
    }
}
