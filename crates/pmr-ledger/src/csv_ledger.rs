//! CSV-directory ledger.
//!
//! Each tab is a file `<dir>/<Tab>.csv` whose first row is the column
//! contract header. Every mutation is read-modify-write of the whole file,
//! written to a sibling temp file and renamed into place, under one
//! in-process lock.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::debug;

use pmr_schemas::{LedgerRecord, MetricsWriteBack, RowIndex};

use crate::table::RawTable;
use crate::{AppendOutcome, Ledger, LedgerError};

#[derive(Debug)]
pub struct CsvLedger {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl CsvLedger {
    /// Open an existing ledger directory.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(LedgerError::Io(format!(
                "ledger directory '{}' does not exist",
                dir.display()
            )));
        }
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn tab_path(&self, tab: &str) -> Result<PathBuf, LedgerError> {
        let name = tab.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(LedgerError::Malformed(format!("invalid tab name '{tab}'")));
        }
        Ok(self.dir.join(format!("{name}.csv")))
    }

    /// Create (or replace) a tab with the given contents.
    pub async fn write_tab(&self, tab: &str, table: &RawTable) -> Result<(), LedgerError> {
        let _guard = self.lock.lock().await;
        self.store(tab, table).await
    }

    async fn load(&self, tab: &str) -> Result<RawTable, LedgerError> {
        let path = self.tab_path(tab)?;
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LedgerError::MissingTab(tab.to_string()))
            }
            Err(e) => return Err(LedgerError::Io(format!("read '{}': {e}", path.display()))),
        };
        let table = parse_table(tab, &raw)?;
        table.validate_headers(tab)?;
        Ok(table)
    }

    async fn store(&self, tab: &str, table: &RawTable) -> Result<(), LedgerError> {
        let path = self.tab_path(tab)?;
        let bytes = render_table(table)?;
        let tmp = path.with_extension("csv.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| LedgerError::Io(format!("write '{}': {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| LedgerError::Io(format!("rename into '{}': {e}", path.display())))?;
        debug!(target: "pmr_ledger", tab, rows = table.rows.len(), "tab stored");
        Ok(())
    }
}

fn parse_table(tab: &str, raw: &str) -> Result<RawTable, LedgerError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(raw.as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| LedgerError::Malformed(format!("tab '{tab}' header: {e}")))?
        .iter()
        .map(String::from)
        .collect();

    let mut rows = Vec::new();
    for (i, rec) in rdr.records().enumerate() {
        let rec = rec.map_err(|e| {
            LedgerError::Malformed(format!("tab '{tab}' data row {}: {e}", i + 1))
        })?;
        rows.push(rec.iter().map(String::from).collect());
    }
    Ok(RawTable { headers, rows })
}

fn render_table(table: &RawTable) -> Result<Vec<u8>, LedgerError> {
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());
    wtr.write_record(&table.headers)
        .map_err(|e| LedgerError::Io(format!("csv encode: {e}")))?;
    for row in &table.rows {
        wtr.write_record(row)
            .map_err(|e| LedgerError::Io(format!("csv encode: {e}")))?;
    }
    wtr.into_inner()
        .map_err(|e| LedgerError::Io(format!("csv flush: {e}")))
}

#[async_trait::async_trait]
impl Ledger for CsvLedger {
    async fn list_pending(&self, tab: &str) -> Result<Vec<LedgerRecord>, LedgerError> {
        let _guard = self.lock.lock().await;
        Ok(self.load(tab).await?.pending())
    }

    async fn list_historical_engagement(&self, tab: &str) -> Result<Vec<f64>, LedgerError> {
        let _guard = self.lock.lock().await;
        Ok(self.load(tab).await?.historical_engagement())
    }

    async fn write_metrics(
        &self,
        tab: &str,
        row_index: RowIndex,
        write_back: &MetricsWriteBack,
    ) -> Result<(), LedgerError> {
        let _guard = self.lock.lock().await;
        let mut table = self.load(tab).await?;
        table.write_metrics(tab, row_index, write_back)?;
        self.store(tab, &table).await
    }

    async fn append_row(
        &self,
        source_tab: &str,
        target_tab: &str,
        row_index: RowIndex,
    ) -> Result<AppendOutcome, LedgerError> {
        let _guard = self.lock.lock().await;
        let source = self.load(source_tab).await?;
        let cells = source
            .row(row_index)
            .ok_or_else(|| LedgerError::UnknownRow {
                tab: source_tab.to_string(),
                row_index,
            })?
            .to_vec();

        // The archive tab is created on first use.
        let mut target = match self.load(target_tab).await {
            Ok(t) => t,
            Err(LedgerError::MissingTab(_)) => RawTable::with_contract_headers(),
            Err(e) => return Err(e),
        };

        let outcome = target.append_unique(cells);
        if let AppendOutcome::Appended(_) = outcome {
            self.store(target_tab, &target).await?;
        }
        Ok(outcome)
    }

    async fn raw_rows(&self, tab: &str) -> Result<RawTable, LedgerError> {
        let _guard = self.lock.lock().await;
        self.load(tab).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_short_rows_and_bom() {
        let raw = "\u{feff}Post ID,Content\nP-1,\"Hello, world\"\nP-2\n";
        let t = parse_table("T", raw).unwrap();
        assert_eq!(t.headers, vec!["Post ID", "Content"]);
        assert_eq!(t.rows[0], vec!["P-1", "Hello, world"]);
        assert_eq!(t.rows[1], vec!["P-2"]);
    }

    #[test]
    fn render_quotes_embedded_commas() {
        let t = RawTable {
            headers: vec!["a".into(), "b".into()],
            rows: vec![vec!["x, y".into(), "z".into()]],
        };
        let out = String::from_utf8(render_table(&t).unwrap()).unwrap();
        assert_eq!(out, "a,b\n\"x, y\",z\n");
    }

    #[test]
    fn tab_names_cannot_escape_the_directory() {
        let dir = tempfile::tempdir().unwrap();
        let l = CsvLedger::open(dir.path()).unwrap();
        assert!(l.tab_path("../etc").is_err());
        assert!(l.tab_path("").is_err());
        assert!(l
            .tab_path("LinkedInPosted")
            .unwrap()
            .ends_with("LinkedInPosted.csv"));
    }

    #[test]
    fn open_requires_existing_directory() {
        assert!(matches!(
            CsvLedger::open("/definitely/not/a/ledger"),
            Err(LedgerError::Io(_))
        ));
    }
}
