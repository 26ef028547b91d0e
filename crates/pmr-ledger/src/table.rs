use pmr_schemas::{LedgerColumn, LedgerRecord, MetricsWriteBack, RowIndex};

use crate::row;
use crate::{AppendOutcome, LedgerError};

/// Spreadsheet row number of the first data row (the header is row 1).
pub const FIRST_DATA_ROW: u64 = 2;

/// One tab exactly as stored: a header row plus string cells.
///
/// `rows[0]` is spreadsheet row [`FIRST_DATA_ROW`]. Row indexes are never
/// reused because rows are only ever appended.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Empty tab carrying the contract header row.
    pub fn with_contract_headers() -> Self {
        Self {
            headers: LedgerColumn::headers().into_iter().map(String::from).collect(),
            rows: Vec::new(),
        }
    }

    pub fn from_records(records: &[LedgerRecord]) -> Self {
        let mut t = Self::with_contract_headers();
        for r in records {
            let pos = position_of(r.row_index).unwrap_or(0);
            if t.rows.len() <= pos {
                t.rows.resize(pos + 1, Vec::new());
            }
            t.rows[pos] = row::record_to_cells(r);
        }
        t
    }

    pub fn row_index_at(pos: usize) -> RowIndex {
        RowIndex(pos as u64 + FIRST_DATA_ROW)
    }

    pub fn row(&self, row_index: RowIndex) -> Option<&[String]> {
        position_of(row_index)
            .and_then(|p| self.rows.get(p))
            .map(Vec::as_slice)
    }

    /// Cell text; `None` only when the row itself does not exist.
    pub fn cell(&self, row_index: RowIndex, col: LedgerColumn) -> Option<&str> {
        self.row(row_index).map(|cells| row::cell(cells, col))
    }

    /// Header row must start with the contract columns, in order.
    /// Extra trailing columns are allowed.
    pub fn validate_headers(&self, tab: &str) -> Result<(), LedgerError> {
        for col in LedgerColumn::ALL {
            let got = self
                .headers
                .get(col.position())
                .map(|h| h.trim())
                .unwrap_or("");
            if !got.eq_ignore_ascii_case(col.header()) {
                return Err(LedgerError::Malformed(format!(
                    "tab '{tab}' column {} header is '{got}', expected '{}'",
                    col.position() + 1,
                    col.header()
                )));
            }
        }
        Ok(())
    }

    /// All non-blank rows as records, in row order.
    pub fn records(&self) -> Vec<LedgerRecord> {
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()))
            .map(|(pos, cells)| row::record_from_cells(Self::row_index_at(pos), cells))
            .collect()
    }

    pub fn pending(&self) -> Vec<LedgerRecord> {
        self.records()
            .into_iter()
            .filter(LedgerRecord::is_eligible)
            .collect()
    }

    /// Engagement of every measured row (non-empty Impressions and a numeric Engagement).
    pub fn historical_engagement(&self) -> Vec<f64> {
        self.rows
            .iter()
            .filter(|cells| !row::cell(cells, LedgerColumn::Impressions).is_empty())
            .filter_map(|cells| row::parse_count(row::cell(cells, LedgerColumn::Engagement)))
            .map(|n| n as f64)
            .collect()
    }

    pub(crate) fn write_metrics(
        &mut self,
        tab: &str,
        row_index: RowIndex,
        wb: &MetricsWriteBack,
    ) -> Result<(), LedgerError> {
        let cells = position_of(row_index)
            .and_then(|p| self.rows.get_mut(p))
            .ok_or_else(|| LedgerError::UnknownRow {
                tab: tab.to_string(),
                row_index,
            })?;
        if !row::cell(cells, LedgerColumn::Impressions).is_empty() {
            return Err(LedgerError::AlreadyMeasured {
                tab: tab.to_string(),
                row_index,
            });
        }
        row::apply_write_back(cells, wb);
        Ok(())
    }

    /// Append a copy of `cells` unless a row with the same key is already present.
    ///
    /// The key is Post ID, or Platform Post ID when Post ID is blank. Rows
    /// with neither are always appended.
    pub(crate) fn append_unique(&mut self, cells: Vec<String>) -> AppendOutcome {
        if let Some((col, key)) = dedup_key(&cells) {
            if self.rows.iter().any(|r| row::cell(r, col) == key) {
                return AppendOutcome::AlreadyPresent;
            }
        }
        self.rows.push(cells);
        AppendOutcome::Appended(Self::row_index_at(self.rows.len() - 1))
    }
}

fn position_of(row_index: RowIndex) -> Option<usize> {
    row_index
        .0
        .checked_sub(FIRST_DATA_ROW)
        .map(|p| p as usize)
}

fn dedup_key(cells: &[String]) -> Option<(LedgerColumn, String)> {
    [LedgerColumn::PostId, LedgerColumn::PlatformPostId]
        .into_iter()
        .map(|col| (col, row::cell(cells, col).to_string()))
        .find(|(_, key)| !key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn table() -> RawTable {
        let posted = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let mut measured = LedgerRecord::posted(3, "P-3", Some("urn:li:share:3"), "b", posted);
        measured.impressions = Some(40);
        measured.engagement = Some(6);
        RawTable::from_records(&[
            LedgerRecord::posted(2, "P-2", Some("urn:li:share:2"), "a", posted),
            measured,
        ])
    }

    #[test]
    fn row_indexes_are_spreadsheet_rows() {
        let t = table();
        assert_eq!(t.cell(RowIndex(2), LedgerColumn::PostId), Some("P-2"));
        assert_eq!(t.cell(RowIndex(3), LedgerColumn::PostId), Some("P-3"));
        assert_eq!(t.cell(RowIndex(1), LedgerColumn::PostId), None);
        assert_eq!(t.cell(RowIndex(0), LedgerColumn::PostId), None);
    }

    #[test]
    fn pending_and_history_split_on_impressions() {
        let t = table();
        let pending = t.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].row_index, RowIndex(2));
        assert_eq!(t.historical_engagement(), vec![6.0]);
    }

    #[test]
    fn write_metrics_is_write_once() {
        let mut t = table();
        let wb = MetricsWriteBack::new(150, 12, true);
        t.write_metrics("T", RowIndex(2), &wb).unwrap();
        assert!(t.pending().is_empty());

        let err = t.write_metrics("T", RowIndex(2), &wb).unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyMeasured { .. }));
        let err = t.write_metrics("T", RowIndex(40), &wb).unwrap_err();
        assert!(matches!(err, LedgerError::UnknownRow { .. }));
    }

    #[test]
    fn append_is_deduplicated_on_post_id() {
        let src = table();
        let mut winners = RawTable::with_contract_headers();
        let cells = src.row(RowIndex(2)).unwrap().to_vec();
        assert_eq!(
            winners.append_unique(cells.clone()),
            AppendOutcome::Appended(RowIndex(2))
        );
        assert_eq!(winners.append_unique(cells), AppendOutcome::AlreadyPresent);
        assert_eq!(winners.rows.len(), 1);
    }

    #[test]
    fn header_validation() {
        let t = RawTable::with_contract_headers();
        assert!(t.validate_headers("T").is_ok());

        let mut bad = t.clone();
        bad.headers.swap(0, 1);
        assert!(matches!(
            bad.validate_headers("T"),
            Err(LedgerError::Malformed(_))
        ));
    }

    #[test]
    fn blank_rows_are_skipped_but_keep_numbering() {
        let mut t = table();
        t.rows.insert(0, vec![String::new(); 3]);
        let recs = t.records();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].row_index, RowIndex(3));
    }
}
