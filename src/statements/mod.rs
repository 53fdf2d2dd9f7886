//! Raw statement tables and the canonical per-period record
//!
//! A raw table is what a spreadsheet export looks like: the first column holds
//! line-item labels in the source language, every other column is a reporting
//! period whose header may use any date notation. The [`merge`] module turns
//! three of these into [`CanonicalPeriodRecord`]s.

pub mod canonical;
pub mod dates;
pub mod merge;

use chrono::NaiveDate;
use std::fmt;

use crate::error::Result;
use crate::fields::{CanonicalField, StatementKind};

pub use canonical::{coerce_number, FieldCanonicalizer};
pub use dates::{normalize_date, normalize_header, ColumnHeader};
pub use merge::{merge, MergeOutcome};

/// One spreadsheet cell, independent of the file format it came from
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Text(text) => f.write_str(text),
            Cell::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
        }
    }
}

/// A line item: its label and one cell per header column after the label column
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub label: String,
    pub cells: Vec<Cell>,
}

/// One statement as read from its source, before any normalization
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatementTable {
    pub kind: StatementKind,
    /// Period headers, excluding the leading label ("item") column
    pub headers: Vec<Cell>,
    pub rows: Vec<RawRow>,
}

impl RawStatementTable {
    pub fn empty(kind: StatementKind) -> Self {
        Self {
            kind,
            headers: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Build a table from grid rows where the first row is the header row and the
    /// first column holds labels.
    ///
    /// Rows with a blank label are dropped, short rows are padded with empty cells.
    pub fn from_grid(kind: StatementKind, grid: Vec<Vec<Cell>>) -> Self {
        let mut lines = grid.into_iter().filter(|row| !row.iter().all(Cell::is_empty));

        let headers: Vec<Cell> = match lines.next() {
            Some(header_row) => header_row.into_iter().skip(1).collect(),
            None => return Self::empty(kind),
        };

        let rows = lines
            .filter_map(|row| {
                let mut cells = row.into_iter();
                let label = cells.next().map(|c| c.to_string())?.trim().to_string();
                if label.is_empty() {
                    return None;
                }
                let mut cells: Vec<Cell> = cells.take(headers.len()).collect();
                cells.resize(headers.len(), Cell::Empty);
                Some(RawRow { label, cells })
            })
            .collect();

        Self {
            kind,
            headers,
            rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() || self.rows.is_empty()
    }
}

/// The three statements published for one ticker
#[derive(Debug, Clone, PartialEq)]
pub struct StatementSet {
    pub balance_sheet: RawStatementTable,
    pub income_statement: RawStatementTable,
    pub cash_flow: RawStatementTable,
}

impl StatementSet {
    pub fn tables(&self) -> [&RawStatementTable; 3] {
        [&self.balance_sheet, &self.income_statement, &self.cash_flow]
    }
}

/// Anything that can produce the raw statements for a ticker
pub trait StatementSource {
    fn load(&self, ticker: &str) -> Result<StatementSet>;
}

/// Canonical values for a single reporting period.
///
/// Every key of the vocabulary has a slot; a slot is written at most once.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalPeriodRecord {
    report_date: NaiveDate,
    values: [Option<f64>; CanonicalField::COUNT],
}

impl CanonicalPeriodRecord {
    pub(crate) fn new(report_date: NaiveDate) -> Self {
        Self {
            report_date,
            values: [None; CanonicalField::COUNT],
        }
    }

    /// Store a value unless the slot is already filled. Returns whether it was stored.
    pub(crate) fn insert(&mut self, field: CanonicalField, value: f64) -> bool {
        let slot = &mut self.values[field.index()];
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        true
    }

    pub fn report_date(&self) -> NaiveDate {
        self.report_date
    }

    pub fn get(&self, field: CanonicalField) -> Option<f64> {
        self.values[field.index()]
    }

    /// Present values, in vocabulary order
    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, f64)> + '_ {
        CanonicalField::ALL
            .iter()
            .filter_map(|field| self.get(*field).map(|value| (*field, value)))
    }

    pub fn len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_from_grid_splits_header_and_labels() {
        let grid = vec![
            vec![Cell::text("项目"), Cell::text("2024-12-31"), Cell::text("2023-12-31")],
            vec![Cell::text("总资产"), Cell::Number(1000.0), Cell::Number(900.0)],
            vec![Cell::Empty, Cell::Empty, Cell::Empty],
            vec![Cell::text("总负债"), Cell::Number(400.0)],
        ];
        let table = RawStatementTable::from_grid(StatementKind::BalanceSheet, grid);

        assert_eq!(table.headers.len(), 2);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].label, "总负债");
        assert_eq!(table.rows[1].cells, vec![Cell::Number(400.0), Cell::Empty]);
    }

    #[test]
    fn test_from_grid_drops_rows_without_label() {
        let grid = vec![
            vec![Cell::text("项目"), Cell::text("2024-12-31")],
            vec![Cell::text("  "), Cell::Number(5.0)],
        ];
        let table = RawStatementTable::from_grid(StatementKind::CashFlow, grid);
        assert!(table.rows.is_empty());
        assert!(table.is_empty());
    }

    #[test]
    fn test_record_first_write_wins() {
        let mut record = CanonicalPeriodRecord::new(date(2024, 12, 31));
        assert!(record.insert(CanonicalField::Revenue, 500.0));
        assert!(!record.insert(CanonicalField::Revenue, 700.0));
        assert_eq!(record.get(CanonicalField::Revenue), Some(500.0));
        assert_eq!(record.get(CanonicalField::TotalAssets), None);
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn test_record_iter_in_vocabulary_order() {
        let mut record = CanonicalPeriodRecord::new(date(2024, 6, 30));
        record.insert(CanonicalField::NetCashOperating, 3.0);
        record.insert(CanonicalField::TotalAssets, 1.0);
        let keys: Vec<_> = record.iter().map(|(f, _)| f).collect();
        assert_eq!(
            keys,
            vec![CanonicalField::TotalAssets, CanonicalField::NetCashOperating]
        );
    }
}
