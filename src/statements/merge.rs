//! Merging the three statements into one record per reporting period

use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::canonical::{coerce_number, is_missing_marker, FieldCanonicalizer};
use super::dates::{normalize_header, ColumnHeader};
use super::{CanonicalPeriodRecord, Cell, RawStatementTable};
use crate::error::MetricsError;

/// Result of a merge: the records plus everything that was skipped on the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// One record per date found in any of the three statements
    pub periods: BTreeMap<NaiveDate, CanonicalPeriodRecord>,
    /// Recoverable problems: unparseable headers, unmapped labels, non-numeric cells
    pub issues: Vec<MetricsError>,
}

impl MergeOutcome {
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Records ordered from the latest report date to the earliest
    pub fn newest_first(&self) -> impl Iterator<Item = &CanonicalPeriodRecord> {
        self.periods.values().rev()
    }
}

/// Build canonical period records from the three raw statements.
///
/// The period set is the union of the statements' date columns, so a date only
/// reported by one statement still gets a record (holding that statement's items
/// only). Within a period the first value written for a field wins.
pub fn merge(
    canonicalizer: &FieldCanonicalizer,
    balance_sheet: &RawStatementTable,
    income_statement: &RawStatementTable,
    cash_flow: &RawStatementTable,
) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();
    for table in [balance_sheet, income_statement, cash_flow] {
        merge_table(canonicalizer, table, &mut outcome);
    }

    info!(
        "Merged {} periods ({} skipped entries)",
        outcome.periods.len(),
        outcome.issues.len()
    );
    outcome
}

fn merge_table(
    canonicalizer: &FieldCanonicalizer,
    table: &RawStatementTable,
    outcome: &mut MergeOutcome,
) {
    let kind = table.kind;

    let columns: Vec<(usize, NaiveDate)> = table
        .headers
        .iter()
        .enumerate()
        .filter_map(|(index, header)| match normalize_header(header) {
            ColumnHeader::Period(date) => Some((index, date)),
            ColumnHeader::Label(label) => {
                if !label.trim().is_empty() {
                    debug!("Skipping {} column '{}': not a date", kind, label);
                    outcome.issues.push(MetricsError::UnparseableDate {
                        statement: kind,
                        header: label,
                    });
                }
                None
            }
        })
        .collect();

    if columns.is_empty() {
        debug!("{} has no usable date columns", kind);
        return;
    }

    for (_, date) in &columns {
        outcome
            .periods
            .entry(*date)
            .or_insert_with(|| CanonicalPeriodRecord::new(*date));
    }

    for row in &table.rows {
        let Some(field) = canonicalizer.canonicalize(kind, &row.label) else {
            debug!("Unmapped {} line item '{}'", kind, row.label);
            outcome.issues.push(MetricsError::UnmappedLineItem {
                statement: kind,
                label: row.label.clone(),
            });
            continue;
        };

        for (index, date) in &columns {
            let Some(cell) = row.cells.get(*index) else {
                continue;
            };
            match coerce_number(cell) {
                Some(value) => {
                    let Some(record) = outcome.periods.get_mut(date) else {
                        continue;
                    };
                    if !record.insert(field, value) {
                        debug!(
                            "Ignoring duplicate {} for {} ('{}' in {})",
                            field, date, row.label, kind
                        );
                    }
                }
                None => {
                    if is_reportable(cell) {
                        debug!("Non-numeric {} cell '{}' at {}: '{}'", kind, row.label, date, cell);
                        outcome.issues.push(MetricsError::NonNumericCell {
                            statement: kind,
                            label: row.label.clone(),
                            date: *date,
                            value: cell.to_string(),
                        });
                    }
                }
            }
        }
    }
}

/// Cells that failed coercion but were not simply left blank
fn is_reportable(cell: &Cell) -> bool {
    match cell {
        Cell::Empty => false,
        Cell::Text(text) => !is_missing_marker(text),
        Cell::Number(_) | Cell::Date(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{CanonicalField, StatementKind};
    use crate::statements::RawRow;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn table(
        kind: StatementKind,
        headers: &[&str],
        rows: Vec<(&str, Vec<Cell>)>,
    ) -> RawStatementTable {
        RawStatementTable {
            kind,
            headers: headers.iter().map(|h| Cell::text(*h)).collect(),
            rows: rows
                .into_iter()
                .map(|(label, cells)| RawRow {
                    label: label.to_string(),
                    cells,
                })
                .collect(),
        }
    }

    #[test]
    fn test_single_period_across_three_statements() {
        let bs = table(
            StatementKind::BalanceSheet,
            &["2024-12-31"],
            vec![("总资产", vec![Cell::Number(1000.0)]), ("总负债", vec![Cell::Number(400.0)])],
        );
        let is = table(
            StatementKind::IncomeStatement,
            &["2024/12/31"],
            vec![("营业额", vec![Cell::Number(500.0)])],
        );
        let cf = table(
            StatementKind::CashFlow,
            &["2024年12月31日"],
            vec![("经营业务现金净额", vec![Cell::text("80")])],
        );

        let outcome = merge(&FieldCanonicalizer::builtin(), &bs, &is, &cf);
        assert_eq!(outcome.periods.len(), 1);
        let record = &outcome.periods[&date(2024, 12, 31)];
        assert_eq!(record.get(CanonicalField::TotalAssets), Some(1000.0));
        assert_eq!(record.get(CanonicalField::TotalLiabilities), Some(400.0));
        assert_eq!(record.get(CanonicalField::Revenue), Some(500.0));
        assert_eq!(record.get(CanonicalField::NetCashOperating), Some(80.0));
        assert!(outcome.issues.is_empty());
    }

    #[test]
    fn test_period_set_is_union_of_statement_dates() {
        let bs = table(
            StatementKind::BalanceSheet,
            &["2024-12-31"],
            vec![("总资产", vec![Cell::Number(1000.0)])],
        );
        let is = table(
            StatementKind::IncomeStatement,
            &["2024-12-31", "2024-06-30"],
            vec![("营业额", vec![Cell::Number(500.0), Cell::Number(240.0)])],
        );
        let cf = RawStatementTable::empty(StatementKind::CashFlow);

        let outcome = merge(&FieldCanonicalizer::builtin(), &bs, &is, &cf);
        assert_eq!(outcome.periods.len(), 2);

        let interim = &outcome.periods[&date(2024, 6, 30)];
        assert_eq!(interim.get(CanonicalField::Revenue), Some(240.0));
        assert_eq!(interim.get(CanonicalField::TotalAssets), None);

        let dates: Vec<_> = outcome.newest_first().map(|r| r.report_date()).collect();
        assert_eq!(dates, vec![date(2024, 12, 31), date(2024, 6, 30)]);
    }

    #[test]
    fn test_unmapped_and_non_numeric_are_reported_and_skipped() {
        let bs = table(
            StatementKind::BalanceSheet,
            &["2024-12-31", "备注"],
            vec![
                ("商誉", vec![Cell::Number(10.0), Cell::Empty]),
                ("总资产", vec![Cell::text("n.m."), Cell::Empty]),
                ("总负债", vec![Cell::text("--"), Cell::Empty]),
            ],
        );
        let empty_is = RawStatementTable::empty(StatementKind::IncomeStatement);
        let empty_cf = RawStatementTable::empty(StatementKind::CashFlow);

        let outcome = merge(&FieldCanonicalizer::builtin(), &bs, &empty_is, &empty_cf);
        let record = &outcome.periods[&date(2024, 12, 31)];
        assert!(record.is_empty());

        assert!(outcome.issues.contains(&MetricsError::UnparseableDate {
            statement: StatementKind::BalanceSheet,
            header: "备注".to_string(),
        }));
        assert!(outcome.issues.contains(&MetricsError::UnmappedLineItem {
            statement: StatementKind::BalanceSheet,
            label: "商誉".to_string(),
        }));
        assert!(outcome.issues.contains(&MetricsError::NonNumericCell {
            statement: StatementKind::BalanceSheet,
            label: "总资产".to_string(),
            date: date(2024, 12, 31),
            value: "n.m.".to_string(),
        }));
        // "--" is a missing marker, not an error
        assert_eq!(outcome.issues.len(), 3);
    }

    #[test]
    fn test_duplicate_date_columns_keep_first_value() {
        let bs = table(
            StatementKind::BalanceSheet,
            &["2024-12-31", "2024/12/31"],
            vec![("总资产", vec![Cell::Number(1000.0), Cell::Number(999.0)])],
        );
        let empty_is = RawStatementTable::empty(StatementKind::IncomeStatement);
        let empty_cf = RawStatementTable::empty(StatementKind::CashFlow);

        let outcome = merge(&FieldCanonicalizer::builtin(), &bs, &empty_is, &empty_cf);
        assert_eq!(outcome.periods.len(), 1);
        assert_eq!(
            outcome.periods[&date(2024, 12, 31)].get(CanonicalField::TotalAssets),
            Some(1000.0)
        );
    }

    #[test]
    fn test_no_usable_dates_yields_no_periods() {
        let bs = table(
            StatementKind::BalanceSheet,
            &["项目说明"],
            vec![("总资产", vec![Cell::Number(1000.0)])],
        );
        let empty_is = RawStatementTable::empty(StatementKind::IncomeStatement);
        let empty_cf = RawStatementTable::empty(StatementKind::CashFlow);

        let outcome = merge(&FieldCanonicalizer::builtin(), &bs, &empty_is, &empty_cf);
        assert!(outcome.is_empty());
    }
}
