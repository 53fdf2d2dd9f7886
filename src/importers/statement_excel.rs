use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, Reader, Sheets};
use chrono::{Duration, NaiveDate};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

use crate::fields::StatementKind;
use crate::statements::{normalize_date, Cell, RawStatementTable};

/// Parse a statement workbook (.xlsx or .xls).
///
/// Reads the sheet named `sheet` when the workbook has one, otherwise the first
/// sheet. The first non-empty row is the header row.
pub fn parse_statement_excel<P: AsRef<Path>>(
    file_path: P,
    kind: StatementKind,
    sheet: Option<&str>,
) -> Result<RawStatementTable> {
    let path = file_path.as_ref();
    info!("Parsing {} Excel file: {:?}", kind, path);

    let mut workbook = open_workbook_auto(path).context("Failed to open Excel file")?;

    let sheet_name = find_statement_sheet(&workbook, sheet)?;
    debug!("Using sheet: {}", sheet_name);

    let range = workbook
        .worksheet_range(&sheet_name)
        .context("Failed to read worksheet")?;

    let grid: Vec<Vec<Cell>> = range
        .rows()
        .map(|row| row.iter().map(to_cell).collect())
        .collect();

    let table = RawStatementTable::from_grid(kind, grid);
    info!(
        "Parsed {} rows x {} columns from {}",
        table.rows.len(),
        table.headers.len(),
        sheet_name
    );
    Ok(table)
}

/// Find the sheet holding the statement: the preferred name, else the first sheet
fn find_statement_sheet(
    workbook: &Sheets<BufReader<File>>,
    preferred: Option<&str>,
) -> Result<String> {
    let sheet_names = workbook.sheet_names();

    if let Some(preferred) = preferred {
        if let Some(name) = sheet_names.iter().find(|name| name.trim() == preferred) {
            return Ok(name.clone());
        }
    }

    sheet_names
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("No sheets found in workbook"))
}

/// Convert a calamine cell to the format-independent representation
fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => {
            if s.trim().is_empty() {
                Cell::Empty
            } else {
                Cell::Text(s.clone())
            }
        }
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::Number(dt.as_f64())),
        Data::DateTimeIso(s) => normalize_date(s)
            .map(Cell::Date)
            .unwrap_or_else(|| Cell::Text(s.clone())),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}

/// Last serial Excel can display (9999-12-31)
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Excel serial day number (1900 date system, epoch 1899-12-30)
fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(0.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let excel_epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    excel_epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}
