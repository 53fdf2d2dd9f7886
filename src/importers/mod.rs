// Import module - statement spreadsheets (Excel and CSV) from a data directory

pub mod statement_csv;
pub mod statement_excel;

use anyhow::{anyhow, bail, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::fields::StatementKind;
use crate::statements::{RawStatementTable, StatementSet, StatementSource};

/// Extensions tried, in order, for each statement file
const EXTENSIONS: [&str; 3] = ["xlsx", "xls", "csv"];

/// Read one statement file, dispatching on its extension
pub fn read_statement_file<P: AsRef<Path>>(
    file_path: P,
    kind: StatementKind,
    sheet: Option<&str>,
) -> Result<RawStatementTable> {
    let path = file_path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| anyhow!("File has no extension: {:?}", path))?
        .to_lowercase();

    info!("Importing {} file: {:?} (type: {})", kind, path, extension);

    match extension.as_str() {
        "xlsx" | "xls" => statement_excel::parse_statement_excel(path, kind, sheet),
        "csv" | "txt" => statement_csv::parse_statement_csv(path, kind),
        _ => Err(anyhow!(
            "Unsupported file format: {}. Supported formats: .xlsx, .xls, .csv",
            extension
        )),
    }
}

/// Worksheet name used for a ticker: the code without exchange prefix or suffix
/// (`HK.03690` and `03690.HK` both become `03690`)
pub fn sheet_name_for(ticker: &str) -> &str {
    let is_exchange = |part: &str| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphabetic());
    match ticker.split_once('.') {
        Some((prefix, code)) if is_exchange(prefix) => code,
        Some((code, suffix)) if is_exchange(suffix) => code,
        _ => ticker,
    }
}

/// Statement files laid out as `{data_dir}/{ticker}/{ticker}_{statement}.{xlsx,xls,csv}`
#[derive(Debug, Clone)]
pub struct FileStatementSource {
    data_dir: PathBuf,
}

impl FileStatementSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// First existing file for the statement, if any
    pub fn locate(&self, ticker: &str, kind: StatementKind) -> Option<PathBuf> {
        let dir = self.data_dir.join(ticker);
        EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}_{}.{}", ticker, kind.as_str(), ext)))
            .find(|path| path.is_file())
    }

    fn load_table(&self, ticker: &str, kind: StatementKind) -> Result<Option<RawStatementTable>> {
        match self.locate(ticker, kind) {
            Some(path) => read_statement_file(&path, kind, Some(sheet_name_for(ticker))).map(Some),
            None => {
                warn!(
                    "No {} file for {} in {}",
                    kind,
                    ticker,
                    self.data_dir.join(ticker).display()
                );
                Ok(None)
            }
        }
    }
}

impl StatementSource for FileStatementSource {
    fn load(&self, ticker: &str) -> Result<StatementSet> {
        let balance_sheet = self.load_table(ticker, StatementKind::BalanceSheet)?;
        let income_statement = self.load_table(ticker, StatementKind::IncomeStatement)?;
        let cash_flow = self.load_table(ticker, StatementKind::CashFlow)?;

        if balance_sheet.is_none() && income_statement.is_none() && cash_flow.is_none() {
            bail!(
                "No statement files found for {} in {}",
                ticker,
                self.data_dir.join(ticker).display()
            );
        }

        let or_empty = |table: Option<RawStatementTable>, kind| {
            table.unwrap_or_else(|| RawStatementTable::empty(kind))
        };
        Ok(StatementSet {
            balance_sheet: or_empty(balance_sheet, StatementKind::BalanceSheet),
            income_statement: or_empty(income_statement, StatementKind::IncomeStatement),
            cash_flow: or_empty(cash_flow, StatementKind::CashFlow),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_sheet_name_strips_exchange() {
        assert_eq!(sheet_name_for("HK.03690"), "03690");
        assert_eq!(sheet_name_for("03690.HK"), "03690");
        assert_eq!(sheet_name_for("03690"), "03690");
        assert_eq!(sheet_name_for("US.AAPL"), "AAPL");
    }

    #[test]
    fn test_unsupported_extension() {
        let result = read_statement_file("statement.pdf", StatementKind::BalanceSheet, None);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Unsupported file format"));
    }

    #[test]
    fn test_load_with_partial_files() {
        let dir = TempDir::new().unwrap();
        let ticker_dir = dir.path().join("HK.03690");
        fs::create_dir_all(&ticker_dir).unwrap();
        fs::write(
            ticker_dir.join("HK.03690_income_statement.csv"),
            "项目,2024-12-31\n营业额,500\n",
        )
        .unwrap();

        let source = FileStatementSource::new(dir.path());
        let set = source.load("HK.03690").unwrap();
        assert!(set.balance_sheet.is_empty());
        assert!(set.cash_flow.is_empty());
        assert_eq!(set.income_statement.kind, StatementKind::IncomeStatement);
        assert_eq!(set.income_statement.rows.len(), 1);
    }

    #[test]
    fn test_load_fails_without_any_file() {
        let dir = TempDir::new().unwrap();
        let source = FileStatementSource::new(dir.path());
        let err = source.load("HK.03690").unwrap_err();
        assert!(err.to_string().contains("No statement files found"));
    }
}
