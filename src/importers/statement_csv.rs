use anyhow::{Context, Result};
use csv::ReaderBuilder;
use encoding_rs::{GB18030, UTF_8};
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::fields::StatementKind;
use crate::statements::{Cell, RawStatementTable};

/// Parse a statement exported as delimited text.
///
/// The file is read as UTF-8 (a byte-order mark is ignored) and falls back to
/// GB18030 when it is not valid UTF-8. The delimiter is detected from the first
/// line.
pub fn parse_statement_csv<P: AsRef<Path>>(
    file_path: P,
    kind: StatementKind,
) -> Result<RawStatementTable> {
    let path = file_path.as_ref();
    info!("Parsing {} CSV file: {:?}", kind, path);

    let bytes = fs::read(path).context("Failed to read CSV file")?;
    let content = decode_text(&bytes);
    let table = parse_statement_text(&content, kind)?;

    info!(
        "Parsed {} rows x {} columns from CSV",
        table.rows.len(),
        table.headers.len()
    );
    Ok(table)
}

/// Parse delimited text already decoded to a string
pub fn parse_statement_text(content: &str, kind: StatementKind) -> Result<RawStatementTable> {
    let delimiter = detect_delimiter(content);
    debug!("CSV delimiter: {:?}", delimiter as char);

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true) // Statement exports often have ragged rows
        .from_reader(content.as_bytes());

    let mut grid = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read CSV record {}", idx + 1))?;
        grid.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        Cell::Empty
                    } else {
                        Cell::text(field.trim())
                    }
                })
                .collect(),
        );
    }

    Ok(RawStatementTable::from_grid(kind, grid))
}

fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(text) => text,
        None => {
            debug!("CSV is not valid UTF-8, decoding as GB18030");
            let (text, _, had_errors) = GB18030.decode(bytes);
            if had_errors {
                debug!("GB18030 decoding replaced malformed sequences");
            }
            text
        }
    }
}

fn detect_delimiter(content: &str) -> u8 {
    let line = content.lines().next().unwrap_or("");
    [b',', b';', b'\t']
        .into_iter()
        .max_by_key(|d| line.matches(*d as char).count())
        .filter(|d| line.contains(*d as char))
        .unwrap_or(b',')
}
