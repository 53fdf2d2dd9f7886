//! Line-item label lookup and cell coercion
//!
//! The label tables are plain data (`mappings.toml`, embedded at build time) and
//! can be extended with a user file of the same shape. Loading checks every entry
//! against the vocabulary so a typo in a table fails at startup, not silently
//! during a merge.

use anyhow::{anyhow, Context};
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::info;
use unicode_normalization::UnicodeNormalization;

use super::Cell;
use crate::error::Result;
use crate::fields::{CanonicalField, StatementKind};

const BUILTIN_MAPPINGS: &str = include_str!("mappings.toml");

static BUILTIN: Lazy<FieldCanonicalizer> = Lazy::new(|| {
    FieldCanonicalizer::from_toml(BUILTIN_MAPPINGS).expect("built-in mapping tables are valid")
});

/// Cell contents meaning "no value reported"
const MISSING_SENTINELS: &[&str] = &["--", "—", "–", "-", "N/A", "NA", "n/a"];

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MappingFile {
    #[serde(default)]
    balance_sheet: BTreeMap<String, String>,
    #[serde(default)]
    income_statement: BTreeMap<String, String>,
    #[serde(default)]
    cash_flow: BTreeMap<String, String>,
}

impl MappingFile {
    fn table(&self, kind: StatementKind) -> &BTreeMap<String, String> {
        match kind {
            StatementKind::BalanceSheet => &self.balance_sheet,
            StatementKind::IncomeStatement => &self.income_statement,
            StatementKind::CashFlow => &self.cash_flow,
        }
    }
}

/// Maps source-language line-item labels to canonical fields, one closed table per
/// statement kind.
#[derive(Debug, Clone, Default)]
pub struct FieldCanonicalizer {
    tables: HashMap<StatementKind, HashMap<String, CanonicalField>>,
}

impl FieldCanonicalizer {
    /// The embedded Hong Kong tables
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// The embedded tables with a user mapping file layered on top.
    ///
    /// Entries of the file replace built-in entries with the same label.
    pub fn with_overrides(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read mapping file {}", path.display()))?;
        let mut canonicalizer = Self::builtin();
        let added = canonicalizer
            .extend_from_toml(&text)
            .with_context(|| format!("Invalid mapping file {}", path.display()))?;
        info!("Loaded {} label mappings from {}", added, path.display());
        Ok(canonicalizer)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let mut canonicalizer = Self::default();
        canonicalizer.extend_from_toml(text)?;
        Ok(canonicalizer)
    }

    /// Add every entry of a TOML mapping document. Returns the number of entries read.
    pub fn extend_from_toml(&mut self, text: &str) -> Result<usize> {
        let file: MappingFile = toml::from_str(text).context("Failed to parse mapping tables")?;

        // Validate everything before touching the tables
        let mut parsed = Vec::new();
        for kind in StatementKind::ALL {
            for (label, key) in file.table(kind) {
                let field = CanonicalField::from_str(key)
                    .map_err(|e| anyhow!("{} label '{}': {}", kind, label, e))?;
                if field.statement() != kind {
                    return Err(anyhow!(
                        "{} label '{}' targets {}, which belongs to {}",
                        kind,
                        label,
                        field,
                        field.statement()
                    ));
                }
                parsed.push((kind, normalize_label(label), field));
            }
        }

        let count = parsed.len();
        for (kind, label, field) in parsed {
            self.tables.entry(kind).or_default().insert(label, field);
        }
        Ok(count)
    }

    /// Look a label up in the table of its own statement
    pub fn canonicalize(&self, kind: StatementKind, label: &str) -> Option<CanonicalField> {
        self.tables.get(&kind)?.get(&normalize_label(label)).copied()
    }

    /// Every entry of one table, ordered by canonical field then label
    pub fn entries(&self, kind: StatementKind) -> Vec<(&str, CanonicalField)> {
        let mut entries: Vec<(&str, CanonicalField)> = self
            .tables
            .get(&kind)
            .map(|table| table.iter().map(|(label, field)| (label.as_str(), *field)).collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}

/// NFKC + trim, applied to both table keys and looked-up labels
pub fn normalize_label(label: &str) -> String {
    label.nfkc().collect::<String>().trim().to_string()
}

/// Read a cell as a finite number, or `None` when it holds nothing usable.
///
/// Text is trimmed; missing-value sentinels, thousands separators and
/// parenthesized negatives (`(1,234)`) are understood.
pub fn coerce_number(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Text(text) => parse_amount(text),
        _ => None,
    }
}

/// Blank text or one of the "nothing reported" tokens
pub(crate) fn is_missing_marker(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || MISSING_SENTINELS.contains(&text)
}

fn parse_amount(raw: &str) -> Option<f64> {
    let text: String = raw.nfkc().collect();
    let text = text.trim();
    if is_missing_marker(text) {
        return None;
    }

    let (negative, body) = match text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        Some(inner) => (true, inner.trim()),
        None => (false, text),
    };
    let cleaned: String = body.chars().filter(|c| *c != ',').collect();
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}
