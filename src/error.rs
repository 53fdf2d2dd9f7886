//! Error handling for statement normalization
//!
//! Most of these conditions are recovered where they happen and only degrade the
//! output: a column is dropped, a row is skipped, a ratio stays absent. They are
//! still named here so that the merger can report them and logs read the same
//! everywhere. Only [`MetricsError::NoUsableStatementData`] ends the work for a
//! ticker, and it surfaces as an empty result rather than an `Err`.

use chrono::NaiveDate;
use thiserror::Error;

use crate::fields::StatementKind;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    #[error("unparseable date header in {statement}: '{header}'")]
    UnparseableDate {
        statement: StatementKind,
        header: String,
    },

    #[error("unmapped line item in {statement}: '{label}'")]
    UnmappedLineItem {
        statement: StatementKind,
        label: String,
    },

    #[error("non-numeric cell in {statement} for '{label}' at {date}: '{value}'")]
    NonNumericCell {
        statement: StatementKind,
        label: String,
        date: NaiveDate,
        value: String,
    },

    #[error("missing operand for {metric}")]
    MissingOperand { metric: String },

    #[error("zero denominator for {metric}")]
    ZeroDenominator { metric: String },

    #[error("quote unavailable for {ticker}: {reason}")]
    QuoteUnavailable { ticker: String, reason: String },

    #[error("no usable statement data for {ticker}")]
    NoUsableStatementData { ticker: String },
}

/// Result type alias for I/O-facing operations (loading files, config, CLI)
pub type Result<T> = anyhow::Result<T>;
