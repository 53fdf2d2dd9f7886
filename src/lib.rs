//! Fundamentals - financial statement normalization and derived metrics
//!
//! This library reads localized balance sheet, income statement and cash flow
//! exports, maps their line items to a fixed canonical vocabulary, merges them
//! into one record per reporting period and computes derived metrics from those
//! records and an optional market quote.

pub mod config;
pub mod error;
pub mod fields;
pub mod importers;
pub mod metrics;
pub mod pipeline;
pub mod quotes;
pub mod statements;
