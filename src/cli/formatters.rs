//! Output formatting module for CLI display
//!
//! Tables put reporting periods in columns (newest first) and line items or
//! metrics in rows. JSON output mirrors the library records.

use chrono::NaiveDate;
use colored::Colorize;
use fundamentals::fields::{CanonicalField, StatementKind};
use fundamentals::metrics::{DerivedMetricsRecord, Metric, MetricGroup, PeriodKind};
use fundamentals::statements::{FieldCanonicalizer, MergeOutcome};
use serde::Serialize;
use serde_json::{Map, Value};
use tabled::{
    builder::Builder,
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

const ABSENT: &str = "-";

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

/// Derived metrics records as a JSON array, newest first
pub fn format_metrics_json(records: &[DerivedMetricsRecord]) -> String {
    to_json(records)
}

/// One table per metric group, periods as columns
pub fn format_metrics_table(ticker: &str, records: &[DerivedMetricsRecord]) -> String {
    let mut output = String::new();
    let currency = records.first().map(|r| r.currency.as_str()).unwrap_or("");
    output.push_str(&format!(
        "\n{} Derived metrics for {} ({})\n",
        "📊".cyan().bold(),
        ticker.bold(),
        currency
    ));

    for group in MetricGroup::ALL {
        let metrics: Vec<Metric> = Metric::ALL
            .iter()
            .copied()
            .filter(|m| m.group() == group)
            .collect();

        let mut builder = Builder::default();
        builder.push_record(period_header("Metric", records.iter().map(|r| (r.report_date(), r.period))));
        for metric in metrics {
            let mut row = vec![metric.as_str().to_string()];
            row.extend(records.iter().map(|r| {
                r.metric(metric)
                    .map(|v| format_metric_value(metric, v))
                    .unwrap_or_else(|| ABSENT.bright_black().to_string())
            }));
            builder.push_record(row);
        }

        output.push_str(&format!("\n{}\n", group.title().cyan().bold()));
        output.push_str(&finish_table(builder.build()));
        output.push('\n');
    }

    output
}

/// Merged canonical records as a JSON array of `{report_date, period, values}`
pub fn format_canonical_json(ticker: &str, outcome: &MergeOutcome) -> String {
    let records: Vec<Value> = outcome
        .newest_first()
        .map(|record| {
            let values: Map<String, Value> = record
                .iter()
                .map(|(field, value)| (field.as_str().to_string(), Value::from(value)))
                .collect();
            serde_json::json!({
                "ticker": ticker,
                "report_date": record.report_date().format("%Y-%m-%d").to_string(),
                "period": PeriodKind::from_date(record.report_date()).as_str(),
                "values": values,
            })
        })
        .collect();
    to_json(&records)
}

/// One table per statement with the fields present in at least one period
pub fn format_canonical_table(ticker: &str, outcome: &MergeOutcome) -> String {
    let records: Vec<_> = outcome.newest_first().collect();
    let mut output = format!(
        "\n{} Canonical statement values for {}\n",
        "📄".cyan().bold(),
        ticker.bold()
    );

    for kind in StatementKind::ALL {
        let fields: Vec<CanonicalField> = CanonicalField::for_statement(kind)
            .filter(|field| records.iter().any(|r| r.get(*field).is_some()))
            .collect();
        if fields.is_empty() {
            continue;
        }

        let mut builder = Builder::default();
        builder.push_record(period_header(
            "Field",
            records
                .iter()
                .map(|r| (r.report_date(), PeriodKind::from_date(r.report_date()))),
        ));
        for field in fields {
            let mut row = vec![field.as_str().to_string()];
            row.extend(records.iter().map(|r| {
                r.get(field)
                    .map(format_amount)
                    .unwrap_or_else(|| ABSENT.bright_black().to_string())
            }));
            builder.push_record(row);
        }

        output.push_str(&format!("\n{}\n", kind.display_name().cyan().bold()));
        output.push_str(&finish_table(builder.build()));
        output.push('\n');
    }

    if !outcome.issues.is_empty() {
        output.push_str(&format!(
            "\n{} {} cells or rows were skipped (run with RUST_LOG=debug for details)\n",
            "⚠".yellow().bold(),
            outcome.issues.len()
        ));
    }

    output
}

#[derive(Tabled)]
struct ParsedDateRow {
    #[tabled(rename = "Input")]
    input: String,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Period")]
    period: String,
}

fn parsed_date_rows(parsed: &[(String, Option<NaiveDate>)]) -> Vec<ParsedDateRow> {
    parsed
        .iter()
        .map(|(input, date)| ParsedDateRow {
            input: input.clone(),
            date: date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            period: date
                .map(|d| PeriodKind::from_date(d).to_string())
                .unwrap_or_default(),
        })
        .collect()
}

pub fn format_parsed_dates_json(parsed: &[(String, Option<NaiveDate>)]) -> String {
    let rows: Vec<Value> = parsed
        .iter()
        .map(|(input, date)| {
            serde_json::json!({
                "input": input,
                "date": date.map(|d| d.format("%Y-%m-%d").to_string()),
                "period": date.map(|d| PeriodKind::from_date(d).as_str()),
            })
        })
        .collect();
    to_json(&rows)
}

pub fn format_parsed_dates_table(parsed: &[(String, Option<NaiveDate>)]) -> String {
    let rows = parsed_date_rows(parsed)
        .into_iter()
        .map(|mut row| {
            if row.date.is_empty() {
                row.date = "not a date".red().to_string();
            }
            row
        })
        .collect::<Vec<_>>();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    format!("{}\n", table)
}

#[derive(Tabled, Serialize)]
struct MappingRow {
    #[tabled(rename = "Statement")]
    statement: &'static str,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Field")]
    field: &'static str,
}

fn mapping_rows(canonicalizer: &FieldCanonicalizer, kinds: &[StatementKind]) -> Vec<MappingRow> {
    kinds
        .iter()
        .flat_map(|kind| {
            canonicalizer
                .entries(*kind)
                .into_iter()
                .map(move |(label, field)| MappingRow {
                    statement: kind.as_str(),
                    label: label.to_string(),
                    field: field.as_str(),
                })
        })
        .collect()
}

pub fn format_mappings_json(canonicalizer: &FieldCanonicalizer, kinds: &[StatementKind]) -> String {
    to_json(&mapping_rows(canonicalizer, kinds))
}

pub fn format_mappings_table(canonicalizer: &FieldCanonicalizer, kinds: &[StatementKind]) -> String {
    let rows = mapping_rows(canonicalizer, kinds);
    let mut table = Table::new(&rows);
    table.with(Style::rounded());
    format!("{}\n{} label mappings\n", table, rows.len())
}

/// Message shown when a ticker produced no periods
pub fn format_no_periods(ticker: &str) -> String {
    format!(
        "{} No reporting periods found for {}\nCheck that the statement files have date headers in their first row.\n",
        "ℹ".blue().bold(),
        ticker.bold()
    )
}

fn period_header(
    first: &str,
    periods: impl Iterator<Item = (NaiveDate, PeriodKind)>,
) -> Vec<String> {
    let mut header = vec![first.bold().to_string()];
    header.extend(
        periods.map(|(date, kind)| format!("{} ({})", date.format("%Y-%m-%d"), kind).bold().to_string()),
    );
    header
}

fn finish_table(mut table: Table) -> String {
    table.with(Style::modern());
    // Right-align all period columns
    table.modify(Columns::new(1..), Alignment::right());
    table.to_string()
}

fn format_metric_value(metric: Metric, value: f64) -> String {
    if metric.is_percent() {
        format!("{:.2}%", value)
    } else if metric.is_amount() {
        format_amount(value)
    } else {
        format_grouped(value, 4)
    }
}

/// Two decimals with thousands separators
fn format_amount(value: f64) -> String {
    format_grouped(value, 2)
}

fn format_grouped(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = formatted
        .split_once('.')
        .unwrap_or((formatted.as_str(), ""));

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*c);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, frac_part)
}
