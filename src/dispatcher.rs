//! Routes parsed CLI commands to their handlers.
//!
//! Configuration is resolved once per invocation; command-line flags override
//! whatever the file and environment provided.

use anyhow::{Context, Result};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::cli::{formatters, Cli, Commands};
use fundamentals::config::AppConfig;
use fundamentals::fields::StatementKind;
use fundamentals::importers::FileStatementSource;
use fundamentals::pipeline::MetricsPipeline;
use fundamentals::quotes::SnapshotCache;
use fundamentals::statements::{normalize_date, StatementSet, StatementSource};

pub fn dispatch(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    let json_output = cli.json;

    match cli.command {
        Commands::Metrics {
            ticker,
            data_dir,
            limit,
            snapshot_file,
            offline,
        } => {
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            if limit.is_some() {
                config.max_periods = limit;
            }
            if snapshot_file.is_some() {
                config.quote.snapshot_file = snapshot_file;
            }
            config.quote.offline |= offline;
            dispatch_metrics(&config, &ticker, json_output)
        }
        Commands::Canonical { ticker, data_dir } => {
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            dispatch_canonical(&config, &ticker, json_output)
        }
        Commands::ParseDate { values } => dispatch_parse_date(&values, json_output),
        Commands::Mappings { statement } => dispatch_mappings(&config, statement, json_output),
    }
}

fn load_statements(config: &AppConfig, ticker: &str) -> Result<StatementSet> {
    let source = FileStatementSource::new(config.data_dir.clone());
    source
        .load(ticker)
        .with_context(|| format!("Failed to load statements for {}", ticker))
}

fn dispatch_metrics(config: &AppConfig, ticker: &str, json_output: bool) -> Result<()> {
    info!("Computing metrics for {} from {}", ticker, config.data_dir.display());

    let statements = load_statements(config, ticker)?;
    let pipeline = MetricsPipeline::from_config(config)?;
    let cache = Arc::new(Mutex::new(SnapshotCache::new()));
    let quotes = config.quote.build_lookup(cache)?;

    let records = pipeline.run(ticker, &statements, &*quotes);

    if json_output {
        println!("{}", formatters::format_metrics_json(&records));
    } else if records.is_empty() {
        print!("{}", formatters::format_no_periods(ticker));
    } else {
        print!("{}", formatters::format_metrics_table(ticker, &records));
    }
    Ok(())
}

fn dispatch_canonical(config: &AppConfig, ticker: &str, json_output: bool) -> Result<()> {
    let statements = load_statements(config, ticker)?;
    let pipeline = MetricsPipeline::from_config(config)?;
    let outcome = pipeline.merge(&statements);

    if json_output {
        println!("{}", formatters::format_canonical_json(ticker, &outcome));
    } else if outcome.is_empty() {
        print!("{}", formatters::format_no_periods(ticker));
    } else {
        print!("{}", formatters::format_canonical_table(ticker, &outcome));
    }
    Ok(())
}

fn dispatch_parse_date(values: &[String], json_output: bool) -> Result<()> {
    let parsed: Vec<_> = values
        .iter()
        .map(|value| (value.clone(), normalize_date(value)))
        .collect();

    if json_output {
        println!("{}", formatters::format_parsed_dates_json(&parsed));
    } else {
        print!("{}", formatters::format_parsed_dates_table(&parsed));
    }
    Ok(())
}

fn dispatch_mappings(
    config: &AppConfig,
    statement: Option<StatementKind>,
    json_output: bool,
) -> Result<()> {
    let canonicalizer = config.canonicalizer()?;
    let kinds: Vec<StatementKind> = match statement {
        Some(kind) => vec![kind],
        None => StatementKind::ALL.to_vec(),
    };

    if json_output {
        println!("{}", formatters::format_mappings_json(&canonicalizer, &kinds));
    } else {
        print!("{}", formatters::format_mappings_table(&canonicalizer, &kinds));
    }
    Ok(())
}
