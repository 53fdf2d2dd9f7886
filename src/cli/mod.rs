use clap::{Parser, Subcommand};
use fundamentals::fields::StatementKind;
use std::path::PathBuf;

pub mod formatters;

#[derive(Parser)]
#[command(name = "fundamentals")]
#[command(
    version,
    about = "Financial statement normalization and derived metrics"
)]
#[command(
    long_about = "Read localized balance sheet, income statement and cash flow exports (Excel or CSV), map their line items to canonical fields, merge them by reporting period and compute valuation, profitability, liquidity, leverage, growth and per-share metrics."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Configuration file (default: {config_home}/fundamentals/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compute derived metrics for every reporting period of a ticker
    Metrics {
        /// Ticker code, also the name of its statement directory (e.g., HK.03690)
        ticker: String,

        /// Directory holding one sub-directory of statement files per ticker
        #[arg(long, value_name = "DIR")]
        data_dir: Option<PathBuf>,

        /// Show only the newest N periods
        #[arg(short, long, value_name = "N")]
        limit: Option<usize>,

        /// Read market snapshots from a JSON file instead of the quote service
        #[arg(long, value_name = "FILE")]
        snapshot_file: Option<PathBuf>,

        /// Skip market quotes; valuation metrics stay empty
        #[arg(long)]
        offline: bool,
    },

    /// Show the merged canonical statement values per period
    Canonical {
        /// Ticker code (e.g., HK.03690)
        ticker: String,

        /// Directory holding one sub-directory of statement files per ticker
        #[arg(long, value_name = "DIR")]
        data_dir: Option<PathBuf>,
    },

    /// Show how period headers are normalized to dates
    ParseDate {
        /// Header values (e.g., "2024-12-31", "2024年6月30日", "2024Q3", "FY2023")
        #[arg(required = true)]
        values: Vec<String>,
    },

    /// List the line-item label tables
    Mappings {
        /// Only this statement (balance_sheet, income_statement, cash_flow)
        #[arg(short, long, value_name = "KIND")]
        statement: Option<StatementKind>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_metrics_with_global_flags() {
        let cli = Cli::try_parse_from([
            "fundamentals",
            "metrics",
            "HK.03690",
            "--limit",
            "2",
            "--offline",
            "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Metrics {
                ticker,
                limit,
                offline,
                ..
            } => {
                assert_eq!(ticker, "HK.03690");
                assert_eq!(limit, Some(2));
                assert!(offline);
            }
            _ => panic!("expected metrics command"),
        }
    }

    #[test]
    fn test_parse_statement_kind() {
        let cli =
            Cli::try_parse_from(["fundamentals", "mappings", "--statement", "cash-flow"]).unwrap();
        match cli.command {
            Commands::Mappings { statement } => {
                assert_eq!(statement, Some(StatementKind::CashFlow))
            }
            _ => panic!("expected mappings command"),
        }
        assert!(Cli::try_parse_from(["fundamentals", "mappings", "--statement", "equity"]).is_err());
    }

    #[test]
    fn test_parse_date_requires_values() {
        assert!(Cli::try_parse_from(["fundamentals", "parse-date"]).is_err());
    }
}
