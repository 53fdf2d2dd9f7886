//! End-to-end processing for one ticker: merge, quote, compute

use anyhow::Result;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::MetricsError;
use crate::metrics::{DerivedMetricsRecord, MetricsCalculator, PeriodKind};
use crate::quotes::QuoteLookup;
use crate::statements::{merge, CanonicalPeriodRecord, FieldCanonicalizer, MergeOutcome, StatementSet};

pub struct MetricsPipeline {
    canonicalizer: FieldCanonicalizer,
    calculator: MetricsCalculator,
    max_periods: Option<usize>,
}

impl MetricsPipeline {
    pub fn new(canonicalizer: FieldCanonicalizer, calculator: MetricsCalculator) -> Self {
        Self {
            canonicalizer,
            calculator,
            max_periods: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self::new(
            config.canonicalizer()?,
            MetricsCalculator::new(config.currency.clone()),
        )
        .with_max_periods(config.max_periods))
    }

    /// Keep only the newest `limit` periods in [`MetricsPipeline::run`] output
    pub fn with_max_periods(mut self, limit: Option<usize>) -> Self {
        self.max_periods = limit;
        self
    }

    pub fn canonicalizer(&self) -> &FieldCanonicalizer {
        &self.canonicalizer
    }

    pub fn merge(&self, statements: &StatementSet) -> MergeOutcome {
        merge(
            &self.canonicalizer,
            &statements.balance_sheet,
            &statements.income_statement,
            &statements.cash_flow,
        )
    }

    /// Derived metrics for every period, newest first.
    ///
    /// The quote is looked up once for the whole run. Growth metrics compare each
    /// period with the next older period of the same kind (annual with annual,
    /// interim with interim). Returns nothing when no statement has a usable
    /// date column.
    pub fn run(
        &self,
        ticker: &str,
        statements: &StatementSet,
        quotes: &dyn QuoteLookup,
    ) -> Vec<DerivedMetricsRecord> {
        let outcome = self.merge(statements);
        if outcome.is_empty() {
            warn!(
                "{}",
                MetricsError::NoUsableStatementData {
                    ticker: ticker.to_string()
                }
            );
            return Vec::new();
        }

        let snapshot = match quotes.snapshot(ticker) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(
                    "{}",
                    MetricsError::QuoteUnavailable {
                        ticker: ticker.to_string(),
                        reason: e.to_string(),
                    }
                );
                None
            }
        };

        let periods: Vec<&CanonicalPeriodRecord> = outcome.newest_first().collect();
        let limit = self.max_periods.unwrap_or(periods.len());

        let records: Vec<DerivedMetricsRecord> = periods
            .iter()
            .enumerate()
            .take(limit)
            .map(|(idx, record)| {
                let prior = comparison_period(record, &periods[idx + 1..]);
                self.calculator
                    .compute_with_snapshot(ticker, record, prior, snapshot.as_ref())
            })
            .collect();

        info!("Computed metrics for {} periods of {}", records.len(), ticker);
        records
    }
}

/// First record among `older` (newest first) with the same period kind
fn comparison_period<'a>(
    record: &CanonicalPeriodRecord,
    older: &[&'a CanonicalPeriodRecord],
) -> Option<&'a CanonicalPeriodRecord> {
    let kind = PeriodKind::from_date(record.report_date());
    older
        .iter()
        .copied()
        .find(|candidate| PeriodKind::from_date(candidate.report_date()) == kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::StatementKind;
    use crate::metrics::Metric;
    use crate::quotes::NoQuotes;
    use crate::statements::{Cell, RawStatementTable};

    fn income(headers: &[&str], revenue: &[f64]) -> RawStatementTable {
        let mut grid = vec![std::iter::once(Cell::text("项目"))
            .chain(headers.iter().map(|h| Cell::text(*h)))
            .collect::<Vec<_>>()];
        grid.push(
            std::iter::once(Cell::text("营业额"))
                .chain(revenue.iter().map(|v| Cell::Number(*v)))
                .collect(),
        );
        RawStatementTable::from_grid(StatementKind::IncomeStatement, grid)
    }

    fn statements(income_statement: RawStatementTable) -> StatementSet {
        StatementSet {
            balance_sheet: RawStatementTable::empty(StatementKind::BalanceSheet),
            income_statement,
            cash_flow: RawStatementTable::empty(StatementKind::CashFlow),
        }
    }

    fn pipeline() -> MetricsPipeline {
        MetricsPipeline::new(FieldCanonicalizer::builtin(), MetricsCalculator::default())
    }

    #[test]
    fn test_growth_uses_same_kind_prior() {
        let set = statements(income(
            &["2024-12-31", "2024-06-30", "2023-12-31", "2023-06-30"],
            &[1200.0, 500.0, 1000.0, 400.0],
        ));
        let records = pipeline().run("HK.03690", &set, &NoQuotes);

        assert_eq!(records.len(), 4);
        assert_eq!(records[0].period, PeriodKind::Annual);
        assert_eq!(records[0].metric(Metric::RevenueGrowth), Some(20.0));
        assert_eq!(records[1].period, PeriodKind::Interim);
        assert_eq!(records[1].metric(Metric::RevenueGrowth), Some(25.0));
        assert_eq!(records[2].metric(Metric::RevenueGrowth), None);
        assert_eq!(records[3].metric(Metric::RevenueGrowth), None);
    }

    #[test]
    fn test_max_periods_truncates_but_keeps_prior_lookup() {
        let set = statements(income(&["2024-12-31", "2023-12-31"], &[1200.0, 1000.0]));
        let records = pipeline()
            .with_max_periods(Some(1))
            .run("HK.03690", &set, &NoQuotes);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metric(Metric::RevenueGrowth), Some(20.0));
    }

    #[test]
    fn test_no_usable_dates_yields_empty_result() {
        let set = statements(income(&["项目说明"], &[1.0]));
        assert!(pipeline().run("HK.03690", &set, &NoQuotes).is_empty());
    }
}
