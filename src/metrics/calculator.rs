use tracing::{trace, warn};

use super::definitions::{Inputs, DEFINITIONS};
use super::{DerivedMetricsRecord, Metric};
use crate::error::MetricsError;
use crate::quotes::{MarketSnapshot, QuoteLookup};
use crate::statements::CanonicalPeriodRecord;

/// Default reporting currency of the built-in statement tables
pub const DEFAULT_CURRENCY: &str = "CNY";

/// Computes the full metric vocabulary for one period record
#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    currency: String,
}

impl Default for MetricsCalculator {
    fn default() -> Self {
        Self::new(DEFAULT_CURRENCY)
    }
}

impl MetricsCalculator {
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
        }
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Look the ticker's quote up once, then compute.
    ///
    /// A failed lookup only removes the quote-derived metrics.
    pub fn compute(
        &self,
        ticker: &str,
        record: &CanonicalPeriodRecord,
        prior: Option<&CanonicalPeriodRecord>,
        quotes: &dyn QuoteLookup,
    ) -> DerivedMetricsRecord {
        let snapshot = match quotes.snapshot(ticker) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                let err = MetricsError::QuoteUnavailable {
                    ticker: ticker.to_string(),
                    reason: e.to_string(),
                };
                warn!("{}", err);
                None
            }
        };
        self.compute_with_snapshot(ticker, record, prior, snapshot.as_ref())
    }

    /// Compute every metric from a record, its comparison period and an optional quote
    pub fn compute_with_snapshot(
        &self,
        ticker: &str,
        record: &CanonicalPeriodRecord,
        prior: Option<&CanonicalPeriodRecord>,
        snapshot: Option<&MarketSnapshot>,
    ) -> DerivedMetricsRecord {
        let mut values = [None; Metric::COUNT];

        for def in DEFINITIONS {
            let outcome = def.evaluate(&Inputs {
                current: record,
                prior,
                market: snapshot,
                computed: &values,
            });
            match outcome {
                Ok(value) => values[def.metric.index()] = Some(value),
                Err(reason) => trace!("{} {}: {}", ticker, record.report_date(), reason),
            }
        }

        DerivedMetricsRecord::new(ticker, &self.currency, record.clone(), values)
    }
}
