//! Derived metrics
//!
//! The metric vocabulary is closed: every [`DerivedMetricsRecord`] carries a slot
//! for each [`Metric`], holding either a finite number or nothing. Formulas live
//! in [`definitions`], the evaluation loop in [`calculator`].

pub mod calculator;
pub mod definitions;

use chrono::{Datelike, NaiveDate};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::fmt;

use crate::fields::{vocabulary, CanonicalField};
use crate::statements::CanonicalPeriodRecord;

pub use calculator::MetricsCalculator;

vocabulary! {
    /// Derived metric keys, grouped as reported (see [`Metric::group`])
    pub enum Metric {
        // Market data
        MarketCap => "market_cap",
        SharesOutstanding => "shares_outstanding",
        LastPrice => "last_price",
        OpenPrice => "open_price",
        HighPrice => "high_price",
        LowPrice => "low_price",
        PrevClosePrice => "prev_close_price",
        // Valuation
        EnterpriseValue => "enterprise_value",
        PriceToEarningsRatio => "price_to_earnings_ratio",
        PriceToBookRatio => "price_to_book_ratio",
        PriceToSalesRatio => "price_to_sales_ratio",
        EnterpriseValueToEbitdaRatio => "enterprise_value_to_ebitda_ratio",
        EnterpriseValueToRevenueRatio => "enterprise_value_to_revenue_ratio",
        FreeCashFlowYield => "free_cash_flow_yield",
        PegRatio => "peg_ratio",
        // Profitability
        GrossMargin => "gross_margin",
        OperatingMargin => "operating_margin",
        NetMargin => "net_margin",
        ReturnOnEquity => "return_on_equity",
        ReturnOnAssets => "return_on_assets",
        ReturnOnInvestedCapital => "return_on_invested_capital",
        // Efficiency
        AssetTurnover => "asset_turnover",
        InventoryTurnover => "inventory_turnover",
        ReceivablesTurnover => "receivables_turnover",
        DaysSalesOutstanding => "days_sales_outstanding",
        OperatingCycle => "operating_cycle",
        WorkingCapitalTurnover => "working_capital_turnover",
        // Liquidity
        CurrentRatio => "current_ratio",
        QuickRatio => "quick_ratio",
        CashRatio => "cash_ratio",
        OperatingCashFlowRatio => "operating_cash_flow_ratio",
        // Leverage
        DebtToEquity => "debt_to_equity",
        DebtToAssets => "debt_to_assets",
        InterestCoverage => "interest_coverage",
        // Cash flow
        OperatingCashFlow => "operating_cash_flow",
        FreeCashFlow => "free_cash_flow",
        // Growth
        RevenueGrowth => "revenue_growth",
        EarningsGrowth => "earnings_growth",
        BookValueGrowth => "book_value_growth",
        EarningsPerShareGrowth => "earnings_per_share_growth",
        FreeCashFlowGrowth => "free_cash_flow_growth",
        OperatingIncomeGrowth => "operating_income_growth",
        EbitdaGrowth => "ebitda_growth",
        // Dividends
        PayoutRatio => "payout_ratio",
        // Per share
        EarningsPerShare => "earnings_per_share",
        BookValuePerShare => "book_value_per_share",
        FreeCashFlowPerShare => "free_cash_flow_per_share",
    }
}

/// Reporting sections for metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricGroup {
    Market,
    Valuation,
    Profitability,
    Efficiency,
    Liquidity,
    Leverage,
    CashFlow,
    Growth,
    Dividends,
    PerShare,
}

impl MetricGroup {
    pub const ALL: [MetricGroup; 10] = [
        MetricGroup::Market,
        MetricGroup::Valuation,
        MetricGroup::Profitability,
        MetricGroup::Efficiency,
        MetricGroup::Liquidity,
        MetricGroup::Leverage,
        MetricGroup::CashFlow,
        MetricGroup::Growth,
        MetricGroup::Dividends,
        MetricGroup::PerShare,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            MetricGroup::Market => "Market data",
            MetricGroup::Valuation => "Valuation",
            MetricGroup::Profitability => "Profitability",
            MetricGroup::Efficiency => "Efficiency",
            MetricGroup::Liquidity => "Liquidity",
            MetricGroup::Leverage => "Leverage",
            MetricGroup::CashFlow => "Cash flow",
            MetricGroup::Growth => "Growth",
            MetricGroup::Dividends => "Dividends",
            MetricGroup::PerShare => "Per share",
        }
    }
}

impl Metric {
    pub fn group(self) -> MetricGroup {
        if self <= Metric::PrevClosePrice {
            MetricGroup::Market
        } else if self <= Metric::PegRatio {
            MetricGroup::Valuation
        } else if self <= Metric::ReturnOnInvestedCapital {
            MetricGroup::Profitability
        } else if self <= Metric::WorkingCapitalTurnover {
            MetricGroup::Efficiency
        } else if self <= Metric::OperatingCashFlowRatio {
            MetricGroup::Liquidity
        } else if self <= Metric::InterestCoverage {
            MetricGroup::Leverage
        } else if self <= Metric::FreeCashFlow {
            MetricGroup::CashFlow
        } else if self <= Metric::EbitdaGrowth {
            MetricGroup::Growth
        } else if self <= Metric::PayoutRatio {
            MetricGroup::Dividends
        } else {
            MetricGroup::PerShare
        }
    }

    /// Metrics expressed as a percentage (already multiplied by 100)
    /// Currency amounts and share counts, as opposed to ratios and per-share figures
    pub fn is_amount(self) -> bool {
        matches!(
            self,
            Metric::MarketCap
                | Metric::SharesOutstanding
                | Metric::EnterpriseValue
                | Metric::OperatingCashFlow
                | Metric::FreeCashFlow
        )
    }

    pub fn is_percent(self) -> bool {
        matches!(
            self,
            Metric::GrossMargin
                | Metric::OperatingMargin
                | Metric::NetMargin
                | Metric::ReturnOnEquity
                | Metric::ReturnOnAssets
                | Metric::PayoutRatio
        ) || self.group() == MetricGroup::Growth
    }
}

/// Reporting period type, derived from the report date's month and day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeriodKind {
    Annual,
    Interim,
    Quarterly,
    Other,
}

impl PeriodKind {
    pub fn from_date(date: NaiveDate) -> Self {
        match (date.month(), date.day()) {
            (12, 31) => PeriodKind::Annual,
            (6, 30) => PeriodKind::Interim,
            (3, 31) => PeriodKind::Quarterly,
            _ => PeriodKind::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodKind::Annual => "annual",
            PeriodKind::Interim => "interim",
            PeriodKind::Quarterly => "quarterly",
            PeriodKind::Other => "other",
        }
    }
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statement values plus derived metrics for one ticker and reporting period
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedMetricsRecord {
    pub ticker: String,
    pub period: PeriodKind,
    pub currency: String,
    pub statement: CanonicalPeriodRecord,
    metrics: [Option<f64>; Metric::COUNT],
}

impl DerivedMetricsRecord {
    pub(crate) fn new(
        ticker: &str,
        currency: &str,
        statement: CanonicalPeriodRecord,
        metrics: [Option<f64>; Metric::COUNT],
    ) -> Self {
        Self {
            ticker: ticker.to_string(),
            period: PeriodKind::from_date(statement.report_date()),
            currency: currency.to_string(),
            statement,
            metrics,
        }
    }

    pub fn report_date(&self) -> NaiveDate {
        self.statement.report_date()
    }

    pub fn metric(&self, metric: Metric) -> Option<f64> {
        self.metrics[metric.index()]
    }

    pub fn field(&self, field: CanonicalField) -> Option<f64> {
        self.statement.get(field)
    }

    /// Metrics that have a value, in vocabulary order
    pub fn present_metrics(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        Metric::ALL
            .iter()
            .filter_map(|metric| self.metric(*metric).map(|value| (*metric, value)))
    }
}

/// Flat object: identification first, then every canonical key, then every
/// metric key. Absent values are written as `null`.
impl Serialize for DerivedMetricsRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map =
            serializer.serialize_map(Some(4 + CanonicalField::COUNT + Metric::COUNT))?;
        map.serialize_entry("ticker", &self.ticker)?;
        map.serialize_entry(
            "report_date",
            &self.report_date().format("%Y-%m-%d").to_string(),
        )?;
        map.serialize_entry("period", self.period.as_str())?;
        map.serialize_entry("currency", &self.currency)?;
        for field in CanonicalField::ALL {
            map.serialize_entry(field.as_str(), &self.statement.get(*field))?;
        }
        for metric in Metric::ALL {
            map.serialize_entry(metric.as_str(), &self.metric(*metric))?;
        }
        map.end()
    }
}
