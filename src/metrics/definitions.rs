//! Metric formulas
//!
//! Every metric is one row of [`DEFINITIONS`]. Formulas only combine a handful of
//! building blocks, so the guard rule (all operands present, non-zero
//! denominator, finite result) is enforced in exactly one place:
//! [`Formula::evaluate`].
//!
//! Rows are ordered so that a formula referring to another metric comes after it.

use crate::error::MetricsError;
use crate::fields::CanonicalField as F;
use crate::quotes::{MarketField, MarketSnapshot};
use crate::statements::CanonicalPeriodRecord;

use super::Metric as M;

const DAYS_PER_YEAR: f64 = 365.0;

/// A statement quantity, read from a single period record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quantity {
    Field(F),
    /// net cash from operations - fixed asset purchases
    FreeCashFlow,
    /// current assets - current liabilities
    WorkingCapital,
    /// total liabilities + total equity
    InvestedCapital,
    /// cash and equivalents + accounts receivable
    QuickAssets,
    /// Dividends paid, as a positive amount
    DividendsPaid,
}

impl Quantity {
    pub fn value(self, record: &CanonicalPeriodRecord) -> Option<f64> {
        let get = |field| record.get(field);
        match self {
            Quantity::Field(field) => get(field),
            Quantity::FreeCashFlow => {
                Some(get(F::NetCashOperating)? - get(F::FixedAssetsAcquisition)?)
            }
            Quantity::WorkingCapital => {
                Some(get(F::TotalCurrentAssets)? - get(F::TotalCurrentLiabilities)?)
            }
            Quantity::InvestedCapital => Some(get(F::TotalLiabilities)? + get(F::TotalEquity)?),
            Quantity::QuickAssets => Some(get(F::CashEquivalents)? + get(F::AccountsReceivable)?),
            Quantity::DividendsPaid => get(F::DividendsPaid).map(f64::abs),
        }
    }
}

/// An operand of a formula
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Term {
    /// Quantity of the period being computed
    Current(Quantity),
    /// Same quantity in the comparison period
    Prior(Quantity),
    /// A metric computed earlier for the same period
    Metric(M),
    Market(MarketField),
    Constant(f64),
}

/// What a formula can see while it is evaluated
pub struct Inputs<'a> {
    pub current: &'a CanonicalPeriodRecord,
    pub prior: Option<&'a CanonicalPeriodRecord>,
    pub market: Option<&'a MarketSnapshot>,
    pub computed: &'a [Option<f64>],
}

impl Term {
    fn value(self, inputs: &Inputs<'_>) -> Option<f64> {
        match self {
            Term::Current(quantity) => quantity.value(inputs.current),
            Term::Prior(quantity) => quantity.value(inputs.prior?),
            Term::Metric(metric) => inputs.computed.get(metric.index()).copied().flatten(),
            Term::Market(field) => inputs.market?.value(field),
            Term::Constant(value) => Some(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Formula {
    Value(Term),
    Ratio {
        numerator: Term,
        denominator: Term,
        scale: f64,
    },
    /// (current - prior) / prior, as a percentage
    Growth(Quantity),
    Sum(&'static [Formula]),
    /// No data source provides the inputs
    Unavailable,
}

/// Why a formula produced nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    MissingOperand,
    /// Zero denominator, or a division that overflowed to a non-finite value
    ZeroDenominator,
}

impl Formula {
    pub fn evaluate(&self, inputs: &Inputs<'_>) -> Result<f64, Guard> {
        let operand = |term: Term| term.value(inputs).ok_or(Guard::MissingOperand);

        let value = match *self {
            Formula::Value(term) => operand(term)?,
            Formula::Ratio {
                numerator,
                denominator,
                scale,
            } => divide(operand(numerator)?, operand(denominator)?)? * scale,
            Formula::Growth(quantity) => {
                let current = operand(Term::Current(quantity))?;
                let prior = operand(Term::Prior(quantity))?;
                divide(current - prior, prior)? * 100.0
            }
            Formula::Sum(parts) => parts
                .iter()
                .map(|part| part.evaluate(inputs))
                .sum::<Result<f64, Guard>>()?,
            Formula::Unavailable => return Err(Guard::MissingOperand),
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(Guard::ZeroDenominator)
        }
    }
}

fn divide(numerator: f64, denominator: f64) -> Result<f64, Guard> {
    if denominator == 0.0 {
        return Err(Guard::ZeroDenominator);
    }
    Ok(numerator / denominator)
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub metric: M,
    pub formula: Formula,
}

impl MetricDef {
    pub fn evaluate(&self, inputs: &Inputs<'_>) -> Result<f64, MetricsError> {
        self.formula.evaluate(inputs).map_err(|guard| {
            let metric = self.metric.as_str().to_string();
            match guard {
                Guard::MissingOperand => MetricsError::MissingOperand { metric },
                Guard::ZeroDenominator => MetricsError::ZeroDenominator { metric },
            }
        })
    }
}

const fn def(metric: M, formula: Formula) -> MetricDef {
    MetricDef { metric, formula }
}

const fn field(field: F) -> Term {
    Term::Current(Quantity::Field(field))
}

const fn ratio(numerator: Term, denominator: Term) -> Formula {
    Formula::Ratio {
        numerator,
        denominator,
        scale: 1.0,
    }
}

const fn percent(numerator: Term, denominator: Term) -> Formula {
    Formula::Ratio {
        numerator,
        denominator,
        scale: 100.0,
    }
}

const fn market(field: MarketField) -> Formula {
    Formula::Value(Term::Market(field))
}

/// Days of inventory + days sales outstanding
const OPERATING_CYCLE: &[Formula] = &[
    ratio(Term::Constant(DAYS_PER_YEAR), Term::Metric(M::InventoryTurnover)),
    Formula::Value(Term::Metric(M::DaysSalesOutstanding)),
];

pub const DEFINITIONS: &[MetricDef] = &[
    // Market data
    def(M::MarketCap, market(MarketField::MarketValue)),
    def(M::SharesOutstanding, market(MarketField::SharesOutstanding)),
    def(M::LastPrice, market(MarketField::LastPrice)),
    def(M::OpenPrice, market(MarketField::OpenPrice)),
    def(M::HighPrice, market(MarketField::HighPrice)),
    def(M::LowPrice, market(MarketField::LowPrice)),
    def(M::PrevClosePrice, market(MarketField::PrevClosePrice)),
    // Profitability
    def(M::GrossMargin, percent(field(F::GrossProfit), field(F::Revenue))),
    def(M::OperatingMargin, percent(field(F::OperatingProfit), field(F::Revenue))),
    def(M::NetMargin, percent(field(F::ProfitAttributable), field(F::Revenue))),
    def(M::ReturnOnEquity, percent(field(F::ProfitAttributable), field(F::TotalEquity))),
    def(M::ReturnOnAssets, percent(field(F::ProfitAttributable), field(F::TotalAssets))),
    def(
        M::ReturnOnInvestedCapital,
        ratio(field(F::OperatingProfit), Term::Current(Quantity::InvestedCapital)),
    ),
    // Efficiency
    def(M::AssetTurnover, ratio(field(F::Revenue), field(F::TotalAssets))),
    def(M::InventoryTurnover, ratio(field(F::CostOfSales), field(F::Inventory))),
    def(M::ReceivablesTurnover, ratio(field(F::Revenue), field(F::AccountsReceivable))),
    def(
        M::DaysSalesOutstanding,
        ratio(Term::Constant(DAYS_PER_YEAR), Term::Metric(M::ReceivablesTurnover)),
    ),
    def(M::OperatingCycle, Formula::Sum(OPERATING_CYCLE)),
    def(
        M::WorkingCapitalTurnover,
        ratio(field(F::Revenue), Term::Current(Quantity::WorkingCapital)),
    ),
    // Liquidity
    def(M::CurrentRatio, ratio(field(F::TotalCurrentAssets), field(F::TotalCurrentLiabilities))),
    def(
        M::QuickRatio,
        ratio(Term::Current(Quantity::QuickAssets), field(F::TotalCurrentLiabilities)),
    ),
    def(M::CashRatio, ratio(field(F::CashEquivalents), field(F::TotalCurrentLiabilities))),
    def(
        M::OperatingCashFlowRatio,
        ratio(field(F::NetCashOperating), field(F::TotalCurrentLiabilities)),
    ),
    // Leverage
    def(M::DebtToEquity, ratio(field(F::TotalLiabilities), field(F::TotalEquity))),
    def(M::DebtToAssets, ratio(field(F::TotalLiabilities), field(F::TotalAssets))),
    def(M::InterestCoverage, ratio(field(F::OperatingProfit), field(F::FinancingCosts))),
    // Cash flow
    def(M::OperatingCashFlow, Formula::Value(field(F::NetCashOperating))),
    def(M::FreeCashFlow, Formula::Value(Term::Current(Quantity::FreeCashFlow))),
    // Growth
    def(M::RevenueGrowth, Formula::Growth(Quantity::Field(F::Revenue))),
    def(M::EarningsGrowth, Formula::Growth(Quantity::Field(F::ProfitAttributable))),
    def(M::BookValueGrowth, Formula::Growth(Quantity::Field(F::ShareholdersEquity))),
    def(M::EarningsPerShareGrowth, Formula::Growth(Quantity::Field(F::BasicEps))),
    def(M::FreeCashFlowGrowth, Formula::Growth(Quantity::FreeCashFlow)),
    def(M::OperatingIncomeGrowth, Formula::Growth(Quantity::Field(F::OperatingProfit))),
    def(M::EbitdaGrowth, Formula::Unavailable),
    // Dividends
    def(
        M::PayoutRatio,
        percent(Term::Current(Quantity::DividendsPaid), field(F::ProfitAttributable)),
    ),
    // Per share
    def(
        M::EarningsPerShare,
        ratio(field(F::ProfitAttributable), Term::Metric(M::SharesOutstanding)),
    ),
    def(
        M::BookValuePerShare,
        ratio(field(F::ShareholdersEquity), Term::Metric(M::SharesOutstanding)),
    ),
    def(
        M::FreeCashFlowPerShare,
        ratio(Term::Metric(M::FreeCashFlow), Term::Metric(M::SharesOutstanding)),
    ),
    // Valuation
    def(M::EnterpriseValue, Formula::Unavailable),
    def(M::PriceToEarningsRatio, market(MarketField::PeRatio)),
    def(
        M::PriceToBookRatio,
        ratio(Term::Market(MarketField::LastPrice), Term::Metric(M::BookValuePerShare)),
    ),
    def(M::PriceToSalesRatio, ratio(Term::Metric(M::MarketCap), field(F::Revenue))),
    def(M::EnterpriseValueToEbitdaRatio, Formula::Unavailable),
    def(M::EnterpriseValueToRevenueRatio, Formula::Unavailable),
    def(
        M::FreeCashFlowYield,
        ratio(Term::Metric(M::FreeCashFlow), Term::Metric(M::MarketCap)),
    ),
    def(
        M::PegRatio,
        ratio(Term::Metric(M::PriceToEarningsRatio), Term::Metric(M::EarningsGrowth)),
    ),
];
