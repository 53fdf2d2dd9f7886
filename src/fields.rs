//! Canonical field vocabulary
//!
//! Every value the canonicalizer produces is keyed by one of the [`CanonicalField`]
//! variants below. Keys are language-neutral and each one belongs to exactly one
//! statement kind, so the three mapping tables never compete for the same key.

use std::fmt;
use std::str::FromStr;

/// Declares a closed, string-keyed vocabulary enum.
///
/// Variants keep declaration order, which doubles as their array index in
/// fixed-size value tables (`index()`), and `ALL` lists them in that order.
macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $variant:ident => $key:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $( $variant, )+
        }

        impl $name {
            /// Every key, in declaration order
            pub const ALL: &'static [$name] = &[ $( $name::$variant, )+ ];

            /// Size of the vocabulary
            pub const COUNT: usize = Self::ALL.len();

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $key, )+
                }
            }

            /// Position in `ALL`
            pub fn index(self) -> usize {
                self as usize
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $( $key => Ok($name::$variant), )+
                    other => Err(format!("unknown {} key: {}", stringify!($name), other)),
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use vocabulary;

/// The three statements a company publishes per reporting period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatementKind {
    BalanceSheet,
    IncomeStatement,
    CashFlow,
}

impl StatementKind {
    pub const ALL: [StatementKind; 3] = [
        StatementKind::BalanceSheet,
        StatementKind::IncomeStatement,
        StatementKind::CashFlow,
    ];

    /// Key used in mapping tables and file names
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::BalanceSheet => "balance_sheet",
            StatementKind::IncomeStatement => "income_statement",
            StatementKind::CashFlow => "cash_flow",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StatementKind::BalanceSheet => "Balance sheet",
            StatementKind::IncomeStatement => "Income statement",
            StatementKind::CashFlow => "Cash flow",
        }
    }
}

impl FromStr for StatementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "balance_sheet" | "balance" | "bs" => Ok(StatementKind::BalanceSheet),
            "income_statement" | "income" | "is" => Ok(StatementKind::IncomeStatement),
            "cash_flow" | "cashflow" | "cf" => Ok(StatementKind::CashFlow),
            other => Err(format!("unknown statement kind: {}", other)),
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

vocabulary! {
    /// Canonical statement line items.
    ///
    /// Declared grouped by statement: balance sheet items up to `TotalEquity`,
    /// income statement items up to `DilutedEps`, cash flow items after that.
    pub enum CanonicalField {
        // Balance sheet
        PropertyPlantEquipment => "property_plant_equipment",
        IntangibleAssets => "intangible_assets",
        DeferredTaxAssets => "deferred_tax_assets",
        Prepayments => "prepayments",
        LongTermInvestments => "long_term_investments",
        OtherInvestments => "other_investments",
        FinancialAssetsFairValue => "financial_assets_fair_value",
        TotalNonCurrentAssets => "total_non_current_assets",
        Inventory => "inventory",
        AccountsReceivable => "accounts_receivable",
        PrepaymentsDepositsReceivables => "prepayments_deposits_receivables",
        ShortTermInvestments => "short_term_investments",
        RestrictedCash => "restricted_cash",
        CashEquivalents => "cash_equivalents",
        TotalCurrentAssets => "total_current_assets",
        TotalAssets => "total_assets",
        AccountsPayable => "accounts_payable",
        NotesPayable => "notes_payable",
        TaxesPayable => "taxes_payable",
        LeaseLiabilitiesCurrent => "lease_liabilities_current",
        DeferredRevenueCurrent => "deferred_revenue_current",
        AccruedExpenses => "accrued_expenses",
        AdvancesFromCustomers => "advances_from_customers",
        ShortTermLoans => "short_term_loans",
        TotalCurrentLiabilities => "total_current_liabilities",
        LongTermLoans => "long_term_loans",
        DeferredTaxLiabilities => "deferred_tax_liabilities",
        LeaseLiabilitiesNonCurrent => "lease_liabilities_non_current",
        NotesPayableNonCurrent => "notes_payable_non_current",
        TotalNonCurrentLiabilities => "total_non_current_liabilities",
        TotalLiabilities => "total_liabilities",
        MinorityInterest => "minority_interest",
        NetAssets => "net_assets",
        ShareCapital => "share_capital",
        SharePremium => "share_premium",
        RetainedEarnings => "retained_earnings",
        OtherReserves => "other_reserves",
        ShareholdersEquity => "shareholders_equity",
        TotalEquity => "total_equity",
        // Income statement
        Revenue => "revenue",
        OperatingIncome => "operating_income",
        CostOfSales => "cost_of_sales",
        GrossProfit => "gross_profit",
        OtherIncome => "other_income",
        SellingDistributionExpenses => "selling_distribution_expenses",
        AdministrativeExpenses => "administrative_expenses",
        ImpairmentProvisions => "impairment_provisions",
        RevaluationSurplus => "revaluation_surplus",
        RdExpenses => "rd_expenses",
        OperatingProfit => "operating_profit",
        InterestIncome => "interest_income",
        FinancingCosts => "financing_costs",
        OtherProfitItems => "other_profit_items",
        ProfitBeforeTax => "profit_before_tax",
        TaxExpense => "tax_expense",
        ProfitAfterTaxContinuing => "profit_after_tax_continuing",
        ProfitAfterTax => "profit_after_tax",
        MinorityInterestIncome => "minority_interest_income",
        ProfitAttributable => "profit_attributable",
        BasicEps => "basic_eps",
        DilutedEps => "diluted_eps",
        // Cash flow
        NetCashOperating => "net_cash_operating",
        NetCashInvesting => "net_cash_investing",
        NetCashFinancing => "net_cash_financing",
        NetCashChange => "net_cash_change",
        CashBeginning => "cash_beginning",
        OtherCashAdjustments => "other_cash_adjustments",
        CashEnding => "cash_ending",
        TaxesPaid => "taxes_paid",
        DividendsReceived => "dividends_received",
        FixedAssetsDisposal => "fixed_assets_disposal",
        FixedAssetsAcquisition => "fixed_assets_acquisition",
        IntangibleAssetsAcquisition => "intangible_assets_acquisition",
        NewBorrowings => "new_borrowings",
        LoanRepayments => "loan_repayments",
        DividendsPaid => "dividends_paid",
        ShareIssuance => "share_issuance",
        ShareRepurchase => "share_repurchase",
        LeaseRepayments => "lease_repayments",
    }
}

impl CanonicalField {
    /// Statement this key is reported on
    pub fn statement(self) -> StatementKind {
        if self <= CanonicalField::TotalEquity {
            StatementKind::BalanceSheet
        } else if self <= CanonicalField::DilutedEps {
            StatementKind::IncomeStatement
        } else {
            StatementKind::CashFlow
        }
    }

    /// Keys reported on one statement, in declaration order
    pub fn for_statement(kind: StatementKind) -> impl Iterator<Item = CanonicalField> {
        CanonicalField::ALL
            .iter()
            .copied()
            .filter(move |field| field.statement() == kind)
    }
}
