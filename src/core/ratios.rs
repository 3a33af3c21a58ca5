//! Per-period solvency and profitability ratios.
//!
//! Every calculator joins a reference series against its companions and
//! emits one point per period for which all inputs are present. A period
//! whose formula fails (missing input, zero denominator) is dropped and the
//! remaining periods are still reported.

use crate::core::align::{AlignedRow, align};
use crate::core::decimal::{absolute, add, divide, subtract, to_percent};
use crate::core::error::{FinanceError, Result};
use crate::core::quote::CompositeQuote;
use crate::core::series::{Metric, PeriodKey};
use chrono::Datelike;
use rust_decimal::Decimal;
use tracing::debug;

pub trait Calculator {
    type Point;

    fn calculate(&self, quote: &CompositeQuote) -> Vec<Self::Point>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatioPoint {
    pub date: PeriodKey,
    pub value: Decimal,
}

/// A per-share amount, denominated in the quote's currency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerSharePoint {
    pub date: PeriodKey,
    pub value: Decimal,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreeCashFlowPoint {
    pub date: PeriodKey,
    pub free_cash_flow: Decimal,
    pub long_term_debt: Option<Decimal>,
    pub years_to_payback: Option<Decimal>,
    pub currency: String,
}

/// The row's companion values, or the first metric without a value in this period.
fn require<const N: usize>(row: &AlignedRow<N>, metrics: [Metric; N]) -> Result<[Decimal; N]> {
    row.complete().ok_or_else(|| {
        let missing = row
            .companions
            .iter()
            .zip(metrics)
            .find_map(|(value, metric)| value.is_none().then_some(metric));
        FinanceError::MissingAlignment {
            metric: missing.map(|m| m.to_string()).unwrap_or_default(),
        }
    })
}

fn skip_period(quote: &CompositeQuote, ratio: &str, date: PeriodKey, err: &FinanceError) {
    debug!(
        ticker = %quote.ticker,
        ratio,
        period = %date,
        "Skipping period: {err}"
    );
}

/// Applies `formula` to every period of `reference`, keeping the periods it succeeds for.
fn derive<const N: usize>(
    ratio: &str,
    quote: &CompositeQuote,
    reference: Metric,
    companions: [Metric; N],
    formula: impl Fn(Decimal, [Decimal; N]) -> Result<Decimal>,
) -> Vec<RatioPoint> {
    let companion_series = companions.map(|metric| quote.series(metric));
    align(quote.series(reference), companion_series)
        .filter_map(|row| {
            match require(&row, companions).and_then(|values| formula(row.reference, values)) {
                Ok(value) => Some(RatioPoint {
                    date: row.date,
                    value,
                }),
                Err(err) => {
                    skip_period(quote, ratio, row.date, &err);
                    None
                }
            }
        })
        .collect()
}

fn per_share(points: Vec<RatioPoint>, currency: &str) -> Vec<PerSharePoint> {
    points
        .into_iter()
        .map(|p| PerSharePoint {
            date: p.date,
            value: p.value,
            currency: currency.to_string(),
        })
        .collect()
}

/// Net income over equity (assets minus liabilities), in percent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReturnOnEquity;

impl Calculator for ReturnOnEquity {
    type Point = RatioPoint;

    fn calculate(&self, quote: &CompositeQuote) -> Vec<RatioPoint> {
        derive(
            "ROE",
            quote,
            Metric::NetIncome,
            [Metric::TotalAssets, Metric::TotalLiabilities],
            |net_income, [assets, liabilities]| {
                to_percent(divide(net_income, subtract(assets, liabilities)?)?)
            },
        )
    }
}

/// Denominator used for return on total capital.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CapitalBasis {
    /// The provider's total capitalization series.
    #[default]
    ProviderCapitalization,
    /// Total assets plus total liabilities of the same period.
    AssetsPlusLiabilities,
}

#[derive(Debug, Clone, Copy)]
pub struct ReturnOnTotalCapital {
    earnings: Metric,
    basis: CapitalBasis,
}

impl ReturnOnTotalCapital {
    pub fn new(earnings: Metric, basis: CapitalBasis) -> Self {
        Self { earnings, basis }
    }
}

impl Default for ReturnOnTotalCapital {
    fn default() -> Self {
        Self::new(Metric::Ebit, CapitalBasis::ProviderCapitalization)
    }
}

impl Calculator for ReturnOnTotalCapital {
    type Point = RatioPoint;

    fn calculate(&self, quote: &CompositeQuote) -> Vec<RatioPoint> {
        match self.basis {
            CapitalBasis::ProviderCapitalization => derive(
                "ROTC",
                quote,
                self.earnings,
                [Metric::TotalCapitalization],
                |earnings, [capital]| to_percent(divide(earnings, capital)?),
            ),
            CapitalBasis::AssetsPlusLiabilities => derive(
                "ROTC",
                quote,
                self.earnings,
                [Metric::TotalAssets, Metric::TotalLiabilities],
                |earnings, [assets, liabilities]| {
                    to_percent(divide(earnings, add(assets, liabilities)?)?)
                },
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReturnOnAssets;

impl Calculator for ReturnOnAssets {
    type Point = RatioPoint;

    fn calculate(&self, quote: &CompositeQuote) -> Vec<RatioPoint> {
        derive(
            "ROA",
            quote,
            Metric::NetIncome,
            [Metric::TotalAssets],
            |net_income, [assets]| to_percent(divide(net_income, assets)?),
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EarningsPerShare;

impl Calculator for EarningsPerShare {
    type Point = PerSharePoint;

    fn calculate(&self, quote: &CompositeQuote) -> Vec<PerSharePoint> {
        let points = derive(
            "EPS",
            quote,
            Metric::NetIncome,
            [Metric::SharesIssued],
            |net_income, [shares]| divide(net_income, shares),
        );
        per_share(points, quote.currency())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DebtToEquity;

impl Calculator for DebtToEquity {
    type Point = RatioPoint;

    fn calculate(&self, quote: &CompositeQuote) -> Vec<RatioPoint> {
        derive(
            "DTE",
            quote,
            Metric::TotalLiabilities,
            [Metric::StockholdersEquity],
            |liabilities, [equity]| divide(liabilities, equity),
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BookValue;

impl Calculator for BookValue {
    type Point = PerSharePoint;

    fn calculate(&self, quote: &CompositeQuote) -> Vec<PerSharePoint> {
        let points = derive(
            "BookValue",
            quote,
            Metric::StockholdersEquity,
            [Metric::SharesIssued],
            |equity, [shares]| divide(equity, shares),
        );
        per_share(points, quote.currency())
    }
}

/// Free cash flow and the years it would take to repay long-term debt from it.
///
/// Capital expenditure is required; long-term debt is not, and its absence
/// only leaves the payback empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreeCashFlow;

impl FreeCashFlow {
    fn period(row: &AlignedRow<2>, currency: &str) -> Result<FreeCashFlowPoint> {
        let capex = row.companions[0].ok_or_else(|| FinanceError::MissingAlignment {
            metric: Metric::CapitalExpenditure.to_string(),
        })?;
        let free_cash_flow = subtract(row.reference, absolute(capex))?;
        let long_term_debt = row.companions[1];
        // zero free cash flow never repays the debt; the point is kept without a payback
        let years_to_payback = match long_term_debt.map(|debt| divide(debt, free_cash_flow)) {
            Some(Ok(years)) => Some(years),
            Some(Err(FinanceError::DivisionByZero)) | None => None,
            Some(Err(err)) => return Err(err),
        };

        Ok(FreeCashFlowPoint {
            date: row.date,
            free_cash_flow,
            long_term_debt,
            years_to_payback,
            currency: currency.to_string(),
        })
    }
}

impl Calculator for FreeCashFlow {
    type Point = FreeCashFlowPoint;

    fn calculate(&self, quote: &CompositeQuote) -> Vec<FreeCashFlowPoint> {
        align(
            quote.series(Metric::CashFromOperations),
            [
                quote.series(Metric::CapitalExpenditure),
                quote.series(Metric::LongTermDebt),
            ],
        )
        .filter_map(|row| match Self::period(&row, quote.currency()) {
            Ok(point) => Some(point),
            Err(err) => {
                skip_period(quote, "FCF", row.date, &err);
                None
            }
        })
        .collect()
    }
}

/// Fiscal years whose ratio is zero or negative, oldest first.
pub fn loss_years(points: &[RatioPoint]) -> Vec<i32> {
    points
        .iter()
        .filter(|p| p.value <= Decimal::ZERO)
        .map(|p| p.date.year())
        .collect()
}
