//! Dated observations and per-metric series.

use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::fmt::Display;

/// Canonical join key: the UTC calendar day a value was reported for.
pub type PeriodKey = NaiveDate;

/// Converts a provider epoch-second timestamp to its UTC calendar day.
pub fn period_from_epoch(seconds: i64) -> Option<PeriodKey> {
    DateTime::from_timestamp(seconds, 0).map(|dt| dt.date_naive())
}

/// Parses an ISO calendar date (`2023-09-30`). A trailing time part is ignored.
pub fn period_from_iso(value: &str) -> Option<PeriodKey> {
    let day = value.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub date: PeriodKey,
    pub value: Decimal,
}

impl Observation {
    pub fn new(date: PeriodKey, value: Decimal) -> Self {
        Self { date, value }
    }
}

/// Observations for one metric, at most one per period.
///
/// Iteration is ascending by date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Series {
    points: BTreeMap<PeriodKey, Decimal>,
}

impl Series {
    pub const fn new() -> Self {
        Self {
            points: BTreeMap::new(),
        }
    }

    /// Inserts an observation; a later value for the same period replaces the earlier one.
    pub fn insert(&mut self, date: PeriodKey, value: Decimal) {
        self.points.insert(date, value);
    }

    pub fn get(&self, date: &PeriodKey) -> Option<Decimal> {
        self.points.get(date).copied()
    }

    pub fn contains(&self, date: &PeriodKey) -> bool {
        self.points.contains_key(date)
    }

    pub fn iter(&self) -> impl Iterator<Item = Observation> + '_ {
        self.points
            .iter()
            .map(|(date, value)| Observation::new(*date, *value))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl FromIterator<Observation> for Series {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        let mut series = Series::new();
        for obs in iter {
            series.insert(obs.date, obs.value);
        }
        series
    }
}

/// Financial-statement line items the ratio calculators consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
pub enum Metric {
    NetIncome,
    Ebit,
    TotalAssets,
    TotalLiabilities,
    CashFromOperations,
    SharesIssued,
    LongTermDebt,
    StockholdersEquity,
    CapitalExpenditure,
    TotalCapitalization,
}

impl Metric {
    pub const ALL: [Metric; 10] = [
        Metric::NetIncome,
        Metric::Ebit,
        Metric::TotalAssets,
        Metric::TotalLiabilities,
        Metric::CashFromOperations,
        Metric::SharesIssued,
        Metric::LongTermDebt,
        Metric::StockholdersEquity,
        Metric::CapitalExpenditure,
        Metric::TotalCapitalization,
    ];

    /// Field name used by the provider for this line item.
    pub fn provider_key(&self) -> &'static str {
        match self {
            Metric::NetIncome => "netIncome",
            Metric::Ebit => "ebit",
            Metric::TotalAssets => "totalAssets",
            Metric::TotalLiabilities => "totalLiab",
            Metric::CashFromOperations => "totalCashFromOperatingActivities",
            Metric::SharesIssued => "annualShareIssued",
            Metric::LongTermDebt => "annualLongTermDebt",
            Metric::StockholdersEquity => "annualStockholdersEquity",
            Metric::CapitalExpenditure => "annualCapitalExpenditure",
            Metric::TotalCapitalization => "annualTotalCapitalization",
        }
    }
}

impl Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Metric::NetIncome => "net income",
                Metric::Ebit => "EBIT",
                Metric::TotalAssets => "total assets",
                Metric::TotalLiabilities => "total liabilities",
                Metric::CashFromOperations => "cash from operations",
                Metric::SharesIssued => "shares issued",
                Metric::LongTermDebt => "long-term debt",
                Metric::StockholdersEquity => "stockholders' equity",
                Metric::CapitalExpenditure => "capital expenditure",
                Metric::TotalCapitalization => "total capitalization",
            }
        )
    }
}
