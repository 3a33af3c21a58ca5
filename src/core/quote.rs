//! Composite quote: snapshot, fundamentals and optional price history of one ticker.

use crate::core::decimal;
use crate::core::series::{Metric, PeriodKey, Series};
use chrono::Datelike;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

static EMPTY_SERIES: Series = Series::new();

/// Point-in-time descriptive data for a listed company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteSnapshot {
    pub name: String,
    pub short_name: Option<String>,
    pub quote_type: Option<String>,
    pub exchange: String,
    pub currency: String,
    pub price: Decimal,
    pub trailing_pe: Option<Decimal>,
    pub open: Decimal,
    pub previous_close: Decimal,
}

/// One series per financial-statement line item.
///
/// Metrics the provider did not report are empty series.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FundamentalsBundle {
    series: BTreeMap<Metric, Series>,
}

impl FundamentalsBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, metric: Metric, series: Series) -> Self {
        self.series.insert(metric, series);
        self
    }

    pub fn series(&self, metric: Metric) -> &Series {
        self.series.get(&metric).unwrap_or(&EMPTY_SERIES)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitEvent {
    pub date: PeriodKey,
    pub numerator: u32,
    pub denominator: u32,
}

/// Periodic open prices with the stock splits that happened in the window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceHistory {
    pub opens: Series,
    pub splits: Vec<SplitEvent>,
}

impl PriceHistory {
    /// Arithmetic mean of the open prices, `None` for an empty history.
    pub fn average_open(&self) -> Option<Decimal> {
        if self.opens.is_empty() {
            return None;
        }
        let sum = self
            .opens
            .iter()
            .try_fold(Decimal::ZERO, |acc, obs| acc.checked_add(obs.value))?;
        decimal::divide(sum, Decimal::from(self.opens.len())).ok()
    }

    /// First open of every calendar year, newest year first.
    pub fn yearly_opens(&self) -> Vec<(i32, Decimal)> {
        let mut by_year = BTreeMap::new();
        for obs in self.opens.iter() {
            by_year.entry(obs.date.year()).or_insert(obs.value);
        }
        by_year.into_iter().rev().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeQuote {
    pub ticker: String,
    pub snapshot: QuoteSnapshot,
    pub fundamentals: FundamentalsBundle,
    pub price_history: Option<PriceHistory>,
}

impl CompositeQuote {
    pub fn series(&self, metric: Metric) -> &Series {
        self.fundamentals.series(metric)
    }

    pub fn currency(&self) -> &str {
        &self.snapshot.currency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::series::Observation;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_missing_metric_is_empty_series() {
        let bundle = FundamentalsBundle::new();
        assert!(bundle.series(Metric::NetIncome).is_empty());
    }

    #[test]
    fn test_average_open() {
        assert_eq!(PriceHistory::default().average_open(), None);

        let opens: Series = [(1, dec!(10)), (2, dec!(20)), (3, dec!(33))]
            .into_iter()
            .map(|(m, v)| Observation::new(NaiveDate::from_ymd_opt(2023, m, 1).unwrap(), v))
            .collect();
        let history = PriceHistory {
            opens,
            splits: Vec::new(),
        };
        assert_eq!(history.average_open(), Some(dec!(21)));
    }

    #[test]
    fn test_yearly_opens_take_first_month_newest_first() {
        let opens: Series = [
            (2022, 11, dec!(80)),
            (2022, 12, dec!(85)),
            (2023, 1, dec!(90)),
            (2023, 6, dec!(120)),
            (2024, 2, dec!(150)),
        ]
        .into_iter()
        .map(|(y, m, v)| Observation::new(NaiveDate::from_ymd_opt(y, m, 1).unwrap(), v))
        .collect();
        let history = PriceHistory {
            opens,
            splits: Vec::new(),
        };
        assert_eq!(
            history.yearly_opens(),
            vec![(2024, dec!(150)), (2023, dec!(90)), (2022, dec!(80))]
        );
        assert!(PriceHistory::default().yearly_opens().is_empty());
    }
}
