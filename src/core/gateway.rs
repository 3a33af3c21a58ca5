//! Finance gateway abstraction and the raw records it returns.
//!
//! Raw records keep the provider's date encodings and decimal strings; the
//! quote service turns them into the series model.

use crate::core::error::GatewayError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Date as the provider encoded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawDate {
    /// Calendar date string, midnight UTC.
    Iso(String),
    /// Seconds since the Unix epoch.
    Epoch(i64),
}

/// A dated value. `value` is `None` when the provider sent a placeholder without a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPoint {
    pub date: RawDate,
    pub value: Option<String>,
}

impl RawPoint {
    pub fn new(date: RawDate, value: Option<&str>) -> Self {
        Self {
            date,
            value: value.map(str::to_string),
        }
    }
}

/// Quote summary: descriptive fields plus statement histories keyed by provider field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawQuote {
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub quote_type: Option<String>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
    pub price: Option<String>,
    pub trailing_pe: Option<String>,
    pub open: Option<String>,
    pub previous_close: Option<String>,
    pub statements: BTreeMap<String, Vec<RawPoint>>,
}

/// Fundamentals time series keyed by provider type name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFundamentals {
    pub series: BTreeMap<String, Vec<RawPoint>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSplit {
    pub date: RawDate,
    pub numerator: u32,
    pub denominator: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPriceHistory {
    pub opens: Vec<RawPoint>,
    pub splits: Vec<RawSplit>,
}

#[async_trait]
pub trait FinanceGateway: Send + Sync {
    async fn fetch_quote(&self, ticker: &str) -> Result<RawQuote, GatewayError>;

    async fn fetch_fundamentals(
        &self,
        ticker: &str,
        period_start: DateTime<Utc>,
    ) -> Result<RawFundamentals, GatewayError>;

    async fn fetch_price_history(
        &self,
        ticker: &str,
        period_start: DateTime<Utc>,
    ) -> Result<RawPriceHistory, GatewayError>;
}
