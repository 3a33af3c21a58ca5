//! Loads a [`CompositeQuote`] by fanning out to the finance gateway.
//!
//! The quote, fundamentals and (optionally) price-history calls run
//! concurrently and the first failure aborts the whole load. Dropping the
//! returned future drops every call still in flight.

use crate::core::error::{FinanceError, GatewayError, Result};
use crate::core::gateway::{
    FinanceGateway, RawDate, RawFundamentals, RawPoint, RawPriceHistory, RawQuote,
};
use crate::core::quote::{
    CompositeQuote, FundamentalsBundle, PriceHistory, QuoteSnapshot, SplitEvent,
};
use crate::core::series::{Metric, PeriodKey, Series, period_from_epoch, period_from_iso};
use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use rust_decimal::Decimal;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderSettings {
    /// Gateway calls allowed in flight at once across all loads of one service.
    pub max_concurrent_requests: usize,
    pub fetch_timeout: Duration,
    pub load_timeout: Duration,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 4,
            fetch_timeout: Duration::from_secs(10),
            load_timeout: Duration::from_secs(30),
        }
    }
}

/// Start of the periods to request from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub fundamentals_start: DateTime<Utc>,
    /// Price history is only requested when this is set.
    pub price_history_start: Option<DateTime<Utc>>,
}

impl FetchWindow {
    pub fn years_back(years: u32) -> Self {
        Self {
            fundamentals_start: years_before_now(years),
            price_history_start: None,
        }
    }

    pub fn with_price_history(mut self, start: DateTime<Utc>) -> Self {
        self.price_history_start = Some(start);
        self
    }
}

impl Default for FetchWindow {
    fn default() -> Self {
        Self::years_back(10)
    }
}

pub fn years_before_now(years: u32) -> DateTime<Utc> {
    let now = Utc::now();
    now.checked_sub_months(Months::new(years.saturating_mul(12)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[async_trait]
pub trait QuoteLoader: Send + Sync {
    async fn load_quote(&self, ticker: &str, window: &FetchWindow) -> Result<CompositeQuote>;
}

pub struct QuoteService {
    gateway: Arc<dyn FinanceGateway>,
    permits: Arc<Semaphore>,
    settings: LoaderSettings,
}

impl QuoteService {
    pub fn new(gateway: Arc<dyn FinanceGateway>, settings: LoaderSettings) -> Self {
        QuoteService {
            gateway,
            permits: Arc::new(Semaphore::new(settings.max_concurrent_requests.max(1))),
            settings,
        }
    }

    /// Runs one gateway call holding a pool permit, bounded by the per-call timeout.
    async fn guarded<T>(
        &self,
        ticker: &str,
        operation: &str,
        call: impl Future<Output = Result<T, GatewayError>>,
    ) -> Result<T> {
        let _permit = self.permits.acquire().await.map_err(|_| {
            FinanceError::gateway(ticker, GatewayError::transport("gateway pool closed"))
        })?;
        debug!(ticker, operation, "Gateway call started");

        match tokio::time::timeout(self.settings.fetch_timeout, call).await {
            Ok(result) => result.map_err(|e| FinanceError::gateway(ticker, e)),
            Err(_) => Err(FinanceError::gateway(
                ticker,
                GatewayError::transport(format!(
                    "{operation} request timed out after {:?}",
                    self.settings.fetch_timeout
                )),
            )),
        }
    }
}

#[async_trait]
impl QuoteLoader for QuoteService {
    #[instrument(name = "LoadQuote", skip(self, window), fields(ticker = %ticker))]
    async fn load_quote(&self, ticker: &str, window: &FetchWindow) -> Result<CompositeQuote> {
        let quote = self.guarded(ticker, "quote", self.gateway.fetch_quote(ticker));
        let fundamentals = self.guarded(
            ticker,
            "fundamentals",
            self.gateway
                .fetch_fundamentals(ticker, window.fundamentals_start),
        );
        let history = async {
            match window.price_history_start {
                Some(start) => self
                    .guarded(
                        ticker,
                        "price history",
                        self.gateway.fetch_price_history(ticker, start),
                    )
                    .await
                    .map(Some),
                None => Ok(None),
            }
        };

        let joined = async { tokio::try_join!(quote, fundamentals, history) };
        let (raw_quote, raw_fundamentals, raw_history) =
            tokio::time::timeout(self.settings.load_timeout, joined)
                .await
                .map_err(|_| {
                    FinanceError::gateway(
                        ticker,
                        GatewayError::transport(format!(
                            "load timed out after {:?}",
                            self.settings.load_timeout
                        )),
                    )
                })??;

        let composite = CompositeQuote {
            ticker: ticker.to_string(),
            snapshot: normalize_snapshot(ticker, &raw_quote)?,
            fundamentals: normalize_fundamentals(ticker, &raw_quote, &raw_fundamentals)?,
            price_history: raw_history
                .map(|h| normalize_history(ticker, &h))
                .transpose()?,
        };
        info!(ticker, name = %composite.snapshot.name, "Loaded quote");
        Ok(composite)
    }
}

fn parse_decimal(ticker: &str, field: &str, raw: &str) -> Result<Decimal> {
    let text = raw.trim();
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(&text.to_ascii_lowercase()))
        .map_err(|_| FinanceError::malformed(ticker, format!("{field} is not a number: '{raw}'")))
}

fn required_decimal(ticker: &str, field: &str, value: Option<&String>) -> Result<Decimal> {
    let raw = value.ok_or_else(|| FinanceError::malformed(ticker, format!("missing {field}")))?;
    parse_decimal(ticker, field, raw)
}

fn required_text(ticker: &str, field: &str, value: Option<&String>) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| FinanceError::malformed(ticker, format!("missing {field}")))
}

fn normalize_date(ticker: &str, field: &str, date: &RawDate) -> Result<PeriodKey> {
    let period = match date {
        RawDate::Iso(text) => period_from_iso(text),
        RawDate::Epoch(seconds) => period_from_epoch(*seconds),
    };
    period.ok_or_else(|| FinanceError::malformed(ticker, format!("{field} has invalid date {date:?}")))
}

fn extend_series(ticker: &str, field: &str, series: &mut Series, points: &[RawPoint]) -> Result<()> {
    for point in points {
        let date = normalize_date(ticker, field, &point.date)?;
        match &point.value {
            Some(raw) => series.insert(date, parse_decimal(ticker, field, raw)?),
            None => debug!(ticker, field, %date, "Skipping point without value"),
        }
    }
    Ok(())
}

fn normalize_snapshot(ticker: &str, raw: &RawQuote) -> Result<QuoteSnapshot> {
    let name = raw
        .long_name
        .as_ref()
        .or(raw.short_name.as_ref())
        .filter(|n| !n.trim().is_empty())
        .cloned()
        .ok_or_else(|| FinanceError::malformed(ticker, "missing company name"))?;

    Ok(QuoteSnapshot {
        name,
        short_name: raw.short_name.clone(),
        quote_type: raw.quote_type.clone(),
        exchange: required_text(ticker, "exchange", raw.exchange.as_ref())?,
        currency: required_text(ticker, "currency", raw.currency.as_ref())?,
        price: required_decimal(ticker, "price", raw.price.as_ref())?,
        trailing_pe: raw
            .trailing_pe
            .as_ref()
            .map(|pe| parse_decimal(ticker, "trailingPE", pe))
            .transpose()?,
        open: required_decimal(ticker, "open", raw.open.as_ref())?,
        previous_close: required_decimal(ticker, "previousClose", raw.previous_close.as_ref())?,
    })
}

fn normalize_fundamentals(
    ticker: &str,
    quote: &RawQuote,
    fundamentals: &RawFundamentals,
) -> Result<FundamentalsBundle> {
    let mut bundle = FundamentalsBundle::new();
    for metric in Metric::ALL {
        let key = metric.provider_key();
        let mut series = Series::new();
        for source in [quote.statements.get(key), fundamentals.series.get(key)]
            .into_iter()
            .flatten()
        {
            extend_series(ticker, key, &mut series, source)?;
        }
        debug!(ticker, metric = key, periods = series.len(), "Normalized series");
        bundle = bundle.with_series(metric, series);
    }
    Ok(bundle)
}

fn normalize_history(ticker: &str, raw: &RawPriceHistory) -> Result<PriceHistory> {
    let mut opens = Series::new();
    extend_series(ticker, "open", &mut opens, &raw.opens)?;

    let splits = raw
        .splits
        .iter()
        .map(|split| {
            Ok(SplitEvent {
                date: normalize_date(ticker, "split", &split.date)?,
                numerator: split.numerator,
                denominator: split.denominator,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(PriceHistory { opens, splits })
}
