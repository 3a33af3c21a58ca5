use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::state::InMemoryState;
use governor::state::direct::NotKeyed;
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::config::YahooProviderConfig;
use crate::core::error::GatewayError;
use crate::core::gateway::{
    FinanceGateway, RawDate, RawFundamentals, RawPoint, RawPriceHistory, RawQuote, RawSplit,
};
use crate::core::series::Metric;
use crate::providers::util::with_retry;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

const RETRY_DELAY_MS: u64 = 250;

/// Yahoo Finance implementation of [`FinanceGateway`].
///
/// Quote summary, fundamentals time series and the monthly chart are three
/// independent endpoints; every request goes through one shared rate limiter.
pub struct YahooFinanceGateway {
    client: reqwest::Client,
    base_url: String,
    summary_base_url: String,
    quote_modules: Vec<String>,
    timeseries_types: Vec<String>,
    retries: usize,
    limiter: Arc<DirectRateLimiter>,
}

impl YahooFinanceGateway {
    pub fn new(config: &YahooProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("fincalc/1.0")
            .build()
            .context("Failed to build HTTP client")?;
        let per_second = NonZeroU32::new(config.requests_per_second.max(1))
            .context("Rate limit must be positive")?;

        Ok(YahooFinanceGateway {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            summary_base_url: config.summary_base_url.trim_end_matches('/').to_string(),
            quote_modules: config.quote_modules.clone(),
            timeseries_types: config.timeseries_types.clone(),
            retries: config.retries,
            limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let url = reqwest::Url::parse_with_params(url, query)
            .map_err(|e| GatewayError::transport(format!("Invalid URL {url}: {e}")))?;
        let url = &url;
        let body = with_retry(
            move || async move {
                self.limiter.until_ready().await;
                debug!("Requesting {}", url);
                let response = self
                    .client
                    .get(url.clone())
                    .send()
                    .await
                    .map_err(|e| GatewayError::transport(format!("Request error: {e} URL: {url}")))?;

                let status = response.status();
                let text = response.text().await.map_err(|e| {
                    GatewayError::transport(format!("Failed to read response body: {e}"))
                })?;
                if !status.is_success() {
                    return Err(GatewayError::new(Some(status.as_u16()), text));
                }
                if text.trim().is_empty() {
                    return Err(GatewayError::new(Some(status.as_u16()), "empty response body"));
                }
                Ok(text)
            },
            self.retries,
            RETRY_DELAY_MS,
        )
        .await?;

        serde_json::from_str(&body)
            .map_err(|e| GatewayError::new(Some(200), format!("Failed to parse JSON response: {e}")))
    }
}

#[derive(Deserialize, Debug, Default)]
struct RawValue {
    #[serde(default)]
    raw: Option<serde_json::Number>,
}

impl RawValue {
    fn text(&self) -> Option<String> {
        self.raw.as_ref().map(|n| n.to_string())
    }
}

fn value_text(value: &Option<RawValue>) -> Option<String> {
    value.as_ref().and_then(RawValue::text)
}

#[derive(Deserialize, Debug)]
struct YahooApiError {
    description: Option<String>,
}

fn missing_result(error: Option<YahooApiError>, ticker: &str) -> GatewayError {
    let description = error
        .and_then(|e| e.description)
        .unwrap_or_else(|| format!("No data found for symbol: {ticker}"));
    GatewayError::new(Some(200), description)
}

#[derive(Deserialize, Debug)]
struct QuoteSummaryResponse {
    #[serde(alias = "quoteSummary")]
    quote_summary: ResultEnvelope<QuoteSummaryItem>,
}

#[derive(Deserialize, Debug)]
struct ResultEnvelope<T> {
    result: Option<Vec<T>>,
    error: Option<YahooApiError>,
}

impl<T> ResultEnvelope<T> {
    fn first(self, ticker: &str) -> Result<T, GatewayError> {
        let error = self.error;
        self.result
            .and_then(|items| items.into_iter().next())
            .ok_or_else(|| missing_result(error, ticker))
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryItem {
    price: Option<PriceModule>,
    summary_detail: Option<SummaryDetailModule>,
    income_statement_history: Option<IncomeStatementModule>,
    balance_sheet_history: Option<BalanceSheetModule>,
    cashflow_statement_history: Option<CashflowModule>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    long_name: Option<String>,
    short_name: Option<String>,
    quote_type: Option<String>,
    exchange_name: Option<String>,
    currency: Option<String>,
    regular_market_price: Option<RawValue>,
    regular_market_open: Option<RawValue>,
    regular_market_previous_close: Option<RawValue>,
}

#[derive(Deserialize, Debug)]
struct SummaryDetailModule {
    #[serde(alias = "trailingPE")]
    trailing_pe: Option<RawValue>,
    open: Option<RawValue>,
    #[serde(alias = "previousClose")]
    previous_close: Option<RawValue>,
}

#[derive(Deserialize, Debug)]
struct IncomeStatementModule {
    #[serde(rename = "incomeStatementHistory", default)]
    statements: Vec<IncomeStatement>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct IncomeStatement {
    end_date: Option<RawValue>,
    net_income: Option<RawValue>,
    ebit: Option<RawValue>,
}

#[derive(Deserialize, Debug)]
struct BalanceSheetModule {
    #[serde(rename = "balanceSheetStatements", default)]
    statements: Vec<BalanceSheet>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct BalanceSheet {
    end_date: Option<RawValue>,
    total_assets: Option<RawValue>,
    total_liab: Option<RawValue>,
}

#[derive(Deserialize, Debug)]
struct CashflowModule {
    #[serde(rename = "cashflowStatements", default)]
    statements: Vec<Cashflow>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Cashflow {
    end_date: Option<RawValue>,
    total_cash_from_operating_activities: Option<RawValue>,
}

/// Appends one statement line item when the statement carries both a date and the field.
fn push_statement(
    statements: &mut BTreeMap<String, Vec<RawPoint>>,
    metric: Metric,
    end_date: &Option<RawValue>,
    value: &Option<RawValue>,
) {
    let Some(seconds) = end_date
        .as_ref()
        .and_then(|d| d.raw.as_ref())
        .and_then(serde_json::Number::as_i64)
    else {
        debug!(field = metric.provider_key(), "Statement without end date");
        return;
    };
    if let Some(value) = value {
        statements
            .entry(metric.provider_key().to_string())
            .or_default()
            .push(RawPoint {
                date: RawDate::Epoch(seconds),
                value: value.text(),
            });
    }
}

fn map_quote(item: QuoteSummaryItem) -> RawQuote {
    let mut quote = RawQuote::default();

    if let Some(price) = item.price {
        quote.long_name = price.long_name;
        quote.short_name = price.short_name;
        quote.quote_type = price.quote_type;
        quote.exchange = price.exchange_name;
        quote.currency = price.currency;
        quote.price = value_text(&price.regular_market_price);
        quote.open = value_text(&price.regular_market_open);
        quote.previous_close = value_text(&price.regular_market_previous_close);
    }
    if let Some(detail) = item.summary_detail {
        quote.trailing_pe = value_text(&detail.trailing_pe);
        quote.open = value_text(&detail.open).or(quote.open);
        quote.previous_close = value_text(&detail.previous_close).or(quote.previous_close);
    }

    let statements = &mut quote.statements;
    for s in item
        .income_statement_history
        .map(|m| m.statements)
        .unwrap_or_default()
    {
        push_statement(statements, Metric::NetIncome, &s.end_date, &s.net_income);
        push_statement(statements, Metric::Ebit, &s.end_date, &s.ebit);
    }
    for s in item
        .balance_sheet_history
        .map(|m| m.statements)
        .unwrap_or_default()
    {
        push_statement(statements, Metric::TotalAssets, &s.end_date, &s.total_assets);
        push_statement(statements, Metric::TotalLiabilities, &s.end_date, &s.total_liab);
    }
    for s in item
        .cashflow_statement_history
        .map(|m| m.statements)
        .unwrap_or_default()
    {
        push_statement(
            statements,
            Metric::CashFromOperations,
            &s.end_date,
            &s.total_cash_from_operating_activities,
        );
    }

    quote
}

#[derive(Deserialize, Debug)]
struct TimeseriesResponse {
    timeseries: ResultEnvelope<TimeseriesItem>,
}

#[derive(Deserialize, Debug)]
struct TimeseriesItem {
    meta: TimeseriesMeta,
    #[serde(flatten)]
    values: HashMap<String, serde_json::Value>,
}

#[derive(Deserialize, Debug)]
struct TimeseriesMeta {
    #[serde(rename = "type", default)]
    types: Vec<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct TimeseriesPoint {
    as_of_date: String,
    reported_value: Option<RawValue>,
}

fn map_fundamentals(items: Vec<TimeseriesItem>) -> Result<RawFundamentals, GatewayError> {
    let mut fundamentals = RawFundamentals::default();
    for mut item in items {
        for kind in item.meta.types {
            let Some(values) = item.values.remove(&kind) else {
                debug!(kind, "Time series without values");
                continue;
            };
            let points: Vec<Option<TimeseriesPoint>> =
                serde_json::from_value(values).map_err(|e| {
                    GatewayError::new(Some(200), format!("Failed to parse {kind} values: {e}"))
                })?;
            let series = fundamentals.series.entry(kind).or_default();
            series.extend(points.into_iter().flatten().map(|p| RawPoint {
                date: RawDate::Iso(p.as_of_date),
                value: value_text(&p.reported_value),
            }));
        }
    }
    Ok(fundamentals)
}

#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: ResultEnvelope<ChartItem>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
    events: Option<ChartEvents>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<ChartQuote>,
}

#[derive(Deserialize, Debug)]
struct ChartQuote {
    open: Option<Vec<Option<serde_json::Number>>>,
}

#[derive(Deserialize, Debug)]
struct ChartEvents {
    splits: Option<HashMap<String, ChartSplit>>,
}

#[derive(Deserialize, Debug)]
struct ChartSplit {
    date: i64,
    numerator: serde_json::Number,
    denominator: serde_json::Number,
}

/// Split ratios arrive as JSON numbers, sometimes with a `.0` suffix.
fn whole_number(value: &serde_json::Number) -> Option<u32> {
    value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| f as u64)
        })
        .and_then(|n| u32::try_from(n).ok())
}

fn map_history(item: ChartItem) -> Result<RawPriceHistory, GatewayError> {
    let timestamps = item.timestamp.unwrap_or_default();
    let opens = item
        .indicators
        .and_then(|i| i.quote.into_iter().next())
        .and_then(|q| q.open)
        .unwrap_or_default();

    let opens = timestamps
        .into_iter()
        .zip(opens)
        .map(|(ts, open)| RawPoint {
            date: RawDate::Epoch(ts),
            value: open.map(|n| n.to_string()),
        })
        .collect();

    let mut splits = item
        .events
        .and_then(|e| e.splits)
        .unwrap_or_default()
        .into_values()
        .map(|split| {
            match (whole_number(&split.numerator), whole_number(&split.denominator)) {
                (Some(numerator), Some(denominator)) => Ok(RawSplit {
                    date: RawDate::Epoch(split.date),
                    numerator,
                    denominator,
                }),
                _ => Err(GatewayError::new(
                    Some(200),
                    format!(
                        "Invalid split ratio {}:{}",
                        split.numerator, split.denominator
                    ),
                )),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    splits.sort_by_key(|s| match s.date {
        RawDate::Epoch(seconds) => seconds,
        RawDate::Iso(_) => 0,
    });

    Ok(RawPriceHistory { opens, splits })
}

#[async_trait]
impl FinanceGateway for YahooFinanceGateway {
    #[instrument(name = "YahooQuoteFetch", skip(self), fields(symbol = %ticker))]
    async fn fetch_quote(&self, ticker: &str) -> Result<RawQuote, GatewayError> {
        let url = format!(
            "{}/v10/finance/quoteSummary/{}",
            self.summary_base_url, ticker
        );
        let query = [("modules", self.quote_modules.join(","))];
        let response: QuoteSummaryResponse = self.get_json(&url, &query).await?;
        let item = response.quote_summary.first(ticker)?;
        Ok(map_quote(item))
    }

    #[instrument(name = "YahooFundamentalsFetch", skip(self), fields(symbol = %ticker))]
    async fn fetch_fundamentals(
        &self,
        ticker: &str,
        period_start: DateTime<Utc>,
    ) -> Result<RawFundamentals, GatewayError> {
        let url = format!(
            "{}/ws/fundamentals-timeseries/v1/finance/timeseries/{}",
            self.base_url, ticker
        );
        let query = [
            ("type", self.timeseries_types.join(",")),
            ("period1", period_start.timestamp().to_string()),
            ("period2", Utc::now().timestamp().to_string()),
            ("merge", "false".to_string()),
        ];
        let response: TimeseriesResponse = self.get_json(&url, &query).await?;
        let items = response.timeseries.result.unwrap_or_default();
        map_fundamentals(items)
    }

    #[instrument(name = "YahooChartFetch", skip(self), fields(symbol = %ticker))]
    async fn fetch_price_history(
        &self,
        ticker: &str,
        period_start: DateTime<Utc>,
    ) -> Result<RawPriceHistory, GatewayError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, ticker);
        let query = [
            ("interval", "1mo".to_string()),
            ("period1", period_start.timestamp().to_string()),
            ("period2", Utc::now().timestamp().to_string()),
            ("events", "div|split".to_string()),
        ];
        let response: ChartResponse = self.get_json(&url, &query).await?;
        let item = response.chart.first(ticker)?;
        map_history(item)
    }
}
