//! Periodic price watch over a fixed list of tickers.
//!
//! Every round loads each ticker with a price history window and raises an
//! [`Alert`] when the current price is below the average monthly open while the
//! trailing P/E stays under the configured ceiling.

use crate::core::config::WatchdogConfig;
use crate::core::error::Result;
use crate::core::quote::CompositeQuote;
use crate::core::service::{FetchWindow, QuoteLoader, years_before_now};
use futures::future::join_all;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub ticker: String,
    pub name: String,
    pub currency: String,
    pub price: Decimal,
    pub average_open: Decimal,
    pub trailing_pe: Decimal,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, alert: &Alert);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchdogSettings {
    pub tickers: Vec<String>,
    pub interval: Duration,
    pub pe_ceiling: Decimal,
    pub lookback_years: u32,
}

impl From<&WatchdogConfig> for WatchdogSettings {
    fn from(config: &WatchdogConfig) -> Self {
        WatchdogSettings {
            tickers: config.tickers.clone(),
            interval: Duration::from_secs(config.interval_minutes.max(1) * 60),
            pe_ceiling: config.pe_ceiling,
            lookback_years: config.lookback_years.max(1),
        }
    }
}

/// Alert rule for one loaded quote. Quotes without P/E or price history never alert.
pub fn evaluate(quote: &CompositeQuote, pe_ceiling: Decimal) -> Option<Alert> {
    let snapshot = &quote.snapshot;
    let trailing_pe = snapshot.trailing_pe?;
    let average_open = quote.price_history.as_ref()?.average_open()?;

    (snapshot.price < average_open && trailing_pe < pe_ceiling).then(|| Alert {
        ticker: quote.ticker.clone(),
        name: snapshot.name.clone(),
        currency: snapshot.currency.clone(),
        price: snapshot.price,
        average_open,
        trailing_pe,
    })
}

pub struct Watchdog {
    loader: Arc<dyn QuoteLoader>,
    notifier: Arc<dyn Notifier>,
    settings: WatchdogSettings,
}

impl Watchdog {
    pub fn new(
        loader: Arc<dyn QuoteLoader>,
        notifier: Arc<dyn Notifier>,
        settings: WatchdogSettings,
    ) -> Self {
        Watchdog {
            loader,
            notifier,
            settings,
        }
    }

    #[instrument(name = "WatchTicker", skip(self), fields(ticker = %ticker))]
    async fn watch(&self, ticker: &str) -> Result<Option<Alert>> {
        // evaluate only reads the snapshot and the price history
        let years = self.settings.lookback_years;
        let window = FetchWindow::years_back(years).with_price_history(years_before_now(years));
        let quote = self.loader.load_quote(ticker, &window).await?;

        let average = quote
            .price_history
            .as_ref()
            .and_then(|h| h.average_open());
        info!(
            price = %quote.snapshot.price,
            average_open = ?average,
            trailing_pe = ?quote.snapshot.trailing_pe,
            "Checked price"
        );
        Ok(evaluate(&quote, self.settings.pe_ceiling))
    }

    /// Checks every ticker concurrently. A failed load is logged and does not affect the others.
    pub async fn run_once(&self) -> Vec<Alert> {
        let results = join_all(self.settings.tickers.iter().map(|t| self.watch(t))).await;

        let mut alerts = Vec::new();
        for (ticker, result) in self.settings.tickers.iter().zip(results) {
            match result {
                Ok(Some(alert)) => {
                    self.notifier.notify(&alert);
                    alerts.push(alert);
                }
                Ok(None) => debug!(ticker = %ticker, "No alert"),
                Err(e) => warn!(ticker = %ticker, error = %e, "Watch failed"),
            }
        }
        alerts
    }

    /// Runs a round immediately and then once per interval until `shutdown` resolves.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) {
        let mut interval = tokio::time::interval(self.settings.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Watchdog stopped");
                    break;
                }
                _ = interval.tick() => {
                    let alerts = self.run_once().await;
                    debug!(alerts = alerts.len(), "Watch round finished");
                }
            }
        }
    }
}
