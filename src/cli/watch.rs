use super::ui;
use crate::core::QuoteLoader;
use crate::watchdog::{Alert, Notifier, Watchdog, WatchdogSettings};
use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// Prints alerts to the terminal.
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    fn message(alert: &Alert) -> String {
        format!(
            "{} ({}): price {} {} is below the average open {} (trailing P/E {})",
            alert.name,
            alert.ticker,
            alert.price.normalize(),
            alert.currency,
            alert.average_open.round_dp(2),
            alert.trailing_pe.round_dp(2),
        )
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, alert: &Alert) {
        warn!(ticker = %alert.ticker, "Price alert");
        println!(
            "{} {}",
            ui::style_text("Price alert:", ui::StyleType::Alert),
            Self::message(alert)
        );
    }
}

pub async fn run(loader: Arc<dyn QuoteLoader>, settings: WatchdogSettings, once: bool) -> Result<()> {
    if settings.tickers.is_empty() {
        anyhow::bail!("No tickers configured under watchdog.tickers");
    }

    let watchdog = Watchdog::new(loader, Arc::new(ConsoleNotifier), settings);
    if once {
        let alerts = watchdog.run_once().await;
        if alerts.is_empty() {
            println!("{}", ui::style_text("No alerts", ui::StyleType::Subtle));
        }
        return Ok(());
    }

    info!("Starting watchdog, press Ctrl+C to stop");
    watch_until(&watchdog, tokio::signal::ctrl_c()).await
}

/// Runs the watchdog until `shutdown` resolves. A shutdown signal that could not be
/// installed stops the watchdog and is returned as an error.
async fn watch_until(
    watchdog: &Watchdog,
    shutdown: impl Future<Output = std::io::Result<()>>,
) -> Result<()> {
    let mut signal_error = None;
    watchdog
        .run(async {
            if let Err(e) = shutdown.await {
                signal_error = Some(e);
            }
        })
        .await;

    match signal_error {
        Some(e) => Err(anyhow::Error::new(e).context("Failed to listen for Ctrl+C")),
        None => Ok(()),
    }
}
