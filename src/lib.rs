pub mod cli;
pub mod core;
pub mod providers;
pub mod watchdog;

use crate::core::config::AppConfig;
use crate::core::service::years_before_now;
use crate::core::{FetchWindow, QuoteService};
use crate::providers::YahooFinanceGateway;
use crate::watchdog::WatchdogSettings;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Ratios { tickers: Vec<String> },
    Watch { once: bool },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fincalc starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let gateway = YahooFinanceGateway::new(&config.providers.yahoo)?;
    let service = Arc::new(QuoteService::new(
        Arc::new(gateway),
        config.loader.settings(),
    ));

    match command {
        AppCommand::Ratios { tickers } => {
            let years = config.loader.fundamentals_years;
            let window = FetchWindow::years_back(years).with_price_history(years_before_now(years));
            cli::ratios::run(service.as_ref(), &tickers, &window).await
        }
        AppCommand::Watch { once } => {
            cli::watch::run(service, WatchdogSettings::from(&config.watchdog), once).await
        }
    }
}
