use crate::core::service::LoaderSettings;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};
use tracing::debug;

fn default_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_summary_base_url() -> String {
    "https://query2.finance.yahoo.com".to_string()
}

fn default_requests_per_second() -> u32 {
    4
}

fn default_retries() -> usize {
    2
}

fn default_quote_modules() -> Vec<String> {
    [
        "price",
        "summaryDetail",
        "balanceSheetHistory",
        "incomeStatementHistory",
        "cashflowStatementHistory",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_timeseries_types() -> Vec<String> {
    [
        "annualTotalCapitalization",
        "annualCapitalExpenditure",
        "annualShareIssued",
        "annualLongTermDebt",
        "annualStockholdersEquity",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Host serving the quote summary endpoint.
    #[serde(default = "default_summary_base_url")]
    pub summary_base_url: String,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default = "default_quote_modules")]
    pub quote_modules: Vec<String>,
    #[serde(default = "default_timeseries_types")]
    pub timeseries_types: Vec<String>,
}

impl Default for YahooProviderConfig {
    fn default() -> Self {
        YahooProviderConfig {
            base_url: default_base_url(),
            summary_base_url: default_summary_base_url(),
            requests_per_second: default_requests_per_second(),
            retries: default_retries(),
            quote_modules: default_quote_modules(),
            timeseries_types: default_timeseries_types(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub yahoo: YahooProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoaderConfig {
    pub max_concurrent_requests: usize,
    pub fetch_timeout_secs: u64,
    pub load_timeout_secs: u64,
    pub fundamentals_years: u32,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        LoaderConfig {
            max_concurrent_requests: 4,
            fetch_timeout_secs: 10,
            load_timeout_secs: 30,
            fundamentals_years: 10,
        }
    }
}

impl LoaderConfig {
    pub fn settings(&self) -> LoaderSettings {
        LoaderSettings {
            max_concurrent_requests: self.max_concurrent_requests,
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            load_timeout: Duration::from_secs(self.load_timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct WatchdogConfig {
    pub tickers: Vec<String>,
    pub interval_minutes: u64,
    /// Alerts are only raised while the trailing P/E is below this value.
    pub pe_ceiling: Decimal,
    /// How far back the open prices for the moving average reach.
    pub lookback_years: u32,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        WatchdogConfig {
            tickers: Vec::new(),
            interval_minutes: 60,
            pe_ceiling: Decimal::from(25),
            lookback_years: 1,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "fincalc", "fincalc")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}
