//! Ratio engine: series model, decimal policy, calculators and the quote service

pub mod align;
pub mod config;
pub mod decimal;
pub mod error;
pub mod gateway;
pub mod log;
pub mod quote;
pub mod ratios;
pub mod series;
pub mod service;

// Re-export main types for cleaner imports
pub use error::{FinanceError, GatewayError};
pub use gateway::FinanceGateway;
pub use quote::CompositeQuote;
pub use ratios::Calculator;
pub use series::{Metric, Observation, PeriodKey, Series};
pub use service::{FetchWindow, LoaderSettings, QuoteLoader, QuoteService};
