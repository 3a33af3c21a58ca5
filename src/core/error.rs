//! Error types shared by the ratio engine and the quote loader.

use thiserror::Error;

/// Failure reported by a [`FinanceGateway`](crate::core::gateway::FinanceGateway) call.
///
/// `status` is the HTTP status when the provider answered, `None` for transport
/// failures and timeouts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", describe_gateway(.status, .message))]
pub struct GatewayError {
    pub status: Option<u16>,
    pub message: String,
}

impl GatewayError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }
}

fn describe_gateway(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("HTTP {status}: {message}"),
        None => message.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FinanceError {
    #[error("could not load {ticker}: {source}")]
    Gateway {
        ticker: String,
        #[source]
        source: GatewayError,
    },

    #[error("malformed data for {ticker}: {reason}")]
    MalformedData { ticker: String, reason: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("decimal overflow")]
    Overflow,

    #[error("no aligned value for {metric}")]
    MissingAlignment { metric: String },
}

impl FinanceError {
    pub fn gateway(ticker: &str, source: GatewayError) -> Self {
        FinanceError::Gateway {
            ticker: ticker.to_string(),
            source,
        }
    }

    pub fn malformed(ticker: &str, reason: impl Into<String>) -> Self {
        FinanceError::MalformedData {
            ticker: ticker.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = FinanceError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_display() {
        let with_status = GatewayError::new(Some(404), "Not Found");
        assert_eq!(with_status.to_string(), "HTTP 404: Not Found");

        let transport = GatewayError::transport("connection reset");
        assert_eq!(transport.to_string(), "connection reset");
    }

    #[test]
    fn test_gateway_error_is_source_of_finance_error() {
        use std::error::Error as _;

        let err = FinanceError::gateway("AAPL", GatewayError::new(Some(429), "Too Many Requests"));
        let source = err.source().expect("gateway error should be the source");
        assert_eq!(source.to_string(), "HTTP 429: Too Many Requests");
        assert!(source.downcast_ref::<GatewayError>().is_some());
    }

    #[test]
    fn test_finance_error_carries_ticker() {
        let err = FinanceError::gateway("AAPL", GatewayError::new(Some(500), "boom"));
        assert_eq!(err.to_string(), "could not load AAPL: HTTP 500: boom");

        let err = FinanceError::malformed("MSFT", "missing currency");
        assert_eq!(err.to_string(), "malformed data for MSFT: missing currency");
    }
}
