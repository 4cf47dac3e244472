//! Provider adapters implementing [`MarketDataSource`](crate::source::MarketDataSource).

use crate::{error::DataError, rest::RestError, source::ProviderKind};

/// Binance USD-M futures adapter.
pub mod binance;

/// Bybit v5 linear perpetuals adapter.
pub mod bybit;

/// Delta Exchange India adapter.
pub mod delta;

/// Map a failed ticker enumeration into the cycle-fatal error.
pub(crate) fn ticker_error(provider: ProviderKind, error: RestError) -> DataError {
    DataError::ProviderUnavailable {
        provider,
        reason: error.to_string(),
    }
}

/// Map a failed candle fetch into an instrument-scoped error.
pub(crate) fn history_error(provider: ProviderKind, symbol: &str, error: RestError) -> DataError {
    match error {
        RestError::Parse(reason) => DataError::MalformedData {
            provider,
            reason: format!("{symbol} candles: {reason}"),
        },
        other => DataError::history(symbol, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_history_error_mapping() {
        struct TestCase {
            input: RestError,
            expected_malformed: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: timeout is missing history
                input: RestError::Timeout,
                expected_malformed: false,
            },
            TestCase {
                // TC1: non-2xx is missing history
                input: RestError::Status(StatusCode::INTERNAL_SERVER_ERROR),
                expected_malformed: false,
            },
            TestCase {
                // TC2: parse failure is malformed data
                input: RestError::Parse("expected f64".to_string()),
                expected_malformed: true,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = history_error(ProviderKind::Bybit, "BTCUSDT", test.input);
            assert_eq!(
                matches!(actual, DataError::MalformedData { .. }),
                test.expected_malformed,
                "TC{} failed",
                index
            );
        }
    }
}
