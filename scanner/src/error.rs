use scanner_data::DataError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Instrument-scoped and cycle-scoped errors generated by the scan pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize, Error)]
pub enum ScanError {
    #[error("market data: {0}")]
    Data(#[from] DataError),

    #[error("instrument not listed by provider this cycle")]
    UnknownInstrument,

    #[error("insufficient history: got {got} candles, require {required}")]
    InsufficientHistory { got: usize, required: usize },

    #[error("candle window contains non-finite prices")]
    NonFiniteCandle,

    #[error("instrument scan exceeded {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl ScanError {
    /// Determine if an error is provider-wide rather than specific to one instrument.
    ///
    /// Raised while scanning a single instrument it is still only a skip, but it is logged at
    /// error level since the remaining instruments will likely fail the same way.
    pub fn is_cycle_fatal(&self) -> bool {
        match self {
            ScanError::Data(error) => error.is_cycle_fatal(),
            ScanError::UnknownInstrument
            | ScanError::InsufficientHistory { .. }
            | ScanError::NonFiniteCandle
            | ScanError::Timeout { .. } => false,
        }
    }
}

/// Invalid [`ScannerConfig`](crate::config::ScannerConfig) values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanner_data::ProviderKind;
    use smol_str::SmolStr;

    #[test]
    fn test_scan_error_is_cycle_fatal() {
        struct TestCase {
            input: ScanError,
            expected: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: provider enumeration failure
                input: ScanError::from(DataError::ProviderUnavailable {
                    provider: ProviderKind::DeltaExchange,
                    reason: "HTTP error: 500".to_string(),
                }),
                expected: true,
            },
            TestCase {
                // TC1: candle failure
                input: ScanError::from(DataError::HistoryUnavailable {
                    symbol: SmolStr::new("ETHUSD"),
                    reason: "request timed out".to_string(),
                }),
                expected: false,
            },
            TestCase {
                // TC2: short window
                input: ScanError::InsufficientHistory {
                    got: 12,
                    required: 30,
                },
                expected: false,
            },
            TestCase {
                // TC3: per-instrument deadline
                input: ScanError::Timeout { timeout_ms: 5000 },
                expected: false,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.is_cycle_fatal();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }
}
