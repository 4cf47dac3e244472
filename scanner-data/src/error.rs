use crate::source::ProviderKind;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// All errors generated in `scanner-data`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum DataError {
    /// Ticker enumeration failed. Nothing from this provider is usable for the current cycle.
    #[error("provider {provider} unavailable: {reason}")]
    ProviderUnavailable {
        provider: ProviderKind,
        reason: String,
    },

    /// Candle history could not be fetched, or came back empty / too short.
    #[error("history unavailable for {symbol}: {reason}")]
    HistoryUnavailable { symbol: SmolStr, reason: String },

    /// A payload arrived but did not have the shape or field types we expect.
    #[error("malformed data from {provider}: {reason}")]
    MalformedData {
        provider: ProviderKind,
        reason: String,
    },
}

impl DataError {
    /// Determine if an error invalidates the whole scan cycle rather than a single instrument.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_cycle_fatal(&self) -> bool {
        match self {
            DataError::ProviderUnavailable { .. } => true,
            _ => false,
        }
    }

    pub(crate) fn history(symbol: &str, reason: impl Into<String>) -> Self {
        Self::HistoryUnavailable {
            symbol: SmolStr::new(symbol),
            reason: reason.into(),
        }
    }
}
