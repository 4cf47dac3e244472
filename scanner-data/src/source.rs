use crate::{
    candle::{CandleRequest, CandleSeries},
    error::DataError,
    exchange::{binance::Binance, bybit::Bybit, delta::DeltaExchange},
    instrument::Instrument,
    rest::{DEFAULT_REQUEST_TIMEOUT, RestError},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{str::FromStr, sync::Arc, time::Duration};

/// Capability surface every market data provider implements.
///
/// Provider quirks (symbol formats, percent-vs-fraction fields, reference metric naming,
/// native candle ordering) stay inside the implementation; callers only ever see
/// normalised [`Instrument`]s and ascending [`CandleSeries`].
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Snapshot every instrument the provider lists.
    ///
    /// Fails with [`DataError::ProviderUnavailable`].
    async fn list_tickers(&self) -> Result<Vec<Instrument>, DataError>;

    /// Historical candles for one instrument, ascending by open time.
    ///
    /// Fails with [`DataError::HistoryUnavailable`] or [`DataError::MalformedData`].
    async fn fetch_candles(
        &self,
        instrument: &Instrument,
        request: CandleRequest,
    ) -> Result<CandleSeries, DataError>;
}

#[async_trait]
impl<S> MarketDataSource for Arc<S>
where
    S: MarketDataSource + ?Sized,
{
    fn kind(&self) -> ProviderKind {
        (**self).kind()
    }

    async fn list_tickers(&self) -> Result<Vec<Instrument>, DataError> {
        (**self).list_tickers().await
    }

    async fn fetch_candles(
        &self,
        instrument: &Instrument,
        request: CandleRequest,
    ) -> Result<CandleSeries, DataError> {
        (**self).fetch_candles(instrument, request).await
    }
}

/// Supported market data providers.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Proprietary exchange REST API (Delta Exchange India).
    #[default]
    DeltaExchange,
    /// Bybit v5 unified market REST API.
    Bybit,
    /// Binance USD-M futures REST API.
    Binance,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::DeltaExchange => "delta_exchange",
            ProviderKind::Bybit => "bybit",
            ProviderKind::Binance => "binance",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::DeltaExchange => "https://api.india.delta.exchange",
            ProviderKind::Bybit => "https://api.bybit.com",
            ProviderKind::Binance => "https://fapi.binance.com",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "delta" | "delta_exchange" => Ok(ProviderKind::DeltaExchange),
            "bybit" => Ok(ProviderKind::Bybit),
            "binance" => Ok(ProviderKind::Binance),
            other => Err(format!("unknown market data provider: {other}")),
        }
    }
}

/// API credentials for providers that accept signed requests.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .finish()
    }
}

/// Connection settings for one provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub kind: ProviderKind,
    /// Override of [`ProviderKind::default_base_url`].
    pub base_url: Option<String>,
    pub request_timeout: Duration,
    pub credentials: Option<Credentials>,
}

impl SourceConfig {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            base_url: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            credentials: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url())
    }
}

/// Construct the adapter for the configured provider.
pub fn build_source(config: &SourceConfig) -> Result<Arc<dyn MarketDataSource>, RestError> {
    let source: Arc<dyn MarketDataSource> = match config.kind {
        ProviderKind::DeltaExchange => Arc::new(DeltaExchange::new(config)?),
        ProviderKind::Bybit => Arc::new(Bybit::new(config)?),
        ProviderKind::Binance => Arc::new(Binance::new(config)?),
    };
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_from_str() {
        assert_eq!("Delta".parse::<ProviderKind>(), Ok(ProviderKind::DeltaExchange));
        assert_eq!("bybit".parse::<ProviderKind>(), Ok(ProviderKind::Bybit));
        assert_eq!(" BINANCE ".parse::<ProviderKind>(), Ok(ProviderKind::Binance));
        assert!("kraken".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_source_config_base_url_override() {
        let config = SourceConfig::new(ProviderKind::Bybit);
        assert_eq!(config.base_url(), "https://api.bybit.com");

        let config = config.with_base_url("http://127.0.0.1:8080");
        assert_eq!(config.base_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let credentials = Credentials {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
        };
        assert!(!format!("{credentials:?}").contains("\"secret\""));
    }
}
