use crate::indicators::round_to;
use chrono::{DateTime, Utc};
use derive_more::Display;
use scanner_data::{DataError, Instrument, MarketDataSource, ProviderKind};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Overall market direction, read from the 24h change of the lead dashboard symbol.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display, Deserialize, Serialize)]
pub enum MarketBias {
    #[display("BULLISH")]
    Bullish,
    #[display("BEARISH")]
    Bearish,
    #[display("SIDEWAYS")]
    Sideways,
}

impl MarketBias {
    pub fn from_change(price_change_pct: f64, threshold: f64) -> Self {
        if price_change_pct > threshold {
            MarketBias::Bullish
        } else if price_change_pct < -threshold {
            MarketBias::Bearish
        } else {
            MarketBias::Sideways
        }
    }
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Symbols shown on the dashboard, the first drives [`MarketBias`]. Empty means the
    /// provider's BTC and ETH perpetuals.
    pub symbols: Vec<SmolStr>,
    pub bias_threshold: f64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            bias_threshold: 0.5,
        }
    }
}

impl DashboardConfig {
    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.symbols = symbols.into_iter().map(|s| SmolStr::new(s.as_ref())).collect();
        self
    }

    pub fn with_bias_threshold(mut self, bias_threshold: f64) -> Self {
        self.bias_threshold = bias_threshold;
        self
    }
}

/// Default dashboard symbols for a provider.
pub fn default_symbols(kind: ProviderKind) -> Vec<SmolStr> {
    let symbols: [&str; 2] = match kind {
        ProviderKind::DeltaExchange => ["BTCUSD", "ETHUSD"],
        ProviderKind::Bybit | ProviderKind::Binance => ["BTCUSDT", "ETHUSDT"],
    };
    symbols.into_iter().map(SmolStr::new).collect()
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct Quote {
    pub symbol: SmolStr,
    pub last_price: f64,
    /// 2 decimals.
    pub price_change_pct: f64,
}

impl From<&Instrument> for Quote {
    fn from(instrument: &Instrument) -> Self {
        Self {
            symbol: instrument.symbol.clone(),
            last_price: instrument.last_price,
            price_change_pct: round_to(instrument.price_change_pct, 2),
        }
    }
}

/// Price-only view produced by the fast tick.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct DashboardSnapshot {
    pub synced_at: DateTime<Utc>,
    /// In configured order, unlisted symbols omitted.
    pub quotes: Vec<Quote>,
    /// `None` when the lead symbol is not listed.
    pub bias: Option<MarketBias>,
}

/// Lightweight price refresh over a handful of symbols.
#[derive(Clone)]
pub struct Dashboard {
    source: Arc<dyn MarketDataSource>,
    symbols: Vec<SmolStr>,
    bias_threshold: f64,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("source", &self.source.kind())
            .field("symbols", &self.symbols)
            .field("bias_threshold", &self.bias_threshold)
            .finish()
    }
}

impl Dashboard {
    pub fn new(source: Arc<dyn MarketDataSource>, config: DashboardConfig) -> Self {
        let symbols = if config.symbols.is_empty() {
            default_symbols(source.kind())
        } else {
            config.symbols
        };

        Self {
            source,
            symbols,
            bias_threshold: config.bias_threshold,
        }
    }

    pub async fn refresh(&self) -> Result<DashboardSnapshot, DataError> {
        let synced_at = Utc::now();
        let tickers = self.source.list_tickers().await?;

        let quotes = self
            .symbols
            .iter()
            .filter_map(|symbol| {
                let quote = tickers
                    .iter()
                    .find(|ticker| ticker.symbol.eq_ignore_ascii_case(symbol))
                    .map(Quote::from);
                if quote.is_none() {
                    warn!(%symbol, "dashboard symbol not listed by provider");
                }
                quote
            })
            .collect::<Vec<_>>();

        let bias = self
            .symbols
            .first()
            .and_then(|lead| {
                tickers
                    .iter()
                    .find(|ticker| ticker.symbol.eq_ignore_ascii_case(lead))
            })
            .map(|lead| MarketBias::from_change(lead.price_change_pct, self.bias_threshold));

        debug!(quotes = quotes.len(), ?bias, "dashboard refreshed");

        Ok(DashboardSnapshot {
            synced_at,
            quotes,
            bias,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_bias_from_change() {
        struct TestCase {
            input: f64,
            expected: MarketBias,
        }

        let tests = vec![
            TestCase {
                // TC0
                input: 0.51,
                expected: MarketBias::Bullish,
            },
            TestCase {
                // TC1: threshold is exclusive
                input: 0.5,
                expected: MarketBias::Sideways,
            },
            TestCase {
                // TC2
                input: -0.5,
                expected: MarketBias::Sideways,
            },
            TestCase {
                // TC3
                input: -2.0,
                expected: MarketBias::Bearish,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = MarketBias::from_change(test.input, 0.5);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_default_symbols() {
        assert_eq!(
            default_symbols(ProviderKind::DeltaExchange),
            vec![SmolStr::new("BTCUSD"), SmolStr::new("ETHUSD")]
        );
        assert_eq!(
            default_symbols(ProviderKind::Binance),
            vec![SmolStr::new("BTCUSDT"), SmolStr::new("ETHUSDT")]
        );
    }
}
