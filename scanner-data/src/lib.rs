#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unused_must_use
)]

//! # Scanner-Data
//! Normalised REST market data for the momentum scanner.
//!
//! Every provider is exposed through the [`MarketDataSource`](source::MarketDataSource) trait,
//! which offers exactly two operations:
//! * `list_tickers`: snapshot of every listed instrument (price, 24h change, open interest or
//!   volume, turnover).
//! * `fetch_candles`: historical OHLC candles for one instrument, always ascending by time.
//!
//! Provider specific symbol formats, percent-vs-fraction fields and payload shapes are handled
//! inside each adapter in [`exchange`].

/// Historical candle models: [`Candle`](candle::Candle), [`CandleSeries`](candle::CandleSeries)
/// and the request parameters used to fetch them.
pub mod candle;

/// Deserialisation helpers shared by the provider adapters.
pub mod de;

/// All [`Error`](std::error::Error)s generated in scanner-data.
pub mod error;

/// Provider adapters: Delta Exchange, Bybit and Binance.
pub mod exchange;

/// Normalised ticker snapshot model and percentage canonicalisation.
pub mod instrument;

/// Timeout-bounded REST client shared by every adapter.
pub mod rest;

/// The [`MarketDataSource`](source::MarketDataSource) trait and provider selection.
pub mod source;

pub use candle::{
    Candle, CandleRequest, CandleSeries, CandleWindow, MAX_CANDLES_PER_REQUEST, Resolution,
};
pub use error::DataError;
pub use instrument::Instrument;
pub use source::{Credentials, MarketDataSource, ProviderKind, SourceConfig, build_source};
