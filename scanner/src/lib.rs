#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unused_must_use
)]

//! # Scanner
//! Momentum and open-interest scanner.
//!
//! Every full scan cycle:
//! 1. Selects a universe of instruments from the provider's ticker snapshot.
//! 2. Records each instrument's open interest (or volume) change since the previous cycle.
//! 3. Fetches one candle window per instrument and computes RSI, ADX, EMA and momentum.
//! 4. Labels positioning sentiment and admits instruments into Bullish or Bearish buckets.
//! 5. Ranks each bucket by momentum and publishes the result.
//!
//! A separate, faster loop refreshes a price-only market dashboard.

/// [`ScannerConfig`](config::ScannerConfig) loaded from defaults, JSON and environment.
pub mod config;

/// Price-only market dashboard refreshed on the fast tick.
pub mod dashboard;

/// All [`Error`](std::error::Error)s generated in the scanner.
pub mod error;

/// RSI, ADX, EMA and momentum calculations.
pub mod indicators;

/// Per-cycle scan pipeline, admission and ranking.
pub mod orchestrator;

/// Periodic refresh loops publishing on `watch` channels.
pub mod scheduler;

/// Price and open interest positioning labels.
pub mod sentiment;

/// Cross-cycle reference metric change tracking.
pub mod tracker;

/// Static and dynamic instrument universe selection.
pub mod universe;

pub use config::ScannerConfig;
pub use error::{ConfigError, ScanError};
pub use orchestrator::{ScanOutcome, ScanReport, ScanRow, Scanner};
pub use sentiment::Sentiment;
pub use tracker::ReferenceTracker;
