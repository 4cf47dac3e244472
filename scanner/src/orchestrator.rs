use crate::{
    error::ScanError,
    indicators::{IndicatorSettings, IndicatorSnapshot, round_to},
    sentiment::Sentiment,
    tracker::ReferenceTracker,
    universe::{self, Selection, UniverseConfig},
};
use chrono::{DateTime, Utc};
use futures::{StreamExt, stream};
use scanner_data::{CandleRequest, Instrument, MarketDataSource, Resolution};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{cmp::Ordering, sync::Arc, time::Duration};
use tracing::{debug, error, info, warn};

/// Admission gates for the Bullish and Bearish buckets.
///
/// Every comparison is strict.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Thresholds {
    /// Minimum 24h percent change for Bullish.
    pub bull_price_change: f64,
    /// Minimum RSI for Bullish.
    pub bull_rsi_floor: f64,
    /// Magnitude of the 24h percent drop required for Bearish.
    pub bear_price_change: f64,
    /// Maximum RSI for Bearish.
    pub bear_rsi_ceiling: f64,
    /// Minimum ADX for Bullish.
    pub bull_adx_floor: f64,
    /// Minimum ADX for Bearish.
    pub bear_adx_floor: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            bull_price_change: 0.5,
            bull_rsi_floor: 60.0,
            bear_price_change: 0.5,
            bear_rsi_ceiling: 45.0,
            bull_adx_floor: 20.0,
            bear_adx_floor: 20.0,
        }
    }
}

impl Thresholds {
    /// Bucket an instrument qualifies for, if any.
    pub fn admit(&self, price_change: f64, rsi: f64, adx: f64) -> Option<Bucket> {
        if price_change > self.bull_price_change
            && rsi > self.bull_rsi_floor
            && adx > self.bull_adx_floor
        {
            Some(Bucket::Bullish)
        } else if price_change < -self.bear_price_change
            && rsi < self.bear_rsi_ceiling
            && adx > self.bear_adx_floor
        {
            Some(Bucket::Bearish)
        } else {
            None
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Deserialize, Serialize)]
pub enum Bucket {
    Bullish,
    Bearish,
}

/// Parameters of one full scan cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanSettings {
    pub resolution: Resolution,
    /// Number of bars requested per instrument.
    pub lookback: usize,
    pub indicators: IndicatorSettings,
    pub thresholds: Thresholds,
    /// Rows kept per bucket.
    pub max_rows: usize,
    /// Instruments scanned in parallel.
    pub concurrency: usize,
    /// Deadline for one instrument's fetch and compute.
    pub instrument_timeout: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            resolution: Resolution::Hour1,
            lookback: 60,
            indicators: IndicatorSettings::default(),
            thresholds: Thresholds::default(),
            max_rows: 10,
            concurrency: 4,
            instrument_timeout: Duration::from_secs(10),
        }
    }
}

/// One ranked instrument.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScanRow {
    pub symbol: SmolStr,
    pub last_price: f64,
    pub momentum_pct: f64,
    /// 2 decimals.
    pub price_change_pct: f64,
    /// 1 decimal.
    pub rsi: f64,
    /// 1 decimal.
    pub adx: f64,
    pub sentiment: Sentiment,
}

/// Why an instrument was left out of this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SkipRecord {
    pub symbol: SmolStr,
    pub error: ScanError,
}

/// Ranked result of one completed cycle.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ScanReport {
    pub synced_at: DateTime<Utc>,
    /// Momentum % descending.
    pub bullish: Vec<ScanRow>,
    /// Momentum % ascending.
    pub bearish: Vec<ScanRow>,
    pub skipped: Vec<SkipRecord>,
}

impl ScanReport {
    pub fn is_empty_bullish(&self) -> bool {
        self.bullish.is_empty()
    }

    pub fn is_empty_bearish(&self) -> bool {
        self.bearish.is_empty()
    }
}

/// Output of [`Scanner::run_cycle`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ScanOutcome {
    Published(ScanReport),
    /// Instruments could not be enumerated, nothing was ranked.
    NoData {
        synced_at: DateTime<Utc>,
        reason: String,
    },
}

impl ScanOutcome {
    pub fn synced_at(&self) -> DateTime<Utc> {
        match self {
            ScanOutcome::Published(report) => report.synced_at,
            ScanOutcome::NoData { synced_at, .. } => *synced_at,
        }
    }

    pub fn report(&self) -> Option<&ScanReport> {
        match self {
            ScanOutcome::Published(report) => Some(report),
            ScanOutcome::NoData { .. } => None,
        }
    }
}

/// Fully computed instrument, prior to admission.
#[derive(Debug, Clone)]
struct Candidate {
    instrument: Instrument,
    snapshot: IndicatorSnapshot,
    sentiment: Sentiment,
}

impl Candidate {
    fn bucket(&self, thresholds: &Thresholds) -> Option<Bucket> {
        thresholds.admit(
            self.instrument.price_change_pct,
            self.snapshot.rsi,
            self.snapshot.adx,
        )
    }

    fn into_row(self) -> ScanRow {
        ScanRow {
            symbol: self.instrument.symbol,
            last_price: self.snapshot.last_close,
            momentum_pct: self.snapshot.momentum_pct,
            price_change_pct: round_to(self.instrument.price_change_pct, 2),
            rsi: round_to(self.snapshot.rsi, 1),
            adx: round_to(self.snapshot.adx, 1),
            sentiment: self.sentiment,
        }
    }
}

/// Runs the full scan pipeline against one [`MarketDataSource`].
///
/// Reference metric deltas are measured against the previous cycle run with the same injected
/// [`ReferenceTracker`].
#[derive(Clone)]
pub struct Scanner {
    source: Arc<dyn MarketDataSource>,
    tracker: Arc<ReferenceTracker>,
    universe: UniverseConfig,
    settings: ScanSettings,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("source", &self.source.kind())
            .field("tracker", &self.tracker)
            .field("universe", &self.universe)
            .field("settings", &self.settings)
            .finish()
    }
}

impl Scanner {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        tracker: Arc<ReferenceTracker>,
        universe: UniverseConfig,
        settings: ScanSettings,
    ) -> Self {
        Self {
            source,
            tracker,
            universe,
            settings,
        }
    }

    /// Run one complete cycle: select the universe, scan each instrument, then rank.
    ///
    /// Per-instrument failures become [`SkipRecord`]s. Only failing to enumerate instruments
    /// produces [`ScanOutcome::NoData`].
    pub async fn run_cycle(&self) -> ScanOutcome {
        let synced_at = Utc::now();

        let tickers = match self.source.list_tickers().await {
            Ok(tickers) => tickers,
            Err(error) => {
                error!(
                    provider = %self.source.kind(),
                    %error,
                    "failed to list tickers, no data this cycle"
                );
                return ScanOutcome::NoData {
                    synced_at,
                    reason: error.to_string(),
                };
            }
        };

        let Selection {
            instruments,
            missing,
        } = universe::select(&self.universe, tickers);

        let mut skipped = missing
            .into_iter()
            .map(|symbol| SkipRecord {
                symbol,
                error: ScanError::UnknownInstrument,
            })
            .collect::<Vec<_>>();

        let scanned = instruments.len();

        // Ordered output keeps ties in universe order for the stable sort below
        let results = stream::iter(instruments)
            .map(|instrument| self.scan_instrument(instrument))
            .buffered(self.settings.concurrency.max(1))
            .collect::<Vec<_>>()
            .await;

        let mut bullish = Vec::new();
        let mut bearish = Vec::new();
        for (symbol, result) in results {
            match result {
                Ok(candidate) => match candidate.bucket(&self.settings.thresholds) {
                    Some(Bucket::Bullish) => bullish.push(candidate.into_row()),
                    Some(Bucket::Bearish) => bearish.push(candidate.into_row()),
                    None => {}
                },
                Err(error) => {
                    log_skip(&symbol, &error);
                    skipped.push(SkipRecord { symbol, error });
                }
            }
        }

        rank(&mut bullish, Bucket::Bullish, self.settings.max_rows);
        rank(&mut bearish, Bucket::Bearish, self.settings.max_rows);

        info!(
            provider = %self.source.kind(),
            scanned,
            bullish = bullish.len(),
            bearish = bearish.len(),
            skipped = skipped.len(),
            "scan cycle complete"
        );

        ScanOutcome::Published(ScanReport {
            synced_at,
            bullish,
            bearish,
            skipped,
        })
    }

    async fn scan_instrument(
        &self,
        instrument: Instrument,
    ) -> (SmolStr, Result<Candidate, ScanError>) {
        let symbol = instrument.symbol.clone();

        // Tracker is updated whether or not the remainder of the scan succeeds
        let reference_delta = self
            .tracker
            .observe(&instrument.symbol, instrument.reference_value);

        let timeout = self.settings.instrument_timeout;
        let result = match tokio::time::timeout(timeout, self.compute(&instrument)).await {
            Ok(Ok(snapshot)) => Ok(Candidate {
                sentiment: Sentiment::classify(instrument.price_change_pct, reference_delta),
                instrument,
                snapshot,
            }),
            Ok(Err(error)) => Err(error),
            Err(_) => Err(ScanError::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        (symbol, result)
    }

    async fn compute(&self, instrument: &Instrument) -> Result<IndicatorSnapshot, ScanError> {
        let request = CandleRequest::last(self.settings.resolution, self.settings.lookback);
        let series = self.source.fetch_candles(instrument, request).await?;
        IndicatorSnapshot::compute(&series, &self.settings.indicators)
    }
}

/// Provider-wide failures surfacing on one instrument log at error, they usually repeat for
/// every remaining instrument this cycle.
fn log_skip(symbol: &str, error: &ScanError) {
    if error.is_cycle_fatal() {
        error!(%symbol, %error, "skipping instrument, provider unavailable");
    } else if matches!(error, ScanError::Timeout { .. }) {
        warn!(%symbol, %error, "skipping instrument");
    } else {
        debug!(%symbol, %error, "skipping instrument");
    }
}

/// Stable sort by momentum, Bullish descending and Bearish ascending, then truncate.
pub fn rank(rows: &mut Vec<ScanRow>, bucket: Bucket, max_rows: usize) {
    rows.sort_by(|a, b| {
        let ordering = a
            .momentum_pct
            .partial_cmp(&b.momentum_pct)
            .unwrap_or(Ordering::Equal);
        match bucket {
            Bucket::Bullish => ordering.reverse(),
            Bucket::Bearish => ordering,
        }
    });
    rows.truncate(max_rows);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(symbol: &str, momentum_pct: f64) -> ScanRow {
        ScanRow {
            symbol: SmolStr::new(symbol),
            last_price: 1.0,
            momentum_pct,
            price_change_pct: 0.0,
            rsi: 50.0,
            adx: 25.0,
            sentiment: Sentiment::Neutral,
        }
    }

    fn symbols(rows: &[ScanRow]) -> Vec<&str> {
        rows.iter().map(|row| row.symbol.as_str()).collect()
    }

    #[test]
    fn test_admit() {
        struct TestCase {
            price_change: f64,
            rsi: f64,
            adx: f64,
            expected: Option<Bucket>,
        }

        let thresholds = Thresholds::default();

        let tests = vec![
            TestCase {
                // TC0: bullish
                price_change: 1.2,
                rsi: 70.0,
                adx: 25.0,
                expected: Some(Bucket::Bullish),
            },
            TestCase {
                // TC1: bearish
                price_change: -1.2,
                rsi: 30.0,
                adx: 25.0,
                expected: Some(Bucket::Bearish),
            },
            TestCase {
                // TC2: weak trend
                price_change: -0.2,
                rsi: 55.0,
                adx: 10.0,
                expected: None,
            },
            TestCase {
                // TC3: gates are strict
                price_change: 0.5,
                rsi: 70.0,
                adx: 25.0,
                expected: None,
            },
            TestCase {
                // TC4: ADX exactly at floor
                price_change: 1.2,
                rsi: 70.0,
                adx: 20.0,
                expected: None,
            },
            TestCase {
                // TC5: price up, RSI too low
                price_change: 2.0,
                rsi: 59.9,
                adx: 40.0,
                expected: None,
            },
            TestCase {
                // TC6: price down, RSI too high
                price_change: -2.0,
                rsi: 45.0,
                adx: 40.0,
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = thresholds.admit(test.price_change, test.rsi, test.adx);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_admit_per_direction_adx_floor() {
        struct TestCase {
            price_change: f64,
            rsi: f64,
            adx: f64,
            expected: Option<Bucket>,
        }

        let thresholds = Thresholds {
            bull_adx_floor: 15.0,
            bear_adx_floor: 30.0,
            ..Thresholds::default()
        };

        let tests = vec![
            TestCase {
                // TC0: clears the bull floor only
                price_change: 1.2,
                rsi: 70.0,
                adx: 25.0,
                expected: Some(Bucket::Bullish),
            },
            TestCase {
                // TC1: bearish setup rejected by the bear floor alone
                price_change: -1.2,
                rsi: 30.0,
                adx: 25.0,
                expected: None,
            },
            TestCase {
                // TC2: clears the bear floor
                price_change: -1.2,
                rsi: 30.0,
                adx: 30.5,
                expected: Some(Bucket::Bearish),
            },
            TestCase {
                // TC3: below both floors
                price_change: 1.2,
                rsi: 70.0,
                adx: 15.0,
                expected: None,
            },
            TestCase {
                // TC4: NaN ADX
                price_change: -1.2,
                rsi: 30.0,
                adx: f64::NAN,
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = thresholds.admit(test.price_change, test.rsi, test.adx);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_rank_bullish_stable_descending_and_truncated() {
        let mut rows = (0..12)
            .map(|i| row(&format!("S{i:02}"), f64::from(i % 4)))
            .collect::<Vec<_>>();

        rank(&mut rows, Bucket::Bullish, 10);

        assert_eq!(rows.len(), 10);
        assert_eq!(
            symbols(&rows),
            vec!["S03", "S07", "S11", "S02", "S06", "S10", "S01", "S05", "S09", "S00"]
        );
    }

    #[test]
    fn test_rank_bearish_ascending() {
        let mut rows = vec![row("A", -1.0), row("B", -3.5), row("C", 0.2), row("D", -3.5)];

        rank(&mut rows, Bucket::Bearish, 10);

        assert_eq!(symbols(&rows), vec!["B", "D", "A", "C"]);
    }

    #[test]
    fn test_scan_report_empty_buckets() {
        let report = ScanReport {
            synced_at: Utc::now(),
            bullish: vec![row("A", 1.0)],
            bearish: vec![],
            skipped: vec![],
        };

        assert!(!report.is_empty_bullish());
        assert!(report.is_empty_bearish());
    }
}
