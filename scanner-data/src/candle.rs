use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Candle resolutions supported by every [`MarketDataSource`](crate::source::MarketDataSource).
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Deserialize, Serialize,
)]
pub enum Resolution {
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[default]
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Minute5 => "5m",
            Resolution::Minute15 => "15m",
            Resolution::Hour1 => "1h",
            Resolution::Hour4 => "4h",
            Resolution::Day1 => "1d",
        }
    }

    /// Wall-clock length of one bar.
    pub fn duration(&self) -> Duration {
        match self {
            Resolution::Minute5 => Duration::minutes(5),
            Resolution::Minute15 => Duration::minutes(15),
            Resolution::Hour1 => Duration::hours(1),
            Resolution::Hour4 => Duration::hours(4),
            Resolution::Day1 => Duration::days(1),
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "5m" => Ok(Resolution::Minute5),
            "15m" => Ok(Resolution::Minute15),
            "1h" | "60m" => Ok(Resolution::Hour1),
            "4h" => Ok(Resolution::Hour4),
            "1d" | "d" => Ok(Resolution::Day1),
            other => Err(format!("unsupported candle resolution: {other}")),
        }
    }
}

/// Smallest per-request candle cap across the supported providers (Bybit's kline limit).
///
/// [`CandleWindow::to_range`] never spans more bars than this.
pub const MAX_CANDLES_PER_REQUEST: usize = 1000;

/// How much history to request.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub enum CandleWindow {
    /// The most recent `n` bars.
    Count(usize),
    /// Bars whose open time falls within `[start, end]`.
    Range {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl CandleWindow {
    /// Resolve into an explicit time range ending at `now`, for providers that only accept ranges.
    ///
    /// `Count` is capped at [`MAX_CANDLES_PER_REQUEST`] bars.
    pub fn to_range(&self, resolution: Resolution, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        match *self {
            CandleWindow::Count(count) => {
                let start = i32::try_from(count.min(MAX_CANDLES_PER_REQUEST))
                    .ok()
                    .and_then(|bars| resolution.duration().checked_mul(bars))
                    .and_then(|span| now.checked_sub_signed(span))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);
                (start, now)
            }
            CandleWindow::Range { start, end } => (start, end),
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Deserialize, Serialize)]
pub struct CandleRequest {
    pub resolution: Resolution,
    pub window: CandleWindow,
}

impl CandleRequest {
    pub fn last(resolution: Resolution, count: usize) -> Self {
        Self {
            resolution,
            window: CandleWindow::Count(count),
        }
    }
}

/// Normalised OHLC bar.
#[derive(Clone, Copy, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct Candle {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

/// Time-ascending sequence of [`Candle`]s for one instrument and one resolution.
///
/// Construction sorts by open time and drops duplicate timestamps (keeping the last one seen),
/// so every provider yields the same canonical ordering regardless of its native sort order.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
pub struct CandleSeries(Vec<Candle>);

impl CandleSeries {
    pub fn new(mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|candle| candle.time);
        candles.dedup_by(|next, prev| {
            if next.time == prev.time {
                *prev = *next;
                true
            } else {
                false
            }
        });
        Self(candles)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.0
    }

    pub fn closes(&self) -> Vec<f64> {
        self.0.iter().map(|candle| candle.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.0.iter().map(|candle| candle.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.0.iter().map(|candle| candle.low).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.0.last().map(|candle| candle.close)
    }
}

impl From<Vec<Candle>> for CandleSeries {
    fn from(candles: Vec<Candle>) -> Self {
        Self::new(candles)
    }
}
