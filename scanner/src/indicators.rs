//! RSI, ADX, EMA and momentum calculation functions
//!
//! Pure functions over one candle window. Each returns `None` when the window is too short to
//! produce a value, callers never compute on partial windows.

use crate::error::ScanError;
use scanner_data::CandleSeries;
use serde::{Deserialize, Serialize};

/// Lookback lengths and minimum window size for the indicator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct IndicatorSettings {
    pub rsi_length: usize,
    pub adx_length: usize,
    pub ema_length: usize,
    /// Instruments with fewer candles than this are skipped for the cycle.
    pub min_candles: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            rsi_length: 14,
            adx_length: 14,
            ema_length: 5,
            min_candles: 30,
        }
    }
}

impl IndicatorSettings {
    /// Smallest window able to produce every indicator, never below `min_candles`.
    pub fn required_candles(&self) -> usize {
        self.min_candles
            .max(self.rsi_length + 1)
            .max(self.adx_length * 2)
            .max(self.ema_length)
    }
}

/// Indicator values computed from the same candle window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorSnapshot {
    pub last_close: f64,
    pub rsi: f64,
    pub adx: f64,
    pub ema: f64,
    /// Distance of the last close from the EMA, in percent, 2 decimals.
    pub momentum_pct: f64,
}

impl IndicatorSnapshot {
    pub fn compute(series: &CandleSeries, settings: &IndicatorSettings) -> Result<Self, ScanError> {
        let required = settings.required_candles();
        if series.len() < required {
            return Err(ScanError::InsufficientHistory {
                got: series.len(),
                required,
            });
        }

        let all_finite = series.candles().iter().all(|candle| {
            candle.high.is_finite() && candle.low.is_finite() && candle.close.is_finite()
        });
        if !all_finite {
            return Err(ScanError::NonFiniteCandle);
        }

        let closes = series.closes();
        let highs = series.highs();
        let lows = series.lows();

        let insufficient = || ScanError::InsufficientHistory {
            got: series.len(),
            required,
        };

        let last_close = series.last_close().ok_or_else(insufficient)?;
        let rsi = calc_rsi(&closes, settings.rsi_length).ok_or_else(insufficient)?;
        let adx = calc_adx(&highs, &lows, &closes, settings.adx_length).ok_or_else(insufficient)?;
        let ema = calc_ema(&closes, settings.ema_length).ok_or_else(insufficient)?;

        Ok(Self {
            last_close,
            rsi,
            adx,
            ema,
            momentum_pct: calc_momentum_pct(last_close, ema),
        })
    }
}

/// Wilder RSI over closing prices, last value.
///
/// Seeds average gain/loss with the simple mean of the first `length` changes, then applies
/// Wilder smoothing. Requires `length + 1` closes.
pub fn calc_rsi(closes: &[f64], length: usize) -> Option<f64> {
    if length == 0 || closes.len() < length + 1 {
        return None;
    }

    let n = length as f64;
    let mut changes = closes.windows(2).map(|w| w[1] - w[0]);

    let (gain_sum, loss_sum) = changes
        .by_ref()
        .take(length)
        .fold((0.0, 0.0), |(gain, loss), change| {
            (gain + change.max(0.0), loss + (-change).max(0.0))
        });
    let mut avg_gain = gain_sum / n;
    let mut avg_loss = loss_sum / n;

    for change in changes {
        avg_gain = (avg_gain * (n - 1.0) + change.max(0.0)) / n;
        avg_loss = (avg_loss * (n - 1.0) + (-change).max(0.0)) / n;
    }

    Some(rsi_from_averages(avg_gain, avg_loss))
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        // No losses: pure uptrend, or a completely flat window
        if avg_gain == 0.0 { 50.0 } else { 100.0 }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// Wilder ADX over high/low/close, last value.
///
/// 1. +DM, -DM and true range from consecutive bars
/// 2. Wilder-smooth each over `length` bars (seeded with their sum)
/// 3. DX = |+DI - -DI| / (+DI + -DI) * 100
/// 4. ADX = mean of the first `length` DX values, then Wilder-smoothed
///
/// Requires `2 * length` bars.
pub fn calc_adx(highs: &[f64], lows: &[f64], closes: &[f64], length: usize) -> Option<f64> {
    let bars = closes.len();
    if length == 0 || highs.len() != bars || lows.len() != bars || bars < length * 2 {
        return None;
    }

    let n = length as f64;
    let moves: Vec<(f64, f64, f64)> = (1..bars)
        .map(|i| {
            let up_move = highs[i] - highs[i - 1];
            let down_move = lows[i - 1] - lows[i];
            let plus_dm = if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 };
            let minus_dm = if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 };
            let tr = (highs[i] - lows[i])
                .max((highs[i] - closes[i - 1]).abs())
                .max((lows[i] - closes[i - 1]).abs());
            (plus_dm, minus_dm, tr)
        })
        .collect();

    let (mut plus_dm, mut minus_dm, mut tr) = moves[..length]
        .iter()
        .fold((0.0, 0.0, 0.0), |(p, m, t), (dp, dm, dt)| (p + dp, m + dm, t + dt));

    let mut dx_values = Vec::with_capacity(moves.len() - length + 1);
    dx_values.push(calc_dx(plus_dm, minus_dm, tr));

    for &(dp, dm, dt) in &moves[length..] {
        plus_dm = plus_dm - plus_dm / n + dp;
        minus_dm = minus_dm - minus_dm / n + dm;
        tr = tr - tr / n + dt;
        dx_values.push(calc_dx(plus_dm, minus_dm, tr));
    }

    if dx_values.len() < length {
        return None;
    }

    let seed = dx_values[..length].iter().sum::<f64>() / n;
    Some(
        dx_values[length..]
            .iter()
            .fold(seed, |adx, dx| (adx * (n - 1.0) + dx) / n),
    )
}

fn calc_dx(plus_dm: f64, minus_dm: f64, tr: f64) -> f64 {
    if tr <= 0.0 {
        return 0.0;
    }
    let di_pos = plus_dm / tr * 100.0;
    let di_neg = minus_dm / tr * 100.0;
    let di_sum = di_pos + di_neg;
    if di_sum > 0.0 {
        (di_pos - di_neg).abs() / di_sum * 100.0
    } else {
        0.0
    }
}

/// Exponential moving average, last value.
///
/// alpha = 2 / (length + 1), seeded with the simple mean of the first `length` values.
pub fn calc_ema(values: &[f64], length: usize) -> Option<f64> {
    if length == 0 || values.len() < length {
        return None;
    }

    let alpha = 2.0 / (length as f64 + 1.0);
    let seed = values[..length].iter().sum::<f64>() / length as f64;
    Some(
        values[length..]
            .iter()
            .fold(seed, |ema, value| alpha * value + (1.0 - alpha) * ema),
    )
}

/// (last_close - ema) / ema * 100, rounded to 2 decimals. Zero when the EMA is not a usable base.
pub fn calc_momentum_pct(last_close: f64, ema: f64) -> f64 {
    if ema == 0.0 || !ema.is_finite() || !last_close.is_finite() {
        return 0.0;
    }
    round_to((last_close - ema) / ema * 100.0, 2)
}

/// Round `value` to `decimals` decimal places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
