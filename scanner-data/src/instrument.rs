use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Normalised ticker snapshot for one tradable instrument.
///
/// Built fresh from provider data every refresh tick. All percentage fields are in canonical
/// percentage units (`1.2` means +1.2%).
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
pub struct Instrument {
    /// Provider symbol, eg/ "BTCUSDT".
    pub symbol: SmolStr,
    /// Provider-specific numeric id, when the provider keys history by id.
    pub product_id: Option<u64>,
    pub last_price: f64,
    /// 24 hour price change in percent.
    pub price_change_pct: f64,
    /// Open interest, or traded volume for providers without open interest on the ticker.
    pub reference_value: f64,
    /// Traded notional over 24h, used to rank activity.
    pub turnover: Option<f64>,
    /// Traded base volume over 24h.
    pub volume: Option<f64>,
}

impl Instrument {
    /// Traded-value proxy: turnover, falling back to volume when turnover is absent or zero.
    pub fn activity(&self) -> f64 {
        match self.turnover {
            Some(turnover) if turnover > 0.0 => turnover,
            _ => self.volume.unwrap_or(0.0),
        }
    }
}

/// Canonicalise a provider-reported change field to percent.
///
/// Magnitudes above 1.0 are taken to already be percentages, anything else is treated as a
/// fraction. Moves of exactly +-1% reported as percentages, or moves beyond +-100% reported as
/// fractions, are misread by this rule.
pub fn normalise_pct(raw: f64) -> f64 {
    if raw.abs() > 1.0 { raw } else { raw * 100.0 }
}

/// Percent change from `open` to `close`, `None` when there is no usable baseline.
pub fn pct_change(open: f64, close: f64) -> Option<f64> {
    (open > 0.0 && open.is_finite() && close.is_finite()).then(|| (close - open) / open * 100.0)
}
