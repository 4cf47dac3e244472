use crate::{
    candle::{Candle, CandleRequest, CandleSeries, CandleWindow, Resolution},
    de::{datetime_utc_from_epoch, de_opt_flexible_f64},
    error::DataError,
    exchange::{history_error, ticker_error},
    instrument::{Instrument, normalise_pct, pct_change},
    rest::{RestClient, RestError},
    source::{MarketDataSource, ProviderKind, SourceConfig},
};
use async_trait::async_trait;
use serde::Deserialize;
use smol_str::SmolStr;
use tracing::debug;

const TICKERS_PATH: &str = "/fapi/v1/ticker/24hr";
const KLINES_PATH: &str = "/fapi/v1/klines";

/// Binance caps a single klines request at 1500 bars.
const MAX_KLINE_LIMIT: usize = 1500;

/// [`Binance`] USD-M futures REST adapter.
///
/// The 24h ticker carries no open interest, so traded volume is used as the reference metric.
/// `quoteVolume` is the turnover proxy.
#[derive(Debug)]
pub struct Binance {
    rest: RestClient,
}

impl Binance {
    pub fn new(config: &SourceConfig) -> Result<Self, RestError> {
        Ok(Self {
            rest: RestClient::new(config.base_url(), config.request_timeout)?,
        })
    }
}

fn interval(resolution: Resolution) -> &'static str {
    // Binance interval strings happen to match the canonical names
    resolution.as_str()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTicker {
    symbol: String,
    #[serde(default, deserialize_with = "de_opt_flexible_f64")]
    last_price: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_flexible_f64")]
    open_price: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_flexible_f64")]
    price_change_percent: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_flexible_f64")]
    volume: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_flexible_f64")]
    quote_volume: Option<f64>,
}

impl BinanceTicker {
    fn into_instrument(self) -> Option<Instrument> {
        let Some(last_price) = self.last_price else {
            debug!(symbol = %self.symbol, "Binance ticker without lastPrice ignored");
            return None;
        };

        let price_change_pct = self
            .open_price
            .and_then(|open| pct_change(open, last_price))
            .or_else(|| self.price_change_percent.map(normalise_pct))
            .unwrap_or(0.0);

        Some(Instrument {
            symbol: SmolStr::new(&self.symbol),
            product_id: None,
            last_price,
            price_change_pct,
            reference_value: self.volume.unwrap_or(0.0),
            turnover: self.quote_volume,
            volume: self.volume,
        })
    }
}

/// Binance kline response format
#[derive(Debug, Deserialize)]
struct BinanceKline(
    i64,    // 0: Open time
    String, // 1: Open
    String, // 2: High
    String, // 3: Low
    String, // 4: Close
    String, // 5: Volume
    i64,    // 6: Close time
    String, // 7: Quote asset volume
    i64,    // 8: Number of trades
    String, // 9: Taker buy base asset volume
    String, // 10: Taker buy quote asset volume
    String, // 11: Ignore
);

fn candles_from_binance(symbol: &str, klines: Vec<BinanceKline>) -> Result<CandleSeries, DataError> {
    let malformed = |reason: String| DataError::MalformedData {
        provider: ProviderKind::Binance,
        reason: format!("{symbol} kline: {reason}"),
    };
    let number = |raw: &str, field: &str| {
        raw.parse::<f64>()
            .map_err(|e| malformed(format!("{field}: {e}")))
    };

    let candles = klines
        .into_iter()
        .map(|k| {
            let time = datetime_utc_from_epoch(k.0)
                .ok_or_else(|| malformed(format!("invalid open time {}", k.0)))?;
            Ok(Candle {
                time,
                open: number(&k.1, "open")?,
                high: number(&k.2, "high")?,
                low: number(&k.3, "low")?,
                close: number(&k.4, "close")?,
                volume: k.5.parse().ok(),
            })
        })
        .collect::<Result<Vec<_>, DataError>>()?;

    if candles.is_empty() {
        return Err(DataError::history(symbol, "no candles returned"));
    }

    Ok(CandleSeries::new(candles))
}

#[async_trait]
impl MarketDataSource for Binance {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Binance
    }

    async fn list_tickers(&self) -> Result<Vec<Instrument>, DataError> {
        let tickers: Vec<BinanceTicker> = self
            .rest
            .get_json(TICKERS_PATH, &[], None)
            .await
            .map_err(|e| ticker_error(self.kind(), e))?;

        Ok(tickers
            .into_iter()
            .filter_map(BinanceTicker::into_instrument)
            .collect())
    }

    async fn fetch_candles(
        &self,
        instrument: &Instrument,
        request: CandleRequest,
    ) -> Result<CandleSeries, DataError> {
        let mut query = vec![
            ("symbol", instrument.symbol.to_string()),
            ("interval", interval(request.resolution).to_string()),
        ];
        match request.window {
            CandleWindow::Count(count) => {
                query.push(("limit", count.clamp(1, MAX_KLINE_LIMIT).to_string()));
            }
            CandleWindow::Range { start, end } => {
                query.push(("startTime", start.timestamp_millis().to_string()));
                query.push(("endTime", end.timestamp_millis().to_string()));
                query.push(("limit", MAX_KLINE_LIMIT.to_string()));
            }
        }

        let klines: Vec<BinanceKline> = self
            .rest
            .get_json(KLINES_PATH, &query, None)
            .await
            .map_err(|e| history_error(self.kind(), &instrument.symbol, e))?;

        candles_from_binance(&instrument.symbol, klines)
    }
}
