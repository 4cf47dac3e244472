use crate::{
    candle::{Candle, CandleRequest, CandleSeries, CandleWindow, Resolution},
    de::{datetime_utc_from_epoch, de_opt_flexible_f64},
    error::DataError,
    exchange::{history_error, ticker_error},
    instrument::{Instrument, normalise_pct},
    rest::{RestClient, RestError},
    source::{MarketDataSource, ProviderKind, SourceConfig},
};
use async_trait::async_trait;
use serde::Deserialize;
use smol_str::SmolStr;
use tracing::debug;

const TICKERS_PATH: &str = "/v5/market/tickers";
const KLINE_PATH: &str = "/v5/market/kline";
const CATEGORY: &str = "linear";

/// Bybit caps a single kline request at 1000 bars.
const MAX_KLINE_LIMIT: usize = 1000;

/// [`Bybit`] v5 linear perpetuals REST adapter.
///
/// `price24hPcnt` is reported as a fraction and `openInterest` in contracts. Klines arrive
/// newest first as arrays of strings.
#[derive(Debug)]
pub struct Bybit {
    rest: RestClient,
}

impl Bybit {
    pub fn new(config: &SourceConfig) -> Result<Self, RestError> {
        Ok(Self {
            rest: RestClient::new(config.base_url(), config.request_timeout)?,
        })
    }
}

/// Bybit interval parameter for a [`Resolution`].
fn interval(resolution: Resolution) -> &'static str {
    match resolution {
        Resolution::Minute5 => "5",
        Resolution::Minute15 => "15",
        Resolution::Hour1 => "60",
        Resolution::Hour4 => "240",
        Resolution::Day1 => "D",
    }
}

#[derive(Debug, Deserialize)]
struct BybitResponse<T> {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg", default)]
    ret_msg: String,
    result: Option<T>,
}

impl<T> BybitResponse<T> {
    fn into_result(self) -> Result<T, RestError> {
        match (self.ret_code, self.result) {
            (0, Some(result)) => Ok(result),
            (code, _) => Err(RestError::Request(format!(
                "Bybit retCode {code}: {}",
                self.ret_msg
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BybitList<T> {
    list: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BybitTicker {
    symbol: String,
    #[serde(default, deserialize_with = "de_opt_flexible_f64")]
    last_price: Option<f64>,
    #[serde(default, rename = "price24hPcnt", deserialize_with = "de_opt_flexible_f64")]
    price_24h_pcnt: Option<f64>,
    #[serde(default, rename = "turnover24h", deserialize_with = "de_opt_flexible_f64")]
    turnover_24h: Option<f64>,
    #[serde(default, rename = "volume24h", deserialize_with = "de_opt_flexible_f64")]
    volume_24h: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_flexible_f64")]
    open_interest: Option<f64>,
}

impl BybitTicker {
    fn into_instrument(self) -> Option<Instrument> {
        let Some(last_price) = self.last_price else {
            debug!(symbol = %self.symbol, "Bybit ticker without lastPrice ignored");
            return None;
        };

        Some(Instrument {
            symbol: SmolStr::new(&self.symbol),
            product_id: None,
            last_price,
            price_change_pct: self.price_24h_pcnt.map(normalise_pct).unwrap_or(0.0),
            reference_value: self.open_interest.unwrap_or(0.0),
            turnover: self.turnover_24h,
            volume: self.volume_24h,
        })
    }
}

/// Parse Bybit kline rows: `[startMs, open, high, low, close, volume, turnover]`.
fn candles_from_bybit(symbol: &str, rows: Vec<Vec<String>>) -> Result<CandleSeries, DataError> {
    let malformed = |reason: String| DataError::MalformedData {
        provider: ProviderKind::Bybit,
        reason: format!("{symbol} kline: {reason}"),
    };

    let candles = rows
        .into_iter()
        .map(|row| {
            if row.len() < 5 {
                return Err(malformed(format!("expected >= 5 fields, got {}", row.len())));
            }
            let number = |index: usize| {
                row[index]
                    .parse::<f64>()
                    .map_err(|e| malformed(format!("field {index}: {e}")))
            };
            let start_ms = row[0]
                .parse::<i64>()
                .map_err(|e| malformed(format!("start time: {e}")))?;
            let time = datetime_utc_from_epoch(start_ms)
                .ok_or_else(|| malformed(format!("invalid start time {start_ms}")))?;

            Ok(Candle {
                time,
                open: number(1)?,
                high: number(2)?,
                low: number(3)?,
                close: number(4)?,
                volume: row.get(5).and_then(|volume| volume.parse().ok()),
            })
        })
        .collect::<Result<Vec<_>, DataError>>()?;

    if candles.is_empty() {
        return Err(DataError::history(symbol, "no candles returned"));
    }

    Ok(CandleSeries::new(candles))
}

#[async_trait]
impl MarketDataSource for Bybit {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Bybit
    }

    async fn list_tickers(&self) -> Result<Vec<Instrument>, DataError> {
        let query = [("category", CATEGORY.to_string())];
        let response: BybitResponse<BybitList<BybitTicker>> = self
            .rest
            .get_json(TICKERS_PATH, &query, None)
            .await
            .map_err(|e| ticker_error(self.kind(), e))?;

        let tickers = response
            .into_result()
            .map_err(|e| ticker_error(self.kind(), e))?;

        Ok(tickers
            .list
            .into_iter()
            .filter_map(BybitTicker::into_instrument)
            .collect())
    }

    async fn fetch_candles(
        &self,
        instrument: &Instrument,
        request: CandleRequest,
    ) -> Result<CandleSeries, DataError> {
        let mut query = vec![
            ("category", CATEGORY.to_string()),
            ("symbol", instrument.symbol.to_string()),
            ("interval", interval(request.resolution).to_string()),
        ];
        match request.window {
            CandleWindow::Count(count) => {
                query.push(("limit", count.clamp(1, MAX_KLINE_LIMIT).to_string()));
            }
            CandleWindow::Range { start, end } => {
                query.push(("start", start.timestamp_millis().to_string()));
                query.push(("end", end.timestamp_millis().to_string()));
                query.push(("limit", MAX_KLINE_LIMIT.to_string()));
            }
        }

        let response: BybitResponse<BybitList<Vec<String>>> = self
            .rest
            .get_json(KLINE_PATH, &query, None)
            .await
            .map_err(|e| history_error(self.kind(), &instrument.symbol, e))?;

        let rows = response
            .into_result()
            .map_err(|e| history_error(self.kind(), &instrument.symbol, e))?;

        candles_from_bybit(&instrument.symbol, rows.list)
    }
}
