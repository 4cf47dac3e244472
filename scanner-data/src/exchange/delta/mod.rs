use self::signer::DeltaSigner;
use crate::{
    candle::{Candle, CandleRequest, CandleSeries},
    de::{datetime_utc_from_epoch, de_flexible_f64, de_opt_flexible_f64},
    error::DataError,
    exchange::{history_error, ticker_error},
    instrument::{Instrument, normalise_pct, pct_change},
    rest::{RequestSigner, RestClient, RestError},
    source::{MarketDataSource, ProviderKind, SourceConfig},
};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use smol_str::SmolStr;
use tracing::debug;

/// HMAC request signing for authenticated Delta Exchange calls.
pub mod signer;

const TICKERS_PATH: &str = "/v2/tickers";
const CANDLES_PATH: &str = "/v2/history/candles";

/// Delta Exchange India REST adapter.
///
/// Tickers come from `/v2/tickers` (perpetual futures only), history from
/// `/v2/history/candles`, which only accepts explicit `start`/`end` ranges in epoch seconds.
/// The reference metric is open interest in contracts.
#[derive(Debug)]
pub struct DeltaExchange {
    rest: RestClient,
    signer: Option<DeltaSigner>,
}

impl DeltaExchange {
    pub fn new(config: &SourceConfig) -> Result<Self, RestError> {
        Ok(Self {
            rest: RestClient::new(config.base_url(), config.request_timeout)?,
            signer: config.credentials.clone().map(DeltaSigner::new),
        })
    }

    fn signer(&self) -> Option<&dyn RequestSigner> {
        self.signer.as_ref().map(|signer| signer as &dyn RequestSigner)
    }
}

/// Envelope wrapping every Delta response.
#[derive(Debug, Deserialize)]
struct DeltaResponse<T> {
    #[serde(default)]
    success: bool,
    result: Option<T>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl<T> DeltaResponse<T> {
    fn into_result(self) -> Result<T, RestError> {
        match (self.success, self.result) {
            (true, Some(result)) => Ok(result),
            (_, _) => Err(RestError::Request(format!(
                "Delta error envelope: {}",
                self.error.map(|e| e.to_string()).unwrap_or_else(|| "no result".to_string())
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeltaTicker {
    symbol: String,
    #[serde(default)]
    product_id: Option<u64>,
    #[serde(default, deserialize_with = "de_opt_flexible_f64")]
    close: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_flexible_f64")]
    open: Option<f64>,
    #[serde(default, alias = "open_interest", deserialize_with = "de_opt_flexible_f64")]
    oi: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_flexible_f64")]
    turnover_usd: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_flexible_f64")]
    volume: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_flexible_f64")]
    mark_change_24h: Option<f64>,
}

impl DeltaTicker {
    fn into_instrument(self) -> Option<Instrument> {
        let Some(last_price) = self.close else {
            debug!(symbol = %self.symbol, "Delta ticker without close price ignored");
            return None;
        };

        // 24h change is derived from the 24h open where available, the reported field is a fallback
        let price_change_pct = self
            .open
            .and_then(|open| pct_change(open, last_price))
            .or_else(|| self.mark_change_24h.map(normalise_pct))
            .unwrap_or(0.0);

        Some(Instrument {
            symbol: SmolStr::new(&self.symbol),
            product_id: self.product_id,
            last_price,
            price_change_pct,
            reference_value: self.oi.unwrap_or(0.0),
            turnover: self.turnover_usd,
            volume: self.volume,
        })
    }
}

#[derive(Debug, Deserialize)]
struct DeltaCandle {
    time: i64,
    #[serde(deserialize_with = "de_flexible_f64")]
    open: f64,
    #[serde(deserialize_with = "de_flexible_f64")]
    high: f64,
    #[serde(deserialize_with = "de_flexible_f64")]
    low: f64,
    #[serde(deserialize_with = "de_flexible_f64")]
    close: f64,
    #[serde(default, deserialize_with = "de_opt_flexible_f64")]
    volume: Option<f64>,
}

fn candles_from_delta(symbol: &str, rows: Vec<DeltaCandle>) -> Result<CandleSeries, DataError> {
    let candles = rows
        .into_iter()
        .map(|row| {
            let time = datetime_utc_from_epoch(row.time).ok_or_else(|| DataError::MalformedData {
                provider: ProviderKind::DeltaExchange,
                reason: format!("{symbol} candle has invalid time {}", row.time),
            })?;
            Ok(Candle {
                time,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            })
        })
        .collect::<Result<Vec<_>, DataError>>()?;

    if candles.is_empty() {
        return Err(DataError::history(symbol, "no candles returned"));
    }

    Ok(CandleSeries::new(candles))
}

#[async_trait]
impl MarketDataSource for DeltaExchange {
    fn kind(&self) -> ProviderKind {
        ProviderKind::DeltaExchange
    }

    async fn list_tickers(&self) -> Result<Vec<Instrument>, DataError> {
        let query = [("contract_types", "perpetual_futures".to_string())];
        let response: DeltaResponse<Vec<DeltaTicker>> = self
            .rest
            .get_json(TICKERS_PATH, &query, self.signer())
            .await
            .map_err(|e| ticker_error(self.kind(), e))?;

        let tickers = response
            .into_result()
            .map_err(|e| ticker_error(self.kind(), e))?;

        Ok(tickers
            .into_iter()
            .filter_map(DeltaTicker::into_instrument)
            .collect())
    }

    async fn fetch_candles(
        &self,
        instrument: &Instrument,
        request: CandleRequest,
    ) -> Result<CandleSeries, DataError> {
        let (start, end) = request.window.to_range(request.resolution, Utc::now());
        let query = [
            ("resolution", request.resolution.as_str().to_string()),
            ("symbol", instrument.symbol.to_string()),
            ("start", start.timestamp().to_string()),
            ("end", end.timestamp().to_string()),
        ];

        let response: DeltaResponse<Vec<DeltaCandle>> = self
            .rest
            .get_json(CANDLES_PATH, &query, self.signer())
            .await
            .map_err(|e| history_error(self.kind(), &instrument.symbol, e))?;

        let rows = response
            .into_result()
            .map_err(|e| history_error(self.kind(), &instrument.symbol, e))?;

        candles_from_delta(&instrument.symbol, rows)
    }
}
