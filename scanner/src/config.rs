use crate::{
    dashboard::DashboardConfig,
    error::ConfigError,
    indicators::IndicatorSettings,
    orchestrator::{ScanSettings, Thresholds},
    scheduler::ScheduleConfig,
    universe::{UniverseConfig, UniversePolicy},
};
use scanner_data::{Credentials, MAX_CANDLES_PER_REQUEST, ProviderKind, Resolution, SourceConfig};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{path::Path, str::FromStr, time::Duration};
use tracing::info;

/// Environment variable naming an optional JSON config file.
pub const CONFIG_PATH_ENV: &str = "SCANNER_CONFIG";

/// Complete scanner configuration.
///
/// Resolved in three layers: built-in defaults, an optional JSON file named by
/// [`CONFIG_PATH_ENV`], then individual environment variable overrides.
#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub provider: ProviderKind,
    pub base_url: Option<String>,
    pub request_timeout_ms: u64,
    pub universe: UniverseConfig,
    pub resolution: Resolution,
    /// Bars requested per instrument.
    pub lookback: usize,
    pub indicators: IndicatorSettings,
    pub thresholds: Thresholds,
    pub max_rows: usize,
    pub concurrency: usize,
    pub instrument_timeout_ms: u64,
    pub scan_secs: u64,
    pub fast_tick_secs: u64,
    pub dashboard: DashboardConfig,
    /// Only ever read from the environment.
    #[serde(skip)]
    pub credentials: Option<Credentials>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::DeltaExchange,
            base_url: None,
            request_timeout_ms: 5_000,
            universe: UniverseConfig::default(),
            resolution: Resolution::Hour1,
            lookback: 60,
            indicators: IndicatorSettings::default(),
            thresholds: Thresholds::default(),
            max_rows: 10,
            concurrency: 4,
            instrument_timeout_ms: 10_000,
            scan_secs: 300,
            fast_tick_secs: 30,
            dashboard: DashboardConfig::default(),
            credentials: None,
        }
    }
}

impl ScannerConfig {
    /// Resolve from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };

        let config = config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;

        info!(
            provider = %config.provider,
            universe = ?config.universe.policy,
            resolution = %config.resolution,
            scan_secs = config.scan_secs,
            fast_tick_secs = config.fast_tick_secs,
            signed = config.credentials.is_some(),
            "loaded scanner config"
        );

        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.display().to_string(),
            reason: error.to_string(),
        })?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|error| ConfigError::Parse(error.to_string()))
    }

    /// Override fields from variables returned by `lookup`.
    pub fn apply_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = var("SCANNER_PROVIDER") {
            self.provider = parse_env("SCANNER_PROVIDER", &value)?;
        }
        if let Some(value) = var("SCANNER_BASE_URL") {
            self.base_url = Some(value.trim().to_string());
        }
        if let Some(value) = var("SCANNER_UNIVERSE") {
            self.universe.policy = parse_env::<UniversePolicy>("SCANNER_UNIVERSE", &value)?;
        }
        if let Some(value) = var("SCANNER_SYMBOLS") {
            self.universe.symbols = split_list(&value);
        }
        if let Some(value) = var("SCANNER_TOP_N") {
            self.universe.top_n = parse_env("SCANNER_TOP_N", &value)?;
        }
        if let Some(value) = var("SCANNER_QUOTE_SUFFIXES") {
            self.universe.quote_suffixes = split_list(&value);
        }
        if let Some(value) = var("SCANNER_RESOLUTION") {
            self.resolution = parse_env("SCANNER_RESOLUTION", &value)?;
        }
        if let Some(value) = var("SCANNER_LOOKBACK") {
            self.lookback = parse_env("SCANNER_LOOKBACK", &value)?;
        }
        if let Some(value) = var("SCANNER_SCAN_SECS") {
            self.scan_secs = parse_env("SCANNER_SCAN_SECS", &value)?;
        }
        if let Some(value) = var("SCANNER_FAST_TICK_SECS") {
            self.fast_tick_secs = parse_env("SCANNER_FAST_TICK_SECS", &value)?;
        }
        if let Some(value) = var("SCANNER_CONCURRENCY") {
            self.concurrency = parse_env("SCANNER_CONCURRENCY", &value)?;
        }

        if let (Some(api_key), Some(api_secret)) = (var("DELTA_API_KEY"), var("DELTA_API_SECRET")) {
            self.credentials = Some(Credentials {
                api_key,
                api_secret,
            });
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid(reason.to_string()))
        };

        if self.universe.policy == UniversePolicy::Static && self.universe.symbols.is_empty() {
            return invalid("static universe requires at least one symbol");
        }
        if self.universe.policy == UniversePolicy::Dynamic {
            if self.universe.top_n == 0 {
                return invalid("dynamic universe top_n must be positive");
            }
            if self.universe.quote_suffixes.is_empty() {
                return invalid("dynamic universe requires at least one quote suffix");
            }
        }

        let indicators = &self.indicators;
        if indicators.rsi_length == 0 || indicators.adx_length == 0 || indicators.ema_length == 0 {
            return invalid("indicator lengths must be positive");
        }
        if indicators.min_candles <= indicators.rsi_length.max(indicators.adx_length) {
            return invalid("min_candles must exceed the longest indicator length");
        }
        if self.lookback < indicators.required_candles() {
            return Err(ConfigError::Invalid(format!(
                "lookback {} is shorter than the {} candles required",
                self.lookback,
                indicators.required_candles()
            )));
        }
        if self.lookback > MAX_CANDLES_PER_REQUEST {
            return Err(ConfigError::Invalid(format!(
                "lookback {} exceeds the {} candles a provider returns per request",
                self.lookback, MAX_CANDLES_PER_REQUEST
            )));
        }

        if self.max_rows == 0 {
            return invalid("max_rows must be positive");
        }
        if self.concurrency == 0 {
            return invalid("concurrency must be positive");
        }
        if self.request_timeout_ms == 0 || self.instrument_timeout_ms == 0 {
            return invalid("timeouts must be positive");
        }
        if self.scan_secs == 0 || self.fast_tick_secs == 0 {
            return invalid("refresh intervals must be positive");
        }

        let thresholds = &self.thresholds;
        let all_finite = [
            thresholds.bull_price_change,
            thresholds.bull_rsi_floor,
            thresholds.bear_price_change,
            thresholds.bear_rsi_ceiling,
            thresholds.bull_adx_floor,
            thresholds.bear_adx_floor,
            self.universe.min_turnover,
            self.dashboard.bias_threshold,
        ]
        .iter()
        .all(|value| value.is_finite());
        if !all_finite {
            return invalid("thresholds must be finite");
        }

        Ok(())
    }

    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_universe(mut self, universe: UniverseConfig) -> Self {
        self.universe = universe;
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn source_config(&self) -> SourceConfig {
        let config = SourceConfig::new(self.provider)
            .with_request_timeout(Duration::from_millis(self.request_timeout_ms))
            .with_credentials(self.credentials.clone());

        match &self.base_url {
            Some(base_url) => config.with_base_url(base_url.clone()),
            None => config,
        }
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            resolution: self.resolution,
            lookback: self.lookback,
            indicators: self.indicators,
            thresholds: self.thresholds,
            max_rows: self.max_rows,
            concurrency: self.concurrency,
            instrument_timeout: Duration::from_millis(self.instrument_timeout_ms),
        }
    }

    pub fn schedule(&self) -> ScheduleConfig {
        ScheduleConfig {
            scan_interval: Duration::from_secs(self.scan_secs),
            fast_tick: Duration::from_secs(self.fast_tick_secs),
        }
    }
}

fn parse_env<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key,
        value: value.to_string(),
    })
}

fn split_list(value: &str) -> Vec<SmolStr> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(SmolStr::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ScannerConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.scan_settings().max_rows, 10);
        assert_eq!(config.schedule(), ScheduleConfig::default());
        assert_eq!(
            config.source_config().request_timeout,
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_from_json_partial() {
        let config = ScannerConfig::from_json(
            r#"{
                "provider": "bybit",
                "resolution": "15m",
                "universe": { "policy": "static", "symbols": ["BTCUSDT", "ETHUSDT"] },
                "thresholds": { "bear_adx_floor": 15.0 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.provider, ProviderKind::Bybit);
        assert_eq!(config.resolution, Resolution::Minute15);
        assert_eq!(config.universe.policy, UniversePolicy::Static);
        assert_eq!(config.universe.symbols.len(), 2);
        assert_eq!(config.universe.top_n, 30);
        assert_eq!(config.thresholds.bear_adx_floor, 15.0);
        assert_eq!(config.thresholds.bull_adx_floor, 20.0);
        assert_eq!(config.thresholds.bull_rsi_floor, 60.0);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            ScannerConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_apply_env() {
        let config = ScannerConfig::default()
            .apply_env(env(&[
                ("SCANNER_PROVIDER", "binance"),
                ("SCANNER_UNIVERSE", "static"),
                ("SCANNER_SYMBOLS", "BTCUSDT, ETHUSDT,,SOLUSDT"),
                ("SCANNER_RESOLUTION", "4h"),
                ("SCANNER_SCAN_SECS", "180"),
                ("SCANNER_CONCURRENCY", " 8 "),
                ("SCANNER_BASE_URL", "http://localhost:9000"),
                ("SCANNER_TOP_N", ""),
                ("DELTA_API_KEY", "key"),
                ("DELTA_API_SECRET", "secret"),
            ]))
            .unwrap();

        assert_eq!(config.provider, ProviderKind::Binance);
        assert_eq!(config.universe.policy, UniversePolicy::Static);
        assert_eq!(
            config.universe.symbols,
            vec![
                SmolStr::new("BTCUSDT"),
                SmolStr::new("ETHUSDT"),
                SmolStr::new("SOLUSDT")
            ]
        );
        assert_eq!(config.universe.top_n, 30);
        assert_eq!(config.resolution, Resolution::Hour4);
        assert_eq!(config.scan_secs, 180);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.source_config().base_url(), "http://localhost:9000");
        assert!(config.credentials.is_some());
    }

    #[test]
    fn test_apply_env_invalid_value() {
        let actual = ScannerConfig::default().apply_env(env(&[("SCANNER_LOOKBACK", "many")]));
        assert_eq!(
            actual,
            Err(ConfigError::InvalidEnv {
                key: "SCANNER_LOOKBACK",
                value: "many".to_string()
            })
        );
    }

    #[test]
    fn test_validate() {
        struct TestCase {
            input: ScannerConfig,
            expected_valid: bool,
        }

        let tests = vec![
            TestCase {
                // TC0: static universe without symbols
                input: ScannerConfig::default()
                    .with_universe(UniverseConfig::default().with_policy(UniversePolicy::Static)),
                expected_valid: false,
            },
            TestCase {
                // TC1: lookback shorter than required history
                input: ScannerConfig {
                    lookback: 20,
                    ..ScannerConfig::default()
                },
                expected_valid: false,
            },
            TestCase {
                // TC2: min_candles not above the longest lookback
                input: ScannerConfig {
                    indicators: IndicatorSettings {
                        min_candles: 14,
                        ..IndicatorSettings::default()
                    },
                    ..ScannerConfig::default()
                },
                expected_valid: false,
            },
            TestCase {
                // TC3: zero concurrency
                input: ScannerConfig::default().with_concurrency(0),
                expected_valid: false,
            },
            TestCase {
                // TC4: non-finite threshold
                input: ScannerConfig::default().with_thresholds(Thresholds {
                    bear_adx_floor: f64::NAN,
                    ..Thresholds::default()
                }),
                expected_valid: false,
            },
            TestCase {
                // TC5: lookback above the per-request candle cap
                input: ScannerConfig {
                    lookback: 100_000_000,
                    ..ScannerConfig::default()
                },
                expected_valid: false,
            },
            TestCase {
                // TC6: lookback at the per-request candle cap
                input: ScannerConfig {
                    lookback: MAX_CANDLES_PER_REQUEST,
                    ..ScannerConfig::default()
                },
                expected_valid: true,
            },
            TestCase {
                // TC7: static universe with symbols
                input: ScannerConfig::default().with_universe(
                    UniverseConfig::default()
                        .with_policy(UniversePolicy::Static)
                        .with_symbols(["BTCUSD"]),
                ),
                expected_valid: true,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = test.input.validate().is_ok();
            assert_eq!(actual, test.expected_valid, "TC{} failed", index);
        }
    }
}
