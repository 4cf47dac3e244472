use itertools::Itertools;
use scanner_data::Instrument;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::{cmp::Ordering, str::FromStr};
use tracing::{debug, warn};

/// How the set of instruments scanned each cycle is chosen.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UniversePolicy {
    /// Fixed, hand-curated symbol list.
    Static,
    /// Most active instruments quoted in an accepted currency.
    #[default]
    Dynamic,
}

impl FromStr for UniversePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "static" => Ok(Self::Static),
            "dynamic" => Ok(Self::Dynamic),
            other => Err(format!("unknown universe policy: {other}")),
        }
    }
}

#[derive(Clone, PartialEq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct UniverseConfig {
    pub policy: UniversePolicy,
    /// Symbols scanned under [`UniversePolicy::Static`].
    pub symbols: Vec<SmolStr>,
    /// Number of instruments kept under [`UniversePolicy::Dynamic`].
    pub top_n: usize,
    /// Accepted quote currency suffixes, matched case-insensitively.
    pub quote_suffixes: Vec<SmolStr>,
    /// Instruments with a lower traded-value proxy are dropped before ranking.
    pub min_turnover: f64,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            policy: UniversePolicy::Dynamic,
            symbols: Vec::new(),
            top_n: 30,
            quote_suffixes: vec![SmolStr::new("USDT"), SmolStr::new("USD")],
            min_turnover: 0.0,
        }
    }
}

impl UniverseConfig {
    pub fn with_policy(mut self, policy: UniversePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.symbols = symbols.into_iter().map(|s| SmolStr::new(s.as_ref())).collect();
        self
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_quote_suffixes<I, S>(mut self, suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.quote_suffixes = suffixes
            .into_iter()
            .map(|s| SmolStr::new(s.as_ref()))
            .collect();
        self
    }

    pub fn with_min_turnover(mut self, min_turnover: f64) -> Self {
        self.min_turnover = min_turnover;
        self
    }
}

/// Instruments chosen for one cycle.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Selection {
    pub instruments: Vec<Instrument>,
    /// Configured static symbols the provider did not list this cycle.
    pub missing: Vec<SmolStr>,
}

/// Choose this cycle's instruments from the provider's ticker snapshot.
pub fn select(config: &UniverseConfig, tickers: Vec<Instrument>) -> Selection {
    match config.policy {
        UniversePolicy::Static => select_static(&config.symbols, tickers),
        UniversePolicy::Dynamic => select_dynamic(config, tickers),
    }
}

fn select_static(symbols: &[SmolStr], mut tickers: Vec<Instrument>) -> Selection {
    let requested = symbols
        .iter()
        .map(|symbol| symbol.trim().to_ascii_uppercase())
        .filter(|symbol| !symbol.is_empty())
        .unique()
        .collect::<Vec<_>>();

    let mut selection = Selection::default();
    for symbol in requested {
        match tickers
            .iter()
            .position(|ticker| ticker.symbol.eq_ignore_ascii_case(&symbol))
        {
            Some(index) => selection.instruments.push(tickers.swap_remove(index)),
            None => {
                warn!(%symbol, "configured symbol not listed by provider");
                selection.missing.push(SmolStr::new(symbol));
            }
        }
    }

    selection
}

fn select_dynamic(config: &UniverseConfig, tickers: Vec<Instrument>) -> Selection {
    let listed = tickers.len();

    let instruments = tickers
        .into_iter()
        .filter(|ticker| has_quote_suffix(&ticker.symbol, &config.quote_suffixes))
        .filter(|ticker| ticker.activity() >= config.min_turnover)
        .sorted_by(|a, b| {
            b.activity()
                .partial_cmp(&a.activity())
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.symbol.cmp(&b.symbol))
        })
        .take(config.top_n)
        .collect::<Vec<_>>();

    debug!(listed, selected = instruments.len(), "selected dynamic universe");

    Selection {
        instruments,
        missing: Vec::new(),
    }
}

fn has_quote_suffix(symbol: &str, suffixes: &[SmolStr]) -> bool {
    let symbol = symbol.to_ascii_uppercase();
    suffixes
        .iter()
        .any(|suffix| !suffix.is_empty() && symbol.ends_with(&suffix.as_str().to_ascii_uppercase()))
}
