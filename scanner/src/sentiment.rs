use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Positioning interpretation of a price move combined with a reference metric move.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Display, Deserialize, Serialize,
)]
pub enum Sentiment {
    /// Price up, open interest up.
    #[display("Long Buildup")]
    LongBuildup,
    /// Price down, open interest up.
    #[display("Short Buildup")]
    ShortBuildup,
    /// Price down, open interest down.
    #[display("Long Unwinding")]
    LongUnwinding,
    /// Price up, open interest down.
    #[display("Short Covering")]
    ShortCovering,
    #[display("Neutral")]
    Neutral,
}

impl Sentiment {
    /// Classify from the 24h price change and the reference metric change.
    ///
    /// Either input being zero (or NaN) yields [`Sentiment::Neutral`].
    pub fn classify(price_change: f64, reference_delta: f64) -> Self {
        match (sign(price_change), sign(reference_delta)) {
            (Ordering::Greater, Ordering::Greater) => Sentiment::LongBuildup,
            (Ordering::Less, Ordering::Greater) => Sentiment::ShortBuildup,
            (Ordering::Less, Ordering::Less) => Sentiment::LongUnwinding,
            (Ordering::Greater, Ordering::Less) => Sentiment::ShortCovering,
            (Ordering::Equal, _) | (_, Ordering::Equal) => Sentiment::Neutral,
        }
    }
}

fn sign(value: f64) -> Ordering {
    value.partial_cmp(&0.0).unwrap_or(Ordering::Equal)
}
