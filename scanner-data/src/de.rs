//! Deserialisation helpers for provider payloads that mix JSON numbers and numeric strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    Str(String),
}

fn parse_number_or_string<E>(value: NumberOrString) -> Result<Option<f64>, E>
where
    E: serde::de::Error,
{
    match value {
        NumberOrString::Number(number) => Ok(Some(number)),
        NumberOrString::Str(raw) if raw.trim().is_empty() => Ok(None),
        NumberOrString::Str(raw) => raw.trim().parse::<f64>().map(Some).map_err(E::custom),
    }
}

/// Deserialise an `f64` that may be encoded as a JSON number or a string.
pub fn de_flexible_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = NumberOrString::deserialize(deserializer)?;
    parse_number_or_string(value)?
        .ok_or_else(|| serde::de::Error::custom("expected numeric value, found empty string"))
}

/// Deserialise an optional `f64` that may be a JSON number, a string, an empty string or null.
pub fn de_opt_flexible_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(value) => parse_number_or_string(value),
        None => Ok(None),
    }
}

/// Interpret an epoch timestamp as seconds or milliseconds depending on its magnitude.
pub fn datetime_utc_from_epoch(epoch: i64) -> Option<DateTime<Utc>> {
    // Seconds since epoch stay below 1e11 until the year 5138.
    if epoch.abs() < 100_000_000_000 {
        DateTime::from_timestamp(epoch, 0)
    } else {
        DateTime::from_timestamp_millis(epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Payload {
        #[serde(deserialize_with = "de_flexible_f64")]
        price: f64,
        #[serde(default, deserialize_with = "de_opt_flexible_f64")]
        oi: Option<f64>,
    }

    #[test]
    fn test_de_flexible_f64() {
        struct TestCase {
            input: &'static str,
            expected: Option<(f64, Option<f64>)>,
        }

        let tests = vec![
            TestCase {
                // TC0: numbers
                input: r#"{"price": 101.5, "oi": 20}"#,
                expected: Some((101.5, Some(20.0))),
            },
            TestCase {
                // TC1: numeric strings
                input: r#"{"price": "101.5", "oi": "20.25"}"#,
                expected: Some((101.5, Some(20.25))),
            },
            TestCase {
                // TC2: empty optional string
                input: r#"{"price": "1", "oi": ""}"#,
                expected: Some((1.0, None)),
            },
            TestCase {
                // TC3: null optional
                input: r#"{"price": 1, "oi": null}"#,
                expected: Some((1.0, None)),
            },
            TestCase {
                // TC4: garbage required field
                input: r#"{"price": "abc"}"#,
                expected: None,
            },
            TestCase {
                // TC5: empty required field
                input: r#"{"price": ""}"#,
                expected: None,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = serde_json::from_str::<Payload>(test.input)
                .ok()
                .map(|payload| (payload.price, payload.oi));
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_datetime_utc_from_epoch() {
        let secs = datetime_utc_from_epoch(1_700_000_000).unwrap();
        let millis = datetime_utc_from_epoch(1_700_000_000_000).unwrap();
        assert_eq!(secs, millis);
    }
}
