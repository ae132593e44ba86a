//! Duration parsing for configuration values.
//!
//! Accepts strings like `"500ms"`, `"30s"`, `"5m"`, `"1h"` and compound
//! forms such as `"1m30s"`. A bare integer (in a string or as a TOML
//! integer) is taken as seconds.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Parse a duration string. Returns `None` for malformed input.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(secs) = s.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return None;
        }
        let value: u64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];

        let unit = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let step = match &rest[..unit] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value.checked_mul(60)?),
            "h" => Duration::from_secs(value.checked_mul(3600)?),
            _ => return None,
        };
        total = total.checked_add(step)?;
        rest = &rest[unit..];
    }
    Some(total)
}

/// Render a duration in the same notation [`parse_duration`] accepts.
pub fn format_duration(d: Duration) -> String {
    let millis = d.subsec_millis();
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);

    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{h}h"));
    }
    if m > 0 {
        out.push_str(&format!("{m}m"));
    }
    if s > 0 {
        out.push_str(&format!("{s}s"));
    }
    if millis > 0 {
        out.push_str(&format!("{millis}ms"));
    }
    if out.is_empty() {
        out.push_str("0s");
    }
    out
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Seconds(u64),
    Text(String),
}

impl RawDuration {
    fn into_duration<E: serde::de::Error>(self) -> Result<Duration, E> {
        match self {
            RawDuration::Seconds(secs) => Ok(Duration::from_secs(secs)),
            RawDuration::Text(text) => parse_duration(&text)
                .ok_or_else(|| E::custom(format!("invalid duration: {text:?}"))),
        }
    }
}

/// Serde adapter: `#[serde(with = "plum_core::duration")]`.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    RawDuration::deserialize(deserializer)?.into_duration()
}

pub fn serialize<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_duration(*d))
}

/// Serde adapter for `Option<Duration>` fields.
pub mod option {
    use super::*;

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<RawDuration>::deserialize(deserializer)?
            .map(RawDuration::into_duration)
            .transpose()
    }

    pub fn serialize<S: Serializer>(d: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => serializer.serialize_str(&format_duration(*d)),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_units() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn parse_compound() {
        assert_eq!(parse_duration("1m30s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_duration("1h5m"), Some(Duration::from_secs(3900)));
        assert_eq!(parse_duration("1s250ms"), Some(Duration::from_millis(1250)));
    }

    #[test]
    fn parse_plain_number_as_seconds() {
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("5x"), None);
        assert_eq!(parse_duration("m5"), None);
    }

    #[test]
    fn parse_rejects_overflow() {
        let max = u64::MAX;
        assert_eq!(parse_duration(&format!("{max}m")), None);
        assert_eq!(parse_duration(&format!("{}h", max / 3600 + 1)), None);
        assert_eq!(parse_duration(&format!("{max}s{max}s")), None);
        assert_eq!(parse_duration(&format!("{max}s")), Some(Duration::from_secs(max)));
    }

    #[test]
    fn format_round_trips_through_parse() {
        for d in [
            Duration::from_millis(500),
            Duration::from_secs(30),
            Duration::from_secs(90),
            Duration::from_secs(3661),
        ] {
            assert_eq!(parse_duration(&format_duration(d)), Some(d));
        }
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
    }

    #[test]
    fn deserialize_accepts_integer_and_string() {
        #[derive(Debug, Deserialize)]
        struct Wrapper {
            #[serde(with = "crate::duration")]
            a: Duration,
            #[serde(default, with = "crate::duration::option")]
            b: Option<Duration>,
        }

        let w: Wrapper = toml::from_str("a = 5\nb = \"1m\"").unwrap();
        assert_eq!(w.a, Duration::from_secs(5));
        assert_eq!(w.b, Some(Duration::from_secs(60)));

        let err = toml::from_str::<Wrapper>("a = \"later\"").unwrap_err();
        assert!(err.to_string().contains("invalid duration"));
    }
}
