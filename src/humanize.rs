//! Human-readable size and duration parsing for configuration values

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseIntError),

    #[error("Invalid unit: {0}")]
    InvalidUnit(String),
}

/// Splits "512MB" into ("512", "MB"). Whitespace between the parts is allowed.
fn split_unit(s: &str) -> Result<(u64, &str), ParseError> {
    let pos = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| ParseError::InvalidFormat(s.to_string()))?;
    if pos == 0 {
        return Err(ParseError::InvalidFormat(s.to_string()));
    }
    let num = s[..pos].parse()?;
    Ok((num, s[pos..].trim()))
}

/// Byte size wrapper accepting `"5MB"`-style strings or plain integers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn to_human_readable(&self) -> String {
        const UNITS: &[(&str, u64)] = &[
            ("GB", 1024 * 1024 * 1024),
            ("MB", 1024 * 1024),
            ("KB", 1024),
        ];

        for &(unit, divisor) in UNITS {
            if self.0 >= divisor && self.0 % divisor == 0 {
                return format!("{}{}", self.0 / divisor, unit);
            }
        }

        format!("{}B", self.0)
    }
}

impl FromStr for ByteSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_uppercase();

        if let Ok(num) = s.parse::<u64>() {
            return Ok(ByteSize(num));
        }

        let (num, unit) = split_unit(&s)?;
        let multiplier = match unit {
            "B" => 1,
            "K" | "KB" | "KIB" => 1024,
            "M" | "MB" | "MIB" => 1024 * 1024,
            "G" | "GB" | "GIB" => 1024 * 1024 * 1024,
            _ => return Err(ParseError::InvalidUnit(unit.to_string())),
        };

        Ok(ByteSize(num * multiplier))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_human_readable())
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(NumberOrStr::<ByteSize>::new("a byte size such as \"512MB\" or an integer"))
    }
}

/// Duration wrapper accepting `"30s"`, `"15m"`, `"1h"`, `"2d"` or plain seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HumanDuration(pub Duration);

impl HumanDuration {
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

impl FromStr for HumanDuration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();

        if let Ok(secs) = s.parse::<u64>() {
            return Ok(Self::from_secs(secs));
        }

        let (num, unit) = split_unit(&s)?;
        let secs = match unit {
            "s" | "sec" | "secs" => num,
            "m" | "min" | "mins" => num * 60,
            "h" | "hr" | "hours" => num * 3600,
            "d" | "days" => num * 86400,
            "ms" => return Ok(Self(Duration::from_millis(num))),
            _ => return Err(ParseError::InvalidUnit(unit.to_string())),
        };

        Ok(Self::from_secs(secs))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        if self.0.subsec_millis() != 0 {
            write!(f, "{}ms", self.0.as_millis())
        } else if secs != 0 && secs % 3600 == 0 {
            write!(f, "{}h", secs / 3600)
        } else if secs != 0 && secs % 60 == 0 {
            write!(f, "{}m", secs / 60)
        } else {
            write!(f, "{}s", secs)
        }
    }
}

impl Serialize for HumanDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_any(NumberOrStr::<HumanDuration>::new("a duration such as \"30s\" or an integer number of seconds"))
    }
}

/// Shared visitor: integers go through `From<u64>`, strings through `FromStr`
struct NumberOrStr<T> {
    expecting: &'static str,
    _marker: std::marker::PhantomData<T>,
}

impl<T> NumberOrStr<T> {
    fn new(expecting: &'static str) -> Self {
        Self {
            expecting,
            _marker: std::marker::PhantomData,
        }
    }
}

impl From<u64> for ByteSize {
    fn from(value: u64) -> Self {
        ByteSize(value)
    }
}

impl From<u64> for HumanDuration {
    fn from(value: u64) -> Self {
        HumanDuration::from_secs(value)
    }
}

impl<'de, T> serde::de::Visitor<'de> for NumberOrStr<T>
where
    T: From<u64> + FromStr<Err = ParseError>,
{
    type Value = T;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str(self.expecting)
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        Ok(T::from(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        u64::try_from(v)
            .map(T::from)
            .map_err(|_| E::custom(format!("negative value: {v}")))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        v.parse::<T>().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sizes() {
        assert_eq!("1024".parse::<ByteSize>().unwrap().as_u64(), 1024);
        assert_eq!("64KB".parse::<ByteSize>().unwrap().as_u64(), 64 * 1024);
        assert_eq!("512mb".parse::<ByteSize>().unwrap().as_u64(), 512 * 1024 * 1024);
        assert_eq!("2 GiB".parse::<ByteSize>().unwrap().as_u64(), 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn test_parse_size_rejects_garbage() {
        assert!("MB".parse::<ByteSize>().is_err());
        assert!("10XB".parse::<ByteSize>().is_err());
        assert!("".parse::<ByteSize>().is_err());
    }

    #[test]
    fn test_size_display() {
        assert_eq!(ByteSize(1024).to_string(), "1KB");
        assert_eq!(ByteSize(512 * 1024 * 1024).to_string(), "512MB");
        assert_eq!(ByteSize(1500).to_string(), "1500B");
    }

    #[test]
    fn test_parse_durations() {
        assert_eq!("90".parse::<HumanDuration>().unwrap().as_duration(), Duration::from_secs(90));
        assert_eq!("30s".parse::<HumanDuration>().unwrap().as_duration(), Duration::from_secs(30));
        assert_eq!("15m".parse::<HumanDuration>().unwrap().as_duration(), Duration::from_secs(900));
        assert_eq!("1h".parse::<HumanDuration>().unwrap().as_duration(), Duration::from_secs(3600));
        assert_eq!("250ms".parse::<HumanDuration>().unwrap().as_duration(), Duration::from_millis(250));
        assert!("5 weeks".parse::<HumanDuration>().is_err());
    }

    #[test]
    fn test_duration_display() {
        assert_eq!(HumanDuration::from_secs(1800).to_string(), "30m");
        assert_eq!(HumanDuration::from_secs(7200).to_string(), "2h");
        assert_eq!(HumanDuration::from_secs(45).to_string(), "45s");
    }

    #[test]
    fn test_deserialize_both_forms() {
        #[derive(Deserialize)]
        struct Limits {
            size: ByteSize,
            timeout: HumanDuration,
        }

        let parsed: Limits = serde_json::from_str(r#"{"size": "10MB", "timeout": 60}"#).unwrap();
        assert_eq!(parsed.size.as_u64(), 10 * 1024 * 1024);
        assert_eq!(parsed.timeout.as_duration(), Duration::from_secs(60));

        let parsed: Limits = serde_json::from_str(r#"{"size": 2048, "timeout": "2m"}"#).unwrap();
        assert_eq!(parsed.size.as_u64(), 2048);
        assert_eq!(parsed.timeout.as_duration(), Duration::from_secs(120));
    }
}
