//! Bucket keys for rollup maps
//!
//! Day and hour keys identify calendar buckets in a caller-specified time
//! zone; model and token keys identify breakdown dimensions. All four
//! serialize as the strings the persisted schema uses (`YYYY-MM-DD`, `HH`,
//! raw model name, numeric token id or `"unknown"`), and their `Ord` matches
//! the lexicographic order of that serialized form, so range queries over
//! persisted data and over in-memory maps agree.

use chrono::{DateTime, Datelike, Days, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Sentinel key for records whose model or token cannot be resolved.
pub const UNKNOWN_KEY: &str = "unknown";

/// Convert unix seconds to a wall-clock datetime in the given zone.
///
/// Out-of-range timestamps clamp to the epoch rather than failing; the
/// engine must never reject a record outright.
fn local_datetime(unix_seconds: i64, tz: Tz) -> DateTime<Tz> {
    DateTime::<Utc>::from_timestamp(unix_seconds, 0)
        .unwrap_or_else(|| DateTime::<Utc>::from_timestamp(0, 0).unwrap_or_default())
        .with_timezone(&tz)
}

/// Local calendar day bucket (`YYYY-MM-DD`)
///
/// Wraps a [`NaiveDate`], so malformed day keys are unrepresentable and
/// chronological comparison is just `Ord`.
///
/// # Examples
/// ```
/// use relaystat::keys::DayKey;
/// use chrono_tz::Tz;
///
/// // 2026-01-10T23:30:00Z is already Jan 11 in Tokyo.
/// let day = DayKey::from_unix_seconds(1_768_087_800, Tz::Asia__Tokyo);
/// assert_eq!(day.to_string(), "2026-01-11");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey(NaiveDate);

impl DayKey {
    /// Create a DayKey from a calendar date
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Compute the local day bucket for a unix timestamp in the given zone
    pub fn from_unix_seconds(unix_seconds: i64, tz: Tz) -> Self {
        Self(local_datetime(unix_seconds, tz).date_naive())
    }

    /// Get the inner date
    pub fn inner(&self) -> NaiveDate {
        self.0
    }

    /// Subtract N calendar days, saturating at the minimum representable date
    pub fn minus_days(&self, days: u64) -> Self {
        Self(
            self.0
                .checked_sub_days(Days::new(days))
                .unwrap_or(NaiveDate::MIN),
        )
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            self.0.month(),
            self.0.day()
        )
    }
}

impl Serialize for DayKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DayKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DayKeyVisitor;

        impl Visitor<'_> for DayKeyVisitor {
            type Value = DayKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a day key in YYYY-MM-DD format")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<DayKey, E> {
                NaiveDate::parse_from_str(value, "%Y-%m-%d")
                    .map(DayKey)
                    .map_err(|_| E::custom(format!("invalid day key: {value}")))
            }
        }

        deserializer.deserialize_str(DayKeyVisitor)
    }
}

/// Local hour bucket (`00`-`23`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HourKey(u8);

impl HourKey {
    /// Create an HourKey, wrapping values above 23 into range
    pub fn new(hour: u8) -> Self {
        Self(hour % 24)
    }

    /// Compute the local hour bucket for a unix timestamp in the given zone
    pub fn from_unix_seconds(unix_seconds: i64, tz: Tz) -> Self {
        Self(local_datetime(unix_seconds, tz).hour() as u8)
    }

    /// Get the hour number (0-23)
    pub fn inner(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for HourKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl Serialize for HourKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HourKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HourKeyVisitor;

        impl Visitor<'_> for HourKeyVisitor {
            type Value = HourKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an hour key between \"00\" and \"23\"")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<HourKey, E> {
                match value.parse::<u8>() {
                    Ok(hour) if hour < 24 => Ok(HourKey(hour)),
                    _ => Err(E::custom(format!("invalid hour key: {value}"))),
                }
            }
        }

        deserializer.deserialize_str(HourKeyVisitor)
    }
}

/// Normalized model breakdown key
///
/// Blank or whitespace-only model names collapse into [`UNKNOWN_KEY`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelKey(String);

impl ModelKey {
    /// Normalize a raw model name into a breakdown key
    pub fn from_raw(model_name: &str) -> Self {
        let trimmed = model_name.trim();
        if trimmed.is_empty() {
            Self(UNKNOWN_KEY.to_string())
        } else {
            Self(trimmed.to_string())
        }
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the unknown-model sentinel
    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_KEY
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Normalized token breakdown key
///
/// A missing token id collapses into [`UNKNOWN_KEY`]; present ids render as
/// their decimal form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TokenKey(String);

impl TokenKey {
    /// Normalize a raw token id into a breakdown key
    pub fn from_raw(token_id: Option<i64>) -> Self {
        match token_id {
            Some(id) => Self(id.to_string()),
            None => Self(UNKNOWN_KEY.to_string()),
        }
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the unknown-token sentinel
    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_KEY
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
