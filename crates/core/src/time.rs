use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// A simple clock abstraction for deterministic time in trackers, services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    #[must_use]
    pub fn is_fixed(&self) -> bool {
        matches!(self, Clock::Fixed(_))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid HH:MM:SS duration: {raw}")]
pub struct ParseHmsError {
    raw: String,
}

/// Formats a duration as zero-padded `HH:MM:SS`.
///
/// Negative durations format as `00:00:00`; hours are not wrapped at 24.
#[must_use]
pub fn format_hms(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Parses `HH:MM:SS` (hours may exceed two digits).
///
/// # Errors
///
/// Returns `ParseHmsError` if the text is not three `:`-separated integers
/// with minutes and seconds below 60.
pub fn parse_hms(raw: &str) -> Result<Duration, ParseHmsError> {
    let err = || ParseHmsError {
        raw: raw.to_owned(),
    };
    let mut parts = raw.trim().split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(err());
    };
    let hours: i64 = h.parse().map_err(|_| err())?;
    let minutes: i64 = m.parse().map_err(|_| err())?;
    let seconds: i64 = s.parse().map_err(|_| err())?;
    if hours < 0 || !(0..60).contains(&minutes) || !(0..60).contains(&seconds) {
        return Err(err());
    }
    Ok(Duration::seconds(hours * 3600 + minutes * 60 + seconds))
}

/// Serde adapter storing a `chrono::Duration` as `HH:MM:SS`.
pub mod hms {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_hms(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_hms(&raw).map_err(serde::de::Error::custom)
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}
