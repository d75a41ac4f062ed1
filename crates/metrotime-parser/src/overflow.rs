use std::fmt;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

const HOURS_PER_DAY: u64 = 24;

/// Rendering used for normalized timestamps in reports and storage.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A timetable clock reading whose hour may run past 23 to denote service
/// continuing after midnight (`25:15:30` is 01:15:30 on the following day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverflowTime {
    pub hours: u64,
    pub minutes: u32,
    pub seconds: u32,
}

impl OverflowTime {
    /// Parses a leading `H+:MM:SS`. The hour takes one or more digits with no
    /// upper bound; minutes and seconds take exactly two digits but are not
    /// range checked. Text after the seconds is ignored, so `24:30:00.5` reads
    /// as `24:30:00`. Anything else yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let (hours, rest) = raw.trim_start().split_once(':')?;
        let (minutes, rest) = rest.split_once(':')?;
        let seconds = rest.get(..2)?;
        if minutes.len() != 2 {
            return None;
        }

        Some(Self {
            hours: parse_digits(hours)?,
            minutes: parse_digits(minutes)? as u32,
            seconds: parse_digits(seconds)? as u32,
        })
    }

    pub fn day_offset(&self) -> u64 {
        self.hours / HOURS_PER_DAY
    }

    pub fn hour_of_day(&self) -> u64 {
        self.hours % HOURS_PER_DAY
    }

    pub fn is_overflow(&self) -> bool {
        self.hours >= HOURS_PER_DAY
    }

    /// Anchors the reading to `base`: `base + day_offset days + hour_of_day
    /// hours + minutes + seconds`. Minute and second values of 60 or more carry
    /// into the larger units. Returns `None` only when the sum leaves chrono's
    /// representable range.
    pub fn resolve(&self, base: NaiveDate) -> Option<NaiveDateTime> {
        let days = Duration::try_days(i64::try_from(self.day_offset()).ok()?)?;
        let hours = Duration::try_hours(i64::try_from(self.hour_of_day()).ok()?)?;
        let minutes = Duration::try_minutes(i64::from(self.minutes))?;
        let seconds = Duration::try_seconds(i64::from(self.seconds))?;

        let offset = days
            .checked_add(&hours)?
            .checked_add(&minutes)?
            .checked_add(&seconds)?;

        base.and_hms_opt(0, 0, 0)?.checked_add_signed(offset)
    }
}

impl fmt::Display for OverflowTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

/// Normalizes a raw timetable value against the service day `base`.
///
/// Null, empty and malformed values all map to `None`; this never fails.
pub fn convert(raw: Option<&str>, base: NaiveDate) -> Option<NaiveDateTime> {
    raw.and_then(OverflowTime::parse)
        .and_then(|time| time.resolve(base))
}

fn parse_digits(field: &str) -> Option<u64> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}
