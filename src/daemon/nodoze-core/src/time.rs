//! Wall-clock time of day and (possibly wrapping) time ranges

use std::fmt;

use chrono::{Local, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when building a time of day from raw components
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeError {
    #[error("hour must be within 0-23, got {0}")]
    HourOutOfRange(u8),
    #[error("minute must be within 0-59, got {0}")]
    MinuteOutOfRange(u8),
    #[error("second must be within 0-59, got {0}")]
    SecondOutOfRange(u8),
}

/// A wall-clock time truncated to seconds.
///
/// Ordering is lexicographic over (hour, minute, second), which the derived
/// `Ord` gives us from the field order. Serialized as an `[h, m, s]` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "[u8; 3]", into = "[u8; 3]")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
    second: u8,
}

impl TimeOfDay {
    /// Wildcard value (00:00:00). A range with an `UNSET` endpoint matches
    /// every instant.
    pub const UNSET: TimeOfDay = TimeOfDay {
        hour: 0,
        minute: 0,
        second: 0,
    };

    pub fn new(hour: u8, minute: u8, second: u8) -> Result<Self, TimeError> {
        if hour > 23 {
            return Err(TimeError::HourOutOfRange(hour));
        }
        if minute > 59 {
            return Err(TimeError::MinuteOutOfRange(minute));
        }
        if second > 59 {
            return Err(TimeError::SecondOutOfRange(second));
        }
        Ok(Self {
            hour,
            minute,
            second,
        })
    }

    /// Current local wall-clock time
    pub fn now() -> Self {
        Self::from(Local::now().time())
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn second(&self) -> u8 {
        self.second
    }

    pub fn is_unset(&self) -> bool {
        *self == Self::UNSET
    }

    /// Whether this instant falls inside `range`. See [`TimeRange::contains`].
    pub fn contains(&self, range: &TimeRange) -> bool {
        range.contains(*self)
    }
}

impl Default for TimeOfDay {
    fn default() -> Self {
        Self::UNSET
    }
}

impl From<NaiveTime> for TimeOfDay {
    fn from(time: NaiveTime) -> Self {
        // chrono keeps leap seconds in the nanosecond field, so second() is always <= 59
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
            second: time.second() as u8,
        }
    }
}

impl TryFrom<[u8; 3]> for TimeOfDay {
    type Error = TimeError;

    fn try_from([hour, minute, second]: [u8; 3]) -> Result<Self, Self::Error> {
        Self::new(hour, minute, second)
    }
}

impl From<TimeOfDay> for [u8; 3] {
    fn from(t: TimeOfDay) -> Self {
        [t.hour, t.minute, t.second]
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

/// An ordered (start, end) pair of times of day.
///
/// `start < end` is a same-day window, `start > end` wraps past midnight.
/// Both bounds are exclusive; `start == end` matches only that instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(default)]
    pub start: TimeOfDay,
    #[serde(default)]
    pub end: TimeOfDay,
}

impl TimeRange {
    /// Range that matches every instant
    pub const ALWAYS: TimeRange = TimeRange {
        start: TimeOfDay::UNSET,
        end: TimeOfDay::UNSET,
    };

    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.start.is_unset() || self.end.is_unset()
    }

    pub fn wraps_midnight(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, t: TimeOfDay) -> bool {
        let TimeRange { start, end } = *self;
        if self.is_unrestricted() {
            return true;
        }
        if start == end {
            return t == start;
        }
        if start < end {
            start < t && t < end
        } else {
            start < t || t < end
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unrestricted() {
            return f.write_str("always");
        }
        write!(f, "{}-{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u8, m: u8, s: u8) -> TimeOfDay {
        TimeOfDay::new(h, m, s).unwrap()
    }

    #[test]
    fn test_component_validation() {
        assert_eq!(TimeOfDay::new(24, 0, 0), Err(TimeError::HourOutOfRange(24)));
        assert_eq!(TimeOfDay::new(23, 60, 0), Err(TimeError::MinuteOutOfRange(60)));
        assert_eq!(TimeOfDay::new(23, 59, 60), Err(TimeError::SecondOutOfRange(60)));
        assert!(TimeOfDay::new(23, 59, 59).is_ok());
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        assert!(t(1, 0, 0) > t(0, 59, 59));
        assert!(t(12, 30, 0) < t(12, 30, 1));
        assert_eq!(t(7, 8, 9), t(7, 8, 9));
        assert_ne!(t(7, 8, 9), t(7, 9, 8));
    }

    #[test]
    fn test_same_day_range_is_open_interval() {
        let range = TimeRange::new(t(9, 0, 0), t(17, 0, 0));
        assert!(!range.contains(t(9, 0, 0)));
        assert!(range.contains(t(9, 0, 1)));
        assert!(range.contains(t(12, 0, 0)));
        assert!(range.contains(t(16, 59, 59)));
        assert!(!range.contains(t(17, 0, 0)));
        assert!(!range.contains(t(3, 0, 0)));
        assert!(!range.contains(t(23, 0, 0)));
    }

    #[test]
    fn test_wrapping_range() {
        let range = TimeRange::new(t(22, 0, 0), t(6, 0, 0));
        assert!(range.wraps_midnight());
        assert!(range.contains(t(23, 30, 0)));
        assert!(range.contains(t(0, 0, 1)));
        assert!(range.contains(t(5, 59, 59)));
        assert!(!range.contains(t(22, 0, 0)));
        assert!(!range.contains(t(6, 0, 0)));
        assert!(!range.contains(t(12, 0, 0)));

        // exhaustive check over the full day at minute granularity
        for h in 0..24 {
            for m in 0..60 {
                let now = t(h, m, 30);
                let expected = now > range.start || now < range.end;
                assert_eq!(range.contains(now), expected, "{now}");
            }
        }
    }

    #[test]
    fn test_degenerate_range_matches_single_instant() {
        let range = TimeRange::new(t(8, 15, 0), t(8, 15, 0));
        assert!(range.contains(t(8, 15, 0)));
        assert!(!range.contains(t(8, 15, 1)));
        assert!(!range.contains(t(8, 14, 59)));
    }

    #[test]
    fn test_unset_endpoint_matches_everything() {
        let open_start = TimeRange::new(TimeOfDay::UNSET, t(6, 0, 0));
        let open_end = TimeRange::new(t(22, 0, 0), TimeOfDay::UNSET);
        for now in [t(0, 0, 0), t(6, 0, 0), t(12, 0, 0), t(23, 59, 59)] {
            assert!(open_start.contains(now));
            assert!(open_end.contains(now));
            assert!(TimeRange::ALWAYS.contains(now));
            assert!(now.contains(&TimeRange::ALWAYS));
        }
    }

    #[test]
    fn test_serde_triple() {
        let range: TimeRange =
            serde_json::from_str(r#"{"start": [22, 0, 0], "end": [6, 30, 15]}"#).unwrap();
        assert_eq!(range.start, t(22, 0, 0));
        assert_eq!(range.end, t(6, 30, 15));
        assert_eq!(serde_json::to_string(&range.end).unwrap(), "[6,30,15]");

        let bad: Result<TimeOfDay, _> = serde_json::from_str("[25, 0, 0]");
        assert!(bad.is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(t(6, 5, 4).to_string(), "06:05:04");
        assert_eq!(TimeRange::new(t(22, 0, 0), t(6, 0, 0)).to_string(), "22:00:00-06:00:00");
        assert_eq!(TimeRange::ALWAYS.to_string(), "always");
    }
}
