//! Time types for the sweep window and remote event times.
//!
//! [`TimeWindow`] is the half-open `[start, end)` interval a sweep targets.
//! It is built from the user's local-format strings through
//! [`TimeWindow::parse_local`], which is the only place wall-clock input is
//! turned into instants. [`EventTime`] is the start of a remote event, which
//! may be a specific instant or an all-day date. An all-day date starts at
//! local midnight in the window's zone.

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat,
    TimeZone, Utc,
};
use chrono_tz::Tz;
use thiserror::Error;

/// Input format accepted for `--start` / `--end`.
pub const LOCAL_INPUT_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Errors raised while building a [`TimeWindow`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    /// The input string does not match [`LOCAL_INPUT_FORMAT`].
    #[error("invalid time '{input}': expected format YYYY-MM-DD HH:MM")]
    Format { input: String },

    /// The local time does not exist in the zone (skipped by a DST change).
    #[error("local time '{input}' does not exist in timezone {zone}")]
    NonexistentLocalTime { input: String, zone: String },

    /// The timezone name is not a known IANA identifier.
    #[error("unknown timezone: {0}")]
    UnknownZone(String),

    /// The window is empty or reversed.
    #[error("start ({start}) must be before end ({end})")]
    EmptyWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// The zone local-format input is interpreted in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WindowZone {
    /// The system's local timezone.
    #[default]
    Local,
    /// A named IANA timezone.
    Named(Tz),
}

impl WindowZone {
    /// Interprets a naive wall-clock time in this zone.
    ///
    /// Ambiguous times (clocks rolled back) resolve to the earlier instant.
    pub fn localize(&self, naive: NaiveDateTime, input: &str) -> Result<DateTime<Utc>, TimeError> {
        match self {
            Self::Local => resolve(chrono::Local.from_local_datetime(&naive), input, "local"),
            Self::Named(tz) => resolve(tz.from_local_datetime(&naive), input, tz.name()),
        }
    }

    /// The first instant of `day` in this zone.
    pub fn start_of_day(&self, day: NaiveDate) -> DateTime<Utc> {
        match self {
            Self::Local => first_instant(&chrono::Local, day),
            Self::Named(tz) => first_instant(tz, day),
        }
    }
}

/// Local midnight, or the end of the DST gap when a zone skips midnight.
fn first_instant<T: TimeZone>(zone: &T, day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::MIN);
    (0..=4)
        .map(|step| midnight + Duration::minutes(30 * step))
        .find_map(|naive| zone.from_local_datetime(&naive).earliest())
        .map_or_else(|| midnight.and_utc(), |dt| dt.with_timezone(&Utc))
}

impl FromStr for WindowZone {
    type Err = TimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("local") {
            return Ok(Self::Local);
        }
        s.parse::<Tz>()
            .map(Self::Named)
            .map_err(|_| TimeError::UnknownZone(s.to_string()))
    }
}

impl fmt::Display for WindowZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Named(tz) => write!(f, "{}", tz.name()),
        }
    }
}

fn resolve<T: TimeZone>(
    result: LocalResult<DateTime<T>>,
    input: &str,
    zone: &str,
) -> Result<DateTime<Utc>, TimeError> {
    match result {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Ok(dt.with_timezone(&Utc)),
        LocalResult::None => Err(TimeError::NonexistentLocalTime {
            input: input.to_string(),
            zone: zone.to_string(),
        }),
    }
}

/// When a remote event starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTime {
    /// A timed event, normalized to UTC.
    At(DateTime<Utc>),
    /// An all-day event. It has no instant of its own until a zone is picked.
    Day(NaiveDate),
}

impl EventTime {
    pub fn from_utc(at: DateTime<Utc>) -> Self {
        Self::At(at)
    }

    pub fn from_date(day: NaiveDate) -> Self {
        Self::Day(day)
    }

    pub fn is_all_day(&self) -> bool {
        matches!(self, Self::Day(_))
    }

    /// The instant this event starts when read in `zone`.
    pub fn starts_at(&self, zone: &WindowZone) -> DateTime<Utc> {
        match *self {
            Self::At(at) => at,
            Self::Day(day) => zone.start_of_day(day),
        }
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(at) => f.write_str(&at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Self::Day(day) => write!(f, "{} (all day)", day),
        }
    }
}

/// The half-open `[start, end)` span a sweep deletes from.
///
/// Bounds are UTC instants. `zone` is the zone the bounds were written in;
/// all-day events are placed at midnight of that zone. Construction rejects
/// `start >= end`, so a window is never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub zone: WindowZone,
}

impl TimeWindow {
    /// A window in UTC.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TimeError> {
        if start < end {
            Ok(Self {
                start,
                end,
                zone: WindowZone::Named(Tz::UTC),
            })
        } else {
            Err(TimeError::EmptyWindow { start, end })
        }
    }

    pub fn with_zone(mut self, zone: WindowZone) -> Self {
        self.zone = zone;
        self
    }

    /// Reads `YYYY-MM-DD HH:MM` wall-clock bounds in `zone`.
    pub fn parse_local(start: &str, end: &str, zone: WindowZone) -> Result<Self, TimeError> {
        let localize = |input: &str| zone.localize(parse_naive(input)?, input);
        Ok(Self::new(localize(start)?, localize(end)?)?.with_zone(zone))
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        (self.start..self.end).contains(&at)
    }

    /// Whether an event starting at `start` belongs to this window.
    pub fn contains_start(&self, start: &EventTime) -> bool {
        self.contains(start.starts_at(&self.zone))
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

fn parse_naive(input: &str) -> Result<NaiveDateTime, TimeError> {
    NaiveDateTime::parse_from_str(input.trim(), LOCAL_INPUT_FORMAT).map_err(|_| {
        TimeError::Format {
            input: input.to_string(),
        }
    })
}
