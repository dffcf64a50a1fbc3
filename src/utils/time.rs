//! Conversions between the four ways this crate talks about a moment or a day:
//!
//! - `ts`: UNIX timestamp in whole seconds (`i64`)
//! - `dt`: naive datetime string, `"YYYY-MM-DD HH:MM:SS"`
//! - `dttz`: offset-aware datetime (`DateTime<FixedOffset>`)
//! - `date`: calendar date without time or zone (`NaiveDate`)
//!
//! Offsets are whole hours east of UTC.

use crate::error::{out_of_range_error, parse_error, CalendarResult, Error};
use chrono::{
    DateTime, Datelike, Days, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Timelike, Utc,
};
use std::fmt::Display;
use chrono_tz::Tz;

/// Format of a naive datetime string
pub const LOCAL_STRING_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format of a calendar date string
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const SECONDS_PER_HOUR: i32 = 3600;

/// Years that fit the four-digit `YYYY` field
const MIN_YEAR: i32 = 1;
const MAX_YEAR: i32 = 9999;

/// Formats accepted for naive datetime strings, tried in order
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Build a fixed offset from a whole number of hours
pub fn fixed_offset(hours: i32) -> CalendarResult<FixedOffset> {
    hours
        .checked_mul(SECONDS_PER_HOUR)
        .and_then(FixedOffset::east_opt)
        .ok_or(Error::InvalidOffset(hours))
}

/// Where the wall-clock fields of a timestamp are read from.
///
/// Converting a timestamp first renders it as wall-clock fields in this
/// locality and only then attaches the requested offset as a label. With the
/// default `System` locality the result therefore depends on the host time
/// zone, exactly like a naive "from timestamp" in most runtimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locality {
    /// Host time zone
    #[default]
    System,
    /// A fixed offset from UTC
    Fixed(FixedOffset),
    /// An IANA time zone
    Zone(Tz),
}

impl Locality {
    /// Locality pinned to a whole-hour offset
    pub fn fixed(hours: i32) -> CalendarResult<Self> {
        Ok(Locality::Fixed(fixed_offset(hours)?))
    }

    /// Parse a locality from `"local"`, a whole-hour offset (`"9"`, `"+09:00"`)
    /// or an IANA zone name (`"Asia/Tokyo"`, `"UTC"`)
    pub fn from_name(name: &str) -> CalendarResult<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("local") || name.eq_ignore_ascii_case("system") {
            return Ok(Locality::System);
        }
        if let Some(hours) = parse_hour_offset(name) {
            return Self::fixed(hours?);
        }
        if let Ok(hours) = name.parse::<i32>() {
            return Self::fixed(hours);
        }
        name.parse::<Tz>()
            .map(Locality::Zone)
            .map_err(|_| parse_error(&format!("unknown locality '{}'", name)))
    }

    /// Wall-clock reading of `ts` in this locality
    pub fn wall_clock(&self, ts: i64) -> CalendarResult<NaiveDateTime> {
        let naive = match self {
            Locality::System => Local.timestamp_opt(ts, 0).single().map(|dt| dt.naive_local()),
            Locality::Fixed(offset) => offset.timestamp_opt(ts, 0).single().map(|dt| dt.naive_local()),
            Locality::Zone(tz) => tz.timestamp_opt(ts, 0).single().map(|dt| dt.naive_local()),
        };
        naive
            .ok_or_else(|| out_of_range_error(&format!("timestamp {} is not representable", ts)))
            .and_then(check_year)
    }

    /// Wall-clock fields of `ts` in this locality, labeled with `offset`.
    ///
    /// The clock fields are not shifted to `offset`; only the label changes.
    pub fn timestamp_to_offset_datetime(
        &self,
        ts: i64,
        offset: i32,
    ) -> CalendarResult<DateTime<FixedOffset>> {
        attach_offset(self.wall_clock(ts)?, offset)
    }

    /// `"YYYY-MM-DD HH:MM:SS"` wall-clock reading of `ts` in this locality
    pub fn timestamp_to_local_string(&self, ts: i64, offset: i32) -> CalendarResult<String> {
        offset_datetime_to_local_string(&self.timestamp_to_offset_datetime(ts, offset)?, None)
    }

    /// Calendar date of `ts` in this locality
    pub fn timestamp_to_date(&self, ts: i64) -> CalendarResult<NaiveDate> {
        local_string_to_date(&self.timestamp_to_local_string(ts, 0)?)
    }
}

/// `"+09:00"`, `"-5:00"` or `"+0900"`; `None` when `s` does not look like an offset
fn parse_hour_offset(s: &str) -> Option<CalendarResult<i32>> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let (hours, minutes) = match rest.split_once(':') {
        Some(parts) => parts,
        None if rest.len() == 4 && rest.is_ascii() => rest.split_at(2),
        None => return None,
    };
    let hours = hours.parse::<i32>().ok()?;
    let minutes = minutes.parse::<u32>().ok()?;
    if minutes != 0 {
        return Some(Err(parse_error(&format!(
            "offset '{}' is not a whole number of hours",
            s
        ))));
    }
    Some(Ok(sign * hours))
}

/// Reject values whose year does not render as exactly four digits
fn check_year<T: Datelike + Display>(value: T) -> CalendarResult<T> {
    if (MIN_YEAR..=MAX_YEAR).contains(&value.year()) {
        Ok(value)
    } else {
        Err(out_of_range_error(&format!(
            "{} is outside years {}..={}",
            value, MIN_YEAR, MAX_YEAR
        )))
    }
}

/// `YYYY-MM-DD` at the start of `s`, ASCII digits in every field position
fn has_date_shape(s: &[u8]) -> bool {
    s.len() >= 10
        && s[..10].iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

/// A bare date, or a date followed by `HH:MM` and optionally `:SS` and a suffix
fn has_datetime_shape(s: &str) -> bool {
    let b = s.as_bytes();
    if !has_date_shape(b) {
        return false;
    }
    if b.len() == 10 {
        return true;
    }
    let two_digits = |i: usize| b.get(i..i + 2).is_some_and(|d| d.iter().all(u8::is_ascii_digit));
    matches!(b[10], b' ' | b'T')
        && two_digits(11)
        && b.get(13) == Some(&b':')
        && two_digits(14)
        && (b.len() == 16 || (b[16] == b':' && two_digits(17)))
}

fn attach_offset(naive: NaiveDateTime, offset: i32) -> CalendarResult<DateTime<FixedOffset>> {
    check_year(naive)?
        .and_local_timezone(fixed_offset(offset)?)
        .single()
        .ok_or_else(|| out_of_range_error(&format!("{} at offset {} is not representable", naive, offset)))
}

fn parse_naive(s: &str) -> CalendarResult<NaiveDateTime> {
    if !has_datetime_shape(s) {
        return Err(parse_error(&format!("invalid datetime string '{}'", s)));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive);
        }
    }
    // A string carrying its own offset keeps its clock fields; the offset is replaced later
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Ok(dt.naive_local());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, DATE_FORMAT) {
        return Ok(date.and_time(NaiveTime::MIN));
    }
    Err(parse_error(&format!("invalid datetime string '{}'", s)))
}

/// Timestamp to offset-aware datetime, reading the clock in the host time zone
pub fn timestamp_to_offset_datetime(ts: i64, offset: i32) -> CalendarResult<DateTime<FixedOffset>> {
    Locality::System.timestamp_to_offset_datetime(ts, offset)
}

/// Timestamp to `"YYYY-MM-DD HH:MM:SS"`, reading the clock in the host time zone
pub fn timestamp_to_local_string(ts: i64, offset: i32) -> CalendarResult<String> {
    Locality::System.timestamp_to_local_string(ts, offset)
}

/// Timestamp to calendar date, reading the clock in the host time zone
pub fn timestamp_to_date(ts: i64) -> CalendarResult<NaiveDate> {
    Locality::System.timestamp_to_date(ts)
}

/// Parse a naive datetime string as wall-clock time at `offset` and return its timestamp
pub fn local_string_to_timestamp(s: &str, offset: i32) -> CalendarResult<i64> {
    Ok(offset_datetime_to_timestamp(&local_string_to_offset_datetime(s, offset)?))
}

/// Parse a naive datetime string and attach `offset`
pub fn local_string_to_offset_datetime(s: &str, offset: i32) -> CalendarResult<DateTime<FixedOffset>> {
    attach_offset(parse_naive(s)?, offset)
}

/// Date part (first 10 characters) of a datetime string
pub fn local_string_to_date(s: &str) -> CalendarResult<NaiveDate> {
    if !has_date_shape(s.as_bytes()) {
        return Err(parse_error(&format!("'{}' does not start with a YYYY-MM-DD date", s)));
    }
    let head = &s[..10];
    let date = NaiveDate::parse_from_str(head, DATE_FORMAT)
        .map_err(|e| parse_error(&format!("invalid date '{}': {}", head, e)))?;
    check_year(date)
}

/// Whole seconds since the epoch; sub-second precision is truncated toward zero
pub fn offset_datetime_to_timestamp(d: &DateTime<FixedOffset>) -> i64 {
    let secs = d.timestamp();
    if secs < 0 && d.timestamp_subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Render `d` as `"YYYY-MM-DD HH:MM:SS"`.
///
/// With `offset` set, `d` is converted to that offset first; otherwise it is
/// rendered in its own offset.
pub fn offset_datetime_to_local_string(
    d: &DateTime<FixedOffset>,
    offset: Option<i32>,
) -> CalendarResult<String> {
    let local = match offset {
        None => d.naive_local(),
        Some(hours) => d.with_timezone(&fixed_offset(hours)?).naive_local(),
    };
    Ok(check_year(local)?.format(LOCAL_STRING_FORMAT).to_string())
}

/// Calendar date of `d`, optionally after converting to `offset`
pub fn offset_datetime_to_date(d: &DateTime<FixedOffset>, offset: Option<i32>) -> CalendarResult<NaiveDate> {
    local_string_to_date(&offset_datetime_to_local_string(d, offset)?)
}

/// Timestamp of midnight on `cd` at `offset`
pub fn date_to_timestamp(cd: NaiveDate, offset: i32) -> CalendarResult<i64> {
    local_string_to_timestamp(&date_to_local_string(cd)?, offset)
}

/// Midnight on `cd` as `"YYYY-MM-DD 00:00:00"`
pub fn date_to_local_string(cd: NaiveDate) -> CalendarResult<String> {
    Ok(format!("{} 00:00:00", check_year(cd)?.format(DATE_FORMAT)))
}

/// Midnight on `cd` with `offset` attached
pub fn date_to_offset_datetime(cd: NaiveDate, offset: i32) -> CalendarResult<DateTime<FixedOffset>> {
    local_string_to_offset_datetime(&date_to_local_string(cd)?, offset)
}

/// Shift a date by `n` days (negative moves backwards)
pub fn add_days(cd: NaiveDate, n: i64) -> CalendarResult<NaiveDate> {
    let days = Days::new(n.unsigned_abs());
    let shifted = if n >= 0 {
        cd.checked_add_days(days)
    } else {
        cd.checked_sub_days(days)
    };
    shifted
        .ok_or_else(|| out_of_range_error(&format!("{} + {} days", cd, n)))
        .and_then(check_year)
}

/// Three-letter English weekday name ("Sun" .. "Sat")
pub fn day_of_week(cd: NaiveDate) -> String {
    cd.format("%a").to_string()
}

/// Current time at `offset`, truncated to whole seconds
pub fn now(offset: i32) -> CalendarResult<DateTime<FixedOffset>> {
    Utc::now()
        .with_timezone(&fixed_offset(offset)?)
        .with_nanosecond(0)
        .ok_or_else(|| out_of_range_error("current time"))
}

/// UTC wire form used by the calendar API, e.g. `"2024-05-14T00:00:00Z"`
pub fn to_wire_utc(d: &DateTime<FixedOffset>) -> CalendarResult<String> {
    let utc = offset_datetime_to_local_string(d, Some(0))?;
    Ok(format!("{}Z", utc.replacen(' ', "T", 1)))
}
