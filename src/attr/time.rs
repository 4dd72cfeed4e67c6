use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::{Error, Result};

lazy_static! {
    static ref DURATION: Regex = Regex::new(concat!(
        r"^(-)?P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)W)?(?:(\d+)D)?",
        r"(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:\.(\d+))?S)?)?$"
    ))
    .expect("duration pattern is valid");
}

/// Closed time interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl Period {
    /// Parses `start/end`, `start/duration` or `duration/end`.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || Error::invalid_value("period", raw);
        let (left, right) = raw.trim().split_once('/').ok_or_else(invalid)?;

        let (start, end) = if is_duration(left) {
            let end = parse_datetime(right)?;
            (end.checked_sub_signed(parse_duration(left)?).ok_or_else(invalid)?, end)
        } else if is_duration(right) {
            let start = parse_datetime(left)?;
            (start, start.checked_add_signed(parse_duration(right)?).ok_or_else(invalid)?)
        } else {
            (parse_datetime(left)?, parse_datetime(right)?)
        };

        if end < start {
            return Err(invalid());
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, instant: &DateTime<FixedOffset>) -> bool {
        self.start <= *instant && *instant <= self.end
    }

    pub fn encloses(&self, other: &Period) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

fn is_duration(value: &str) -> bool {
    let value = value.trim();
    value.starts_with('P') || value.starts_with("-P")
}

/// RFC 3339 date-times; a missing zone is taken as UTC.
pub fn parse_datetime(raw: &str) -> Result<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Ok(datetime);
    }
    for format in &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc).into());
        }
    }
    Err(Error::invalid_value("datetime", raw))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    let raw = raw.strip_suffix('Z').unwrap_or(raw);
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| Error::invalid_value("date", raw))
}

pub fn parse_time(raw: &str) -> Result<NaiveTime> {
    let raw = raw.trim();
    let raw = raw.strip_suffix('Z').unwrap_or(raw);
    NaiveTime::parse_from_str(raw, "%H:%M:%S%.f").map_err(|_| Error::invalid_value("time", raw))
}

/// ISO-8601 durations. Years count as 365 days and months as 30 days.
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    let invalid = || Error::invalid_value("duration", raw);
    let captures = DURATION.captures(raw).ok_or_else(invalid)?;

    // "P" and "PT" alone carry no component.
    if captures.iter().skip(2).all(|group| group.is_none()) || raw.ends_with('T') {
        return Err(invalid());
    }

    let number = |index: usize| -> Result<i64> {
        match captures.get(index) {
            Some(group) => group.as_str().parse::<i64>().map_err(|_| invalid()),
            None => Ok(0),
        }
    };

    let scaled = |index: usize, factor: i64| number(index)?.checked_mul(factor).ok_or_else(invalid);
    let days = [scaled(2, 365)?, scaled(3, 30)?, scaled(4, 7)?, number(5)?]
        .into_iter()
        .try_fold(0_i64, i64::checked_add)
        .ok_or_else(invalid)?;
    let parts = [
        Duration::try_days(days),
        Duration::try_hours(number(6)?),
        Duration::try_minutes(number(7)?),
        Duration::try_seconds(number(8)?),
    ];
    let mut duration = parts
        .into_iter()
        .try_fold(Duration::zero(), |total, part| total.checked_add(&part?))
        .ok_or_else(invalid)?;

    if let Some(fraction) = captures.get(9) {
        let digits: String = fraction.as_str().chars().take(9).collect();
        let scale = 10_i64.pow(9 - digits.len() as u32);
        let nanos = digits.parse::<i64>().map_err(|_| invalid())? * scale;
        duration = duration.checked_add(&Duration::nanoseconds(nanos)).ok_or_else(invalid)?;
    }

    if captures.get(1).is_some() {
        duration = -duration;
    }
    Ok(duration)
}

/// Canonical ISO-8601 form, `PnDTnHnMnS` without year/month components.
pub fn format_duration(duration: &Duration) -> String {
    let mut out = String::new();
    let mut remaining = *duration;
    if remaining < Duration::zero() {
        out.push('-');
        remaining = -remaining;
    }
    out.push('P');

    let days = remaining.num_days();
    let hours = remaining.num_hours() % 24;
    let minutes = remaining.num_minutes() % 60;
    let seconds = remaining.num_seconds() % 60;
    let nanos = (remaining - Duration::seconds(remaining.num_seconds()))
        .num_nanoseconds()
        .unwrap_or(0);

    if days > 0 {
        out.push_str(&format!("{}D", days));
    }
    if hours > 0 || minutes > 0 || seconds > 0 || nanos > 0 || days == 0 {
        out.push('T');
        if hours > 0 {
            out.push_str(&format!("{}H", hours));
        }
        if minutes > 0 {
            out.push_str(&format!("{}M", minutes));
        }
        if nanos > 0 {
            let fraction = format!("{:09}", nanos);
            out.push_str(&format!("{}.{}S", seconds, fraction.trim_end_matches('0')));
        } else if seconds > 0 || (hours == 0 && minutes == 0) {
            out.push_str(&format!("{}S", seconds));
        }
    }
    out
}
