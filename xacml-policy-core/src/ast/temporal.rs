/*
 * Copyright Cedar Contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *      https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! XML Schema date, time and duration values.

use super::LexicalError;
use chrono::{FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

// PANIC SAFETY The `Regex`es here are valid
#[allow(clippy::unwrap_used)]
mod constants {
    use regex::Regex;

    lazy_static::lazy_static! {
        pub static ref DAY_TIME_DURATION: Regex = Regex::new(
            r"^(-)?P(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)(?:\.(\d+))?S)?)?$"
        ).unwrap();
        pub static ref YEAR_MONTH_DURATION: Regex =
            Regex::new(r"^(-)?P(?:(\d+)Y)?(?:(\d+)M)?$").unwrap();
    }
}

const SECONDS_PER_DAY: i64 = 86_400;

/// Split a trailing time zone (`Z` or `+hh:mm` / `-hh:mm`) off a lexical form.
fn split_offset(s: &str) -> Result<(&str, Option<FixedOffset>), LexicalError> {
    if let Some(rest) = s.strip_suffix('Z') {
        return Ok((rest, FixedOffset::east_opt(0)));
    }
    let bytes = s.as_bytes();
    let n = bytes.len();
    if n >= 6
        && matches!(bytes.get(n - 6), Some(b'+' | b'-'))
        && bytes.get(n - 3) == Some(&b':')
    {
        let sign = if bytes.get(n - 6) == Some(&b'-') { -1 } else { 1 };
        let hours: i32 = s
            .get(n - 5..n - 3)
            .and_then(|h| h.parse().ok())
            .ok_or_else(|| LexicalError::new("malformed time zone hours"))?;
        let minutes: i32 = s
            .get(n - 2..)
            .and_then(|m| m.parse().ok())
            .ok_or_else(|| LexicalError::new("malformed time zone minutes"))?;
        if hours > 14 || minutes > 59 {
            return Err(LexicalError::new("time zone out of range"));
        }
        let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .ok_or_else(|| LexicalError::new("time zone out of range"))?;
        let rest = s.get(..n - 6).unwrap_or_default();
        return Ok((rest, Some(offset)));
    }
    Ok((s, None))
}

fn fmt_offset(offset: Option<FixedOffset>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match offset {
        None => Ok(()),
        Some(o) if o.local_minus_utc() == 0 => write!(f, "Z"),
        Some(o) => {
            let secs = o.local_minus_utc();
            let sign = if secs < 0 { '-' } else { '+' };
            let secs = secs.abs();
            write!(f, "{sign}{:02}:{:02}", secs / 3600, (secs % 3600) / 60)
        }
    }
}

fn offset_delta(offset: Option<FixedOffset>) -> TimeDelta {
    TimeDelta::seconds(i64::from(offset.map_or(0, |o| o.local_minus_utc())))
}

/// An `xs:time` value.
///
/// Values carrying a time zone are normalized to UTC; values without one are
/// taken to be UTC. Equality and ordering use the normalized time only.
#[derive(Debug, Clone, Copy)]
pub struct Time {
    utc: NaiveTime,
    offset: Option<FixedOffset>,
}

impl Time {
    /// Build a time from a UTC time of day
    pub fn from_utc(utc: NaiveTime) -> Self {
        Self { utc, offset: None }
    }

    /// The time of day, normalized to UTC
    pub fn utc(&self) -> NaiveTime {
        self.utc
    }
}

impl FromStr for Time {
    type Err = LexicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (body, offset) = split_offset(s.trim())?;
        let local = NaiveTime::parse_from_str(body, "%H:%M:%S%.f")
            .map_err(|e| LexicalError::new(e.to_string()))?;
        let (utc, _) = local.overflowing_sub_signed(offset_delta(offset));
        Ok(Self { utc, offset })
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (local, _) = self.utc.overflowing_add_signed(offset_delta(self.offset));
        write!(f, "{}", local.format("%H:%M:%S%.f"))?;
        fmt_offset(self.offset, f)
    }
}

impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        self.utc == other.utc
    }
}

impl Eq for Time {}

impl Hash for Time {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.utc.hash(state);
    }
}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        self.utc.cmp(&other.utc)
    }
}

/// An `xs:date` value: a calendar date with an optional time zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Date {
    date: NaiveDate,
    offset: Option<FixedOffset>,
}

impl Date {
    /// Build a date without a time zone
    pub fn from_naive(date: NaiveDate) -> Self {
        Self { date, offset: None }
    }

    /// The calendar date
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Add (or, for negative durations, subtract) a number of months
    pub fn checked_add_months(&self, months: i64) -> Option<Self> {
        let date = add_months(
            self.date,
            months,
            NaiveDate::checked_add_months,
            NaiveDate::checked_sub_months,
        )?;
        Some(Self { date, ..*self })
    }
}

impl FromStr for Date {
    type Err = LexicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (body, offset) = split_offset(s.trim())?;
        let date = NaiveDate::parse_from_str(body, "%Y-%m-%d")
            .map_err(|e| LexicalError::new(e.to_string()))?;
        Ok(Self { date, offset })
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date.format("%Y-%m-%d"))?;
        fmt_offset(self.offset, f)
    }
}

/// An `xs:dateTime` value: an instant on the time line.
///
/// A lexical form without a time zone is taken to be UTC. Equality, hashing
/// and ordering compare instants.
#[derive(Debug, Clone, Copy)]
pub struct DateTime {
    instant: chrono::DateTime<FixedOffset>,
    explicit_offset: bool,
}

impl DateTime {
    /// Build a value from a zoned instant
    pub fn from_instant(instant: chrono::DateTime<FixedOffset>) -> Self {
        Self {
            instant,
            explicit_offset: true,
        }
    }

    /// The current instant, in UTC
    pub fn now() -> Self {
        Self::from_instant(chrono::Utc::now().fixed_offset())
    }

    /// The instant
    pub fn instant(&self) -> chrono::DateTime<FixedOffset> {
        self.instant
    }

    /// The UTC date part of this instant
    pub fn date(&self) -> Date {
        Date {
            date: self.instant.date_naive(),
            offset: self.explicit_offset.then_some(*self.instant.offset()),
        }
    }

    /// The time-of-day part of this instant
    pub fn time(&self) -> Time {
        Time {
            utc: self.instant.naive_utc().time(),
            offset: self.explicit_offset.then_some(*self.instant.offset()),
        }
    }

    /// Add a day-time duration
    pub fn checked_add_duration(&self, d: &DayTimeDuration) -> Option<Self> {
        let instant = self.instant.checked_add_signed(d.0)?;
        Some(Self { instant, ..*self })
    }

    /// Add (or, for negative durations, subtract) a number of months
    pub fn checked_add_months(&self, months: i64) -> Option<Self> {
        let instant = add_months(
            self.instant,
            months,
            chrono::DateTime::checked_add_months,
            chrono::DateTime::checked_sub_months,
        )?;
        Some(Self { instant, ..*self })
    }
}

fn add_months<T>(
    t: T,
    months: i64,
    add: impl Fn(T, Months) -> Option<T>,
    sub: impl Fn(T, Months) -> Option<T>,
) -> Option<T> {
    let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
    if months >= 0 {
        add(t, Months::new(magnitude))
    } else {
        sub(t, Months::new(magnitude))
    }
}

impl FromStr for DateTime {
    type Err = LexicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (body, offset) = split_offset(s.trim())?;
        let naive = NaiveDateTime::parse_from_str(body, "%Y-%m-%dT%H:%M:%S%.f")
            .map_err(|e| LexicalError::new(e.to_string()))?;
        let zone = offset.or_else(|| FixedOffset::east_opt(0));
        let instant = zone
            .and_then(|z| z.from_local_datetime(&naive).single())
            .ok_or_else(|| LexicalError::new("date-time is out of range"))?;
        Ok(Self {
            instant,
            explicit_offset: offset.is_some(),
        })
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.instant.naive_local().format("%Y-%m-%dT%H:%M:%S%.f"))?;
        fmt_offset(self.explicit_offset.then_some(*self.instant.offset()), f)
    }
}

impl PartialEq for DateTime {
    fn eq(&self, other: &Self) -> bool {
        self.instant == other.instant
    }
}

impl Eq for DateTime {}

impl Hash for DateTime {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.instant.hash(state);
    }
}

impl PartialOrd for DateTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DateTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.instant.cmp(&other.instant)
    }
}

/// An `xs:dayTimeDuration` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DayTimeDuration(TimeDelta);

impl DayTimeDuration {
    /// Wrap a signed duration
    pub fn new(delta: TimeDelta) -> Self {
        Self(delta)
    }

    /// The signed duration
    pub fn delta(&self) -> TimeDelta {
        self.0
    }

    /// The same magnitude with the opposite sign
    pub fn negated(&self) -> Self {
        Self(-self.0)
    }
}

fn capture_i64(caps: &regex::Captures<'_>, i: usize) -> Result<i64, LexicalError> {
    caps.get(i)
        .map_or(Ok(0), |m| m.as_str().parse())
        .map_err(|_| LexicalError::new("duration component out of range"))
}

impl FromStr for DayTimeDuration {
    type Err = LexicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let caps = constants::DAY_TIME_DURATION
            .captures(s)
            .ok_or_else(|| LexicalError::new("expected a form like `P1DT2H3M4.5S`"))?;
        if (2..=5).all(|i| caps.get(i).is_none()) || s.ends_with('T') {
            return Err(LexicalError::new("duration has no components"));
        }
        let overflow = || LexicalError::new("duration out of range");
        let secs = capture_i64(&caps, 2)?
            .checked_mul(SECONDS_PER_DAY)
            .and_then(|d| d.checked_add(capture_i64(&caps, 3).ok()?.checked_mul(3600)?))
            .and_then(|d| d.checked_add(capture_i64(&caps, 4).ok()?.checked_mul(60)?))
            .and_then(|d| d.checked_add(capture_i64(&caps, 5).ok()?))
            .ok_or_else(overflow)?;
        let nanos = match caps.get(6) {
            None => 0,
            Some(frac) => {
                let digits: String = frac
                    .as_str()
                    .chars()
                    .chain(std::iter::repeat('0'))
                    .take(9)
                    .collect();
                digits.parse::<u32>().map_err(|_| overflow())?
            }
        };
        let delta = TimeDelta::new(secs, nanos).ok_or_else(overflow)?;
        Ok(if caps.get(1).is_some() {
            Self(-delta)
        } else {
            Self(delta)
        })
    }
}

impl fmt::Display for DayTimeDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 < TimeDelta::zero() {
            write!(f, "-")?;
        }
        let magnitude = self.0.abs();
        let total = magnitude.num_seconds();
        let nanos = magnitude.subsec_nanos();
        let (days, rem) = (total / SECONDS_PER_DAY, total % SECONDS_PER_DAY);
        let (hours, minutes, seconds) = (rem / 3600, (rem % 3600) / 60, rem % 60);
        write!(f, "P")?;
        if days > 0 {
            write!(f, "{days}D")?;
        }
        if hours == 0 && minutes == 0 && seconds == 0 && nanos == 0 {
            if days == 0 {
                write!(f, "T0S")?;
            }
            return Ok(());
        }
        write!(f, "T")?;
        if hours > 0 {
            write!(f, "{hours}H")?;
        }
        if minutes > 0 {
            write!(f, "{minutes}M")?;
        }
        if seconds > 0 || nanos > 0 {
            if nanos > 0 {
                let frac = format!("{nanos:09}");
                write!(f, "{seconds}.{}S", frac.trim_end_matches('0'))?;
            } else {
                write!(f, "{seconds}S")?;
            }
        }
        Ok(())
    }
}

/// An `xs:yearMonthDuration` value, held as a signed number of months.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonthDuration {
    months: i64,
}

impl YearMonthDuration {
    /// A duration of `months` months
    pub fn from_months(months: i64) -> Self {
        Self { months }
    }

    /// The signed number of months
    pub fn months(&self) -> i64 {
        self.months
    }
}

impl FromStr for YearMonthDuration {
    type Err = LexicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let caps = constants::YEAR_MONTH_DURATION
            .captures(s)
            .ok_or_else(|| LexicalError::new("expected a form like `P1Y2M`"))?;
        if caps.get(2).is_none() && caps.get(3).is_none() {
            return Err(LexicalError::new("duration has no components"));
        }
        let months = capture_i64(&caps, 2)?
            .checked_mul(12)
            .and_then(|m| m.checked_add(capture_i64(&caps, 3).ok()?))
            .ok_or_else(|| LexicalError::new("duration out of range"))?;
        Ok(Self {
            months: if caps.get(1).is_some() { -months } else { months },
        })
    }
}

impl fmt::Display for YearMonthDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.months < 0 {
            write!(f, "-")?;
        }
        let magnitude = self.months.unsigned_abs();
        let (years, months) = (magnitude / 12, magnitude % 12);
        write!(f, "P")?;
        if years > 0 {
            write!(f, "{years}Y")?;
        }
        if months > 0 || years == 0 {
            write!(f, "{months}M")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn time_zones_normalize() {
        let a: Time = "09:30:00Z".parse().unwrap();
        let b: Time = "10:30:00+01:00".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(b.to_string(), "10:30:00+01:00");
        assert!("25:00:00".parse::<Time>().is_err());
    }

    #[test]
    fn date_times() {
        let a: DateTime = "2002-09-24T09:30:15-05:00".parse().unwrap();
        let b: DateTime = "2002-09-24T14:30:15Z".parse().unwrap();
        assert_eq!(a, b);
        let naive: DateTime = "2002-09-24T14:30:15.25".parse().unwrap();
        assert_eq!(naive.to_string(), "2002-09-24T14:30:15.250");
        assert!("2002-09-24".parse::<DateTime>().is_err());
    }

    #[test]
    fn dates_with_offsets() {
        let d: Date = "2002-09-24-05:00".parse().unwrap();
        assert_eq!(d.to_string(), "2002-09-24-05:00");
        let plain: Date = "2002-09-24".parse().unwrap();
        assert_ne!(d, plain);
        assert_eq!(
            plain.checked_add_months(-13).unwrap().to_string(),
            "2001-08-24"
        );
    }

    #[test]
    fn day_time_durations() {
        let d: DayTimeDuration = "P1DT2H3M4.5S".parse().unwrap();
        assert_eq!(d.to_string(), "P1DT2H3M4.5S");
        let neg: DayTimeDuration = "-PT36H".parse().unwrap();
        assert_eq!(neg.to_string(), "-P1DT12H");
        assert_eq!("PT0S".parse::<DayTimeDuration>().unwrap().to_string(), "PT0S");
        assert!("P".parse::<DayTimeDuration>().is_err());
        assert!("P1DT".parse::<DayTimeDuration>().is_err());
        assert!("P1Y".parse::<DayTimeDuration>().is_err());
    }

    #[test]
    fn year_month_durations() {
        let d: YearMonthDuration = "P1Y14M".parse().unwrap();
        assert_eq!(d.months(), 26);
        assert_eq!(d.to_string(), "P2Y2M");
        assert_eq!("-P3M".parse::<YearMonthDuration>().unwrap().months(), -3);
        assert_eq!(YearMonthDuration::from_months(0).to_string(), "P0M");
        assert!("P".parse::<YearMonthDuration>().is_err());
    }

    #[test]
    fn date_time_arithmetic() {
        let start: DateTime = "2020-01-31T00:00:00Z".parse().unwrap();
        let plus_month = start.checked_add_months(1).unwrap();
        assert_eq!(plus_month.to_string(), "2020-02-29T00:00:00Z");
        let d: DayTimeDuration = "PT1H".parse().unwrap();
        let later = start.checked_add_duration(&d).unwrap();
        assert_eq!(later.to_string(), "2020-01-31T01:00:00Z");
    }
}
