//! Conversion between caller-local wall-clock times and absolute instants.
//!
//! Instants are stored as UTC `OffsetDateTime`; zone arithmetic goes through
//! `chrono-tz`, which carries the IANA database.

use std::fmt::Write;

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use time::OffsetDateTime;

use super::error::{Result, SchedulingError};

/// Default layout for display strings.
pub const DISPLAY_LAYOUT: &str = "%Y-%m-%d %H:%M";

pub fn parse_zone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| SchedulingError::InvalidTimeInput(format!("unknown timezone '{}'", name)))
}

pub fn parse_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| {
        SchedulingError::InvalidTimeInput(format!("date '{}' is not YYYY-MM-DD", date))
    })
}

pub fn parse_time(local_time: &str) -> Result<NaiveTime> {
    let s = local_time.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| {
            SchedulingError::InvalidTimeInput(format!("time '{}' is not HH:MM", local_time))
        })
}

/// Resolves a local date + time in `zone` to an absolute instant.
///
/// Local times skipped by a DST transition are rejected; repeated local
/// times resolve to the earlier instant.
pub fn to_instant(date: &str, local_time: &str, zone: &str) -> Result<OffsetDateTime> {
    let tz = parse_zone(zone)?;
    let naive = parse_date(date)?.and_time(parse_time(local_time)?);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => from_chrono(dt.with_timezone(&Utc)),
        LocalResult::None => Err(SchedulingError::InvalidTimeInput(format!(
            "{} does not exist in {}",
            naive, tz
        ))),
    }
}

/// Renders `instant` as wall-clock time in `tz` using a strftime `layout`.
/// An unusable layout falls back to [`DISPLAY_LAYOUT`].
pub fn to_local_display(instant: OffsetDateTime, tz: Tz, layout: &str) -> String {
    let local = to_chrono(instant).with_timezone(&tz);
    let mut out = String::new();
    if write!(out, "{}", local.format(layout)).is_err() {
        out.clear();
        let _ = write!(out, "{}", local.format(DISPLAY_LAYOUT));
    }
    out
}

/// Query window covering the whole local days `from_date..=to_date` in `tz`:
/// local midnight of `from_date` up to local midnight after `to_date`.
pub fn range_to_instants(
    from_date: &str,
    to_date: &str,
    tz: Tz,
) -> Result<(OffsetDateTime, OffsetDateTime)> {
    let from = parse_date(from_date)?;
    let to = parse_date(to_date)?;
    if to < from {
        return Err(SchedulingError::InvalidTimeInput(
            "to date must not be before from date".into(),
        ));
    }
    let after = to
        .succ_opt()
        .ok_or_else(|| SchedulingError::InvalidTimeInput("date out of range".into()))?;
    Ok((start_of_day(from, tz)?, start_of_day(after, tz)?))
}

/// First existing instant of `date` in `tz`. A few zones skip midnight on
/// DST days, in which case the day starts at the first valid hour.
fn start_of_day(date: NaiveDate, tz: Tz) -> Result<OffsetDateTime> {
    let midnight = date.and_time(NaiveTime::MIN);
    (0..=3)
        .map(|h| midnight + chrono::Duration::hours(h))
        .find_map(|candidate: NaiveDateTime| tz.from_local_datetime(&candidate).earliest())
        .ok_or_else(|| {
            SchedulingError::InvalidTimeInput(format!("{} has no start of day in {}", date, tz))
        })
        .and_then(|dt| from_chrono(dt.with_timezone(&Utc)))
}

fn from_chrono(dt: DateTime<Utc>) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .map(|t| t + time::Duration::nanoseconds(i64::from(dt.timestamp_subsec_nanos())))
        .map_err(|_| SchedulingError::InvalidTimeInput(format!("{} is out of range", dt)))
}

fn to_chrono(instant: OffsetDateTime) -> DateTime<Utc> {
    // OffsetDateTime's range is a strict subset of chrono's.
    DateTime::from_timestamp(instant.unix_timestamp(), instant.nanosecond()).unwrap_or_default()
}
