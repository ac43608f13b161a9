//! Microsecond-resolution timestamps, epoch 2000-01-01 UTC.
//!
//! Stored as `i64` microseconds relative to the epoch, per spec §3. All
//! parsing/formatting funnels through here so `Value::cast_as` and
//! `Value::encode`'s TEXT representation agree on one format.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use crate::error::ValueError;

fn epoch_2000() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(2000, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

pub fn micros_from_datetime(dt: DateTime<Utc>) -> Result<i64, ValueError> {
    dt.signed_duration_since(epoch_2000())
        .num_microseconds()
        .ok_or(ValueError::IntegerOutOfRange)
}

pub fn datetime_from_micros(micros: i64) -> Option<DateTime<Utc>> {
    epoch_2000().checked_add_signed(chrono::Duration::microseconds(micros))
}

/// Accepts RFC 3339 / ISO-8601 and `"YYYY-MM-DD HH:MM:SS[.fff][±HH:MM]"`.
pub fn parse_timestamp(input: &str) -> Result<i64, ValueError> {
    let input = input.trim();
    let err = |reason: String| ValueError::ParseError {
        kind: "TIMESTAMP",
        input: input.to_string(),
        reason,
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return micros_from_datetime(dt.with_timezone(&Utc));
    }

    const FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f%:z",
        "%Y-%m-%d %H:%M:%S%:z",
        "%Y-%m-%dT%H:%M:%S%.f%:z",
        "%Y-%m-%dT%H:%M:%S%:z",
    ];
    for fmt in FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(input, fmt) {
            return micros_from_datetime(dt.with_timezone(&Utc));
        }
    }

    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ];
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, fmt) {
            return micros_from_datetime(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        let naive = date.and_hms_opt(0, 0, 0).unwrap();
        return micros_from_datetime(naive.and_utc());
    }

    Err(err("no recognized timestamp format matched".into()))
}

pub fn format_timestamp(micros: i64) -> Result<String, ValueError> {
    let dt = datetime_from_micros(micros).ok_or(ValueError::IntegerOutOfRange)?;
    Ok(dt.to_rfc3339_opts(SecondsFormat::Micros, true))
}
