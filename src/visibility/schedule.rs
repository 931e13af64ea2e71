//! Lenient wall-clock schedule parsing. Upstream data entry produces a
//! handful of date/time shapes; failure is an explicit error the gate can
//! apply policy to, not a silent guess.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("schedule is missing")]
    Missing,

    #[error("unrecognized date {0:?}")]
    BadDate(String),

    #[error("unrecognized time {0:?}")]
    BadTime(String),
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];
const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S", "%I:%M %p"];

pub fn parse(date: &str, time: &str) -> Result<NaiveDateTime, ScheduleError> {
    let date = date.trim();
    let time = time.trim();
    if date.is_empty() || time.is_empty() {
        return Err(ScheduleError::Missing);
    }

    let parsed_date = DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(date, format).ok())
        .ok_or_else(|| ScheduleError::BadDate(date.to_string()))?;

    let parsed_time = TIME_FORMATS
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(time, format).ok())
        .ok_or_else(|| ScheduleError::BadTime(time.to_string()))?;

    Ok(parsed_date.and_time(parsed_time))
}

/// Schedules carry no zone; they are compared against UTC wall-clock.
pub fn seconds_until(at: NaiveDateTime, now: DateTime<Utc>) -> i64 {
    (at - now.naive_utc()).num_seconds()
}

/// Remaining wait rendered for countdown reasons: `2h 05m` or `45m`.
pub fn format_wait(seconds: i64) -> String {
    let total_minutes = (seconds.max(0) + 59) / 60;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if hours > 0 {
        format!("{hours}h {minutes:02}m")
    } else {
        format!("{minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;

    #[test]
    fn parses_the_common_upstream_shapes() {
        let expected = NaiveDate::from_ymd_opt(2026, 3, 14)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();

        assert_eq!(parse("2026-03-14", "09:30").unwrap(), expected);
        assert_eq!(parse("14/03/2026", "09:30:00").unwrap(), expected);
        assert_eq!(parse("14-03-2026", "9:30 AM").unwrap(), expected);
    }

    #[test]
    fn rejects_garbage_with_the_offending_field() {
        assert_eq!(
            parse("someday", "09:30"),
            Err(ScheduleError::BadDate("someday".to_string()))
        );
        assert_eq!(
            parse("2026-03-14", "morning"),
            Err(ScheduleError::BadTime("morning".to_string()))
        );
        assert_eq!(parse("", "09:30"), Err(ScheduleError::Missing));
    }

    #[test]
    fn seconds_until_is_negative_for_the_past() {
        let now = Utc::now();
        let past = (now - chrono::Duration::minutes(10)).naive_utc();
        assert!(seconds_until(past, now) < 0);
    }

    #[test]
    fn wait_formatting_rounds_up_and_splits_hours() {
        assert_eq!(format_wait(45 * 60), "45m");
        assert_eq!(format_wait(125 * 60), "2h 05m");
        assert_eq!(format_wait(61), "2m");
        assert_eq!(format_wait(-5), "0m");
    }
}
