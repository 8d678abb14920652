//! Time and timestamp helpers.

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, Timelike, Utc, Weekday};

/// UTC timestamp used for `last_run`, `last_update`, payload times, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Return the current wall-clock time in the local time zone.
///
/// Time-of-day triggers and conditions are authored against the wall
/// clock of the installation, not UTC.
#[must_use]
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Parse an `HH:MM` time-of-day string.
///
/// Returns `None` when the string is not two `:`-separated integers or
/// the hour/minute is out of range.
#[must_use]
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let (hour, minute) = value.split_once(':')?;
    let hour: u32 = hour.trim().parse().ok()?;
    let minute: u32 = minute.trim().parse().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Minutes elapsed since midnight for the given time of day.
#[must_use]
pub fn minutes_since_midnight(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Lowercase English weekday name (`"monday"`, …).
#[must_use]
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_parse_valid_time_of_day() {
        let t = parse_time_of_day("08:30").unwrap();
        assert_eq!(minutes_since_midnight(t), 8 * 60 + 30);
    }

    #[test]
    fn should_parse_single_digit_hour() {
        let t = parse_time_of_day("7:05").unwrap();
        assert_eq!(minutes_since_midnight(t), 7 * 60 + 5);
    }

    #[test]
    fn should_reject_malformed_time_of_day() {
        assert!(parse_time_of_day("0800").is_none());
        assert!(parse_time_of_day("08:00:00").is_none());
        assert!(parse_time_of_day("ab:cd").is_none());
        assert!(parse_time_of_day("").is_none());
    }

    #[test]
    fn should_reject_out_of_range_time_of_day() {
        assert!(parse_time_of_day("24:00").is_none());
        assert!(parse_time_of_day("12:60").is_none());
    }

    #[test]
    fn should_name_weekdays_in_lowercase() {
        assert_eq!(weekday_name(Weekday::Mon), "monday");
        assert_eq!(weekday_name(Weekday::Sun), "sunday");
    }
}
