//! Calendar helpers for the simulated working week.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{Datelike, NaiveDateTime, NaiveTime, TimeDelta, Timelike};

/// First working hour of the day.
pub const WORK_START_HOUR: u32 = 8;
/// Last working hour of the day (inclusive).
pub const WORK_END_HOUR: u32 = 17;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Monday to Friday.
pub fn is_weekday(t: NaiveDateTime) -> bool {
    t.weekday().num_days_from_monday() < 5
}

/// Weekday between 08:00 and 17:00, both ends inclusive.
pub fn is_working_hour(t: NaiveDateTime) -> bool {
    let start = NaiveTime::from_hms_opt(WORK_START_HOUR, 0, 0).unwrap_or_default();
    let end = NaiveTime::from_hms_opt(WORK_END_HOUR, 0, 0).unwrap_or_default();
    is_weekday(t) && t.time() >= start && t.time() <= end
}

/// Start of the next working period.
///
/// Weekday mornings give today 08:00; later times and weekends roll forward
/// to the next weekday at 08:00.
pub fn next_working_hour(t: NaiveDateTime) -> NaiveDateTime {
    let mut date = if t.hour() < WORK_START_HOUR {
        t.date()
    } else {
        t.date() + TimeDelta::days(1)
    };
    while date.weekday().num_days_from_monday() >= 5 {
        date += TimeDelta::days(1);
    }
    date.and_hms_opt(WORK_START_HOUR, 0, 0).unwrap_or(t)
}

/// First minute after today's working window (17:01).
pub fn next_non_working_hour(t: NaiveDateTime) -> NaiveDateTime {
    t.date().and_hms_opt(WORK_END_HOUR, 1, 0).unwrap_or(t)
}

/// Smallest hour-aligned timestamp not before `t`.
pub fn ceil_to_hour(t: NaiveDateTime) -> NaiveDateTime {
    let floor = t
        .date()
        .and_hms_opt(t.hour(), 0, 0)
        .unwrap_or(t);
    if floor == t {
        t
    } else {
        floor + TimeDelta::hours(1)
    }
}

/// Convert fractional simulated hours to a calendar delta.
pub fn hours_delta(hours: f64) -> TimeDelta {
    // Millisecond precision is plenty for hour-scale durations.
    #[allow(clippy::cast_possible_truncation)]
    let millis = (hours.max(0.0) * 3_600_000.0).round() as i64;
    TimeDelta::milliseconds(millis)
}

/// Convert fractional simulated hours to a real sleep using the configured
/// length of one simulated hour.
pub fn scaled_sleep(hours: f64, hour_scale: Duration) -> Duration {
    hour_scale.mul_f64(hours.max(0.0))
}

/// Round to two decimals, as reported to the orchestrator.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn working_window_is_inclusive() {
        // 2018-01-01 is a Monday.
        assert!(is_working_hour(at(2018, 1, 1, 8, 0)));
        assert!(is_working_hour(at(2018, 1, 1, 17, 0)));
        assert!(!is_working_hour(at(2018, 1, 1, 17, 1)));
        assert!(!is_working_hour(at(2018, 1, 1, 7, 59)));
        assert!(!is_working_hour(at(2018, 1, 6, 10, 0)));
    }

    #[test]
    fn next_working_hour_cases() {
        assert_eq!(next_working_hour(at(2018, 1, 6, 12, 0)), at(2018, 1, 8, 8, 0));
        assert_eq!(next_working_hour(at(2018, 1, 7, 23, 0)), at(2018, 1, 8, 8, 0));
        assert_eq!(next_working_hour(at(2018, 1, 2, 18, 0)), at(2018, 1, 3, 8, 0));
        assert_eq!(next_working_hour(at(2018, 1, 2, 3, 0)), at(2018, 1, 2, 8, 0));
        assert_eq!(next_working_hour(at(2018, 1, 5, 17, 30)), at(2018, 1, 8, 8, 0));
    }

    #[test]
    fn next_non_working_is_one_minute_past_close() {
        assert_eq!(next_non_working_hour(at(2018, 1, 2, 9, 30)), at(2018, 1, 2, 17, 1));
    }

    #[test]
    fn ceil_to_hour_keeps_aligned_times() {
        assert_eq!(ceil_to_hour(at(2018, 1, 1, 10, 0)), at(2018, 1, 1, 10, 0));
        assert_eq!(ceil_to_hour(at(2018, 1, 1, 10, 30)), at(2018, 1, 1, 11, 0));
        assert_eq!(ceil_to_hour(at(2018, 1, 1, 23, 5)), at(2018, 1, 2, 0, 0));
    }

    #[test]
    fn rounding_and_scaling() {
        assert!((round2(1.23456) - 1.23).abs() < f64::EPSILON);
        assert_eq!(scaled_sleep(2.0, Duration::from_millis(10)), Duration::from_millis(20));
        assert_eq!(scaled_sleep(-1.0, Duration::from_millis(10)), Duration::ZERO);
        assert_eq!(hours_delta(1.5), TimeDelta::minutes(90));
    }
}
