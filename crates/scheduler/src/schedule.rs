//! Next-run computation for time-of-day posting jobs.

use chrono::{DateTime, Duration, NaiveTime, TimeZone};

use crate::error::{Error, Result};

/// Compute the next wall-clock run for a `HH:MM` time of day.
///
/// A time already past today rolls over to tomorrow.
pub fn next_run_at<Tz: TimeZone>(time_of_day: &str, now: DateTime<Tz>) -> Result<DateTime<Tz>> {
    let time = NaiveTime::parse_from_str(time_of_day, "%H:%M")
        .map_err(|_| Error::invalid_time(time_of_day))?;

    let mut target = now
        .with_time(time)
        .earliest()
        .ok_or_else(|| Error::invalid_time(time_of_day))?;
    if target <= now {
        target += Duration::days(1);
    }
    Ok(target)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, chrono::Utc};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, h, m, 0).unwrap()
    }

    #[test]
    fn future_time_runs_today() {
        let next = next_run_at("18:30", at(12, 0)).unwrap();
        assert_eq!(next, at(18, 30));
    }

    #[test]
    fn past_time_rolls_to_tomorrow() {
        let next = next_run_at("08:00", at(12, 0)).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 5, 11, 8, 0, 0).unwrap());
    }

    #[test]
    fn exactly_now_rolls_to_tomorrow() {
        let next = next_run_at("12:00", at(12, 0)).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 5, 11, 12, 0, 0).unwrap());
    }

    #[test]
    fn garbage_time_is_rejected() {
        for bad in ["25:00", "noon", "12:60", ""] {
            assert!(matches!(
                next_run_at(bad, at(0, 0)),
                Err(Error::InvalidTime { .. })
            ));
        }
    }
}
