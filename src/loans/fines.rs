//! Late-day arithmetic.
//!
//! Two rules exist and they differ on purpose:
//!
//! - [`return_late_days`] is charged when a book comes back. A return later
//!   on the due date itself is free.
//! - [`sweep_overdue_days`] estimates the fine in overdue warnings. Any
//!   lateness counts as at least one day.
//!
//! Calendar days are compared in UTC.

use chrono::{DateTime, Utc};

/// Days charged on return.
pub fn return_late_days(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    if now <= due {
        return 0;
    }

    let days = (now - due).num_hours() / 24;
    if days >= 1 {
        return days;
    }
    if now.date_naive() == due.date_naive() {
        0
    } else {
        1
    }
}

pub fn return_fine(due: DateTime<Utc>, now: DateTime<Utc>, fine_per_day: i64) -> i64 {
    return_late_days(due, now) * fine_per_day
}

/// Days overdue as reported by the sweep, floor with a minimum of one.
pub fn sweep_overdue_days(due: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    if now <= due {
        return 0;
    }
    ((now - due).num_hours() / 24).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32, hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, min, 0).unwrap()
    }

    #[test]
    fn test_on_time_is_free() {
        let due = at(10, 12, 0);
        assert_eq!(return_late_days(due, due), 0);
        assert_eq!(return_late_days(due, at(9, 8, 0)), 0);
        assert_eq!(sweep_overdue_days(due, due), 0);
    }

    #[test]
    fn test_same_calendar_day_is_free_on_return() {
        let due = at(10, 9, 0);
        let now = at(10, 21, 0);
        assert_eq!(return_late_days(due, now), 0);
        assert_eq!(sweep_overdue_days(due, now), 1);
    }

    #[test]
    fn test_next_day_under_24h_counts_one() {
        let due = at(10, 22, 0);
        let now = at(11, 2, 0);
        assert_eq!(return_late_days(due, now), 1);
        assert_eq!(return_fine(due, now, 5000), 5000);
    }

    #[test]
    fn test_floor_of_whole_days() {
        let due = at(10, 9, 0);
        assert_eq!(return_late_days(due, due + Duration::hours(47)), 1);
        assert_eq!(return_late_days(due, due + Duration::hours(48)), 2);
        assert_eq!(sweep_overdue_days(due, due + Duration::hours(71)), 2);
    }

    #[test]
    fn test_ten_days_late() {
        let due = at(1, 9, 0);
        let now = due + Duration::days(10);
        assert_eq!(return_fine(due, now, 5000), 50_000);
    }
}
