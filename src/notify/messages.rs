//! Notification texts.
//!
//! The feed deduplicates on exact text, so these formats double as the
//! dedup key and must stay stable.

use chrono::{DateTime, Utc};

/// Title used when a book's title cannot be read.
pub const FALLBACK_TITLE: &str = "Book";

/// `02 Jan 2006` style
pub fn format_date(date: DateTime<Utc>) -> String {
    date.format("%d %b %Y").to_string()
}

pub fn borrowed(title: &str, due: DateTime<Utc>) -> String {
    format!("Borrowed: {}. Due: {}", title, format_date(due))
}

pub fn returned(title: &str, fine: i64) -> String {
    format!("Returned: {}. Fine: {}", title, fine)
}

pub fn overdue_warning(title: &str, days: i64, fine: i64) -> String {
    format!(
        "WARNING: '{}' is {} day(s) overdue. Estimated fine: {}. Please return it as soon as possible.",
        title, days, fine
    )
}

pub fn due_reminder(title: &str, due: DateTime<Utc>) -> String {
    format!("REMINDER: '{}' is due tomorrow ({}).", title, format_date(due))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_formats() {
        let due = Utc.with_ymd_and_hms(2024, 1, 2, 15, 4, 5).unwrap();
        assert_eq!(format_date(due), "02 Jan 2024");
        assert_eq!(borrowed("Dune", due), "Borrowed: Dune. Due: 02 Jan 2024");
        assert_eq!(returned("Dune", 10000), "Returned: Dune. Fine: 10000");
        assert_eq!(
            overdue_warning("Dune", 3, 15000),
            "WARNING: 'Dune' is 3 day(s) overdue. Estimated fine: 15000. Please return it as soon as possible."
        );
        assert_eq!(
            due_reminder("Dune", due),
            "REMINDER: 'Dune' is due tomorrow (02 Jan 2024)."
        );
    }
}
