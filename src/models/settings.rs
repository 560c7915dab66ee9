use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Library-wide loan policy (the `settings` singleton row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LoanPolicy {
    /// Simultaneous `borrowed` loans allowed per user
    pub max_loan_books: i64,
    /// Standard and maximum loan length in days
    #[sqlx(rename = "loan_duration")]
    pub loan_duration_days: i64,
    /// Fine charged per late day, in whole currency units
    pub fine_per_day: i64,
}

impl LoanPolicy {
    pub const FALLBACK_FINE_PER_DAY: i64 = 5000;
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            max_loan_books: 3,
            loan_duration_days: 7,
            fine_per_day: Self::FALLBACK_FINE_PER_DAY,
        }
    }
}
