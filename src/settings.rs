//! Read-only access to the loan policy row.

use crate::models::LoanPolicy;
use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct SettingsProvider {
    pool: SqlitePool,
}

impl SettingsProvider {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Current policy. Falls back to the built-in default when the row is
    /// missing or cannot be read; this never fails the caller.
    pub async fn current(&self) -> LoanPolicy {
        let result = sqlx::query_as::<_, LoanPolicy>(
            "SELECT max_loan_books, loan_duration, fine_per_day FROM settings WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(policy)) => policy,
            Ok(None) => LoanPolicy::default(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read settings, using defaults");
                LoanPolicy::default()
            }
        }
    }
}
