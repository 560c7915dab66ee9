use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Loan lifecycle state. `Returned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum LoanStatus {
    Borrowed,
    Returned,
}

/// A row from the `loans` table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Loan {
    pub id: i64,
    pub user_id: Uuid,
    pub book_id: i64,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub fine: i64,
}

impl Loan {
    pub fn is_borrowed(&self) -> bool {
        self.status == LoanStatus::Borrowed
    }
}

/// Loan joined with display fields for listings.
///
/// `username` is only populated by the all-loans listing.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LoanView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub loan: Loan,
    pub book_title: String,
    pub username: Option<String>,
}
