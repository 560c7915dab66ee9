//! Loan lifecycle: borrow, return, extend and listings.
//!
//! Stock and loan status only change inside a database transaction. Each
//! transaction opens with its conditional write so SQLite takes the write
//! lock before anything is read, and every precondition is re-checked under
//! that lock.

mod error;
pub mod fines;

pub use error::{LoanError, LoanResult};

use crate::auth::Identity;
use crate::clock::Clock;
use crate::models::{Loan, LoanView};
use crate::settings::SettingsProvider;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

/// Fixed extension granted by [`LoanEngine::extend`], independent of policy.
pub const EXTENSION_DAYS: i64 = 7;

const LOAN_COLUMNS: &str = "id, user_id, book_id, loan_date, due_date, return_date, status, fine";

/// Inclusive loan-date filter: start of `start` through 23:59:59 of `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Parse `YYYY-MM-DD` bounds. Missing or malformed input means no filter.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Option<Self> {
        let start = NaiveDate::parse_from_str(start?.trim(), "%Y-%m-%d").ok()?;
        let end = NaiveDate::parse_from_str(end?.trim(), "%Y-%m-%d").ok()?;
        Some(Self { start, end })
    }

    fn bounds(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        (
            self.start.and_time(NaiveTime::MIN).and_utc(),
            self.end.and_time(end_of_day).and_utc(),
        )
    }
}

/// Dashboard counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LibraryStats {
    pub users: i64,
    pub books: i64,
    pub active_loans: i64,
    pub overdue_loans: i64,
}

#[derive(Clone)]
pub struct LoanEngine {
    pool: SqlitePool,
    settings: SettingsProvider,
    clock: Arc<dyn Clock>,
}

impl LoanEngine {
    pub fn new(pool: SqlitePool, settings: SettingsProvider, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            settings,
            clock,
        }
    }

    /// Borrow one copy of a book.
    ///
    /// `requested_days <= 0` selects the standard loan duration. Errors are
    /// reported in order: loan limit, duration, missing book, stock.
    pub async fn borrow(&self, user_id: Uuid, book_id: i64, requested_days: i64) -> LoanResult<Loan> {
        let policy = self.settings.current().await;
        let mut tx = self.pool.begin().await?;

        let decremented = sqlx::query("UPDATE books SET stock = stock - 1 WHERE id = ? AND stock > 0")
            .bind(book_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            == 1;

        let active = active_loan_count(&mut tx, user_id).await?;
        if active >= policy.max_loan_books {
            return Err(LoanError::LimitExceeded {
                max: policy.max_loan_books,
            });
        }

        let days = if requested_days <= 0 {
            policy.loan_duration_days
        } else if requested_days > policy.loan_duration_days {
            return Err(LoanError::InvalidDuration {
                requested: requested_days,
                max: policy.loan_duration_days,
            });
        } else {
            requested_days
        };

        if !decremented {
            let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM books WHERE id = ?")
                .bind(book_id)
                .fetch_optional(&mut *tx)
                .await?;
            return Err(if exists.is_some() {
                LoanError::OutOfStock
            } else {
                LoanError::BookNotFound
            });
        }

        let now = self.clock.now();
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "INSERT INTO loans (user_id, book_id, loan_date, due_date, status, fine)
             VALUES (?, ?, ?, ?, 'borrowed', 0)
             RETURNING {LOAN_COLUMNS}"
        ))
        .bind(user_id)
        .bind(book_id)
        .bind(now)
        .bind(now + Duration::days(days))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            loan_id = loan.id,
            user_id = %user_id,
            book_id,
            days,
            due = %loan.due_date,
            "book borrowed"
        );
        Ok(loan)
    }

    /// Return a borrowed book, charging any late fine.
    pub async fn return_loan(&self, loan_id: i64) -> LoanResult<Loan> {
        let policy = self.settings.current().await;
        let current = self.get(loan_id).await?;
        if !current.is_borrowed() {
            return Err(LoanError::AlreadyReturned);
        }

        let now = self.clock.now();
        let fine = fines::return_fine(current.due_date, now, policy.fine_per_day);

        let mut tx = self.pool.begin().await?;

        // A concurrent return that committed first leaves nothing to match.
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "UPDATE loans SET return_date = ?, status = 'returned', fine = ?
             WHERE id = ? AND status = 'borrowed'
             RETURNING {LOAN_COLUMNS}"
        ))
        .bind(now)
        .bind(fine)
        .bind(loan_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LoanError::AlreadyReturned)?;

        sqlx::query("UPDATE books SET stock = stock + 1 WHERE id = ?")
            .bind(loan.book_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            loan_id,
            book_id = loan.book_id,
            fine,
            late_days = fines::return_late_days(loan.due_date, now),
            "book returned"
        );
        Ok(loan)
    }

    /// Push the due date of a borrowed, not yet overdue loan by a week.
    ///
    /// Members may only extend their own loans. Concurrent extends of the
    /// same loan serialize, each adding a full week.
    pub async fn extend(&self, caller: &Identity, loan_id: i64) -> LoanResult<Loan> {
        let mut tx = self.pool.begin().await?;

        // No-op write: holds the write lock before the due date is read.
        let current = sqlx::query_as::<_, Loan>(&format!(
            "UPDATE loans SET due_date = due_date WHERE id = ? RETURNING {LOAN_COLUMNS}"
        ))
        .bind(loan_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(LoanError::NotFound)?;

        if !caller.is_admin() && current.user_id != caller.user_id {
            return Err(LoanError::Forbidden);
        }
        if !current.is_borrowed() {
            return Err(LoanError::AlreadyReturned);
        }
        if self.clock.now() > current.due_date {
            return Err(LoanError::Overdue);
        }

        let due = current.due_date + Duration::days(EXTENSION_DAYS);
        let loan = sqlx::query_as::<_, Loan>(&format!(
            "UPDATE loans SET due_date = ? WHERE id = ? RETURNING {LOAN_COLUMNS}"
        ))
        .bind(due)
        .bind(loan_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(loan_id, due = %loan.due_date, by = %caller.username, "loan extended");
        Ok(loan)
    }

    pub async fn get(&self, loan_id: i64) -> LoanResult<Loan> {
        sqlx::query_as::<_, Loan>(&format!("SELECT {LOAN_COLUMNS} FROM loans WHERE id = ?"))
            .bind(loan_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(LoanError::NotFound)
    }

    /// A user's loans, newest first.
    pub async fn list_loans_for_user(&self, user_id: Uuid) -> LoanResult<Vec<LoanView>> {
        let loans = sqlx::query_as::<_, LoanView>(
            "SELECT l.id, l.user_id, l.book_id, l.loan_date, l.due_date, l.return_date,
                    l.status, l.fine, b.title AS book_title, NULL AS username
             FROM loans l JOIN books b ON b.id = l.book_id
             WHERE l.user_id = ?
             ORDER BY l.loan_date DESC, l.id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    /// Every loan, newest first, optionally restricted to a loan-date range.
    pub async fn list_all_loans(&self, range: Option<DateRange>) -> LoanResult<Vec<LoanView>> {
        const SELECT: &str = "SELECT l.id, l.user_id, l.book_id, l.loan_date, l.due_date,
                    l.return_date, l.status, l.fine, b.title AS book_title, u.username
             FROM loans l
             JOIN books b ON b.id = l.book_id
             JOIN users u ON u.id = l.user_id";
        const ORDER: &str = "ORDER BY l.loan_date DESC, l.id DESC";

        let loans = match range {
            Some(range) => {
                let (from, to) = range.bounds();
                sqlx::query_as::<_, LoanView>(&format!(
                    "{SELECT} WHERE l.loan_date >= ? AND l.loan_date <= ? {ORDER}"
                ))
                .bind(from)
                .bind(to)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, LoanView>(&format!("{SELECT} {ORDER}"))
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(loans)
    }

    /// A user's borrowed loans whose due date has passed.
    pub async fn list_overdue_for_user(&self, user_id: Uuid) -> LoanResult<Vec<LoanView>> {
        let loans = sqlx::query_as::<_, LoanView>(
            "SELECT l.id, l.user_id, l.book_id, l.loan_date, l.due_date, l.return_date,
                    l.status, l.fine, b.title AS book_title, NULL AS username
             FROM loans l JOIN books b ON b.id = l.book_id
             WHERE l.user_id = ? AND l.status = 'borrowed' AND l.due_date < ?
             ORDER BY l.due_date",
        )
        .bind(user_id)
        .bind(self.clock.now())
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    /// Every loan still out, oldest due date first.
    pub async fn list_borrowed(&self) -> LoanResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(&format!(
            "SELECT {LOAN_COLUMNS} FROM loans WHERE status = 'borrowed' ORDER BY due_date"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    pub async fn stats(&self) -> LoanResult<LibraryStats> {
        let (users, books, active_loans, overdue_loans): (i64, i64, i64, i64) = sqlx::query_as(
            "SELECT
                (SELECT COUNT(*) FROM users),
                (SELECT COUNT(*) FROM books),
                (SELECT COUNT(*) FROM loans WHERE status = 'borrowed'),
                (SELECT COUNT(*) FROM loans WHERE status = 'borrowed' AND due_date < ?)",
        )
        .bind(self.clock.now())
        .fetch_one(&self.pool)
        .await?;

        Ok(LibraryStats {
            users,
            books,
            active_loans,
            overdue_loans,
        })
    }
}

async fn active_loan_count(conn: &mut SqliteConnection, user_id: Uuid) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE user_id = ? AND status = 'borrowed'")
        .bind(user_id)
        .fetch_one(conn)
        .await
}
