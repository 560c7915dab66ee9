//! Periodic overdue sweep.
//!
//! Walks every borrowed loan, warns about overdue ones with an estimated
//! fine and reminds about loans due within a day. The feed's dedup keeps
//! repeated runs from stacking identical messages.

use crate::catalog::BookStore;
use crate::clock::Clock;
use crate::loans::{fines, LoanEngine};
use crate::metrics::Metrics;
use crate::models::Loan;
use crate::notify::{messages, NotificationSink};
use crate::settings::SettingsProvider;
use anyhow::Result;
use chrono::Duration;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Outcome of one pass. Counts only newly written notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub warnings: usize,
    pub reminders: usize,
}

#[derive(Clone)]
pub struct OverdueSweeper {
    loans: LoanEngine,
    books: BookStore,
    settings: SettingsProvider,
    sink: NotificationSink,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
}

impl OverdueSweeper {
    pub fn new(
        loans: LoanEngine,
        books: BookStore,
        settings: SettingsProvider,
        sink: NotificationSink,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
    ) -> Self {
        Self {
            loans,
            books,
            settings,
            sink,
            clock,
            metrics,
        }
    }

    /// One pass over all borrowed loans.
    pub async fn run_once(&self) -> Result<SweepReport> {
        let borrowed = self.loans.list_borrowed().await?;
        let policy = self.settings.current().await;
        let now = self.clock.now();

        let mut report = SweepReport {
            scanned: borrowed.len(),
            ..Default::default()
        };

        for loan in &borrowed {
            let Some(message) = self.message_for(loan, now, policy.fine_per_day).await else {
                continue;
            };

            match self.sink.create(loan.user_id, &message).await {
                Ok(true) if now > loan.due_date => report.warnings += 1,
                Ok(true) => report.reminders += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(loan_id = loan.id, error = %e, "sweep failed to write notification");
                }
            }
        }

        self.metrics.sweep_runs.inc();
        tracing::info!(
            scanned = report.scanned,
            warnings = report.warnings,
            reminders = report.reminders,
            "overdue sweep finished"
        );
        Ok(report)
    }

    async fn message_for(
        &self,
        loan: &Loan,
        now: chrono::DateTime<chrono::Utc>,
        fine_per_day: i64,
    ) -> Option<String> {
        let until_due = loan.due_date - now;
        let overdue = now > loan.due_date;
        if !overdue && until_due >= Duration::hours(24) {
            return None;
        }

        let title = match self.books.get(loan.book_id).await {
            Ok(book) => book.title,
            Err(e) => {
                tracing::debug!(book_id = loan.book_id, error = %e, "title lookup failed");
                messages::FALLBACK_TITLE.to_string()
            }
        };

        if overdue {
            let days = fines::sweep_overdue_days(loan.due_date, now);
            Some(messages::overdue_warning(&title, days, days * fine_per_day))
        } else if until_due > Duration::zero() {
            Some(messages::due_reminder(&title, loan.due_date))
        } else {
            None
        }
    }

    /// Run now and then every `interval` until stopped.
    pub fn spawn(self, interval: std::time::Duration) -> SweepHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.run_once().await {
                            tracing::error!(error = %e, "overdue sweep failed");
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            tracing::debug!("overdue sweep stopped");
        });

        SweepHandle { stop_tx, task }
    }
}

pub struct SweepHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweepHandle {
    /// Signal the task and wait for it to finish its current pass.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "overdue sweep task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::notify::NotificationHub;
    use crate::test_utils::{memory_pool, seed_book, seed_user, FixedClock};
    use uuid::Uuid;

    struct Fixture {
        sweeper: OverdueSweeper,
        engine: LoanEngine,
        sink: NotificationSink,
        clock: Arc<FixedClock>,
        user: Uuid,
        book: i64,
    }

    async fn fixture() -> Fixture {
        let pool = memory_pool().await;
        let clock = Arc::new(FixedClock::at(2024, 5, 1, 10, 0));
        let settings = SettingsProvider::new(pool.clone());
        let metrics = Metrics::new().unwrap();
        let engine = LoanEngine::new(pool.clone(), settings.clone(), clock.clone());
        let sink = NotificationSink::new(
            pool.clone(),
            NotificationHub::start(),
            clock.clone(),
            metrics.clone(),
        );
        let sweeper = OverdueSweeper::new(
            engine.clone(),
            BookStore::new(pool.clone(), clock.clone()),
            settings,
            sink.clone(),
            clock.clone(),
            metrics,
        );
        let user = seed_user(&pool, "ana", Role::Student).await;
        let book = seed_book(&pool, "Dune", 3).await;
        Fixture {
            sweeper,
            engine,
            sink,
            clock,
            user,
            book,
        }
    }

    #[tokio::test]
    async fn test_reminder_once() {
        let f = fixture().await;
        let loan = f.engine.borrow(f.user, f.book, 1).await.unwrap();
        f.clock.set(loan.due_date - Duration::hours(12));

        let report = f.sweeper.run_once().await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                scanned: 1,
                warnings: 0,
                reminders: 1
            }
        );
        let feed = f.sink.list(f.user).await.unwrap();
        assert_eq!(feed[0].message, "REMINDER: 'Dune' is due tomorrow (02 May 2024).");

        let again = f.sweeper.run_once().await.unwrap();
        assert_eq!(again.reminders, 0);
        assert_eq!(f.sink.list(f.user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_nothing_when_due_later() {
        let f = fixture().await;
        f.engine.borrow(f.user, f.book, 0).await.unwrap();

        let report = f.sweeper.run_once().await.unwrap();
        assert_eq!(report.scanned, 1);
        assert_eq!(report.warnings + report.reminders, 0);
        assert!(f.sink.list(f.user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overdue_warning() {
        let f = fixture().await;
        let loan = f.engine.borrow(f.user, f.book, 0).await.unwrap();

        // Two hours late still counts as a full day here.
        f.clock.set(loan.due_date + Duration::hours(2));
        let report = f.sweeper.run_once().await.unwrap();
        assert_eq!(report.warnings, 1);
        assert_eq!(
            f.sink.list(f.user).await.unwrap()[0].message,
            "WARNING: 'Dune' is 1 day(s) overdue. Estimated fine: 5000. Please return it as soon as possible."
        );

        f.clock.set(loan.due_date + Duration::days(3));
        assert_eq!(f.sweeper.run_once().await.unwrap().warnings, 1);
        assert_eq!(f.sink.list(f.user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_returned_loans_are_ignored() {
        let f = fixture().await;
        let loan = f.engine.borrow(f.user, f.book, 0).await.unwrap();
        f.engine.return_loan(loan.id).await.unwrap();

        f.clock.set(loan.due_date + Duration::days(5));
        let report = f.sweeper.run_once().await.unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[tokio::test]
    async fn test_spawn_runs_immediately_and_stops() {
        let f = fixture().await;
        let loan = f.engine.borrow(f.user, f.book, 0).await.unwrap();
        f.clock.set(loan.due_date + Duration::days(1));

        let handle = f.sweeper.clone().spawn(std::time::Duration::from_secs(3600));
        let mut written = 0;
        for _ in 0..50 {
            written = f.sink.list(f.user).await.unwrap().len();
            if written > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(written, 1);

        tokio::time::timeout(std::time::Duration::from_secs(1), handle.stop())
            .await
            .unwrap();
    }
}
