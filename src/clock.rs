//! Time source shared by the loan engine and the overdue sweep.

use chrono::{DateTime, SubsecRound, Utc};

/// Source of the current instant.
///
/// Timestamps are truncated to whole seconds so that values written to
/// SQLite keep a fixed-width text form and sort lexically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(0)
    }
}
