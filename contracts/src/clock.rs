//! # Ledger Clock
//!
//! The vault never reads the wall clock directly. Time is whatever the host
//! says it is at the instant an operation executes, and in the in-memory
//! host that is a [`LedgerClock`] which only moves when told to.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A manually advanced ledger timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerClock {
    now: DateTime<Utc>,
}

impl LedgerClock {
    /// Starts the clock at `genesis`.
    pub fn new(genesis: DateTime<Utc>) -> Self {
        Self { now: genesis }
    }

    /// Starts the clock at the current wall-clock time.
    pub fn starting_now() -> Self {
        Self::new(Utc::now())
    }

    /// Current ledger time.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Moves time forward by `secs` seconds, saturating at the largest
    /// representable instant.
    pub fn advance(&mut self, secs: u64) {
        let step = i64::try_from(secs)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|d| self.now.checked_add_signed(d));
        self.now = step.unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    /// Jumps to `instant`. Earlier instants are ignored: ledger time never
    /// runs backwards.
    pub fn set(&mut self, instant: DateTime<Utc>) {
        if instant > self.now {
            self.now = instant;
        }
    }
}

impl Default for LedgerClock {
    fn default() -> Self {
        Self::starting_now()
    }
}
