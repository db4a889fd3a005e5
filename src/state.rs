use chrono::{DateTime, Utc};

/// When the last order attempt was made. Lives in memory for the lifetime of
/// one controller; each instrument loop owns its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThrottleState {
    pub last_trade: Option<DateTime<Utc>>,
}

impl ThrottleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State after an order attempt at `at`, whatever its outcome.
    #[must_use]
    pub fn after_attempt(self, at: DateTime<Utc>) -> Self {
        Self { last_trade: Some(at) }
    }

    /// Whole seconds since the last attempt, `None` if there was none.
    pub fn seconds_since_last(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_trade.map(|t| (now - t).num_seconds())
    }
}
