use chrono::{DateTime, Duration, Utc};
use std::fmt;

use crate::state::ThrottleState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateLimits {
    pub min_seconds_between_trades: u64,
    pub max_positions: usize,
}

impl GateLimits {
    /// Minimum spacing between attempts. Saturates at the longest
    /// representable span instead of overflowing.
    pub fn cooldown(&self) -> Duration {
        i64::try_from(self.min_seconds_between_trades)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DenyReason {
    Cooldown { remaining_secs: i64 },
    PositionCap { open: usize, max: usize },
    InvalidVolatility,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Cooldown { remaining_secs } => {
                write!(f, "cooldown active ({remaining_secs}s remaining)")
            }
            DenyReason::PositionCap { open, max } => {
                write!(f, "position cap reached ({open}/{max})")
            }
            DenyReason::InvalidVolatility => write!(f, "invalid volatility"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    Allow,
    Deny(DenyReason),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }
}

/// Decides whether a new order may be sent now. Cooldown is checked before
/// the position cap and the first failing rule is reported.
pub fn evaluate(
    throttle: &ThrottleState,
    open_positions: usize,
    limits: &GateLimits,
    now: DateTime<Utc>,
) -> GateDecision {
    if let Some(last) = throttle.last_trade {
        let cooldown = limits.cooldown();
        let elapsed = now - last;
        if elapsed < cooldown {
            let remaining = cooldown.checked_sub(&elapsed).unwrap_or(Duration::MAX);
            // round up so "0s remaining" is never reported while denying
            let remaining_secs = remaining.num_milliseconds().saturating_add(999) / 1000;
            return GateDecision::Deny(DenyReason::Cooldown { remaining_secs });
        }
    }

    if open_positions >= limits.max_positions {
        return GateDecision::Deny(DenyReason::PositionCap {
            open: open_positions,
            max: limits.max_positions,
        });
    }

    GateDecision::Allow
}
