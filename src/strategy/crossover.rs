use serde::{Deserialize, Serialize};

use crate::domain::{Direction, IndicatorSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Long,
    Short,
    None,
}

impl Signal {
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Signal::Long => Some(Direction::Long),
            Signal::Short => Some(Direction::Short),
            Signal::None => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossoverParams {
    pub overbought: f64,
    pub oversold: f64,
}

/// EMA cross filtered by RSI.
///
/// A bar where the averages are exactly equal counts as "not above" and
/// "not below": a cross is only reported on the first bar where the fast
/// average is strictly on the new side. This only moves the boundary bar of
/// a cross and is kept as-is.
pub fn generate_signal(
    previous: &IndicatorSnapshot,
    current: &IndicatorSnapshot,
    params: &CrossoverParams,
) -> Signal {
    // cannot evaluate the filter without momentum on both bars
    let (Some(_), Some(momentum)) = (previous.momentum, current.momentum) else {
        return Signal::None;
    };

    let crossed_up = previous.fast_avg <= previous.slow_avg && current.fast_avg > current.slow_avg;
    let crossed_down = previous.fast_avg >= previous.slow_avg && current.fast_avg < current.slow_avg;

    if crossed_up && momentum < params.overbought {
        Signal::Long
    } else if crossed_down && momentum > params.oversold {
        Signal::Short
    } else {
        Signal::None
    }
}

/// Signal for the last two snapshots of a series.
pub fn latest_signal(snapshots: &[IndicatorSnapshot], params: &CrossoverParams) -> Signal {
    match snapshots {
        [.., previous, current] => generate_signal(previous, current, params),
        _ => Signal::None,
    }
}
