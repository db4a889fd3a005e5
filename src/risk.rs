use serde::{Deserialize, Serialize};

use crate::domain::{AccountInfo, InstrumentInfo};
use crate::error::{Error, Result};

/// Tolerance for float noise when snapping a price or step size to a grid.
pub(crate) const STEP_EPSILON: f64 = 1e-9;

/// Inputs of the risk sizer, refreshed from the account and instrument every
/// time an order is sized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskParameters {
    pub account_balance: f64,
    pub risk_fraction: f64, // 0.01 => 1% of balance at risk per trade

    pub point: f64,
    pub contract_size: f64,
    pub lot_step: f64,
    pub lot_min: f64,
    pub lot_max: f64,
}

impl RiskParameters {
    pub fn new(account: &AccountInfo, instrument: &InstrumentInfo, risk_fraction: f64) -> Self {
        Self {
            account_balance: account.balance,
            risk_fraction,
            point: instrument.point,
            contract_size: instrument.contract_size,
            lot_step: instrument.lot_step,
            lot_min: instrument.lot_min,
            lot_max: instrument.lot_max,
        }
    }

    pub fn instrument(&self) -> InstrumentInfo {
        InstrumentInfo {
            point: self.point,
            contract_size: self.contract_size,
            lot_step: self.lot_step,
            lot_min: self.lot_min,
            lot_max: self.lot_max,
        }
    }

    pub fn risk_amount(&self) -> f64 {
        self.account_balance * self.risk_fraction
    }

    /// Quantity that would lose exactly the risk amount at the stop, before
    /// any quantization.
    pub fn raw_quantity(&self, entry_price: f64, stop_loss_price: f64) -> f64 {
        let distance = (entry_price - stop_loss_price).abs();
        self.risk_amount() / (distance * self.contract_size)
    }
}

/// Sizes a position so that hitting the stop loses at most the configured
/// fraction of the balance.
///
/// Returns 0 ("do not trade") for a degenerate stop or when there is nothing
/// to risk. Otherwise the quantity is a whole number of lot steps, floored
/// from the raw figure and clamped to the lot bounds snapped inward onto the
/// step grid. It exceeds the raw figure only when the smallest allowed lot is
/// already more than the risk budget allows.
pub fn size_position(entry_price: f64, stop_loss_price: f64, params: &RiskParameters) -> Result<f64> {
    params.instrument().validate()?;

    let distance = (entry_price - stop_loss_price).abs();
    if !(distance > 0.0) {
        return Ok(0.0);
    }
    if !(params.risk_amount() > 0.0) {
        return Ok(0.0);
    }

    let raw = params.raw_quantity(entry_price, stop_loss_price);
    if !raw.is_finite() {
        return Ok(0.0);
    }

    let step = params.lot_step;
    let min_steps = steps_at_least(params.lot_min, step);
    let max_steps = steps_at_most(params.lot_max, step);
    if min_steps > max_steps {
        return Err(Error::InvalidInstrumentParameters(format!(
            "no multiple of lot step {step} lies in [{}, {}]",
            params.lot_min, params.lot_max
        )));
    }

    let steps = steps_at_most(raw, step).clamp(min_steps, max_steps);
    Ok(round_to(steps * step, report_decimals(step)))
}

/// Largest `n` with `n * step <= value`.
fn steps_at_most(value: f64, step: f64) -> f64 {
    let n = (value / step).floor();
    // 0.29 / 0.01 is 28.999999999999996
    if (n + 1.0) * step <= value {
        n + 1.0
    } else {
        n
    }
}

/// Smallest `n` with `n * step >= value`.
fn steps_at_least(value: f64, step: f64) -> f64 {
    let n = (value / step).ceil();
    // 0.07 / 0.01 is 7.000000000000001
    if n >= 1.0 && (n - 1.0) * step >= value {
        n - 1.0
    } else {
        n
    }
}

/// Two decimals, or more when the lot step itself is finer than 0.01.
pub(crate) fn report_decimals(step: f64) -> i32 {
    let mut decimals = 0;
    let mut scaled = step;
    while decimals < 8 && (scaled - scaled.round()).abs() > STEP_EPSILON {
        scaled *= 10.0;
        decimals += 1;
    }
    decimals.max(2)
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
