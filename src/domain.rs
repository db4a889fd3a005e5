use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Bars must be strictly increasing in time.
pub fn ensure_chronological(bars: &[PriceBar]) -> Result<()> {
    match bars.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
        Some(w) => Err(Error::DataUnavailable(format!(
            "bars out of order or duplicated at {}",
            w[1].timestamp
        ))),
        None => Ok(()),
    }
}

/// Derived values for one bar. Momentum and volatility are `None` until
/// their warm-up period has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IndicatorSnapshot {
    pub fast_avg: f64,
    pub slow_avg: f64,
    pub momentum: Option<f64>,
    pub volatility: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "buy")]
    Long,
    #[serde(rename = "sell")]
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "buy",
            Direction::Short => "sell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    /// Smallest price increment.
    pub point: f64,
    pub contract_size: f64,
    pub lot_step: f64,
    pub lot_min: f64,
    pub lot_max: f64,
}

impl InstrumentInfo {
    pub fn validate(&self) -> Result<()> {
        if !(self.contract_size > 0.0) {
            return Err(Error::InvalidInstrumentParameters(format!(
                "contract size must be positive, got {}",
                self.contract_size
            )));
        }
        if !(self.lot_step > 0.0) {
            return Err(Error::InvalidInstrumentParameters(format!(
                "lot step must be positive, got {}",
                self.lot_step
            )));
        }
        if !(self.point > 0.0) {
            return Err(Error::InvalidInstrumentParameters(format!(
                "point must be positive, got {}",
                self.point
            )));
        }
        if !(self.lot_min > 0.0) || self.lot_min > self.lot_max {
            return Err(Error::InvalidInstrumentParameters(format!(
                "lot bounds [{}, {}] are not a valid range",
                self.lot_min, self.lot_max
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub bid: f64,
    pub ask: f64,
}

impl Tick {
    pub fn entry_price(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Long => self.ask,
            Direction::Short => self.bid,
        }
    }
}

/// A fully priced and sized order. Built once per cycle and consumed by the
/// dispatcher; there is no way to change it after construction.
#[derive(Debug, PartialEq)]
pub struct OrderIntent {
    direction: Direction,
    quantity: f64,
    entry_price: f64,
    stop_loss_price: f64,
    take_profit_price: f64,
}

impl OrderIntent {
    pub fn new(
        direction: Direction,
        quantity: f64,
        entry_price: f64,
        stop_loss_price: f64,
        take_profit_price: f64,
    ) -> Result<Self> {
        if !(quantity > 0.0) {
            return Err(Error::InvalidInstrumentParameters(format!(
                "order quantity must be positive, got {quantity}"
            )));
        }
        let loss_side = match direction {
            Direction::Long => stop_loss_price < entry_price,
            Direction::Short => stop_loss_price > entry_price,
        };
        if !loss_side {
            return Err(Error::InvalidVolatility(format!(
                "stop {stop_loss_price} is not on the loss side of {entry_price} for {direction:?}"
            )));
        }
        Ok(Self {
            direction,
            quantity,
            entry_price,
            stop_loss_price,
            take_profit_price,
        })
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn entry_price(&self) -> f64 {
        self.entry_price
    }

    pub fn stop_loss_price(&self) -> f64 {
        self.stop_loss_price
    }

    pub fn take_profit_price(&self) -> f64 {
        self.take_profit_price
    }
}
