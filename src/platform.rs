//! Narrow capabilities the trading loop needs from the platform. The
//! production implementation is [`crate::bridge::BridgeClient`]; tests use
//! in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{AccountInfo, Direction, InstrumentInfo, PriceBar, Tick};
use crate::error::Result;

/// Connection lifecycle. `disconnect` must be safe to call after a failed
/// or partial `connect`.
#[async_trait]
pub trait Session: Send + Sync {
    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self);
}

#[async_trait]
pub trait MarketData: Send + Sync {
    /// Most recent `count` bars, oldest first.
    async fn fetch_bars(&self, instrument: &str, timeframe: &str, count: usize) -> Result<Vec<PriceBar>>;
}

#[async_trait]
pub trait AccountSource: Send + Sync {
    async fn account_info(&self) -> Result<AccountInfo>;
    async fn instrument_info(&self, instrument: &str) -> Result<InstrumentInfo>;
    async fn open_position_count(&self, instrument: &str) -> Result<usize>;
    async fn current_tick(&self, instrument: &str) -> Result<Tick>;
}

/// Market deal request as sent to the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Direction,
    pub volume: f64,
    pub price: f64,
    pub sl: f64,
    pub tp: f64,
    /// Accepted slippage in points.
    pub deviation: u32,
    pub magic: u64,
    pub comment: String,
    pub time_in_force: TimeInForce,
    pub filling: Filling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    GoodTillCancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filling {
    ImmediateOrCancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitReply {
    Success { ticket: u64 },
    Failure { code: u32, message: String },
}

#[async_trait]
pub trait OrderSink: Send + Sync {
    async fn submit(&self, request: &OrderRequest) -> Result<SubmitReply>;
}

/// Everything the controller needs from one platform connection.
pub trait TradingPlatform: Session + MarketData + AccountSource + OrderSink {}

impl<T> TradingPlatform for T where T: Session + MarketData + AccountSource + OrderSink {}
