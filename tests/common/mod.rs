#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use atomic_trader::config::Config;
use atomic_trader::domain::{AccountInfo, InstrumentInfo, PriceBar, Tick};
use atomic_trader::error::{Error, Result};
use atomic_trader::platform::{AccountSource, MarketData, OrderRequest, OrderSink, Session, SubmitReply};

/// Closes that end in a fast/slow EMA cross up on the last bar with RSI(4)
/// just under 70 (fast 3, slow 6).
pub const CROSS_UP: [f64; 12] = [
    1.1000, 1.0990, 1.0995, 1.0980, 1.0985, 1.0970, 1.0975, 1.0960, 1.0965, 1.0950, 1.0955, 1.0990,
];

/// Mirror image: cross down on the last bar with RSI(4) just above 30.
pub const CROSS_DOWN: [f64; 12] = [
    1.0900, 1.0910, 1.0905, 1.0920, 1.0915, 1.0930, 1.0925, 1.0940, 1.0935, 1.0950, 1.0945, 1.0910,
];

/// Steady climb, no cross on the last bar.
pub const TRENDING: [f64; 12] = [
    1.0900, 1.0905, 1.0910, 1.0915, 1.0920, 1.0925, 1.0930, 1.0935, 1.0940, 1.0945, 1.0950, 1.0955,
];

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
}

pub fn make_bars(closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            timestamp: t0() + Duration::minutes(15 * i as i64),
            open: close,
            high: close + 0.0005,
            low: close - 0.0005,
            close,
        })
        .collect()
}

pub fn test_config() -> Config {
    Config {
        symbol: "EURUSD".into(),
        timeframe: "M15".into(),
        history_bars: 12,
        fast_period: 3,
        slow_period: 6,
        rsi_period: 4,
        atr_period: 3,
        rsi_overbought: 70.0,
        rsi_oversold: 30.0,
        atr_sl_mult: 1.5,
        atr_tp_mult: 3.0,
        risk_fraction: 0.01,
        max_positions: 1,
        min_seconds_between_trades: 60,
        idle_delay_secs: 10,
        throttle_delay_secs: 5,
        ..Config::default()
    }
}

pub fn eurusd() -> InstrumentInfo {
    InstrumentInfo {
        point: 0.00001,
        contract_size: 100_000.0,
        lot_step: 0.01,
        lot_min: 0.01,
        lot_max: 100.0,
    }
}

pub struct FakeState {
    pub bars: Result<Vec<PriceBar>>,
    pub balance: f64,
    pub instrument: InstrumentInfo,
    pub open_positions: usize,
    pub tick: Tick,
    pub reply: SubmitReply,
    pub submitted: Vec<OrderRequest>,
    pub calls: HashMap<&'static str, usize>,
    pub connected: bool,
    pub disconnected: bool,
    /// Fetches never complete once set.
    pub hang_fetch: bool,
    /// Token to cancel after this many fetches.
    pub cancel_after: Option<(usize, CancellationToken)>,
}

pub struct FakePlatform {
    pub state: Mutex<FakeState>,
}

impl FakePlatform {
    pub fn new(closes: &[f64]) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                bars: Ok(make_bars(closes)),
                balance: 10_000.0,
                instrument: eurusd(),
                open_positions: 0,
                tick: Tick { bid: 1.0990, ask: 1.0992 },
                reply: SubmitReply::Success { ticket: 5001 },
                submitted: vec![],
                calls: HashMap::new(),
                connected: false,
                disconnected: false,
                hang_fetch: false,
                cancel_after: None,
            }),
        })
    }

    pub fn with<F: FnOnce(&mut FakeState)>(self: Arc<Self>, f: F) -> Arc<Self> {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn calls(&self, name: &str) -> usize {
        self.state.lock().unwrap().calls.get(name).copied().unwrap_or(0)
    }

    pub fn submitted(&self) -> Vec<OrderRequest> {
        self.state.lock().unwrap().submitted.clone()
    }

    fn hit(&self, name: &'static str) {
        *self.state.lock().unwrap().calls.entry(name).or_default() += 1;
    }
}

#[async_trait]
impl Session for FakePlatform {
    async fn connect(&self) -> Result<()> {
        self.hit("connect");
        self.state.lock().unwrap().connected = true;
        Ok(())
    }

    async fn disconnect(&self) {
        self.hit("disconnect");
        self.state.lock().unwrap().disconnected = true;
    }
}

#[async_trait]
impl MarketData for FakePlatform {
    async fn fetch_bars(&self, _instrument: &str, _timeframe: &str, _count: usize) -> Result<Vec<PriceBar>> {
        self.hit("fetch_bars");
        let (hang, bars) = {
            let st = self.state.lock().unwrap();
            let fetched = st.calls["fetch_bars"];
            if let Some((after, token)) = &st.cancel_after {
                if fetched >= *after {
                    token.cancel();
                }
            }
            (st.hang_fetch, st.bars.clone())
        };
        if hang {
            std::future::pending::<()>().await;
        }
        bars
    }
}

#[async_trait]
impl AccountSource for FakePlatform {
    async fn account_info(&self) -> Result<AccountInfo> {
        self.hit("account_info");
        Ok(AccountInfo { balance: self.state.lock().unwrap().balance })
    }

    async fn instrument_info(&self, _instrument: &str) -> Result<InstrumentInfo> {
        self.hit("instrument_info");
        Ok(self.state.lock().unwrap().instrument)
    }

    async fn open_position_count(&self, _instrument: &str) -> Result<usize> {
        self.hit("open_position_count");
        Ok(self.state.lock().unwrap().open_positions)
    }

    async fn current_tick(&self, _instrument: &str) -> Result<Tick> {
        self.hit("current_tick");
        Ok(self.state.lock().unwrap().tick)
    }
}

#[async_trait]
impl OrderSink for FakePlatform {
    async fn submit(&self, request: &OrderRequest) -> Result<SubmitReply> {
        self.hit("submit");
        let mut st = self.state.lock().unwrap();
        st.submitted.push(request.clone());
        Ok(st.reply.clone())
    }
}

pub fn unavailable() -> Error {
    Error::DataUnavailable("bridge offline".into())
}
