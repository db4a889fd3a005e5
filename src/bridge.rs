//! HTTP client for the platform bridge: a small JSON service running next
//! to the trading terminal that exposes bars, account data and order entry.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{AccountInfo, InstrumentInfo, PriceBar, Tick};
use crate::error::{Error, Result};
use crate::platform::{AccountSource, MarketData, OrderRequest, OrderSink, Session, SubmitReply};

/// Platform return code for a completed deal request.
pub const RETCODE_DONE: u32 = 10009;

/// Code reported when the request never reached the platform.
pub const RETCODE_TRANSPORT: u32 = 0;

#[derive(Clone)]
pub struct BridgeClient {
    base_url: String,
    http: Client,
}

impl BridgeClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> anyhow::Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()?;
        Ok(resp.json().await?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarRow {
    /// Bar open time, unix seconds.
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl BarRow {
    pub fn into_bar(self) -> anyhow::Result<PriceBar> {
        let timestamp = Utc
            .timestamp_opt(self.time, 0)
            .single()
            .ok_or_else(|| anyhow!("bar time {} out of range", self.time))?;
        Ok(PriceBar {
            timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolRow {
    pub point: f64,
    pub trade_contract_size: f64,
    pub volume_step: f64,
    pub volume_min: f64,
    pub volume_max: f64,
}

impl From<SymbolRow> for InstrumentInfo {
    fn from(row: SymbolRow) -> Self {
        InstrumentInfo {
            point: row.point,
            contract_size: row.trade_contract_size,
            lot_step: row.volume_step,
            lot_min: row.volume_min,
            lot_max: row.volume_max,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReply {
    pub retcode: u32,
    #[serde(default)]
    pub order: u64,
    #[serde(default)]
    pub comment: String,
}

pub fn classify_reply(reply: OrderReply) -> SubmitReply {
    if reply.retcode == RETCODE_DONE {
        SubmitReply::Success { ticket: reply.order }
    } else {
        SubmitReply::Failure {
            code: reply.retcode,
            message: reply.comment,
        }
    }
}

fn unavailable(err: anyhow::Error) -> Error {
    Error::DataUnavailable(format!("{err:#}"))
}

#[async_trait]
impl Session for BridgeClient {
    async fn connect(&self) -> Result<()> {
        let url = format!("{}/session", self.base_url);
        self.http
            .post(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::DataUnavailable(format!("connect to {url}: {e}")))?;
        info!(bridge = %self.base_url, "bridge.connected");
        Ok(())
    }

    async fn disconnect(&self) {
        let url = format!("{}/session", self.base_url);
        match self.http.delete(&url).send().await.and_then(|r| r.error_for_status()) {
            Ok(_) => info!(bridge = %self.base_url, "bridge.disconnected"),
            Err(e) => warn!(bridge = %self.base_url, error = %e, "bridge.disconnect_failed"),
        }
    }
}

#[async_trait]
impl MarketData for BridgeClient {
    async fn fetch_bars(&self, instrument: &str, timeframe: &str, count: usize) -> Result<Vec<PriceBar>> {
        let rows: Vec<BarRow> = self
            .get_json(
                "/bars",
                &[
                    ("symbol", instrument.to_string()),
                    ("timeframe", timeframe.to_string()),
                    ("count", count.to_string()),
                ],
            )
            .await
            .map_err(unavailable)?;
        debug!(instrument, timeframe, rows = rows.len(), "bridge.bars");
        rows.into_iter()
            .map(BarRow::into_bar)
            .collect::<anyhow::Result<Vec<_>>>()
            .map_err(unavailable)
    }
}

#[async_trait]
impl AccountSource for BridgeClient {
    async fn account_info(&self) -> Result<AccountInfo> {
        self.get_json("/account", &[]).await.map_err(unavailable)
    }

    async fn instrument_info(&self, instrument: &str) -> Result<InstrumentInfo> {
        let row: SymbolRow = self
            .get_json(&format!("/symbols/{instrument}"), &[])
            .await
            .map_err(unavailable)?;
        Ok(row.into())
    }

    async fn open_position_count(&self, instrument: &str) -> Result<usize> {
        let positions: Vec<serde_json::Value> = self
            .get_json("/positions", &[("symbol", instrument.to_string())])
            .await
            .map_err(unavailable)?;
        Ok(positions.len())
    }

    async fn current_tick(&self, instrument: &str) -> Result<Tick> {
        self.get_json(&format!("/ticks/{instrument}"), &[])
            .await
            .map_err(unavailable)
    }
}

#[async_trait]
impl OrderSink for BridgeClient {
    async fn submit(&self, request: &OrderRequest) -> Result<SubmitReply> {
        let url = format!("{}/orders", self.base_url);
        let sent = async {
            let resp = self
                .http
                .post(&url)
                .json(request)
                .send()
                .await?
                .error_for_status()?;
            Ok::<OrderReply, reqwest::Error>(resp.json().await?)
        }
        .await;

        match sent {
            Ok(reply) => Ok(classify_reply(reply)),
            Err(e) => Err(Error::DispatchFailure {
                code: RETCODE_TRANSPORT,
                message: format!("POST {url}: {e}"),
            }),
        }
    }
}
