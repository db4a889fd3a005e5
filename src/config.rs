use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::engine::{DispatchSettings, ExitLevels};
use crate::error::Error;
use crate::gate::GateLimits;
use crate::strategy::{CrossoverParams, IndicatorParams};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // Platform bridge
    pub bridge_url: String,

    // Instrument
    pub symbol: String,
    pub timeframe: String,
    pub history_bars: usize,

    // Indicators
    pub fast_period: usize,
    pub slow_period: usize,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub atr_period: usize,

    // Exits and risk
    pub atr_sl_mult: f64,
    pub atr_tp_mult: f64,
    pub risk_fraction: f64,
    pub max_positions: usize,
    pub min_seconds_between_trades: u64,

    // Execution
    pub slippage_points: u32,
    pub strategy_label: String,
    pub magic: u64,
    pub dry_run: bool,

    // Loop pacing
    pub idle_delay_secs: u64,
    pub throttle_delay_secs: u64,

    // Logging
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bridge_url: "http://127.0.0.1:8228".to_string(),
            symbol: "EURUSD".to_string(),
            timeframe: "M15".to_string(),
            history_bars: 500,
            fast_period: 12,
            slow_period: 26,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            atr_period: 14,
            atr_sl_mult: 1.5,
            atr_tp_mult: 3.0,
            risk_fraction: 0.01,
            max_positions: 1,
            min_seconds_between_trades: 60,
            slippage_points: 10,
            strategy_label: "atomic-ema-rsi".to_string(),
            magic: 240_501,
            dry_run: true,
            idle_delay_secs: 10,
            throttle_delay_secs: 5,
            log_json: false,
        }
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().map(|s| s.trim().to_lowercase()) {
        None => default,
        Some(v) if v.is_empty() => default,
        Some(v) if v == "1" || v == "true" || v == "yes" || v == "y" || v == "on" => true,
        Some(v) if v == "0" || v == "false" || v == "no" || v == "n" || v == "off" => false,
        Some(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|x| x.trim().parse().ok())
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let d = Self::default();

        let cfg = Self {
            bridge_url: env_string("ATOMIC_BRIDGE_URL", &d.bridge_url),

            symbol: env_string("ATOMIC_SYMBOL", &d.symbol),
            timeframe: env_string("ATOMIC_TIMEFRAME", &d.timeframe),
            history_bars: env_parse("ATOMIC_HISTORY_BARS").unwrap_or(d.history_bars),

            fast_period: env_parse("ATOMIC_FAST_PERIOD").unwrap_or(d.fast_period),
            slow_period: env_parse("ATOMIC_SLOW_PERIOD").unwrap_or(d.slow_period),
            rsi_period: env_parse("ATOMIC_RSI_PERIOD").unwrap_or(d.rsi_period),
            rsi_overbought: env_parse("ATOMIC_RSI_OVERBOUGHT").unwrap_or(d.rsi_overbought),
            rsi_oversold: env_parse("ATOMIC_RSI_OVERSOLD").unwrap_or(d.rsi_oversold),
            atr_period: env_parse("ATOMIC_ATR_PERIOD").unwrap_or(d.atr_period),

            atr_sl_mult: env_parse("ATOMIC_ATR_SL_MULT").unwrap_or(d.atr_sl_mult),
            atr_tp_mult: env_parse("ATOMIC_ATR_TP_MULT").unwrap_or(d.atr_tp_mult),
            risk_fraction: env_parse("ATOMIC_RISK_FRACTION").unwrap_or(d.risk_fraction),
            max_positions: env_parse("ATOMIC_MAX_POSITIONS").unwrap_or(d.max_positions),
            min_seconds_between_trades: env_parse("ATOMIC_MIN_SECONDS_BETWEEN_TRADES")
                .unwrap_or(d.min_seconds_between_trades),

            slippage_points: env_parse("ATOMIC_SLIPPAGE_POINTS").unwrap_or(d.slippage_points),
            strategy_label: env_string("ATOMIC_STRATEGY_LABEL", &d.strategy_label),
            magic: env_parse("ATOMIC_MAGIC").unwrap_or(d.magic),
            dry_run: env_bool("DRY_RUN", d.dry_run),

            idle_delay_secs: env_parse("ATOMIC_IDLE_DELAY_SECS").unwrap_or(d.idle_delay_secs),
            throttle_delay_secs: env_parse("ATOMIC_THROTTLE_DELAY_SECS").unwrap_or(d.throttle_delay_secs),

            log_json: Self::log_json_from_env(),
        };

        cfg.validate()?;
        Ok(cfg)
    }

    /// Output format switch, readable before the rest of the config so that
    /// the subscriber is up when loading fails.
    pub fn log_json_from_env() -> bool {
        env_bool("ATOMIC_LOG_JSON", Self::default().log_json)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |msg: String| -> Result<(), Error> { Err(Error::Config(msg)) };

        if self.symbol.trim().is_empty() {
            return invalid("symbol cannot be empty".into());
        }
        let ind = self.indicator_params();
        if ind.fast_period == 0 || ind.slow_period == 0 || ind.momentum_period == 0 || ind.volatility_period == 0 {
            return invalid(format!("indicator periods must be positive: {ind:?}"));
        }
        if self.fast_period >= self.slow_period {
            return invalid(format!(
                "fast period ({}) must be shorter than slow period ({})",
                self.fast_period, self.slow_period
            ));
        }
        if !(0.0..=100.0).contains(&self.rsi_oversold)
            || !(0.0..=100.0).contains(&self.rsi_overbought)
            || self.rsi_oversold >= self.rsi_overbought
        {
            return invalid(format!(
                "rsi thresholds must satisfy 0 <= oversold ({}) < overbought ({}) <= 100",
                self.rsi_oversold, self.rsi_overbought
            ));
        }
        if !(self.atr_sl_mult > 0.0) || !(self.atr_tp_mult > 0.0) {
            return invalid("ATR stop-loss and take-profit multiples must be positive".into());
        }
        if !(self.risk_fraction > 0.0 && self.risk_fraction <= 1.0) {
            return invalid(format!("risk fraction {} must be in (0, 1]", self.risk_fraction));
        }
        if self.max_positions == 0 {
            return invalid("max positions must be at least 1".into());
        }
        let cooldown = i64::try_from(self.min_seconds_between_trades)
            .ok()
            .and_then(chrono::Duration::try_seconds);
        if cooldown.is_none() {
            return invalid(format!(
                "min seconds between trades ({}) is out of range",
                self.min_seconds_between_trades
            ));
        }

        let need = ind.warmup_bars();
        if self.history_bars < need {
            return Err(Error::InsufficientHistory { have: self.history_bars, need });
        }
        Ok(())
    }

    pub fn indicator_params(&self) -> IndicatorParams {
        IndicatorParams {
            fast_period: self.fast_period,
            slow_period: self.slow_period,
            momentum_period: self.rsi_period,
            volatility_period: self.atr_period,
        }
    }

    pub fn crossover_params(&self) -> CrossoverParams {
        CrossoverParams {
            overbought: self.rsi_overbought,
            oversold: self.rsi_oversold,
        }
    }

    pub fn exit_levels(&self) -> ExitLevels {
        ExitLevels {
            stop_loss_atr: self.atr_sl_mult,
            take_profit_atr: self.atr_tp_mult,
        }
    }

    pub fn gate_limits(&self) -> GateLimits {
        GateLimits {
            min_seconds_between_trades: self.min_seconds_between_trades,
            max_positions: self.max_positions,
        }
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            symbol: self.symbol.clone(),
            deviation: self.slippage_points,
            magic: self.magic,
            comment: self.strategy_label.clone(),
            simulate: self.dry_run,
        }
    }

    pub fn idle_delay(&self) -> Duration {
        Duration::from_secs(self.idle_delay_secs)
    }

    pub fn throttle_delay(&self) -> Duration {
        Duration::from_secs(self.throttle_delay_secs)
    }
}
