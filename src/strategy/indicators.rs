//! Indicator engine: EMA trend pair, Wilder RSI and Wilder ATR computed over
//! an ordered bar history.

use crate::domain::{IndicatorSnapshot, PriceBar};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub momentum_period: usize,
    pub volatility_period: usize,
}

impl IndicatorParams {
    /// Bars needed so that the last two snapshots are fully defined.
    pub fn warmup_bars(&self) -> usize {
        self.slow_period
            .max(self.momentum_period)
            .max(self.volatility_period)
            + 2
    }
}

/// Computes one snapshot per bar.
///
/// Fails with [`Error::InsufficientHistory`] rather than returning a series
/// whose last two entries still sit inside a warm-up window.
pub fn compute_snapshots(bars: &[PriceBar], params: &IndicatorParams) -> Result<Vec<IndicatorSnapshot>> {
    if params.fast_period == 0
        || params.slow_period == 0
        || params.momentum_period == 0
        || params.volatility_period == 0
    {
        return Err(Error::Config(format!("indicator periods must be positive: {params:?}")));
    }

    let need = params.warmup_bars();
    if bars.len() < need {
        return Err(Error::InsufficientHistory { have: bars.len(), need });
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let fast = ema(&closes, params.fast_period);
    let slow = ema(&closes, params.slow_period);
    let momentum = rsi_wilder(&closes, params.momentum_period);
    let volatility = atr_wilder(bars, params.volatility_period);

    Ok((0..bars.len())
        .map(|i| IndicatorSnapshot {
            fast_avg: fast[i],
            slow_avg: slow[i],
            momentum: momentum[i],
            volatility: volatility[i],
        })
        .collect())
}

/// EMA seeded with the first close: `ema[i] = close[i]*k + ema[i-1]*(1-k)`.
pub fn ema(closes: &[f64], period: usize) -> Vec<f64> {
    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(closes.len());
    let mut prev: Option<f64> = None;
    for &close in closes {
        let value = match prev {
            None => close,
            Some(p) => close * k + p * (1.0 - k),
        };
        out.push(value);
        prev = Some(value);
    }
    out
}

/// RSI (Wilder) over close prices. The first `period` entries are `None`.
pub fn rsi_wilder(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period + 1 {
        return out;
    }

    let mut gain = 0.0;
    let mut loss = 0.0;
    for i in 1..=period {
        let diff = closes[i] - closes[i - 1];
        if diff >= 0.0 {
            gain += diff;
        } else {
            loss -= diff;
        }
    }

    let n = period as f64;
    let mut avg_gain = gain / n;
    let mut avg_loss = loss / n;
    out[period] = Some(relative_strength(avg_gain, avg_loss));

    for i in (period + 1)..closes.len() {
        let diff = closes[i] - closes[i - 1];
        let (g, l) = if diff >= 0.0 { (diff, 0.0) } else { (0.0, -diff) };
        avg_gain = (avg_gain * (n - 1.0) + g) / n;
        avg_loss = (avg_loss * (n - 1.0) + l) / n;
        out[i] = Some(relative_strength(avg_gain, avg_loss));
    }
    out
}

fn relative_strength(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        // flat window: neither side dominates
        return if avg_gain == 0.0 { 50.0 } else { 100.0 };
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// ATR with Wilder smoothing, seeded with the first true range. The first
/// entry is `None` since it has no previous close.
pub fn atr_wilder(bars: &[PriceBar], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; bars.len()];
    if period == 0 {
        return out;
    }

    let n = period as f64;
    let mut atr: Option<f64> = None;
    for i in 1..bars.len() {
        let tr = true_range(&bars[i], bars[i - 1].close);
        let next = match atr {
            None => tr,
            Some(prev) => (prev * (n - 1.0) + tr) / n,
        };
        atr = Some(next);
        out[i] = atr;
    }
    out
}

fn true_range(bar: &PriceBar, prev_close: f64) -> f64 {
    (bar.high - bar.low)
        .max((bar.high - prev_close).abs())
        .max((bar.low - prev_close).abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{TimeZone, Utc};

    fn bar(i: i64, high: f64, low: f64, close: f64) -> PriceBar {
        PriceBar {
            timestamp: Utc.timestamp_opt(1_700_000_000 + i * 900, 0).unwrap(),
            open: close,
            high,
            low,
            close,
        }
    }

    fn flat_bars(closes: &[f64]) -> Vec<PriceBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| bar(i as i64, c, c, c))
            .collect()
    }

    fn params() -> IndicatorParams {
        IndicatorParams {
            fast_period: 3,
            slow_period: 5,
            momentum_period: 4,
            volatility_period: 3,
        }
    }

    #[test]
    fn ema_seed_is_first_close() {
        let out = ema(&[10.0, 20.0, 30.0], 3);
        let k = 0.5;
        assert_relative_eq!(out[0], 10.0);
        assert_relative_eq!(out[1], 20.0 * k + 10.0 * (1.0 - k));
        assert_relative_eq!(out[2], 30.0 * k + out[1] * (1.0 - k));
    }

    #[test]
    fn ema_constant_series() {
        for v in ema(&[100.0; 8], 4) {
            assert_relative_eq!(v, 100.0);
        }
    }

    #[test]
    fn rsi_warmup_is_undefined() {
        let out = rsi_wilder(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 4);
        assert!(out[..4].iter().all(Option::is_none));
        assert!(out[4].is_some());
        assert!(out[5].is_some());
    }

    #[test]
    fn rsi_wilder_values() {
        let out = rsi_wilder(&[1.0, 2.0, 1.0, 2.0, 1.0], 2);
        assert_relative_eq!(out[2].unwrap(), 50.0);
        assert_relative_eq!(out[3].unwrap(), 75.0);
        assert_relative_eq!(out[4].unwrap(), 37.5);
    }

    #[test]
    fn rsi_extremes() {
        let rising = rsi_wilder(&[1.0, 2.0, 3.0, 4.0], 2);
        assert_relative_eq!(rising[3].unwrap(), 100.0);

        let falling = rsi_wilder(&[4.0, 3.0, 2.0, 1.0], 2);
        assert_relative_eq!(falling[3].unwrap(), 0.0);

        let flat = rsi_wilder(&[2.0; 4], 2);
        assert_relative_eq!(flat[3].unwrap(), 50.0);
    }

    #[test]
    fn atr_wilder_values() {
        let bars = vec![
            bar(0, 11.0, 9.0, 10.0),
            bar(1, 12.0, 10.0, 11.0),
            bar(2, 15.0, 11.0, 14.0),
            // gap down: true range reaches back to the previous close
            bar(3, 9.0, 8.0, 8.5),
        ];
        let out = atr_wilder(&bars, 2);
        assert!(out[0].is_none());
        assert_relative_eq!(out[1].unwrap(), 2.0);
        assert_relative_eq!(out[2].unwrap(), 3.0);
        assert_relative_eq!(out[3].unwrap(), 4.5);
    }

    #[test]
    fn snapshots_are_parallel_to_bars() {
        let closes: Vec<f64> = (0..10).map(|i| 1.0 + i as f64 * 0.01).collect();
        let bars = flat_bars(&closes);
        let snaps = compute_snapshots(&bars, &params()).unwrap();
        assert_eq!(snaps.len(), bars.len());
        assert!(snaps[0].volatility.is_none());
        assert!(snaps[3].momentum.is_none());
        let last = snaps.last().unwrap();
        assert!(last.momentum.is_some());
        assert!(last.volatility.is_some());
    }

    #[test]
    fn short_history_is_rejected() {
        let p = params();
        assert_eq!(p.warmup_bars(), 7);
        let bars = flat_bars(&[1.0; 6]);
        assert_eq!(
            compute_snapshots(&bars, &p),
            Err(Error::InsufficientHistory { have: 6, need: 7 })
        );
        assert!(compute_snapshots(&[], &p).is_err());
    }

    #[test]
    fn zero_period_is_a_config_error() {
        let p = IndicatorParams { momentum_period: 0, ..params() };
        let bars = flat_bars(&[1.0; 10]);
        assert!(matches!(compute_snapshots(&bars, &p), Err(Error::Config(_))));
    }
}
