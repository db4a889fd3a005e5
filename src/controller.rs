//! The polling loop: one decision cycle at a time, then a fixed pause.
//!
//! Collaborator calls carry no timeout of their own here. A call that never
//! returns stalls the loop until the shutdown token fires; whatever timeout
//! the platform connection enforces is the only other way out.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::domain::{ensure_chronological, Direction, IndicatorSnapshot, OrderIntent};
use crate::engine::{plan_order, DispatchOutcome, Dispatcher};
use crate::error::{Error, Result};
use crate::gate::{self, DenyReason, GateDecision};
use crate::platform::TradingPlatform;
use crate::risk::RiskParameters;
use crate::state::ThrottleState;
use crate::strategy::{compute_snapshots, latest_signal, Signal};
use crate::time::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Fetching,
    Deciding,
    Gating,
    Dispatching,
    Sleeping,
    Terminated,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    NoSignal,
    Denied(DenyReason),
    /// Recoverable error before an order was built.
    Skipped(Error),
    QuantityZero,
    Dispatched(DispatchOutcome),
    DispatchFailed(Error),
}

impl CycleOutcome {
    /// Denials and skips retry sooner than cycles that ran to completion.
    pub fn is_throttled(&self) -> bool {
        matches!(
            self,
            CycleOutcome::Denied(_) | CycleOutcome::Skipped(_) | CycleOutcome::QuantityZero
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub signal: Option<Signal>,
    pub outcome: CycleOutcome,
    pub delay: Duration,
}

pub struct Controller<P, C> {
    cfg: Config,
    platform: Arc<P>,
    clock: Arc<C>,
    dispatcher: Dispatcher<P>,
    throttle: ThrottleState,
    phase: Phase,
}

impl<P: TradingPlatform, C: Clock> Controller<P, C> {
    pub fn new(cfg: Config, platform: Arc<P>, clock: Arc<C>) -> Self {
        let dispatcher = Dispatcher::new(platform.clone(), cfg.dispatch_settings());
        Self {
            cfg,
            platform,
            clock,
            dispatcher,
            throttle: ThrottleState::new(),
            phase: Phase::Idle,
        }
    }

    /// Starts from a given throttle state instead of an empty one.
    pub fn with_throttle(mut self, throttle: ThrottleState) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn throttle(&self) -> ThrottleState {
        self.throttle
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn enter(&mut self, next: Phase) {
        debug!(from = ?self.phase, to = ?next, "controller.phase");
        self.phase = next;
    }

    fn report(&self, signal: Option<Signal>, outcome: CycleOutcome) -> CycleReport {
        let delay = if outcome.is_throttled() {
            self.cfg.throttle_delay()
        } else {
            self.cfg.idle_delay()
        };
        CycleReport { signal, outcome, delay }
    }

    /// Connects, checks the instrument, then cycles until `shutdown` fires
    /// or a fatal error occurs. The connection is released on every exit
    /// path. Returns the final throttle state.
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<ThrottleState> {
        info!(
            symbol = %self.cfg.symbol,
            timeframe = %self.cfg.timeframe,
            dry_run = self.cfg.dry_run,
            "controller.start"
        );

        let started = tokio::select! {
            biased;
            _ = shutdown.cancelled() => Ok(()),
            r = self.startup() => r,
        };
        let result = match started {
            Ok(()) => self.cycle_until(&shutdown).await,
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            error!(error = %e, "controller.fatal");
        }

        self.enter(Phase::Terminated);
        self.platform.disconnect().await;
        info!("controller.stopped");
        result.map(|()| self.throttle)
    }

    async fn startup(&mut self) -> Result<()> {
        self.platform.connect().await?;
        let instrument = self.platform.instrument_info(&self.cfg.symbol).await?;
        instrument.validate()?;
        info!(symbol = %self.cfg.symbol, ?instrument, "controller.instrument");
        Ok(())
    }

    async fn cycle_until(&mut self, shutdown: &CancellationToken) -> Result<()> {
        loop {
            if shutdown.is_cancelled() {
                return Ok(());
            }

            let report = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(()),
                r = self.run_cycle() => r?,
            };
            info!(
                signal = ?report.signal,
                outcome = ?report.outcome,
                delay_secs = report.delay.as_secs(),
                "controller.cycle"
            );

            self.enter(Phase::Sleeping);
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(()),
                _ = tokio::time::sleep(report.delay) => {}
            }
        }
    }

    /// Runs one fetch → decide → gate → dispatch pass. Recoverable problems
    /// end up in the report; only fatal ones are returned as errors.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.enter(Phase::Idle);
        self.enter(Phase::Fetching);
        let snapshots = match self.fetch_snapshots().await {
            Ok(s) => s,
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "controller.data_unavailable");
                return Ok(self.report(None, CycleOutcome::Skipped(e)));
            }
            Err(e) => return Err(e),
        };
        let Some(current) = snapshots.last().copied() else {
            return Err(Error::InsufficientHistory { have: 0, need: self.cfg.indicator_params().warmup_bars() });
        };

        self.enter(Phase::Deciding);
        let signal = latest_signal(&snapshots, &self.cfg.crossover_params());
        info!(
            ?signal,
            fast = current.fast_avg,
            slow = current.slow_avg,
            rsi = ?current.momentum,
            atr = ?current.volatility,
            "controller.signal"
        );

        self.enter(Phase::Gating);
        let open = match self.platform.open_position_count(&self.cfg.symbol).await {
            Ok(n) => n,
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "controller.positions_unavailable");
                return Ok(self.report(Some(signal), CycleOutcome::Skipped(e)));
            }
            Err(e) => return Err(e),
        };
        let now = self.clock.now();
        if let GateDecision::Deny(reason) = gate::evaluate(&self.throttle, open, &self.cfg.gate_limits(), now) {
            info!(
                %reason,
                open,
                since_last_secs = ?self.throttle.seconds_since_last(now),
                "controller.denied"
            );
            return Ok(self.report(Some(signal), CycleOutcome::Denied(reason)));
        }

        let Some(direction) = signal.direction() else {
            return Ok(self.report(Some(signal), CycleOutcome::NoSignal));
        };
        let Some(atr) = valid_volatility(&current) else {
            warn!(atr = ?current.volatility, reason = %DenyReason::InvalidVolatility, "controller.denied");
            return Ok(self.report(Some(signal), CycleOutcome::Denied(DenyReason::InvalidVolatility)));
        };

        let intent = match self.plan(direction, atr).await {
            Ok(Some(intent)) => intent,
            Ok(None) => {
                warn!(?direction, "controller.quantity_zero");
                return Ok(self.report(Some(signal), CycleOutcome::QuantityZero));
            }
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "controller.skip");
                return Ok(self.report(Some(signal), CycleOutcome::Skipped(e)));
            }
            Err(e) => return Err(e),
        };

        self.enter(Phase::Dispatching);
        let result = self.dispatcher.dispatch(intent).await;
        // failed and successful attempts throttle alike
        self.throttle = self.throttle.after_attempt(self.clock.now());

        let outcome = match result {
            Ok(o) => CycleOutcome::Dispatched(o),
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "controller.dispatch_failed");
                CycleOutcome::DispatchFailed(e)
            }
            Err(e) => return Err(e),
        };
        Ok(self.report(Some(signal), outcome))
    }

    async fn fetch_snapshots(&self) -> Result<Vec<IndicatorSnapshot>> {
        let bars = self
            .platform
            .fetch_bars(&self.cfg.symbol, &self.cfg.timeframe, self.cfg.history_bars)
            .await?;
        ensure_chronological(&bars)?;
        compute_snapshots(&bars, &self.cfg.indicator_params())
    }

    async fn plan(&self, direction: Direction, atr: f64) -> Result<Option<OrderIntent>> {
        let symbol = &self.cfg.symbol;
        let account = self.platform.account_info().await?;
        let instrument = self.platform.instrument_info(symbol).await?;
        let tick = self.platform.current_tick(symbol).await?;

        let risk = RiskParameters::new(&account, &instrument, self.cfg.risk_fraction);
        plan_order(direction, &tick, atr, &self.cfg.exit_levels(), &risk)
    }
}

fn valid_volatility(snapshot: &IndicatorSnapshot) -> Option<f64> {
    snapshot.volatility.filter(|v| v.is_finite() && *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttled_outcomes() {
        assert!(CycleOutcome::Denied(DenyReason::InvalidVolatility).is_throttled());
        assert!(CycleOutcome::Skipped(Error::DataUnavailable("x".into())).is_throttled());
        assert!(CycleOutcome::QuantityZero.is_throttled());
        assert!(!CycleOutcome::NoSignal.is_throttled());
        assert!(!CycleOutcome::DispatchFailed(Error::DispatchFailure { code: 1, message: String::new() })
            .is_throttled());
    }

    #[test]
    fn volatility_must_be_positive_and_defined() {
        let snap = |v| IndicatorSnapshot { volatility: v, ..Default::default() };
        assert_eq!(valid_volatility(&snap(Some(0.002))), Some(0.002));
        assert_eq!(valid_volatility(&snap(Some(0.0))), None);
        assert_eq!(valid_volatility(&snap(Some(f64::NAN))), None);
        assert_eq!(valid_volatility(&snap(None)), None);
    }
}
