use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{Direction, OrderIntent, Tick};
use crate::error::{Error, Result};
use crate::platform::{Filling, OrderRequest, OrderSink, SubmitReply, TimeInForce};
use crate::risk::{report_decimals, round_to, size_position, RiskParameters, STEP_EPSILON};

/// Stop-loss and take-profit distances as multiples of ATR.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExitLevels {
    pub stop_loss_atr: f64,
    pub take_profit_atr: f64,
}

/// Prices and sizes an order at the current tick.
///
/// Returns `Ok(None)` when the sizer yields no tradable quantity. Stops are
/// snapped to the instrument's point grid away from the entry, so they stay
/// strictly on the loss side.
pub fn plan_order(
    direction: Direction,
    tick: &Tick,
    atr: f64,
    levels: &ExitLevels,
    risk: &RiskParameters,
) -> Result<Option<OrderIntent>> {
    if !atr.is_finite() || atr <= 0.0 {
        return Err(Error::InvalidVolatility(format!("atr = {atr}")));
    }
    risk.instrument().validate()?;

    let entry = tick.entry_price(direction);
    let sl_dist = levels.stop_loss_atr * atr;
    let tp_dist = levels.take_profit_atr * atr;
    let point = risk.point;
    let digits = report_decimals(point);

    let (sl, tp) = match direction {
        Direction::Long => (
            ((entry - sl_dist) / point + STEP_EPSILON).floor() * point,
            ((entry + tp_dist) / point).round() * point,
        ),
        Direction::Short => (
            ((entry + sl_dist) / point - STEP_EPSILON).ceil() * point,
            ((entry - tp_dist) / point).round() * point,
        ),
    };
    let sl = round_to(sl, digits);
    let tp = round_to(tp, digits);

    let quantity = size_position(entry, sl, risk)?;
    if quantity <= 0.0 {
        return Ok(None);
    }

    OrderIntent::new(direction, quantity, entry, sl, tp).map(Some)
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub symbol: String,
    pub deviation: u32,
    pub magic: u64,
    pub comment: String,
    /// Paper mode: log the request, never send it.
    pub simulate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Simulated(OrderRequest),
    Filled { ticket: u64 },
}

pub struct Dispatcher<S: ?Sized> {
    sink: Arc<S>,
    settings: DispatchSettings,
}

impl<S: OrderSink + ?Sized> Dispatcher<S> {
    pub fn new(sink: Arc<S>, settings: DispatchSettings) -> Self {
        Self { sink, settings }
    }

    pub fn request_for(&self, intent: &OrderIntent) -> OrderRequest {
        OrderRequest {
            symbol: self.settings.symbol.clone(),
            side: intent.direction(),
            volume: intent.quantity(),
            price: intent.entry_price(),
            sl: intent.stop_loss_price(),
            tp: intent.take_profit_price(),
            deviation: self.settings.deviation,
            magic: self.settings.magic,
            comment: self.settings.comment.clone(),
            time_in_force: TimeInForce::GoodTillCancelled,
            filling: Filling::ImmediateOrCancel,
        }
    }

    /// Sends (or simulates) the intent. A rejected order comes back as
    /// [`Error::DispatchFailure`] carrying the platform's code.
    pub async fn dispatch(&self, intent: OrderIntent) -> Result<DispatchOutcome> {
        let request = self.request_for(&intent);

        if self.settings.simulate {
            info!(
                symbol = %request.symbol,
                side = request.side.as_str(),
                volume = request.volume,
                price = request.price,
                sl = request.sl,
                tp = request.tp,
                "dispatch.simulated"
            );
            return Ok(DispatchOutcome::Simulated(request));
        }

        info!(?request, "dispatch.submit");
        match self.sink.submit(&request).await? {
            SubmitReply::Success { ticket } => {
                info!(ticket, volume = request.volume, price = request.price, "dispatch.filled");
                Ok(DispatchOutcome::Filled { ticket })
            }
            SubmitReply::Failure { code, message } => {
                warn!(code, %message, "dispatch.rejected");
                Err(Error::DispatchFailure { code, message })
            }
        }
    }
}
