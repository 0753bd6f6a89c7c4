//! Grid risk control: layer cap, stop-loss, and trailing take-profit
//! (spec §4.1). This module is the pure decision function; `SlotTable::
//! evaluate_risk` calls it each `AdjustOrders` tick and applies the result
//! (force-closing held slots, pausing new buys) against its own state.

use engine_core::GridRiskControl;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskAction {
    None,
    /// Too many concurrently held/paired layers; stop placing new buys.
    LayerCapReached,
    /// Drawdown from average cost exceeded `stop_loss_ratio`; close all and pause.
    StopLoss,
    /// Price retraced from its post-trigger peak by `trailing_take_profit_ratio`; close all.
    TrailingTakeProfitHit,
}

/// Tracks the peak price/pnl-ratio seen since a take-profit trigger fired,
/// so trailing take-profit can compare against a moving reference rather
/// than a fixed level.
#[derive(Debug, Clone, Default)]
pub struct TrailingState {
    triggered: bool,
    peak_price: Decimal,
}

impl TrailingState {
    pub fn reset(&mut self) {
        self.triggered = false;
        self.peak_price = Decimal::ZERO;
    }
}

/// Evaluates grid risk control for one symbol given its current inventory.
///
/// `avg_cost`/`current_price` drive stop-loss; `held_layers` drives the
/// layer cap; `trailing` is mutated in place to track the post-trigger peak.
pub fn evaluate(
    control: &GridRiskControl,
    held_layers: u32,
    avg_cost: Decimal,
    current_price: Decimal,
    trend_is_favorable: bool,
    trailing: &mut TrailingState,
) -> RiskAction {
    if !control.enabled {
        return RiskAction::None;
    }

    if control.max_grid_layers > 0 && held_layers >= control.max_grid_layers {
        return RiskAction::LayerCapReached;
    }

    if avg_cost > Decimal::ZERO {
        let drawdown = (avg_cost - current_price) / avg_cost;
        if control.stop_loss_ratio > Decimal::ZERO && drawdown >= control.stop_loss_ratio {
            return RiskAction::StopLoss;
        }

        let gain = (current_price - avg_cost) / avg_cost;
        if control.take_profit_trigger_ratio > Decimal::ZERO
            && gain >= control.take_profit_trigger_ratio
        {
            if !trailing.triggered || current_price > trailing.peak_price {
                trailing.triggered = true;
                trailing.peak_price = current_price;
            }
        }

        if trailing.triggered && control.trailing_take_profit_ratio > Decimal::ZERO {
            let retrace = (trailing.peak_price - current_price) / trailing.peak_price;
            if retrace >= control.trailing_take_profit_ratio {
                return RiskAction::TrailingTakeProfitHit;
            }
        }
    }

    if control.trend_filter_enabled && !trend_is_favorable {
        // trend filter only suppresses new entries; grid::adjust_orders
        // itself checks this flag via the strategy host, not a RiskAction.
    }

    RiskAction::None
}
