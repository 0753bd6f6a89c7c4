//! The strategy contract (spec §4.2).
//!
//! Direct descendant of the teacher's "legacy" dyn-dispatch `Strategy`
//! trait (`bog-core/src/strategy/mod.rs`): `on_update` is renamed
//! `on_price_change`, `on_fill` becomes the fuller `on_order_update`, and
//! the whole thing is made `async_trait` because strategies call through
//! to the async Order Executor and Capital Allocator from inside these
//! callbacks (the teacher's own version predates any async execution path
//! and so stayed synchronous). The host fans out ticks/updates to every
//! enabled strategy and never inspects strategy internals.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use engine_core::{Order, OrderId, OrderStatus, Position};
use rust_decimal::Decimal;

use engine_execution::EventBus;
use engine_grid::OrderSink;

const RETURNS_WINDOW: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyState {
    Running,
    Paused,
    Stopped,
}

/// Running statistics, extended from the teacher's
/// `signals_generated`/`fills_received`/`total_buy_volume`/`total_sell_volume`
/// with the fields the Capital Allocator's scoring needs.
#[derive(Debug, Clone, Default)]
pub struct StrategyStats {
    pub signals_generated: u64,
    pub fills_received: u64,
    pub total_buy_volume: Decimal,
    pub total_sell_volume: Decimal,
    pub realized_pnl: Decimal,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub max_drawdown: Decimal,
    peak_pnl: Decimal,
    recent_returns: VecDeque<Decimal>,
}

impl StrategyStats {
    pub fn win_rate(&self) -> Decimal {
        let total = self.winning_trades + self.losing_trades;
        if total == 0 {
            return Decimal::ZERO;
        }
        Decimal::from(self.winning_trades) / Decimal::from(total)
    }

    /// Books one closed trade's PnL: updates realized PnL, the win/loss
    /// counters, drawdown-from-peak, and the bounded return ring buffer.
    pub fn record_trade(&mut self, pnl: Decimal) {
        self.realized_pnl += pnl;
        if pnl >= Decimal::ZERO {
            self.winning_trades += 1;
        } else {
            self.losing_trades += 1;
        }
        if self.realized_pnl > self.peak_pnl {
            self.peak_pnl = self.realized_pnl;
        }
        let drawdown = self.peak_pnl - self.realized_pnl;
        if drawdown > self.max_drawdown {
            self.max_drawdown = drawdown;
        }
        if self.recent_returns.len() == RETURNS_WINDOW {
            self.recent_returns.pop_front();
        }
        self.recent_returns.push_back(pnl);
    }

    /// Mean-over-stdev of the bounded return window; `None` until at least
    /// two returns are available or the window has zero variance.
    pub fn sharpe_estimate(&self) -> Option<f64> {
        let n = self.recent_returns.len();
        if n < 2 {
            return None;
        }
        let vals: Vec<f64> = self.recent_returns.iter().map(|d| d.to_string().parse().unwrap_or(0.0)).collect();
        let mean = vals.iter().sum::<f64>() / n as f64;
        let variance = vals.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        if variance <= 0.0 {
            return None;
        }
        Some(mean / variance.sqrt())
    }
}

/// Everything a strategy needs from its host to act: where to submit
/// orders, which exchange it's trading on, and (optionally) where to
/// publish events. Bundled so `initialize` doesn't grow a new parameter
/// every time the host gains another shared collaborator.
#[derive(Clone)]
pub struct StrategyContext {
    pub executor: Arc<dyn OrderSink>,
    pub exchange: String,
    pub symbol: String,
    pub event_bus: Option<EventBus>,
}

#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    async fn initialize(&mut self, ctx: StrategyContext) -> anyhow::Result<()>;

    fn start(&mut self);
    fn stop(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    fn state(&self) -> StrategyState;

    async fn on_price_change(&mut self, price: Decimal) -> anyhow::Result<()>;

    async fn on_order_update(
        &mut self,
        order_id: &OrderId,
        status: OrderStatus,
        filled_qty: Decimal,
        fill_price: Decimal,
    ) -> anyhow::Result<()>;

    fn get_positions(&self) -> Vec<Position> {
        Vec::new()
    }

    fn get_orders(&self) -> Vec<Order> {
        Vec::new()
    }

    fn get_statistics(&self) -> StrategyStats {
        StrategyStats::default()
    }
}
