//! `GridStrategy` (spec §4.2): a thin adapter forwarding ticks and order
//! updates into the SPM actor. All grid state and risk logic lives in
//! `engine-grid`; this strategy only tracks the running `StrategyStats` the
//! Capital Allocator's scoring reads, plus the `SpmHandle` to talk to the
//! actor.

use async_trait::async_trait;
use engine_core::{OrderId, OrderStatus};
use rust_decimal::Decimal;
use engine_grid::SpmHandle;

use crate::traits::{Strategy, StrategyContext, StrategyState, StrategyStats};

pub struct GridStrategy {
    name: String,
    spm: SpmHandle,
    state: StrategyState,
    exchange: String,
    stats: StrategyStats,
}

impl GridStrategy {
    pub fn new(name: String, spm: SpmHandle) -> Self {
        Self { name, spm, state: StrategyState::Running, exchange: String::new(), stats: StrategyStats::default() }
    }
}

#[async_trait]
impl Strategy for GridStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&mut self, ctx: StrategyContext) -> anyhow::Result<()> {
        self.exchange = ctx.exchange;
        Ok(())
    }

    fn start(&mut self) {
        self.state = StrategyState::Running;
    }

    fn stop(&mut self) {
        self.state = StrategyState::Stopped;
    }

    fn pause(&mut self) {
        if self.state != StrategyState::Stopped {
            self.state = StrategyState::Paused;
        }
    }

    fn resume(&mut self) {
        if self.state != StrategyState::Stopped {
            self.state = StrategyState::Running;
        }
    }

    fn state(&self) -> StrategyState {
        self.state
    }

    /// Pause silently drops ticks rather than cancelling open orders
    /// (spec §4.2): resuming later picks up exactly where the SPM left off.
    async fn on_price_change(&mut self, price: Decimal) -> anyhow::Result<()> {
        if self.state != StrategyState::Running {
            return Ok(());
        }
        self.spm.send_adjust_orders(price);
        Ok(())
    }

    async fn on_order_update(
        &mut self,
        order_id: &OrderId,
        status: OrderStatus,
        filled_qty: Decimal,
        fill_price: Decimal,
    ) -> anyhow::Result<()> {
        let trades = self
            .spm
            .on_order_update(order_id.clone(), status, filled_qty, fill_price, self.exchange.clone())
            .await?;
        self.stats.fills_received += 1;
        for trade in trades {
            self.stats.record_trade(trade.realized_pnl);
            self.stats.total_buy_volume += trade.quantity;
            self.stats.total_sell_volume += trade.quantity;
        }
        Ok(())
    }

    fn get_statistics(&self) -> StrategyStats {
        self.stats.clone()
    }
}
