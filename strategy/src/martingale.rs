//! `MartingaleStrategy` (spec §4.2): a doubling ladder with risk-decay,
//! an optional reverse mode, and an optional trend filter gating the
//! initial entry only.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use engine_core::decimal_ext::{round_price_half_even, truncate_quantity};
use engine_core::{ClientOrderId, Order, OrderId, OrderStatus, Side};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use crate::allocator::CapitalAllocator;
use crate::indicators::RollingWindow;
use crate::traits::{Strategy, StrategyContext, StrategyState, StrategyStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MartingaleDirection {
    Long,
    Short,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MartingaleConfig {
    pub direction: MartingaleDirection,
    pub initial_amount: Decimal,
    pub price_step_pct: Decimal,
    pub multiplier: Decimal,
    pub decay_factor: Decimal,
    pub min_multiplier: Decimal,
    pub max_levels: u32,
    #[serde(default)]
    pub reverse_mode: bool,
    pub reverse_multiplier: Decimal,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
    #[serde(default)]
    pub trend_filter: bool,
    #[serde(default = "default_decimals")]
    pub price_decimals: u32,
    #[serde(default = "default_decimals")]
    pub quantity_decimals: u32,
}

fn default_decimals() -> u32 {
    8
}

struct Entry {
    price: Decimal,
    quantity: Decimal,
    cost: Decimal,
    order_id: Option<OrderId>,
}

pub struct MartingaleStrategy {
    name: String,
    cfg: MartingaleConfig,
    state: StrategyState,
    ctx: Option<StrategyContext>,
    allocator: Option<Arc<CapitalAllocator>>,
    entries: Vec<Entry>,
    total_cost: Decimal,
    total_qty: Decimal,
    trend_short: RollingWindow,
    trend_long: RollingWindow,
    nonce: u64,
    stats: StrategyStats,
}

impl MartingaleStrategy {
    pub fn new(name: String, cfg: MartingaleConfig, allocator: Option<Arc<CapitalAllocator>>) -> Self {
        Self {
            name,
            cfg,
            state: StrategyState::Running,
            ctx: None,
            allocator,
            entries: Vec::new(),
            total_cost: Decimal::ZERO,
            total_qty: Decimal::ZERO,
            trend_short: RollingWindow::new(10),
            trend_long: RollingWindow::new(30),
            nonce: 0,
            stats: StrategyStats::default(),
        }
    }

    fn side(&self) -> Side {
        match self.cfg.direction {
            MartingaleDirection::Long => Side::Buy,
            MartingaleDirection::Short => Side::Sell,
        }
    }

    fn avg_entry_price(&self) -> Decimal {
        if self.total_qty.is_zero() {
            return Decimal::ZERO;
        }
        self.total_cost / self.total_qty
    }

    fn aggregate_pnl_pct(&self, price: Decimal) -> Decimal {
        let avg = self.avg_entry_price();
        if avg.is_zero() {
            return Decimal::ZERO;
        }
        let direction = match self.cfg.direction {
            MartingaleDirection::Long => Decimal::ONE,
            MartingaleDirection::Short => -Decimal::ONE,
        };
        direction * (price - avg) / avg * Decimal::from(100)
    }

    fn trend_allows_entry(&self) -> bool {
        if !self.cfg.trend_filter {
            return true;
        }
        match (self.trend_short.sma(10), self.trend_long.sma(30)) {
            (Some(short), Some(long)) => match self.cfg.direction {
                MartingaleDirection::Long => short >= long,
                MartingaleDirection::Short => short <= long,
            },
            _ => true,
        }
    }

    async fn submit(&mut self, price: Decimal, quote_amount: Decimal) -> anyhow::Result<()> {
        let Some(ctx) = self.ctx.clone() else { return Ok(()) };

        if let Some(alloc) = &self.allocator {
            if !alloc.try_reserve(&self.name, quote_amount) {
                warn!(strategy = %self.name, "martingale layer skipped, capital reservation denied");
                return Ok(());
            }
        }

        let rounded_price = round_price_half_even(price, self.cfg.price_decimals);
        let qty = truncate_quantity(quote_amount / rounded_price, self.cfg.quantity_decimals);
        if qty.is_zero() {
            if let Some(alloc) = &self.allocator {
                alloc.release(&self.name, quote_amount);
            }
            return Ok(());
        }

        self.nonce += 1;
        let coid = ClientOrderId::for_nonce(&self.name, &ctx.symbol, self.nonce);
        let order = Order {
            order_id: None,
            client_order_id: coid.clone(),
            symbol: ctx.symbol.clone(),
            side: self.side(),
            price: rounded_price,
            quantity: qty,
            status: OrderStatus::None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let result = ctx.executor.submit_batch(&ctx.symbol, vec![order]).await;
        match result.placed.into_iter().find(|(c, _)| c.as_str() == coid.as_str()) {
            Some((_, order_id)) => {
                self.total_cost += quote_amount;
                self.total_qty += qty;
                self.entries.push(Entry { price: rounded_price, quantity: qty, cost: quote_amount, order_id: Some(order_id) });
                self.stats.signals_generated += 1;
            }
            None => {
                if let Some(alloc) = &self.allocator {
                    alloc.release(&self.name, quote_amount);
                }
            }
        }
        Ok(())
    }

    async fn close_all(&mut self, pnl_pct: Decimal) -> anyhow::Result<()> {
        let realized = self.total_cost * pnl_pct / Decimal::from(100);
        self.stats.record_trade(realized);
        if let Some(alloc) = &self.allocator {
            alloc.release(&self.name, self.total_cost);
        }
        self.entries.clear();
        self.total_cost = Decimal::ZERO;
        self.total_qty = Decimal::ZERO;
        Ok(())
    }
}

#[async_trait]
impl Strategy for MartingaleStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&mut self, ctx: StrategyContext) -> anyhow::Result<()> {
        self.ctx = Some(ctx);
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

    async fn on_price_change(&mut self, price: Decimal) -> anyhow::Result<()> {
        if self.state != StrategyState::Running {
            return Ok(());
        }
        self.trend_short.push(price);
        self.trend_long.push(price);

        if self.entries.is_empty() {
            if self.trend_allows_entry() {
                self.submit(price, self.cfg.initial_amount).await?;
            }
            return Ok(());
        }

        let pnl_pct = self.aggregate_pnl_pct(price);
        if pnl_pct >= self.cfg.take_profit || pnl_pct <= -self.cfg.stop_loss {
            return self.close_all(pnl_pct).await;
        }

        let Some(last) = self.entries.last() else { return Ok(()) };
        let moved_pct = match self.cfg.direction {
            MartingaleDirection::Long => (last.price - price) / last.price * Decimal::from(100),
            MartingaleDirection::Short => (price - last.price) / last.price * Decimal::from(100),
        };

        let adverse = moved_pct >= self.cfg.price_step_pct;
        let favorable = -moved_pct >= self.cfg.price_step_pct;

        if self.entries.len() as u32 >= self.cfg.max_levels {
            return Ok(());
        }

        if adverse && !self.cfg.reverse_mode {
            let level = self.entries.len() as u32;
            let decay = crate::indicators::pow_decimal(self.cfg.decay_factor, level.saturating_sub(1));
            let scale = (self.cfg.multiplier * decay).max(self.cfg.min_multiplier);
            let amount = last.cost * scale;
            self.submit(price, amount).await?;
        } else if favorable && self.cfg.reverse_mode {
            let amount = last.cost * self.cfg.reverse_multiplier;
            self.submit(price, amount).await?;
        }
        Ok(())
    }

    async fn on_order_update(
        &mut self,
        order_id: &OrderId,
        status: OrderStatus,
        _filled_qty: Decimal,
        _fill_price: Decimal,
    ) -> anyhow::Result<()> {
        if status == OrderStatus::Filled && self.entries.iter().any(|e| e.order_id.as_ref() == Some(order_id)) {
            self.stats.fills_received += 1;
        }
        Ok(())
    }

    fn get_statistics(&self) -> StrategyStats {
        self.stats.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn cfg() -> MartingaleConfig {
        MartingaleConfig {
            direction: MartingaleDirection::Long,
            initial_amount: dec!(100),
            price_step_pct: dec!(2),
            multiplier: dec!(2),
            decay_factor: dec!(0.9),
            min_multiplier: dec!(1.1),
            max_levels: 5,
            reverse_mode: false,
            reverse_multiplier: dec!(1.5),
            take_profit: dec!(3),
            stop_loss: dec!(20),
            trend_filter: false,
            price_decimals: 2,
            quantity_decimals: 4,
        }
    }

    #[test]
    fn aggregate_pnl_sign_flips_for_short() {
        let mut s = MartingaleStrategy::new("m1".into(), cfg(), None);
        s.cfg.direction = MartingaleDirection::Short;
        s.total_cost = dec!(100);
        s.total_qty = dec!(1);
        assert!(s.aggregate_pnl_pct(dec!(90)) > Decimal::ZERO);
        assert!(s.aggregate_pnl_pct(dec!(110)) < Decimal::ZERO);
    }
}
