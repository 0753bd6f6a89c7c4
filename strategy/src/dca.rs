//! `DcaEnhancedStrategy` (spec §4.2): a lazy safety-order ladder with
//! ATR-scaled spacing, four take-profit exits plus a trailing exit,
//! cascade-drop protection, and an optional MA/EMA trend filter.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine_core::decimal_ext::truncate_quantity;
use engine_core::{ClientOrderId, Event, EventType, Order, OrderId, OrderStatus, Side};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::warn;

use crate::allocator::CapitalAllocator;
use crate::indicators::{pow_decimal, RollingWindow};
use crate::traits::{Strategy, StrategyContext, StrategyState, StrategyStats};

#[derive(Debug, Clone)]
pub struct Layer {
    pub index: u32,
    pub price: Decimal,
    pub quantity: Decimal,
    pub cost: Decimal,
    pub order_id: Option<OrderId>,
    pub status: OrderStatus,
    pub filled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DcaConfig {
    pub base_order_amount: Decimal,
    pub safety_order_amount: Decimal,
    pub safety_order_scale: Decimal,
    pub safety_order_step: Decimal,
    pub max_safety_orders: u32,
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
    pub atr_multiplier: Decimal,
    pub min_price_step: Decimal,
    pub max_price_step: Decimal,
    pub first_order_take_profit: Decimal,
    pub last_order_take_profit: Decimal,
    pub total_take_profit: Decimal,
    pub trailing_activation: Decimal,
    pub trailing_take_profit: Decimal,
    pub stop_loss: Decimal,
    pub cascade_drop_threshold: Decimal,
    pub cascade_pause_duration_s: u64,
    #[serde(default)]
    pub trend_filter: bool,
    #[serde(default = "default_decimals")]
    pub price_decimals: u32,
    #[serde(default = "default_decimals")]
    pub quantity_decimals: u32,
}

fn default_atr_period() -> usize {
    14
}

fn default_decimals() -> u32 {
    8
}

pub struct DcaStrategy {
    name: String,
    cfg: DcaConfig,
    state: StrategyState,
    ctx: Option<StrategyContext>,
    allocator: Option<Arc<CapitalAllocator>>,
    layers: Vec<Layer>,
    total_cost: Decimal,
    total_qty: Decimal,
    highest_profit_pct: Decimal,
    trailing_armed: bool,
    cascade_pause_until: Option<DateTime<Utc>>,
    atr_window: RollingWindow,
    peak_window: RollingWindow,
    trend_short: RollingWindow,
    trend_long: RollingWindow,
    nonce: u64,
    stats: StrategyStats,
}

impl DcaStrategy {
    pub fn new(name: String, cfg: DcaConfig, allocator: Option<Arc<CapitalAllocator>>) -> Self {
        let atr_period = cfg.atr_period;
        Self {
            name,
            cfg,
            state: StrategyState::Running,
            ctx: None,
            allocator,
            layers: Vec::new(),
            total_cost: Decimal::ZERO,
            total_qty: Decimal::ZERO,
            highest_profit_pct: Decimal::ZERO,
            trailing_armed: false,
            cascade_pause_until: None,
            atr_window: RollingWindow::new(atr_period.max(2)),
            peak_window: RollingWindow::new(10),
            trend_short: RollingWindow::new(10),
            trend_long: RollingWindow::new(30),
            nonce: 0,
            stats: StrategyStats::default(),
        }
    }

    fn avg_entry_price(&self) -> Decimal {
        if self.total_qty.is_zero() {
            return Decimal::ZERO;
        }
        self.total_cost / self.total_qty
    }

    /// Aggregate unrealized P&L percent at `price`, against average entry.
    fn aggregate_pnl_pct(&self, price: Decimal) -> Decimal {
        let avg = self.avg_entry_price();
        if avg.is_zero() {
            return Decimal::ZERO;
        }
        (price - avg) / avg * Decimal::from(100)
    }

    fn layer_pnl_pct(&self, layer: &Layer, price: Decimal) -> Decimal {
        if layer.price.is_zero() {
            return Decimal::ZERO;
        }
        (price - layer.price) / layer.price * Decimal::from(100)
    }

    fn trend_allows_entry(&self) -> bool {
        if !self.cfg.trend_filter {
            return true;
        }
        match (self.trend_short.sma(10), self.trend_long.sma(30)) {
            (Some(short), Some(long)) => short >= long,
            _ => true,
        }
    }

    fn next_client_order_id(&mut self, symbol: &str) -> ClientOrderId {
        self.nonce += 1;
        ClientOrderId::for_nonce(&self.name, symbol, self.nonce)
    }

    async fn submit_layer(&mut self, price: Decimal, quote_amount: Decimal, index: u32) -> anyhow::Result<()> {
        let Some(ctx) = self.ctx.clone() else { return Ok(()) };

        if let Some(alloc) = &self.allocator {
            if !alloc.try_reserve(&self.name, quote_amount) {
                warn!(strategy = %self.name, "DCA layer skipped, capital reservation denied");
                return Ok(());
            }
        }

        let rounded_price = engine_core::decimal_ext::round_price_half_even(price, self.cfg.price_decimals);
        let raw_qty = quote_amount / rounded_price;
        let qty = truncate_quantity(raw_qty, self.cfg.quantity_decimals);
        if qty.is_zero() {
            if let Some(alloc) = &self.allocator {
                alloc.release(&self.name, quote_amount);
            }
            if let Some(bus) = &ctx.event_bus {
                bus.publish(
                    Event::new(
                        EventType::PrecisionAdjustment,
                        "precision adjustment yielded zero quantity",
                        format!("strategy {} paused after a zero-quantity precision adjustment", self.name),
                    )
                    .with_symbol(ctx.exchange.clone(), ctx.symbol.clone()),
                );
            }
            self.pause();
            return Ok(());
        }

        let coid = self.next_client_order_id(&ctx.symbol);
        let order = Order {
            order_id: None,
            client_order_id: coid.clone(),
            symbol: ctx.symbol.clone(),
            side: Side::Buy,
            price: rounded_price,
            quantity: qty,
            status: OrderStatus::None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let result = ctx.executor.submit_batch(&ctx.symbol, vec![order]).await;
        let placed = result.placed.into_iter().find(|(c, _)| c.as_str() == coid.as_str());
        match placed {
            Some((_, order_id)) => {
                self.total_cost += quote_amount;
                self.total_qty += qty;
                self.layers.push(Layer {
                    index,
                    price: rounded_price,
                    quantity: qty,
                    cost: quote_amount,
                    order_id: Some(order_id),
                    status: OrderStatus::Placed,
                    filled_at: None,
                });
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

    async fn maybe_open_base(&mut self, price: Decimal) -> anyhow::Result<()> {
        if !self.trend_allows_entry() {
            return Ok(());
        }
        self.submit_layer(price, self.cfg.base_order_amount, 0).await
    }

    async fn maybe_add_safety_order(&mut self, price: Decimal) -> anyhow::Result<()> {
        if self.layers.len() as u32 > self.cfg.max_safety_orders {
            return Ok(());
        }
        let Some(last) = self.layers.last().cloned() else { return Ok(()) };
        let layer_idx = self.layers.len() as u32;

        let dynamic_interval = self
            .atr_window
            .atr_pct()
            .map(|atr| atr * self.cfg.atr_multiplier)
            .unwrap_or(self.cfg.min_price_step)
            .clamp(self.cfg.min_price_step, self.cfg.max_price_step);

        let required_drop = dynamic_interval * pow_decimal(self.cfg.safety_order_step, layer_idx.saturating_sub(1));
        let drop_pct = if last.price.is_zero() {
            Decimal::ZERO
        } else {
            (last.price - price) / last.price * Decimal::from(100)
        };

        if drop_pct < required_drop {
            return Ok(());
        }

        let amount = self.cfg.safety_order_amount * pow_decimal(self.cfg.safety_order_scale, layer_idx.saturating_sub(1));
        self.submit_layer(price, amount, layer_idx).await
    }

    fn evaluate_cascade(&mut self, price: Decimal) {
        self.peak_window.push(price);
        if self.peak_window.len() < 2 {
            return;
        }
        let Some(peak) = self.peak_window.max() else { return };
        if peak.is_zero() {
            return;
        }
        let drop_pct = (peak - price) / peak * Decimal::from(100);
        if drop_pct >= self.cfg.cascade_drop_threshold {
            self.cascade_pause_until =
                Some(Utc::now() + chrono::Duration::seconds(self.cfg.cascade_pause_duration_s as i64));
        }
    }

    fn cascade_paused(&self) -> bool {
        self.cascade_pause_until.map(|t| Utc::now() < t).unwrap_or(false)
    }

    /// Returns `Some(realized_pnl_pct)` if any exit condition fires.
    fn evaluate_exit(&mut self, price: Decimal) -> Option<Decimal> {
        let aggregate = self.aggregate_pnl_pct(price);

        if let Some(first) = self.layers.first() {
            if self.layer_pnl_pct(first, price) >= self.cfg.first_order_take_profit {
                return Some(aggregate);
            }
        }
        if let Some(last) = self.layers.last() {
            if self.layer_pnl_pct(last, price) >= self.cfg.last_order_take_profit {
                return Some(aggregate);
            }
        }
        if aggregate >= self.cfg.total_take_profit {
            return Some(aggregate);
        }
        if aggregate >= self.cfg.trailing_activation {
            self.trailing_armed = true;
        }
        if self.trailing_armed {
            if aggregate > self.highest_profit_pct {
                self.highest_profit_pct = aggregate;
            }
            if self.highest_profit_pct - aggregate >= self.cfg.trailing_take_profit {
                return Some(aggregate);
            }
        }
        if aggregate <= -self.cfg.stop_loss {
            return Some(aggregate);
        }
        None
    }

    async fn close_all(&mut self, realized_pnl_pct: Decimal) -> anyhow::Result<()> {
        let realized_quote = self.total_cost * realized_pnl_pct / Decimal::from(100);
        self.stats.record_trade(realized_quote);
        if let Some(alloc) = &self.allocator {
            alloc.release(&self.name, self.total_cost);
        }
        self.layers.clear();
        self.total_cost = Decimal::ZERO;
        self.total_qty = Decimal::ZERO;
        self.highest_profit_pct = Decimal::ZERO;
        self.trailing_armed = false;
        Ok(())
    }
}

#[async_trait]
impl Strategy for DcaStrategy {
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
        self.atr_window.push(price);
        self.trend_short.push(price);
        self.trend_long.push(price);

        if self.layers.is_empty() {
            return self.maybe_open_base(price).await;
        }

        if let Some(pnl) = self.evaluate_exit(price) {
            return self.close_all(pnl).await;
        }

        self.evaluate_cascade(price);
        if !self.cascade_paused() {
            self.maybe_add_safety_order(price).await?;
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
        if let Some(layer) = self.layers.iter_mut().find(|l| l.order_id.as_ref() == Some(order_id)) {
            layer.status = status;
            if status == OrderStatus::Filled {
                layer.filled_at = Some(Utc::now());
                self.stats.fills_received += 1;
                self.stats.total_buy_volume += layer.quantity;
            }
        }
        Ok(())
    }

    fn get_statistics(&self) -> StrategyStats {
        self.stats.clone()
    }
}
