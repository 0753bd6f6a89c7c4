//! `TrendFollowingStrategy` / `MeanReversionStrategy` / `MomentumStrategy`
//! (spec §4.2): lighter strategies holding at most one position, entered
//! and exited on a single indicator condition (MA crossover, Bollinger
//! excursion, or RSI extreme respectively). Same shape, different signal
//! rule, so one struct parameterized by [`SignalKind`] implements all three
//! rather than three near-duplicate structs.

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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    MaCrossover,
    BollingerExcursion,
    RsiExtreme,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinglePositionConfig {
    pub order_amount: Decimal,
    #[serde(default = "default_short")]
    pub short_window: usize,
    #[serde(default = "default_long")]
    pub long_window: usize,
    #[serde(default = "default_bollinger_k")]
    pub bollinger_k: Decimal,
    #[serde(default = "default_rsi_overbought")]
    pub rsi_overbought: Decimal,
    #[serde(default = "default_rsi_oversold")]
    pub rsi_oversold: Decimal,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
    #[serde(default = "default_decimals")]
    pub price_decimals: u32,
    #[serde(default = "default_decimals")]
    pub quantity_decimals: u32,
}

fn default_short() -> usize {
    10
}
fn default_long() -> usize {
    30
}
fn default_bollinger_k() -> Decimal {
    Decimal::from(2)
}
fn default_rsi_overbought() -> Decimal {
    Decimal::from(70)
}
fn default_rsi_oversold() -> Decimal {
    Decimal::from(30)
}
fn default_decimals() -> u32 {
    8
}

struct OpenPosition {
    side: Side,
    entry_price: Decimal,
    quantity: Decimal,
    order_id: Option<OrderId>,
}

pub struct SinglePositionStrategy {
    name: String,
    kind: SignalKind,
    cfg: SinglePositionConfig,
    state: StrategyState,
    ctx: Option<StrategyContext>,
    allocator: Option<Arc<CapitalAllocator>>,
    window: RollingWindow,
    position: Option<OpenPosition>,
    nonce: u64,
    stats: StrategyStats,
}

impl SinglePositionStrategy {
    pub fn new(name: String, kind: SignalKind, cfg: SinglePositionConfig, allocator: Option<Arc<CapitalAllocator>>) -> Self {
        let capacity = cfg.long_window.max(cfg.short_window).max(2);
        Self {
            name,
            kind,
            cfg,
            state: StrategyState::Running,
            ctx: None,
            allocator,
            window: RollingWindow::new(capacity),
            position: None,
            nonce: 0,
            stats: StrategyStats::default(),
        }
    }

    /// `Some(side)` to enter, `None` to stay flat.
    fn entry_signal(&self) -> Option<Side> {
        match self.kind {
            SignalKind::MaCrossover => {
                let (short, long) = (self.window.sma(self.cfg.short_window)?, self.window.sma(self.cfg.long_window)?);
                if short > long {
                    Some(Side::Buy)
                } else if short < long {
                    Some(Side::Sell)
                } else {
                    None
                }
            }
            SignalKind::BollingerExcursion => {
                let (lower, _, upper) = self.window.bollinger(self.cfg.bollinger_k)?;
                let price = self.window.last()?;
                if price <= lower {
                    Some(Side::Buy)
                } else if price >= upper {
                    Some(Side::Sell)
                } else {
                    None
                }
            }
            SignalKind::RsiExtreme => {
                let rsi = self.window.rsi()?;
                if rsi <= self.cfg.rsi_oversold {
                    Some(Side::Buy)
                } else if rsi >= self.cfg.rsi_overbought {
                    Some(Side::Sell)
                } else {
                    None
                }
            }
        }
    }

    fn pnl_pct(&self, position: &OpenPosition, price: Decimal) -> Decimal {
        if position.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        let direction = match position.side {
            Side::Buy => Decimal::ONE,
            Side::Sell => -Decimal::ONE,
        };
        direction * (price - position.entry_price) / position.entry_price * Decimal::from(100)
    }

    async fn enter(&mut self, side: Side, price: Decimal) -> anyhow::Result<()> {
        let Some(ctx) = self.ctx.clone() else { return Ok(()) };

        if let Some(alloc) = &self.allocator {
            if !alloc.try_reserve(&self.name, self.cfg.order_amount) {
                warn!(strategy = %self.name, "single-position entry skipped, capital reservation denied");
                return Ok(());
            }
        }

        let rounded_price = round_price_half_even(price, self.cfg.price_decimals);
        let qty = truncate_quantity(self.cfg.order_amount / rounded_price, self.cfg.quantity_decimals);
        if qty.is_zero() {
            if let Some(alloc) = &self.allocator {
                alloc.release(&self.name, self.cfg.order_amount);
            }
            return Ok(());
        }

        self.nonce += 1;
        let coid = ClientOrderId::for_nonce(&self.name, &ctx.symbol, self.nonce);
        let order = Order {
            order_id: None,
            client_order_id: coid.clone(),
            symbol: ctx.symbol.clone(),
            side,
            price: rounded_price,
            quantity: qty,
            status: OrderStatus::None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let result = ctx.executor.submit_batch(&ctx.symbol, vec![order]).await;
        match result.placed.into_iter().find(|(c, _)| c.as_str() == coid.as_str()) {
            Some((_, order_id)) => {
                self.position = Some(OpenPosition { side, entry_price: rounded_price, quantity: qty, order_id: Some(order_id) });
                self.stats.signals_generated += 1;
            }
            None => {
                if let Some(alloc) = &self.allocator {
                    alloc.release(&self.name, self.cfg.order_amount);
                }
            }
        }
        Ok(())
    }

    async fn exit(&mut self, price: Decimal) -> anyhow::Result<()> {
        let Some(position) = self.position.take() else { return Ok(()) };
        let Some(ctx) = self.ctx.clone() else { return Ok(()) };

        let pnl_pct = self.pnl_pct(&position, price);
        let notional = position.entry_price * position.quantity;
        self.stats.record_trade(notional * pnl_pct / Decimal::from(100));

        if let Some(alloc) = &self.allocator {
            alloc.release(&self.name, notional);
        }

        self.nonce += 1;
        let coid = ClientOrderId::for_nonce(&self.name, &ctx.symbol, self.nonce);
        let order = Order {
            order_id: None,
            client_order_id: coid,
            symbol: ctx.symbol.clone(),
            side: position.side.opposite(),
            price: round_price_half_even(price, self.cfg.price_decimals),
            quantity: position.quantity,
            status: OrderStatus::None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        ctx.executor.submit_batch(&ctx.symbol, vec![order]).await;
        Ok(())
    }
}

#[async_trait]
impl Strategy for SinglePositionStrategy {
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
        self.window.push(price);

        if let Some(position) = &self.position {
            let pnl_pct = self.pnl_pct(position, price);
            if pnl_pct >= self.cfg.take_profit || pnl_pct <= -self.cfg.stop_loss {
                return self.exit(price).await;
            }
            return Ok(());
        }

        if let Some(side) = self.entry_signal() {
            self.enter(side, price).await?;
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
        if status == OrderStatus::Filled {
            if let Some(position) = &self.position {
                if position.order_id.as_ref() == Some(order_id) {
                    self.stats.fills_received += 1;
                }
            }
        }
        Ok(())
    }

    fn get_statistics(&self) -> StrategyStats {
        self.stats.clone()
    }
}
