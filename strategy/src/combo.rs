//! `ComboStrategy` (spec §4.2): a meta-strategy composing N child
//! strategies with weights and preferred-market tags, a 30s-cadence
//! market-state classifier, and adaptive per-child weighting.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use engine_core::{OrderId, OrderStatus};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::factory::StrategyInstanceConfig;
use crate::indicators::RollingWindow;
use crate::traits::{Strategy, StrategyContext, StrategyState, StrategyStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketState {
    Bullish,
    Bearish,
    Sideways,
    Volatile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComboChildConfig {
    pub name: String,
    pub instance: StrategyInstanceConfig,
    /// Empty means always-on regardless of market state.
    #[serde(default)]
    pub preferred_states: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ComboConfig {
    pub children: Vec<ComboChildConfig>,
    #[serde(default = "default_vol_threshold")]
    pub volatility_threshold: Decimal,
    #[serde(default = "default_rebalance_interval_ticks")]
    pub rebalance_interval_ticks: u64,
    /// Cadence of the market-state classifier, independent of
    /// `rebalance_interval_ticks` (spec §4.2: classification runs on its
    /// own 30s timer, reweighting on the tick-count gate).
    #[serde(default = "default_classify_interval_s")]
    pub classify_interval_s: i64,
}

fn default_vol_threshold() -> Decimal {
    Decimal::from(2)
}

fn default_rebalance_interval_ticks() -> u64 {
    30
}

fn default_classify_interval_s() -> i64 {
    30
}

fn parse_state(s: &str) -> Option<MarketState> {
    match s {
        "bullish" => Some(MarketState::Bullish),
        "bearish" => Some(MarketState::Bearish),
        "sideways" => Some(MarketState::Sideways),
        "volatile" => Some(MarketState::Volatile),
        _ => None,
    }
}

struct Child {
    strategy: Box<dyn Strategy>,
    preferred: Vec<MarketState>,
    effective_weight: Decimal,
}

pub struct ComboStrategy {
    name: String,
    cfg: ComboConfig,
    state: StrategyState,
    children: Vec<Child>,
    short: RollingWindow,
    long: RollingWindow,
    atr: RollingWindow,
    tick_count: u64,
    current_state: MarketState,
    last_classified_at: Option<DateTime<Utc>>,
}

impl ComboStrategy {
    pub fn new(name: String, children: Vec<Box<dyn Strategy>>, cfg: ComboConfig) -> Self {
        let preferred: Vec<Vec<MarketState>> = cfg
            .children
            .iter()
            .map(|c| c.preferred_states.iter().filter_map(|s| parse_state(s)).collect())
            .collect();
        let children = children
            .into_iter()
            .zip(preferred)
            .map(|(strategy, preferred)| Child { strategy, preferred, effective_weight: Decimal::ONE })
            .collect();
        Self {
            name,
            cfg,
            state: StrategyState::Running,
            children,
            short: RollingWindow::new(10),
            long: RollingWindow::new(30),
            atr: RollingWindow::new(14),
            tick_count: 0,
            current_state: MarketState::Sideways,
            last_classified_at: None,
        }
    }

    /// True once `classify_interval_s` has elapsed since the last
    /// classification (or it has never run).
    fn classify_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_classified_at {
            None => true,
            Some(last) => (now - last) >= chrono::Duration::seconds(self.cfg.classify_interval_s),
        }
    }

    fn classify(&self) -> MarketState {
        let (Some(short), Some(long)) = (self.short.sma(10), self.long.sma(30)) else {
            return self.current_state;
        };
        if let Some(atr_pct) = self.atr.atr_pct() {
            if atr_pct > self.cfg.volatility_threshold {
                return MarketState::Volatile;
            }
        }
        if short > long * Decimal::new(102, 2) {
            MarketState::Bullish
        } else if short < long * Decimal::new(98, 2) {
            MarketState::Bearish
        } else {
            MarketState::Sideways
        }
    }

    /// Nudges each child's effective weight toward (preferred) or away
    /// from (not preferred) the current market state; never globally
    /// renormalized (spec.md §9's documented anomaly — see
    /// [`Self::renormalize`] for the opt-in the spec leaves available).
    fn adaptive_reweight(&mut self) {
        let current_state = self.current_state;
        for child in &mut self.children {
            let active = child.preferred.is_empty() || child.preferred.contains(&current_state);
            let factor = if active { Decimal::new(15, 1) } else { Decimal::new(5, 1) };
            child.effective_weight = (child.effective_weight * factor).clamp(Decimal::new(1, 1), Decimal::ONE);
        }
    }

    /// Rescales every child's effective weight so they sum to 1.0. Exists
    /// at operator/implementer discretion; never called automatically.
    pub fn renormalize(&mut self) {
        let sum: Decimal = self.children.iter().map(|c| c.effective_weight).sum();
        if sum <= Decimal::ZERO {
            return;
        }
        for child in &mut self.children {
            child.effective_weight /= sum;
        }
    }
}

#[async_trait]
impl Strategy for ComboStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&mut self, ctx: StrategyContext) -> anyhow::Result<()> {
        for child in &mut self.children {
            child.strategy.initialize(ctx.clone()).await?;
        }
        Ok(())
    }

    fn start(&mut self) {
        self.state = StrategyState::Running;
        for child in &mut self.children {
            child.strategy.start();
        }
    }

    fn stop(&mut self) {
        self.state = StrategyState::Stopped;
        for child in &mut self.children {
            child.strategy.stop();
        }
    }

    fn pause(&mut self) {
        if self.state != StrategyState::Stopped {
            self.state = StrategyState::Paused;
        }
        for child in &mut self.children {
            child.strategy.pause();
        }
    }

    fn resume(&mut self) {
        if self.state != StrategyState::Stopped {
            self.state = StrategyState::Running;
        }
        for child in &mut self.children {
            child.strategy.resume();
        }
    }

    fn state(&self) -> StrategyState {
        self.state
    }

    async fn on_price_change(&mut self, price: Decimal) -> anyhow::Result<()> {
        if self.state != StrategyState::Running {
            return Ok(());
        }
        self.short.push(price);
        self.long.push(price);
        self.atr.push(price);
        self.tick_count += 1;

        let now = Utc::now();
        if self.classify_due(now) {
            self.current_state = self.classify();
            self.last_classified_at = Some(now);
        }
        if self.tick_count % self.cfg.rebalance_interval_ticks == 0 {
            self.adaptive_reweight();
        }

        let current_state = self.current_state;
        for child in &mut self.children {
            let active = child.preferred.is_empty() || child.preferred.contains(&current_state);
            if active {
                child.strategy.on_price_change(price).await?;
            }
        }
        Ok(())
    }

    async fn on_order_update(
        &mut self,
        order_id: &OrderId,
        status: OrderStatus,
        filled_qty: Decimal,
        fill_price: Decimal,
    ) -> anyhow::Result<()> {
        for child in &mut self.children {
            child.strategy.on_order_update(order_id, status, filled_qty, fill_price).await?;
        }
        Ok(())
    }

    fn get_statistics(&self) -> StrategyStats {
        let mut total = StrategyStats::default();
        for child in &self.children {
            let stats = child.strategy.get_statistics();
            total.signals_generated += stats.signals_generated;
            total.fills_received += stats.fills_received;
            total.total_buy_volume += stats.total_buy_volume;
            total.total_sell_volume += stats.total_sell_volume;
            total.realized_pnl += stats.realized_pnl;
            total.winning_trades += stats.winning_trades;
            total.losing_trades += stats.losing_trades;
        }
        total
    }
}
