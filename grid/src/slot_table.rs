//! `SlotTable`: the pure, synchronous grid state machine. No channels, no
//! async — the [`crate::actor`] module wraps this in a single-writer Tokio
//! task per spec §9's redesign flag. Kept separate so the state machine is
//! unit-testable without spinning up a runtime, mirroring the split between
//! the teacher's async tick loop (`engine/generic.rs`) and its pure mutation
//! methods (`core/types.rs`).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use engine_core::decimal_ext::{level, price_key};
use engine_core::{ClientOrderId, Order, OrderId, OrderStatus, PositionStatus, PriceKey, Side, Slot, SymbolConfig, Trade};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::risk::{self, RiskAction, TrailingState};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpmError {
    #[error("no slot at price key {0}")]
    NoSuchSlot(String),
    #[error("order update references unknown order_id {0}")]
    UnknownOrder(String),
}

/// One step of the plan `adjust_orders` produces: orders to cancel and orders
/// to place. The actor submits this via an [`crate::sink::OrderSink`].
#[derive(Debug, Clone, Default)]
pub struct AdjustPlan {
    pub cancel: Vec<OrderId>,
    pub place: Vec<Order>,
}

pub struct SlotTable {
    config: SymbolConfig,
    /// Keyed by `(side, price_key.key)` — buy and sell slots at the same
    /// canonical price never collide.
    slots: HashMap<(Side, String), Slot>,
    /// order_id -> (side, price_key) for O(1) resolution in `on_order_update`.
    order_index: HashMap<OrderId, (Side, String)>,
    /// buy slot key -> margin-lock expiry, set when its fill pairs a sell.
    margin_locked_until: HashMap<String, DateTime<Utc>>,
    /// Trades emitted since the last drain (storage/event-bus consume these).
    pending_trades: Vec<Trade>,
    /// Monotonic counter bounding repeated cleanup cost; not persisted.
    orders_seen: u32,
    /// Post-trigger peak tracker for trailing take-profit (spec §4.1 risk control).
    trailing: TrailingState,
    /// Set by a stop-loss trigger; `adjust_orders` stops placing new buys
    /// until an operator calls [`Self::resume`].
    paused: bool,
    /// Set for the current tick only when the layer cap is reached; cleared
    /// on the next call to `evaluate_risk`.
    layer_cap_this_tick: bool,
}

impl SlotTable {
    pub fn new(config: SymbolConfig) -> Self {
        Self {
            config,
            slots: HashMap::new(),
            order_index: HashMap::new(),
            margin_locked_until: HashMap::new(),
            pending_trades: Vec::new(),
            orders_seen: 0,
            trailing: TrailingState::default(),
            paused: false,
            layer_cap_this_tick: false,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Clears the manual-resume pause a stop-loss trigger set.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Weighted average cost and layer count across HELD/PAIRED buy slots,
    /// the inputs grid risk control evaluates against.
    fn held_summary(&self) -> (Decimal, u32) {
        let held: Vec<&Slot> = self
            .slots
            .iter()
            .filter(|((side, _), s)| *side == Side::Buy && matches!(s.position_status, PositionStatus::Held | PositionStatus::Paired))
            .map(|(_, s)| s)
            .collect();
        let layers = held.len() as u32;
        let total_qty: Decimal = held.iter().map(|s| s.position_qty).sum();
        if total_qty.is_zero() {
            return (Decimal::ZERO, layers);
        }
        let weighted: Decimal = held.iter().map(|s| s.price_key.price * s.position_qty).sum();
        (weighted / total_qty, layers)
    }

    /// Evaluates grid risk control against the table's current inventory and,
    /// on a StopLoss or TrailingTakeProfitHit trigger, force-closes every
    /// HELD/PAIRED slot at `current_price` (spec §4.1, §8 scenarios 2/3).
    /// Returns the action taken plus any live sell orders the caller must
    /// cancel against the exchange.
    pub fn evaluate_risk(&mut self, current_price: Decimal, now: DateTime<Utc>) -> (RiskAction, Vec<OrderId>) {
        let control = self.config.grid_risk_control.clone();
        let (avg_cost, held_layers) = self.held_summary();
        let action = risk::evaluate(&control, held_layers, avg_cost, current_price, true, &mut self.trailing);
        self.layer_cap_this_tick = matches!(action, RiskAction::LayerCapReached);

        let cancels = match action {
            RiskAction::StopLoss | RiskAction::TrailingTakeProfitHit => {
                let cancels = self.force_exit_all(current_price, now);
                self.paused = action == RiskAction::StopLoss;
                self.trailing.reset();
                cancels
            }
            RiskAction::LayerCapReached | RiskAction::None => Vec::new(),
        };
        (action, cancels)
    }

    /// Closes every HELD/PAIRED buy slot at `exit_price`, emitting one Trade
    /// per slot and returning the live sell order ids (if any) to cancel.
    fn force_exit_all(&mut self, exit_price: Decimal, now: DateTime<Utc>) -> Vec<OrderId> {
        let mut cancels = Vec::new();
        let buy_keys: Vec<String> = self
            .slots
            .iter()
            .filter(|((side, _), s)| *side == Side::Buy && matches!(s.position_status, PositionStatus::Held | PositionStatus::Paired))
            .map(|((_, k), _)| k.clone())
            .collect();

        for buy_key in buy_keys {
            let paired_sell_key = self.slots.get(&(Side::Buy, buy_key.clone())).and_then(|s| s.paired_sell_slot_key.clone());
            if let Some(sell_key) = paired_sell_key {
                if let Some(sell_slot) = self.slots.get(&(Side::Sell, sell_key.clone())) {
                    if let Some(oid) = &sell_slot.order_id {
                        cancels.push(oid.clone());
                    }
                }
                if let Some(removed) = self.slots.remove(&(Side::Sell, sell_key)) {
                    if let Some(oid) = removed.order_id {
                        self.order_index.remove(&oid);
                    }
                }
            }

            let Some(buy_slot) = self.slots.get_mut(&(Side::Buy, buy_key.clone())) else {
                continue;
            };
            let qty = buy_slot.position_qty;
            let buy_price = buy_slot.price_key.price;
            let buy_order_id = buy_slot.order_id.take().unwrap_or_else(|| OrderId::new("unknown"));
            buy_slot.position_status = PositionStatus::Closed;
            buy_slot.position_qty = Decimal::ZERO;
            buy_slot.client_order_id = None;
            buy_slot.order_status = OrderStatus::None;
            buy_slot.paired_sell_slot_key = None;
            buy_slot.updated_at = now;

            self.order_index.remove(&buy_order_id);
            self.pending_trades.push(Trade {
                buy_order_id,
                sell_order_id: OrderId::new("risk-exit"),
                exchange: self.config.exchange.clone(),
                symbol: self.config.symbol.clone(),
                buy_price,
                sell_price: exit_price,
                quantity: qty,
                realized_pnl: (exit_price - buy_price) * qty,
                created_at: now,
            });
        }

        cancels
    }

    pub fn config(&self) -> &SymbolConfig {
        &self.config
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, side: Side, key: &str) -> Option<&Slot> {
        self.slots.get(&(side, key.to_string()))
    }

    /// Drains and returns Trades emitted since the last call. Each PAIRED
    /// slot closure emits exactly one Trade (spec §8 invariant).
    pub fn drain_trades(&mut self) -> Vec<Trade> {
        std::mem::take(&mut self.pending_trades)
    }

    fn key_at(&self, current_price: Decimal, offset_levels: i64) -> PriceKey {
        let interval = self.config.price_interval;
        let base = level(current_price, interval);
        let p = base + interval * Decimal::from(offset_levels);
        PriceKey {
            key: price_key(p, decimals_for(interval)),
            price: p,
        }
    }

    fn ensure_slot(&mut self, side: Side, pk: PriceKey, now: DateTime<Utc>) {
        self.slots
            .entry((side, pk.key.clone()))
            .or_insert_with(|| Slot::empty(pk, side, now));
    }

    /// Computes the buy/sell window around `current_price` and returns the
    /// plan of cancels/places the caller should submit. Steps mirror spec
    /// §4.1's `AdjustOrders` numbering.
    pub fn adjust_orders(&mut self, current_price: Decimal, now: DateTime<Utc>) -> AdjustPlan {
        let mut plan = AdjustPlan::default();
        let buy_w = self.config.buy_window_size as i64;
        let sell_w = self.config.sell_window_size as i64;

        // Step 1: compute windows as sets of in-window canonical keys.
        let buy_window_keys: Vec<PriceKey> = if buy_w == 0 {
            Vec::new()
        } else {
            (1..=buy_w).map(|i| self.key_at(current_price, -i)).collect()
        };
        let buy_window_set: std::collections::HashSet<String> =
            buy_window_keys.iter().map(|k| k.key.clone()).collect();

        for pk in &buy_window_keys {
            self.ensure_slot(Side::Buy, pk.clone(), now);
        }

        // Step 2: cancel out-of-window placed buys, unless the slot is still
        // within its post-fill margin lock window (spec §4.1 margin-lock guard).
        let stale_buy_keys: Vec<String> = self
            .slots
            .iter()
            .filter(|((side, key), slot)| {
                *side == Side::Buy
                    && matches!(slot.order_status, OrderStatus::Placed | OrderStatus::Partial)
                    && !buy_window_set.contains(key)
            })
            .map(|((_, key), _)| key.clone())
            .collect();
        for key in stale_buy_keys {
            if let Some(locked_until) = self.margin_locked_until.get(&key) {
                if now < *locked_until {
                    continue;
                }
            }
            if let Some(slot) = self.slots.get(&(Side::Buy, key.clone())) {
                if let Some(oid) = &slot.order_id {
                    plan.cancel.push(oid.clone());
                }
            }
        }

        // Step 3: place missing in-window buys (empty slots, no order yet).
        // Skipped entirely while paused by a stop-loss trigger (spec §8 scenario 2)
        // or for this tick only if the layer cap is reached.
        if buy_w > 0 && !self.paused && !self.layer_cap_this_tick {
            for pk in &buy_window_keys {
                let slot = self.slots.get(&(Side::Buy, pk.key.clone())).expect("ensured above");
                if matches!(slot.position_status, PositionStatus::Empty)
                    && matches!(slot.order_status, OrderStatus::None | OrderStatus::Canceled | OrderStatus::Rejected)
                {
                    let qty = self.config.order_quantity_quote / pk.price;
                    let coid = ClientOrderId::for_slot("grid", &self.config.symbol, &pk.key);
                    plan.place.push(Order {
                        order_id: None,
                        client_order_id: coid,
                        symbol: self.config.symbol.clone(),
                        side: Side::Buy,
                        price: pk.price,
                        quantity: qty,
                        status: OrderStatus::None,
                        created_at: now,
                        updated_at: now,
                    });
                }
            }
        }

        // Step 4: place missing sells for HELD slots that lack an outstanding sell.
        let held_without_sell: Vec<(String, Decimal, Decimal)> = self
            .slots
            .iter()
            .filter(|((side, _), slot)| {
                *side == Side::Buy
                    && matches!(slot.position_status, PositionStatus::Held)
            })
            .map(|((_, key), slot)| (key.clone(), slot.price_key.price, slot.position_qty))
            .collect();

        for (buy_key, buy_price, qty) in held_without_sell {
            if sell_w == 0 {
                continue; // boundary behavior: sell_window_size=0 => no sells ever
            }
            let interval = self.config.price_interval;
            let sell_price = buy_price + interval;
            let sell_pk = PriceKey {
                key: price_key(sell_price, decimals_for(interval)),
                price: sell_price,
            };
            self.ensure_slot(Side::Sell, sell_pk.clone(), now);
            let sell_slot = self.slots.get(&(Side::Sell, sell_pk.key.clone())).expect("ensured above");
            if matches!(sell_slot.order_status, OrderStatus::None | OrderStatus::Canceled | OrderStatus::Rejected) {
                let coid = ClientOrderId::for_slot("grid", &self.config.symbol, &sell_pk.key);
                plan.place.push(Order {
                    order_id: None,
                    client_order_id: coid,
                    symbol: self.config.symbol.clone(),
                    side: Side::Sell,
                    price: sell_price,
                    quantity: qty,
                    status: OrderStatus::None,
                    created_at: now,
                    updated_at: now,
                });
                // link the buy slot to its pending sell slot (PAIRED happens
                // fully once the sell order is actually PLACED, see on_order_update)
                if let Some(buy_slot) = self.slots.get_mut(&(Side::Buy, buy_key.clone())) {
                    buy_slot.paired_sell_slot_key = Some(sell_pk.key.clone());
                }
            }
        }

        // Step 6: cleanup when the table has grown past the configured threshold.
        self.cleanup_if_needed(&mut plan);

        plan
    }

    fn cleanup_if_needed(&mut self, plan: &mut AdjustPlan) {
        if self.slots.len() as u32 <= self.config.order_cleanup_threshold {
            return;
        }
        let mut closed_keys: Vec<(Side, String)> = self
            .slots
            .iter()
            .filter(|(_, s)| matches!(s.position_status, PositionStatus::Closed))
            .map(|(k, _)| k.clone())
            .collect();
        closed_keys.truncate(self.config.cleanup_batch_size as usize);
        for key in closed_keys {
            if let Some(slot) = self.slots.remove(&key) {
                if let Some(oid) = slot.order_id {
                    self.order_index.remove(&oid);
                }
            }
        }
        let _ = plan; // cleanup never cancels live orders, only prunes closed slots
    }

    /// Registers that `client_order_id`/`order_id` now belongs to the slot at
    /// `(side, price_key)`. Called once the executor confirms submission.
    pub fn record_placed(&mut self, side: Side, price_key: &str, order_id: OrderId, now: DateTime<Utc>) {
        if let Some(slot) = self.slots.get_mut(&(side, price_key.to_string())) {
            slot.order_id = Some(order_id.clone());
            slot.order_status = OrderStatus::Placed;
            slot.updated_at = now;
            if side == Side::Sell {
                // find the paired buy slot and transition it to PAIRED now
                // that its sell is actually live on the exchange.
                if let Some(buy_key) = self
                    .slots
                    .iter()
                    .find(|((s, _), sl)| *s == Side::Buy && sl.paired_sell_slot_key.as_deref() == Some(price_key))
                    .map(|((_, k), _)| k.clone())
                {
                    if let Some(buy_slot) = self.slots.get_mut(&(Side::Buy, buy_key)) {
                        buy_slot.position_status = PositionStatus::Paired;
                        buy_slot.updated_at = now;
                    }
                }
            }
        }
        self.order_index.insert(order_id, (side, price_key.to_string()));
    }

    /// Applies one order status update, per spec §4.1 `OnOrderUpdate`.
    pub fn on_order_update(
        &mut self,
        order_id: &OrderId,
        status: OrderStatus,
        filled_qty: Decimal,
        fill_price: Decimal,
        exchange: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SpmError> {
        self.orders_seen += 1;
        let (side, key) = self
            .order_index
            .get(order_id)
            .cloned()
            .ok_or_else(|| SpmError::UnknownOrder(order_id.to_string()))?;

        match side {
            Side::Buy => self.apply_buy_update(&key, status, filled_qty, now),
            Side::Sell => self.apply_sell_update(&key, status, filled_qty, fill_price, exchange, now)?,
        }
        Ok(())
    }

    fn apply_buy_update(&mut self, key: &str, status: OrderStatus, filled_qty: Decimal, now: DateTime<Utc>) {
        let Some(slot) = self.slots.get_mut(&(Side::Buy, key.to_string())) else {
            return;
        };
        slot.order_status = status;
        slot.updated_at = now;
        match status {
            OrderStatus::Filled => {
                slot.position_status = PositionStatus::Held;
                slot.position_qty = filled_qty;
                self.margin_locked_until.insert(
                    key.to_string(),
                    now + chrono::Duration::seconds(self.config.margin_lock_duration_s as i64),
                );
            }
            OrderStatus::Partial => {
                slot.position_qty = filled_qty;
                self.margin_locked_until.insert(
                    key.to_string(),
                    now + chrono::Duration::seconds(self.config.margin_lock_duration_s as i64),
                );
            }
            OrderStatus::Canceled | OrderStatus::Rejected => {
                slot.order_id = None;
                slot.client_order_id = None;
            }
            _ => {}
        }
    }

    fn apply_sell_update(
        &mut self,
        key: &str,
        status: OrderStatus,
        filled_qty: Decimal,
        fill_price: Decimal,
        exchange: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SpmError> {
        let sell_key = key.to_string();
        let sell_order_id = self
            .slots
            .get(&(Side::Sell, sell_key.clone()))
            .and_then(|s| s.order_id.clone());

        let Some(sell_slot) = self.slots.get_mut(&(Side::Sell, sell_key.clone())) else {
            return Ok(());
        };
        sell_slot.order_status = status;
        sell_slot.updated_at = now;

        if status != OrderStatus::Filled {
            if matches!(status, OrderStatus::Canceled | OrderStatus::Rejected) {
                sell_slot.order_id = None;
                sell_slot.client_order_id = None;
            }
            return Ok(());
        }

        // Find the buy slot paired to this sell slot and close it.
        let buy_key = self
            .slots
            .iter()
            .find(|((s, _), sl)| *s == Side::Buy && sl.paired_sell_slot_key.as_deref() == Some(sell_key.as_str()))
            .map(|((_, k), _)| k.clone())
            .ok_or_else(|| SpmError::NoSuchSlot(sell_key.clone()))?;

        let buy_slot = self
            .slots
            .get_mut(&(Side::Buy, buy_key.clone()))
            .ok_or_else(|| SpmError::NoSuchSlot(buy_key.clone()))?;
        let buy_order_id = buy_slot.order_id.clone().ok_or_else(|| SpmError::NoSuchSlot(buy_key.clone()))?;
        let buy_price = buy_slot.price_key.price;
        buy_slot.position_status = PositionStatus::Closed;
        buy_slot.position_qty = Decimal::ZERO;
        buy_slot.order_id = None;
        buy_slot.client_order_id = None;
        buy_slot.order_status = OrderStatus::None;
        buy_slot.paired_sell_slot_key = None;
        buy_slot.updated_at = now;

        let realized_pnl = (fill_price - buy_price) * filled_qty;
        self.pending_trades.push(Trade {
            buy_order_id,
            sell_order_id: sell_order_id.unwrap_or_else(|| OrderId::new("unknown")),
            exchange: exchange.to_string(),
            symbol: self.config.symbol.clone(),
            buy_price,
            sell_price: fill_price,
            quantity: filled_qty,
            realized_pnl,
            created_at: now,
        });

        // the sell slot itself becomes reusable (remove it so a future level
        // touch re-creates it fresh).
        if let Some(removed) = self.slots.remove(&(Side::Sell, sell_key)) {
            if let Some(oid) = removed.order_id {
                self.order_index.remove(&oid);
            }
        }

        Ok(())
    }

    /// Invariant check (spec §8): a slot is never HELD while its own-side
    /// SELL order is PLACED. Exposed for property tests.
    pub fn check_held_invariant(&self) -> bool {
        self.slots.values().all(|s| s.is_held_consistent() && s.is_paired_consistent())
    }
}

fn decimals_for(interval: Decimal) -> u32 {
    interval.scale().max(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_core::GridRiskControl;
    use rust_decimal_macros::dec;

    fn cfg() -> SymbolConfig {
        SymbolConfig {
            exchange: "binance".into(),
            symbol: "BTCUSDT".into(),
            price_interval: dec!(1),
            order_quantity_quote: dec!(100),
            min_order_value_quote: dec!(10),
            buy_window_size: 2,
            sell_window_size: 2,
            reconcile_interval_s: 60,
            order_cleanup_threshold: 500,
            cleanup_batch_size: 50,
            margin_lock_duration_s: 0,
            position_safety_check: false,
            grid_risk_control: GridRiskControl::default(),
        }
    }

    #[test]
    fn adjust_orders_places_buys_in_window() {
        let mut table = SlotTable::new(cfg());
        let now = Utc::now();
        let plan = table.adjust_orders(dec!(100), now);
        assert_eq!(plan.place.len(), 2);
        assert!(plan.place.iter().all(|o| o.side == Side::Buy));
    }

    #[test]
    fn buy_window_zero_never_buys() {
        let mut c = cfg();
        c.buy_window_size = 0;
        let mut table = SlotTable::new(c);
        let plan = table.adjust_orders(dec!(100), Utc::now());
        assert!(plan.place.is_empty());
    }

    #[test]
    fn fill_then_sell_then_close_emits_one_trade() {
        let mut table = SlotTable::new(cfg());
        let now = Utc::now();
        let plan = table.adjust_orders(dec!(100), now);
        let buy_order = plan.place.into_iter().find(|o| o.price == dec!(99)).unwrap();
        let oid = OrderId::new("ex-1");
        table.record_placed(Side::Buy, "99.00", oid.clone(), now);
        table
            .on_order_update(&oid, OrderStatus::Filled, buy_order.quantity, dec!(99), "binance", now)
            .unwrap();
        assert!(table.check_held_invariant());

        let plan2 = table.adjust_orders(dec!(100), now);
        let sell_order = plan2.place.iter().find(|o| o.side == Side::Sell).expect("sell should be queued").clone();
        let sell_oid = OrderId::new("ex-2");
        let sell_key = price_key(dec!(100), decimals_for(dec!(1)));
        table.record_placed(Side::Sell, &sell_key, sell_oid.clone(), now);
        table
            .on_order_update(&sell_oid, OrderStatus::Filled, sell_order.quantity, dec!(100), "binance", now)
            .unwrap();

        let trades = table.drain_trades();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].realized_pnl, dec!(1) * sell_order.quantity);
    }

    fn risk_cfg() -> SymbolConfig {
        let mut c = cfg();
        c.grid_risk_control = GridRiskControl {
            enabled: true,
            max_grid_layers: 0,
            stop_loss_ratio: dec!(0.02),
            take_profit_trigger_ratio: dec!(0),
            trailing_take_profit_ratio: dec!(0),
            trend_filter_enabled: false,
        };
        c
    }

    /// Ticks `adjust_orders` at `tick_price`, fills the nearest queued buy,
    /// and returns its price. Mirrors how `fill_then_sell_then_close_emits_one_trade`
    /// derives a fillable buy from a tick.
    fn fill_nearest_buy(table: &mut SlotTable, tick_price: Decimal, oid: &str, now: DateTime<Utc>) -> Decimal {
        let plan = table.adjust_orders(tick_price, now);
        let buy_order = plan.place.into_iter().find(|o| o.side == Side::Buy).unwrap();
        let key = price_key(buy_order.price, decimals_for(dec!(1)));
        let order_id = OrderId::new(oid);
        table.record_placed(Side::Buy, &key, order_id.clone(), now);
        table
            .on_order_update(&order_id, OrderStatus::Filled, buy_order.quantity, buy_order.price, "binance", now)
            .unwrap();
        buy_order.price
    }

    #[test]
    fn stop_loss_trigger_closes_held_slots_and_pauses_new_buys() {
        let mut table = SlotTable::new(risk_cfg());
        let now = Utc::now();
        fill_nearest_buy(&mut table, dec!(100), "ex-1", now);

        let (action, cancels) = table.evaluate_risk(dec!(95), now);
        assert_eq!(action, RiskAction::StopLoss);
        assert!(cancels.is_empty(), "no sell was outstanding yet to cancel");

        let trades = table.drain_trades();
        assert_eq!(trades.len(), 1);
        assert!(trades[0].realized_pnl < Decimal::ZERO, "forced exit below cost should realize a loss");

        assert!(table.is_paused());
        let plan = table.adjust_orders(dec!(95), now);
        assert!(plan.place.iter().all(|o| o.side != Side::Buy), "no new buys while paused");

        table.resume();
        let plan = table.adjust_orders(dec!(95), now);
        assert!(plan.place.iter().any(|o| o.side == Side::Buy), "buys resume after manual resume");
    }

    #[test]
    fn margin_lock_guards_a_freshly_filled_buy_from_immediate_cancellation() {
        let mut c = cfg();
        c.margin_lock_duration_s = 60;
        let mut table = SlotTable::new(c);
        let now = Utc::now();

        let plan = table.adjust_orders(dec!(100), now);
        let buy_order = plan.place.into_iter().find(|o| o.price == dec!(99)).unwrap();
        let oid = OrderId::new("ex-1");
        table.record_placed(Side::Buy, "99.00", oid.clone(), now);
        table
            .on_order_update(&oid, OrderStatus::Partial, buy_order.quantity / dec!(2), dec!(99), "binance", now)
            .unwrap();

        // price moves far enough that the buy at 99 falls out of window
        let plan2 = table.adjust_orders(dec!(200), now);
        assert!(plan2.cancel.is_empty(), "still within the margin lock window");

        let later = now + chrono::Duration::seconds(61);
        let plan3 = table.adjust_orders(dec!(200), later);
        assert!(plan3.cancel.contains(&oid), "lock expired, stale buy should now be cancelled");
    }

    #[test]
    fn no_risk_trigger_when_control_disabled() {
        let mut table = SlotTable::new(cfg());
        let now = Utc::now();
        fill_nearest_buy(&mut table, dec!(100), "ex-1", now);
        let (action, _) = table.evaluate_risk(dec!(1), now);
        assert_eq!(action, RiskAction::None);
        assert!(!table.is_paused());
    }
}
