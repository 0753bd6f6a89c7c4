//! Shared data model: the types every other crate in this workspace builds
//! on. Mirrors spec §3 ("Data Model") field for field.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::{ClientOrderId, OrderId};

/// Order/position side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Order lifecycle state, as tracked by this workspace (not the exchange's
/// own internal state machine, which may have more states).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    None,
    Placed,
    Partial,
    Filled,
    Canceled,
    Rejected,
}

/// A slot's position lifecycle, independent of its order lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    /// No inventory held at this level.
    Empty,
    /// Buy filled, no outstanding sell placed against it yet.
    Held,
    /// Buy filled, a sell is outstanding and linked via `paired_sell_slot_key`.
    Paired,
    /// The paired sell filled; a Trade was emitted; slot is reusable.
    Closed,
}

/// A canonical, rounded grid price level plus the float it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceKey {
    /// Canonical string key, stable across float/Decimal representation
    /// differences (see [`crate::decimal_ext::price_key`]).
    pub key: String,
    pub price: Decimal,
}

/// The central grid entity: one row per discretized price level, per
/// symbol. Owned exclusively by the symbol's SPM actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub price_key: PriceKey,
    pub side: Side,
    pub order_id: Option<OrderId>,
    pub client_order_id: Option<ClientOrderId>,
    pub order_status: OrderStatus,
    pub position_status: PositionStatus,
    pub position_qty: Decimal,
    /// Set when `position_status == Paired`: the slot key of the linked sell.
    pub paired_sell_slot_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    pub fn empty(price_key: PriceKey, side: Side, now: DateTime<Utc>) -> Self {
        Self {
            price_key,
            side,
            order_id: None,
            client_order_id: None,
            order_status: OrderStatus::None,
            position_status: PositionStatus::Empty,
            position_qty: Decimal::ZERO,
            paired_sell_slot_key: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Invariant (spec §3): HELD ⟹ filled buy and no outstanding sell.
    pub fn is_held_consistent(&self) -> bool {
        !matches!(self.position_status, PositionStatus::Held) || self.paired_sell_slot_key.is_none()
    }

    /// Invariant (spec §3): PAIRED ⟹ filled buy, outstanding sell linked by key.
    pub fn is_paired_consistent(&self) -> bool {
        !matches!(self.position_status, PositionStatus::Paired) || self.paired_sell_slot_key.is_some()
    }
}

/// An order as tracked by this workspace (mirrors spec §3 `Order`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: Option<OrderId>,
    pub client_order_id: ClientOrderId,
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Derived, non-authoritative view of inventory at a price level; the slot
/// table is authoritative, this is for reporting/UI consumption only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub slot_price: Decimal,
    pub symbol: String,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Append-only record, emitted exactly once per PAIRED→CLOSED transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub exchange: String,
    pub symbol: String,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub quantity: Decimal,
    pub realized_pnl: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Grid risk-control parameters (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridRiskControl {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub max_grid_layers: u32,
    #[serde(default)]
    pub stop_loss_ratio: Decimal,
    #[serde(default)]
    pub take_profit_trigger_ratio: Decimal,
    #[serde(default)]
    pub trailing_take_profit_ratio: Decimal,
    #[serde(default)]
    pub trend_filter_enabled: bool,
}

impl Default for GridRiskControl {
    fn default() -> Self {
        Self {
            enabled: false,
            max_grid_layers: 0,
            stop_loss_ratio: Decimal::ZERO,
            take_profit_trigger_ratio: Decimal::ZERO,
            trailing_take_profit_ratio: Decimal::ZERO,
            trend_filter_enabled: false,
        }
    }
}

impl GridRiskControl {
    /// Validates the ratio-in-[0,1] and layer-count invariants spec §3 names.
    pub fn validate(&self) -> Result<(), String> {
        for (name, ratio) in [
            ("stop_loss_ratio", self.stop_loss_ratio),
            ("take_profit_trigger_ratio", self.take_profit_trigger_ratio),
            ("trailing_take_profit_ratio", self.trailing_take_profit_ratio),
        ] {
            if ratio < Decimal::ZERO || ratio > Decimal::ONE {
                return Err(format!("{name} must be in [0,1], got {ratio}"));
            }
        }
        Ok(())
    }
}

/// Per-symbol trading configuration (spec §3 `Symbol config`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolConfig {
    pub exchange: String,
    pub symbol: String,
    pub price_interval: Decimal,
    pub order_quantity_quote: Decimal,
    pub min_order_value_quote: Decimal,
    pub buy_window_size: u32,
    pub sell_window_size: u32,
    #[serde(default = "default_reconcile_interval_s")]
    pub reconcile_interval_s: u64,
    #[serde(default = "default_cleanup_threshold")]
    pub order_cleanup_threshold: u32,
    #[serde(default = "default_cleanup_batch_size")]
    pub cleanup_batch_size: u32,
    #[serde(default)]
    pub margin_lock_duration_s: u64,
    #[serde(default)]
    pub position_safety_check: bool,
    #[serde(default)]
    pub grid_risk_control: GridRiskControl,
}

fn default_reconcile_interval_s() -> u64 {
    60
}
fn default_cleanup_threshold() -> u32 {
    500
}
fn default_cleanup_batch_size() -> u32 {
    50
}

impl SymbolConfig {
    /// Validation: `price_interval = 0` is rejected (spec §8 boundary behavior).
    pub fn validate(&self) -> Result<(), String> {
        if self.price_interval <= Decimal::ZERO {
            return Err(format!(
                "symbol {}: price_interval must be positive, got {}",
                self.symbol, self.price_interval
            ));
        }
        if self.order_quantity_quote <= Decimal::ZERO {
            return Err(format!(
                "symbol {}: order_quantity_quote must be positive",
                self.symbol
            ));
        }
        self.grid_risk_control.validate().map_err(|e| format!("symbol {}: {e}", self.symbol))
    }
}

/// Allocator ledger entry for one strategy (spec §3 `Strategy capital entry`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalEntry {
    pub allocated: Decimal,
    pub used: Decimal,
    pub weight: Decimal,
    pub fixed_pool: bool,
}

impl CapitalEntry {
    /// `available = allocated - used`, never negative (spec §3 invariant).
    pub fn available(&self) -> Decimal {
        let avail = self.allocated - self.used;
        if avail < Decimal::ZERO {
            Decimal::ZERO
        } else {
            avail
        }
    }
}

/// Per-symbol reconciliation snapshot (spec §3 `Reconciliation snapshot`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationSnapshot {
    pub symbol: String,
    pub reconcile_time: DateTime<Utc>,
    pub local_position: Decimal,
    pub exchange_position: Decimal,
    pub position_diff: Decimal,
    pub active_buy_orders: u32,
    pub active_sell_orders: u32,
    pub pending_sell_qty: Decimal,
    pub total_buy_qty: Decimal,
    pub total_sell_qty: Decimal,
    pub estimated_profit: Decimal,
    pub actual_profit_cumulative: Decimal,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capital_entry_available_never_negative() {
        let e = CapitalEntry {
            allocated: Decimal::from(100),
            used: Decimal::from(150),
            weight: Decimal::ONE,
            fixed_pool: false,
        };
        assert_eq!(e.available(), Decimal::ZERO);
    }

    #[test]
    fn symbol_config_rejects_zero_price_interval() {
        let cfg = SymbolConfig {
            exchange: "binance".into(),
            symbol: "BTCUSDT".into(),
            price_interval: Decimal::ZERO,
            order_quantity_quote: Decimal::from(10),
            min_order_value_quote: Decimal::from(5),
            buy_window_size: 3,
            sell_window_size: 3,
            reconcile_interval_s: 60,
            order_cleanup_threshold: 500,
            cleanup_batch_size: 50,
            margin_lock_duration_s: 0,
            position_safety_check: false,
            grid_risk_control: GridRiskControl::default(),
        };
        assert!(cfg.validate().is_err());
    }
}
