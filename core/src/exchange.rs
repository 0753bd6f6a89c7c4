//! The Exchange Adapter capability set (spec §6). Concrete adapters
//! (Binance/Bitget/Phemex/Bitfinex/OKX) are out of scope; this trait is the
//! contract this workspace's executor/price-monitor/reconciler consume.
//!
//! Grounded on the teacher's `execution::Executor` trait shape (one method
//! per capability, `Result`-returning, `Send` bound), generalized from "one
//! exchange, compiled in" to "any exchange, behind a trait object" since
//! there is no single exchange to monomorphize against here.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::ids::{ClientOrderId, OrderId};
use crate::types::{Order, OrderStatus, Position, Side};

/// One exchange-reported order status update, fed into `OnOrderUpdate`.
#[derive(Debug, Clone)]
pub struct OrderUpdate {
    pub order_id: OrderId,
    pub client_order_id: Option<ClientOrderId>,
    pub symbol: String,
    pub side: Side,
    pub status: OrderStatus,
    pub filled_qty: Decimal,
    pub avg_fill_price: Decimal,
}

/// Account balance summary, as much as this workspace needs for capital
/// allocation and pre-trade checks.
#[derive(Debug, Clone)]
pub struct AccountInfo {
    pub total_equity: Decimal,
    pub available_margin: Decimal,
}

/// One OHLCV candle.
#[derive(Debug, Clone)]
pub struct Kline {
    pub open_time: chrono::DateTime<chrono::Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Result of a batch order submission (spec §4.3 `BatchResult`).
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub placed: Vec<OrderId>,
    pub has_margin_error: bool,
    pub reduce_only_errors: Vec<ClientOrderId>,
}

#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    async fn place_order(&self, order: &Order) -> anyhow::Result<OrderId>;
    async fn cancel_order(&self, symbol: &str, order_id: &OrderId) -> anyhow::Result<()>;
    async fn batch_place_orders(&self, orders: &[Order]) -> anyhow::Result<BatchResult>;
    async fn batch_cancel_orders(&self, symbol: &str, order_ids: &[OrderId]) -> anyhow::Result<()>;
    async fn get_open_orders(&self, symbol: &str) -> anyhow::Result<Vec<Order>>;
    async fn get_positions(&self, symbol: &str) -> anyhow::Result<Vec<Position>>;
    async fn get_account(&self) -> anyhow::Result<AccountInfo>;
    async fn get_historical_klines(
        &self,
        symbol: &str,
        limit: u32,
    ) -> anyhow::Result<Vec<Kline>>;

    /// Subscribes to price ticks; implementations push onto the channel
    /// until the returned task is dropped/canceled.
    async fn subscribe_price(
        &self,
        symbol: &str,
    ) -> anyhow::Result<tokio::sync::mpsc::Receiver<Decimal>>;

    /// Subscribes to this account's own order status updates for `symbol`.
    async fn subscribe_own_orders(
        &self,
        symbol: &str,
    ) -> anyhow::Result<tokio::sync::mpsc::Receiver<OrderUpdate>>;

    fn price_decimals(&self, symbol: &str) -> u32;
    fn quantity_decimals(&self, symbol: &str) -> u32;
    fn base_asset(&self, symbol: &str) -> String;
    fn quote_asset(&self, symbol: &str) -> String;
}
