//! The boundary between the grid core and the Order Executor.
//!
//! `SlotTable` decides *what* orders should exist; it never talks to an
//! exchange directly. `OrderSink` is the narrow contract the SPM actor uses
//! to submit that plan; `engine-execution`'s `OrderExecutor` implements it.
//! Keeping this trait in `engine-grid` (rather than depending on
//! `engine-execution` directly) avoids a crate cycle, since the executor
//! crate has no reason to depend back on the grid crate.

use async_trait::async_trait;
use engine_core::{ClientOrderId, Order, OrderId};

#[derive(Debug, Clone, Default)]
pub struct SinkResult {
    pub placed: Vec<(ClientOrderId, OrderId)>,
    pub has_margin_error: bool,
    pub failed_client_order_ids: Vec<ClientOrderId>,
}

#[async_trait]
pub trait OrderSink: Send + Sync {
    async fn submit_batch(&self, symbol: &str, orders: Vec<Order>) -> SinkResult;
    async fn cancel_batch(&self, symbol: &str, order_ids: Vec<OrderId>);
}
