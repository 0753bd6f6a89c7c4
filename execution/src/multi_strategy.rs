//! Multi-strategy capital guard (spec §4.4): wraps an [`OrderSink`] so every
//! order placed through it first reserves capital from a
//! [`CapitalReserve`], releasing the reservation immediately if the
//! underlying sink rejects the order. Also keeps an order_id -> strategy
//! name map so fills can be attributed back to the strategy that placed
//! them.
//!
//! Grounded on the teacher's pattern of wrapping a lower-level executor to
//! add a cross-cutting concern (see `JournaledExecutor` wrapping fill
//! tracking around a bare executor) rather than baking accounting into the
//! executor itself.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use engine_core::{CapitalReserve, OrderId};
use engine_grid::{OrderSink, SinkResult};
use tracing::warn;

pub struct MultiStrategyExecutor {
    inner: Arc<dyn OrderSink>,
    allocator: Arc<dyn CapitalReserve>,
    strategy: String,
    order_strategy: Arc<DashMap<String, String>>,
}

impl MultiStrategyExecutor {
    pub fn new(
        inner: Arc<dyn OrderSink>,
        allocator: Arc<dyn CapitalReserve>,
        strategy: impl Into<String>,
        order_strategy: Arc<DashMap<String, String>>,
    ) -> Self {
        Self {
            inner,
            allocator,
            strategy: strategy.into(),
            order_strategy,
        }
    }

    pub fn strategy_for_order(map: &DashMap<String, String>, order_id: &OrderId) -> Option<String> {
        map.get(&order_id.0).map(|v| v.clone())
    }
}

#[async_trait]
impl OrderSink for MultiStrategyExecutor {
    async fn submit_batch(&self, symbol: &str, orders: Vec<engine_core::Order>) -> SinkResult {
        let mut reserved = Vec::with_capacity(orders.len());
        let mut admitted = Vec::with_capacity(orders.len());
        for order in orders {
            let notional = order.price * order.quantity;
            if self.allocator.try_reserve(&self.strategy, notional) {
                reserved.push(notional);
                admitted.push(order);
            } else {
                warn!(symbol, strategy = %self.strategy, "capital reservation denied, dropping order");
            }
        }

        if admitted.is_empty() {
            return SinkResult::default();
        }

        let client_order_ids: Vec<_> = admitted.iter().map(|o| o.client_order_id.clone()).collect();
        let result = self.inner.submit_batch(symbol, admitted).await;

        let placed_ids: std::collections::HashSet<&str> =
            result.placed.iter().map(|(c, _)| c.as_str()).collect();
        for (coid, notional) in client_order_ids.iter().zip(reserved.iter()) {
            if !placed_ids.contains(coid.as_str()) {
                self.allocator.release(&self.strategy, *notional);
            }
        }
        for (coid, order_id) in &result.placed {
            let _ = coid;
            self.order_strategy.insert(order_id.0.clone(), self.strategy.clone());
        }

        result
    }

    async fn cancel_batch(&self, symbol: &str, order_ids: Vec<OrderId>) {
        self.inner.cancel_batch(symbol, order_ids).await;
    }
}
