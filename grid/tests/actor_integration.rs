//! Drives a live `SpmHandle` through a mock `OrderSink`, exercising the
//! actor/channel boundary that `slot_table.rs`'s own unit tests bypass.

use std::sync::Arc;

use async_trait::async_trait;
use engine_core::{GridRiskControl, OrderId, OrderStatus, SymbolConfig};
use engine_grid::{actor, OrderSink, SinkResult, SlotTable};
use rust_decimal_macros::dec;
use tokio::sync::Mutex;

struct RecordingSink {
    placed: Mutex<Vec<String>>,
}

#[async_trait]
impl OrderSink for RecordingSink {
    async fn submit_batch(&self, _symbol: &str, orders: Vec<engine_core::Order>) -> SinkResult {
        let mut placed = self.placed.lock().await;
        let mut result = SinkResult::default();
        for order in orders {
            placed.push(order.client_order_id.as_str().to_string());
            result.placed.push((order.client_order_id.clone(), OrderId::new(format!("ex-{}", placed.len()))));
        }
        result
    }

    async fn cancel_batch(&self, _symbol: &str, _order_ids: Vec<OrderId>) {}
}

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

#[tokio::test]
async fn adjust_orders_tick_places_buys_through_sink() {
    let sink = Arc::new(RecordingSink { placed: Mutex::new(Vec::new()) });
    let handle = actor::spawn(SlotTable::new(cfg()), sink.clone(), 32);

    handle.send_adjust_orders(dec!(100));
    // give the actor task a tick to process the message
    tokio::task::yield_now().await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let placed = sink.placed.lock().await;
    assert_eq!(placed.len(), 2, "expected two buy orders placed in the window");
}

#[tokio::test]
async fn on_order_update_for_unknown_order_does_not_panic_the_actor() {
    let sink = Arc::new(RecordingSink { placed: Mutex::new(Vec::new()) });
    let handle = actor::spawn(SlotTable::new(cfg()), sink, 32);

    let result = handle
        .on_order_update(OrderId::new("does-not-exist"), OrderStatus::Filled, dec!(1), dec!(100), "binance".into())
        .await;
    assert!(result.is_err(), "unknown order id should surface as an error, not a panic");

    // actor should still be alive and answer a follow-up query
    let query = handle.query().await;
    assert!(query.is_ok());
}
