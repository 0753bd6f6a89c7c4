//! Chains `MultiStrategyExecutor` -> `OrderExecutor` -> a mock
//! `ExchangeAdapter`, the full order-submission path spec.md §4.3/§4.4
//! describe, which the crate's own unit tests only exercise one layer at a
//! time (`OrderExecutor` alone against a `MockAdapter`).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use engine_core::{
    AccountInfo, BatchResult, CapitalReserve, ClientOrderId, ExchangeAdapter, Kline, Order, OrderId, OrderStatus,
    OrderUpdate, Position, Side,
};
use engine_execution::{MultiStrategyExecutor, OrderExecutor};
use engine_grid::OrderSink;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

struct AlwaysFillsAdapter;

#[async_trait]
impl ExchangeAdapter for AlwaysFillsAdapter {
    async fn place_order(&self, order: &Order) -> anyhow::Result<OrderId> {
        Ok(OrderId::new(order.client_order_id.as_str().to_string()))
    }
    async fn cancel_order(&self, _symbol: &str, _order_id: &OrderId) -> anyhow::Result<()> {
        Ok(())
    }
    async fn batch_place_orders(&self, orders: &[Order]) -> anyhow::Result<BatchResult> {
        Ok(BatchResult {
            placed: orders.iter().map(|o| OrderId::new(o.client_order_id.as_str().to_string())).collect(),
            has_margin_error: false,
            reduce_only_errors: Vec::new(),
        })
    }
    async fn batch_cancel_orders(&self, _symbol: &str, _order_ids: &[OrderId]) -> anyhow::Result<()> {
        Ok(())
    }
    async fn get_open_orders(&self, _symbol: &str) -> anyhow::Result<Vec<Order>> {
        Ok(Vec::new())
    }
    async fn get_positions(&self, _symbol: &str) -> anyhow::Result<Vec<Position>> {
        Ok(Vec::new())
    }
    async fn get_account(&self) -> anyhow::Result<AccountInfo> {
        Ok(AccountInfo { total_equity: dec!(0), available_margin: dec!(0) })
    }
    async fn get_historical_klines(&self, _symbol: &str, _limit: u32) -> anyhow::Result<Vec<Kline>> {
        Ok(Vec::new())
    }
    async fn subscribe_price(&self, _symbol: &str) -> anyhow::Result<tokio::sync::mpsc::Receiver<Decimal>> {
        let (_tx, rx) = tokio::sync::mpsc::channel(1);
        Ok(rx)
    }
    async fn subscribe_own_orders(&self, _symbol: &str) -> anyhow::Result<tokio::sync::mpsc::Receiver<OrderUpdate>> {
        let (_tx, rx) = tokio::sync::mpsc::channel(1);
        Ok(rx)
    }
    fn price_decimals(&self, _symbol: &str) -> u32 {
        2
    }
    fn quantity_decimals(&self, _symbol: &str) -> u32 {
        4
    }
    fn base_asset(&self, _symbol: &str) -> String {
        "BTC".into()
    }
    fn quote_asset(&self, _symbol: &str) -> String {
        "USDT".into()
    }
}

/// Minimal in-memory reserve, standing in for `engine-strategy`'s
/// `CapitalAllocator` without pulling that crate in as a dev-dependency.
struct FixedPool {
    available: std::sync::Mutex<HashMap<String, Decimal>>,
}

impl CapitalReserve for FixedPool {
    fn try_reserve(&self, strategy: &str, amount: Decimal) -> bool {
        let mut guard = self.available.lock().unwrap();
        let balance = guard.entry(strategy.to_string()).or_insert(Decimal::ZERO);
        if *balance < amount {
            return false;
        }
        *balance -= amount;
        true
    }

    fn release(&self, strategy: &str, amount: Decimal) {
        *self.available.lock().unwrap().entry(strategy.to_string()).or_insert(Decimal::ZERO) += amount;
    }
}

fn order(coid: &str, price: Decimal, qty: Decimal) -> Order {
    Order {
        order_id: None,
        client_order_id: ClientOrderId(coid.to_string()),
        symbol: "BTCUSDT".into(),
        side: Side::Buy,
        price,
        quantity: qty,
        status: OrderStatus::None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn full_stack_reserves_capital_submits_and_attributes_the_order() {
    let adapter: Arc<dyn ExchangeAdapter> = Arc::new(AlwaysFillsAdapter);
    let executor: Arc<dyn OrderSink> = Arc::new(OrderExecutor::new(adapter));

    let mut seed = HashMap::new();
    seed.insert("dca_btc".to_string(), dec!(1000));
    let pool: Arc<dyn CapitalReserve> = Arc::new(FixedPool { available: std::sync::Mutex::new(seed) });

    let order_strategy = Arc::new(DashMap::new());
    let guarded = MultiStrategyExecutor::new(executor, pool.clone(), "dca_btc", order_strategy.clone());

    let result = guarded.submit_batch("BTCUSDT", vec![order("dca_btc_1_a", dec!(100), dec!(1))]).await;

    assert_eq!(result.placed.len(), 1);
    assert!(!pool.try_reserve("dca_btc", dec!(950)), "the $100 notional should still be reserved, not released");

    let (_, order_id) = &result.placed[0];
    let owner = MultiStrategyExecutor::strategy_for_order(&order_strategy, order_id);
    assert_eq!(owner.as_deref(), Some("dca_btc"));
}

#[tokio::test]
async fn capital_denial_blocks_submission_entirely() {
    let adapter: Arc<dyn ExchangeAdapter> = Arc::new(AlwaysFillsAdapter);
    let executor: Arc<dyn OrderSink> = Arc::new(OrderExecutor::new(adapter));
    let pool: Arc<dyn CapitalReserve> = Arc::new(FixedPool { available: std::sync::Mutex::new(HashMap::new()) }); // no capital registered

    let order_strategy = Arc::new(DashMap::new());
    let guarded = MultiStrategyExecutor::new(executor, pool, "dca_btc", order_strategy);

    let result = guarded.submit_batch("BTCUSDT", vec![order("dca_btc_1_a", dec!(100), dec!(1))]).await;
    assert!(result.placed.is_empty());
}
