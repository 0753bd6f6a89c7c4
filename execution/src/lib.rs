//! Order execution (spec §4.3, §4.5): the Order Executor, Event Bus, Event
//! Center, and the multi-strategy capital guard that wraps an
//! [`engine_grid::OrderSink`] with reserve/release accounting.

pub mod error;
pub mod event_bus;
pub mod event_center;
pub mod executor;
pub mod multi_strategy;

pub use error::ExecError;
pub use event_bus::EventBus;
pub use event_center::{EventCenter, EventPersister, LoggingNotifier, Notifier};
pub use executor::OrderExecutor;
pub use multi_strategy::MultiStrategyExecutor;

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use engine_core::{AccountInfo, BatchResult, ExchangeAdapter, Kline, Order, OrderId, OrderUpdate, Position, Side};
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct MockAdapter {
        calls: AtomicUsize,
        fail_times: usize,
    }

    struct RateLimitedMockAdapter {
        calls: AtomicUsize,
        fail_times: usize,
    }

    #[async_trait]
    impl ExchangeAdapter for RateLimitedMockAdapter {
        async fn place_order(&self, order: &Order) -> anyhow::Result<OrderId> {
            Ok(OrderId(order.client_order_id.as_str().to_string()))
        }
        async fn cancel_order(&self, _symbol: &str, _order_id: &OrderId) -> anyhow::Result<()> {
            Ok(())
        }
        async fn batch_place_orders(&self, orders: &[Order]) -> anyhow::Result<BatchResult> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                anyhow::bail!("rate limit exceeded, 429");
            }
            Ok(BatchResult {
                placed: orders
                    .iter()
                    .map(|o| OrderId(o.client_order_id.as_str().to_string()))
                    .collect(),
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
        async fn subscribe_price(&self, _symbol: &str) -> anyhow::Result<tokio::sync::mpsc::Receiver<rust_decimal::Decimal>> {
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

    #[async_trait]
    impl ExchangeAdapter for MockAdapter {
        async fn place_order(&self, order: &Order) -> anyhow::Result<OrderId> {
            Ok(OrderId(order.client_order_id.as_str().to_string()))
        }
        async fn cancel_order(&self, _symbol: &str, _order_id: &OrderId) -> anyhow::Result<()> {
            Ok(())
        }
        async fn batch_place_orders(&self, orders: &[Order]) -> anyhow::Result<BatchResult> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_times {
                anyhow::bail!("temporarily unavailable, please retry");
            }
            Ok(BatchResult {
                placed: orders
                    .iter()
                    .map(|o| OrderId(o.client_order_id.as_str().to_string()))
                    .collect(),
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
        async fn subscribe_price(&self, _symbol: &str) -> anyhow::Result<tokio::sync::mpsc::Receiver<rust_decimal::Decimal>> {
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

    fn order(coid: &str) -> Order {
        Order {
            order_id: None,
            client_order_id: engine_core::ClientOrderId(coid.to_string()),
            symbol: "BTCUSDT".into(),
            side: Side::Buy,
            price: dec!(100.123456),
            quantity: dec!(0.0001234),
            status: engine_core::OrderStatus::None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_then_succeeds() {
        use engine_grid::OrderSink;
        let adapter = Arc::new(MockAdapter { calls: AtomicUsize::new(0), fail_times: 2 });
        let executor = OrderExecutor::new(adapter);
        let result = executor.submit_batch("BTCUSDT", vec![order("grid_BTCUSDT_1_abc")]).await;
        assert_eq!(result.placed.len(), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        use engine_grid::OrderSink;
        let adapter = Arc::new(MockAdapter { calls: AtomicUsize::new(0), fail_times: 10 });
        let executor = OrderExecutor::new(adapter);
        let result = executor.submit_batch("BTCUSDT", vec![order("grid_BTCUSDT_1_abc")]).await;
        assert!(result.placed.is_empty());
        assert_eq!(result.failed_client_order_ids.len(), 1);
    }

    #[tokio::test]
    async fn rate_limited_retries_exactly_once_on_its_own_fixed_delay() {
        use engine_grid::OrderSink;
        let adapter = Arc::new(RateLimitedMockAdapter { calls: AtomicUsize::new(0), fail_times: 1 });
        let executor =
            OrderExecutor::new(adapter.clone()).with_rate_limit_retry_delay(std::time::Duration::from_millis(1));
        let result = executor.submit_batch("BTCUSDT", vec![order("grid_BTCUSDT_1_abc")]).await;
        assert_eq!(result.placed.len(), 1);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 2, "one initial attempt plus exactly one retry");
    }

    #[tokio::test]
    async fn rate_limited_gives_up_after_its_single_retry() {
        use engine_grid::OrderSink;
        let adapter = Arc::new(RateLimitedMockAdapter { calls: AtomicUsize::new(0), fail_times: 10 });
        let executor =
            OrderExecutor::new(adapter.clone()).with_rate_limit_retry_delay(std::time::Duration::from_millis(1));
        let result = executor.submit_batch("BTCUSDT", vec![order("grid_BTCUSDT_1_abc")]).await;
        assert!(result.placed.is_empty());
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 2, "rate limit never enters the generic backoff loop");
    }
}
