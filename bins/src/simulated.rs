//! Built-in simulated exchange adapter.
//!
//! No live exchange adapter is implemented in this workspace (spec §6: "no
//! concrete adapter... out of scope"); this one fills immediately at the
//! requested price, pessimistic for maker strategies exactly like the
//! teacher's `SimulatedExecutor` ("Immediately fills orders at requested
//! prices (pessimistic simulation)"), generalized to the async
//! `ExchangeAdapter` trait and to a price feed driven by a random walk per
//! symbol instead of a replayed tape.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use engine_core::{
    AccountInfo, BatchResult, ExchangeAdapter, Kline, Order, OrderId, OrderStatus, OrderUpdate, Position, Side,
};
use rand::Rng;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::debug;

pub struct SimulatedAdapter {
    prices: Arc<DashMap<String, Decimal>>,
    net_position: DashMap<String, Decimal>,
    order_update_tx: DashMap<String, mpsc::Sender<OrderUpdate>>,
    price_decimals: u32,
    quantity_decimals: u32,
}

impl SimulatedAdapter {
    /// `initial_prices` seeds the random walk for every symbol the engine
    /// will trade; symbols absent from it fall back to `50000`.
    pub fn new(initial_prices: HashMap<String, Decimal>) -> Self {
        let prices = Arc::new(DashMap::new());
        for (symbol, price) in initial_prices {
            prices.insert(symbol, price);
        }
        Self {
            prices,
            net_position: DashMap::new(),
            order_update_tx: DashMap::new(),
            price_decimals: 2,
            quantity_decimals: 6,
        }
    }

    fn fill(&self, order: &Order) -> OrderId {
        let order_id = OrderId(order.client_order_id.as_str().to_string());
        let delta = match order.side {
            Side::Buy => order.quantity,
            Side::Sell => -order.quantity,
        };
        *self.net_position.entry(order.symbol.clone()).or_insert(Decimal::ZERO) += delta;

        if let Some(tx) = self.order_update_tx.get(&order.symbol) {
            let update = OrderUpdate {
                order_id: order_id.clone(),
                client_order_id: Some(order.client_order_id.clone()),
                symbol: order.symbol.clone(),
                side: order.side,
                status: OrderStatus::Filled,
                filled_qty: order.quantity,
                avg_fill_price: order.price,
            };
            if tx.try_send(update).is_err() {
                debug!(symbol = %order.symbol, "simulated adapter: own-order channel full, dropping fill notification");
            }
        }
        order_id
    }
}

#[async_trait]
impl ExchangeAdapter for SimulatedAdapter {
    async fn place_order(&self, order: &Order) -> anyhow::Result<OrderId> {
        Ok(self.fill(order))
    }

    async fn cancel_order(&self, _symbol: &str, _order_id: &OrderId) -> anyhow::Result<()> {
        // Orders fill instantly in this adapter, so there is never anything left to cancel.
        Ok(())
    }

    async fn batch_place_orders(&self, orders: &[Order]) -> anyhow::Result<BatchResult> {
        let placed = orders.iter().map(|o| self.fill(o)).collect();
        Ok(BatchResult { placed, has_margin_error: false, reduce_only_errors: Vec::new() })
    }

    async fn batch_cancel_orders(&self, _symbol: &str, _order_ids: &[OrderId]) -> anyhow::Result<()> {
        Ok(())
    }

    async fn get_open_orders(&self, _symbol: &str) -> anyhow::Result<Vec<Order>> {
        Ok(Vec::new())
    }

    async fn get_positions(&self, symbol: &str) -> anyhow::Result<Vec<Position>> {
        let size = self.net_position.get(symbol).map(|e| *e).unwrap_or(Decimal::ZERO);
        if size.is_zero() {
            return Ok(Vec::new());
        }
        let current_price = self.prices.get(symbol).map(|p| *p).unwrap_or(Decimal::ZERO);
        Ok(vec![Position {
            slot_price: current_price,
            symbol: symbol.to_string(),
            size,
            entry_price: current_price,
            current_price,
            unrealized_pnl: Decimal::ZERO,
            opened_at: chrono::Utc::now(),
            closed_at: None,
        }])
    }

    async fn get_account(&self) -> anyhow::Result<AccountInfo> {
        Ok(AccountInfo { total_equity: Decimal::from(1_000_000), available_margin: Decimal::from(1_000_000) })
    }

    async fn get_historical_klines(&self, _symbol: &str, _limit: u32) -> anyhow::Result<Vec<Kline>> {
        Ok(Vec::new())
    }

    async fn subscribe_price(&self, symbol: &str) -> anyhow::Result<mpsc::Receiver<Decimal>> {
        let (tx, rx) = mpsc::channel(64);
        let prices = self.prices.clone();
        let symbol = symbol.to_string();
        prices.entry(symbol.clone()).or_insert(Decimal::from(50_000));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(250));
            loop {
                ticker.tick().await;
                let next = {
                    let mut entry = prices.entry(symbol.clone()).or_insert(Decimal::from(50_000));
                    let pct = Decimal::new(rand::thread_rng().gen_range(-50..=50), 4); // +/- 0.5%
                    *entry = (*entry * (Decimal::ONE + pct)).max(Decimal::new(1, 2));
                    *entry
                };
                if tx.send(next).await.is_err() {
                    break;
                }
            }
        });

        Ok(rx)
    }

    async fn subscribe_own_orders(&self, symbol: &str) -> anyhow::Result<mpsc::Receiver<OrderUpdate>> {
        let (tx, rx) = mpsc::channel(256);
        self.order_update_tx.insert(symbol.to_string(), tx);
        Ok(rx)
    }

    fn price_decimals(&self, _symbol: &str) -> u32 {
        self.price_decimals
    }

    fn quantity_decimals(&self, _symbol: &str) -> u32 {
        self.quantity_decimals
    }

    fn base_asset(&self, symbol: &str) -> String {
        symbol.trim_end_matches("USDT").to_string()
    }

    fn quote_asset(&self, _symbol: &str) -> String {
        "USDT".to_string()
    }
}
